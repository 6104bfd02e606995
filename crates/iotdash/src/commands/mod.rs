//! Command dispatch: bridges CLI args -> sync controller -> output formatting.

pub mod alerts;
pub mod config_cmd;
pub mod devices;
pub mod relays;
pub mod sensors;
pub mod system;
pub mod util;
pub mod watch;

use iotdash_core::SyncController;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a backend-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    controller: &SyncController,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Devices(args) => devices::handle(controller, args, global).await,
        Command::Relays(args) => relays::handle(controller, args, global).await,
        Command::Sensors(args) => sensors::handle(controller, args, global).await,
        Command::Alerts(args) => alerts::handle(controller, &args, global).await,
        Command::Stats => system::stats(controller, global).await,
        Command::Health(args) => system::health(controller, &args, global).await,
        // Handled before a one-shot controller is built
        Command::Watch(_) | Command::Config(_) | Command::Completions(_) => Ok(()),
    }
}
