mod cli;
mod commands;
mod config;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use iotdash_core::SyncController;

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Config commands don't need a backend
        Command::Config(args) => commands::config_cmd::handle(args, &cli.global),

        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "iotdash", &mut std::io::stdout());
            Ok(())
        }

        // Watch keeps the controller running with polling and push
        Command::Watch(args) => {
            let sync_config = config::resolve(&cli.global)?;
            commands::watch::handle(sync_config, &args, &cli.global).await
        }

        cmd => {
            let sync_config = config::resolve(&cli.global)?;
            tracing::debug!(command = ?cmd, url = %sync_config.base_url, "dispatching command");
            let global = &cli.global;
            SyncController::oneshot(sync_config, |controller| async move {
                Ok(commands::dispatch(cmd, &controller, global).await)
            })
            .await?
        }
    }
}
