//! Shared helpers for command handlers.

use std::future::Future;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use iotdash_core::{CollectionKind, Mutation, MutationResult, ResourceId, SyncController};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Prompt for confirmation, auto-approving if `--yes` was passed.
///
/// Without a terminal to ask on, `--yes` is required.
pub fn confirm(message: &str, action: &str, global: &GlobalOpts) -> Result<bool, CliError> {
    if global.yes {
        return Ok(true);
    }
    if !std::io::IsTerminal::is_terminal(&std::io::stdin()) {
        return Err(CliError::NonInteractiveRequiresYes {
            action: action.into(),
        });
    }
    dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))
}

/// Run `fut` behind a spinner on stderr when it is a terminal.
pub async fn with_spinner<F, T>(message: String, global: &GlobalOpts, fut: F) -> T
where
    F: Future<Output = T>,
{
    let spinner = (!global.quiet && std::io::IsTerminal::is_terminal(&std::io::stderr())).then(|| {
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
            bar.set_style(style);
        }
        bar.set_message(message);
        bar.enable_steady_tick(Duration::from_millis(100));
        bar
    });
    let result = fut.await;
    if let Some(bar) = spinner {
        bar.finish_and_clear();
    }
    result
}

/// Execute a mutation with a spinner. The store holds the server's view
/// of every affected collection once this returns.
pub async fn execute(
    controller: &SyncController,
    mutation: Mutation,
    global: &GlobalOpts,
) -> Result<MutationResult, CliError> {
    let label = mutation.describe();
    let result = with_spinner(label, global, controller.execute(mutation)).await?;
    Ok(result)
}

/// Fetch one collection, failing the command if it cannot be read.
pub async fn load(controller: &SyncController, kind: CollectionKind) -> Result<(), CliError> {
    controller.refresh(kind).await?;
    Ok(())
}

pub fn parse_id(raw: &str) -> ResourceId {
    ResourceId::from(raw.trim())
}

pub fn not_found(resource_type: &str, identifier: &str, list_command: &str) -> CliError {
    CliError::NotFound {
        resource_type: resource_type.into(),
        identifier: identifier.into(),
        list_command: list_command.into(),
    }
}

/// `-` for absent values in tables.
pub fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".into(), |v| v.to_string())
}

pub fn fmt_time(at: Option<chrono::DateTime<chrono::Utc>>) -> String {
    or_dash(at.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string()))
}
