//! Config subcommand handlers.

use std::fmt::Write as _;

use dialoguer::Input;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config, Profile, PushOption};
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

fn format_config(cfg: &Config) -> String {
    let mut out = String::new();

    if let Some(default) = &cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let _ = writeln!(out, "\n[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "color = \"{}\"", cfg.defaults.color);
    let _ = writeln!(out, "timeout = \"{}\"", cfg.defaults.timeout);

    for (name, p) in &cfg.profiles {
        let _ = writeln!(out, "\n[profiles.{name}]");
        let _ = writeln!(out, "url = \"{}\"", p.url);
        match &p.push {
            Some(PushOption::Enabled(on)) => {
                let _ = writeln!(out, "push = {on}");
            }
            Some(PushOption::Url(url)) => {
                let _ = writeln!(out, "push = \"{url}\"");
            }
            None => {}
        }
        if let Some(ca) = &p.ca_cert {
            let _ = writeln!(out, "ca_cert = \"{}\"", ca.display());
        }
        if let Some(insecure) = p.insecure {
            let _ = writeln!(out, "insecure = {insecure}");
        }
        if let Some(timeout) = &p.timeout {
            let _ = writeln!(out, "timeout = \"{timeout}\"");
        }
        if let Some(fallback) = &p.push_fallback {
            let _ = writeln!(out, "push_fallback = \"{fallback}\"");
        }
        if let Some(handshake) = &p.push_handshake_timeout {
            let _ = writeln!(out, "push_handshake_timeout = \"{handshake}\"");
        }
        let poll = [
            ("devices", &p.poll.devices),
            ("relays", &p.poll.relays),
            ("motion_sensors", &p.poll.motion_sensors),
            ("motion_alerts", &p.poll.motion_alerts),
            ("system_stats", &p.poll.system_stats),
            ("health", &p.poll.health),
        ];
        for (key, value) in poll.iter().filter_map(|(k, v)| v.as_ref().map(|v| (k, v))) {
            let _ = writeln!(out, "poll.{key} = \"{value}\"");
        }
    }

    out.trim_end().to_owned()
}

fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

/// Backend URL from `--url`, else asked for on a terminal.
fn backend_url(global: &GlobalOpts) -> Result<String, CliError> {
    let raw = match &global.url {
        Some(url) => url.clone(),
        None if std::io::IsTerminal::is_terminal(&std::io::stdin()) => Input::new()
            .with_prompt("Backend URL")
            .default("http://localhost:5000".to_owned())
            .interact_text()
            .map_err(prompt_err)?,
        None => {
            return Err(CliError::Validation {
                field: "url".into(),
                reason: "pass --url when not running interactively".into(),
            });
        }
    };

    url::Url::parse(raw.trim()).map_err(|e| CliError::Validation {
        field: "url".into(),
        reason: format!("{raw:?} is not a valid URL: {e}"),
    })?;
    Ok(raw.trim().to_owned())
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => {
            let cfg = config::load(global)?;
            let out = output::render_single(global.output, &cfg, format_config, |c| {
                config::active_profile_name(global, c)
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&config::config_path(global).display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Init {
            name,
            push,
            make_default,
        } => {
            let path = config::config_path(global);
            let mut cfg = config::load(global)?;
            let url = backend_url(global)?;

            let replaced = cfg
                .profiles
                .insert(
                    name.clone(),
                    Profile {
                        url,
                        push: push.then_some(PushOption::Enabled(true)),
                        ..Profile::default()
                    },
                )
                .is_some();

            let default_missing = cfg
                .default_profile
                .as_ref()
                .is_none_or(|d| !cfg.profiles.contains_key(d));
            if make_default || default_missing {
                cfg.default_profile = Some(name.clone());
            }

            iotdash_config::save_config_to(&path, &cfg)?;
            tracing::info!(profile = %name, path = %path.display(), "config written");
            output::note(
                &format!(
                    "{} profile '{name}' in {}",
                    if replaced { "Replaced" } else { "Added" },
                    path.display()
                ),
                global.quiet,
            );
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let path = config::config_path(global);
            let mut cfg = config::load(global)?;
            if !cfg.profiles.contains_key(&name) {
                return Err(CliError::ProfileNotFound {
                    available: config::available_profiles(&cfg),
                    name,
                });
            }
            cfg.default_profile = Some(name.clone());
            iotdash_config::save_config_to(&path, &cfg)?;
            output::note(&format!("Default profile set to '{name}'"), global.quiet);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn show_lists_profiles_with_push() {
        let mut cfg = Config::default();
        cfg.profiles.insert(
            "lab".into(),
            Profile {
                url: "http://10.0.0.5:5000".into(),
                push: Some(PushOption::Enabled(true)),
                ..Profile::default()
            },
        );
        let text = format_config(&cfg);
        assert!(text.contains("[profiles.lab]"));
        assert!(text.contains("url = \"http://10.0.0.5:5000\""));
        assert!(text.contains("push = true"));
    }
}
