//! CLI configuration: thin wrapper around `iotdash_config`.
//!
//! Adds the `GlobalOpts` overrides (--url, --insecure, --timeout) on top
//! of profile resolution.

use std::path::PathBuf;

use iotdash_core::{SyncConfig, TlsVerification};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use iotdash_config::{Config, Profile, PushOption};

/// Config file in effect: `--config` / `IOTDASH_CONFIG`, else the
/// platform default.
pub fn config_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(iotdash_config::config_path)
}

pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(iotdash_config::load_config_from(&config_path(global))?)
}

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Build the `SyncConfig` for this invocation.
///
/// Flags win over the profile. Without a profile, `--url` alone is enough.
pub fn resolve(global: &GlobalOpts) -> Result<SyncConfig, CliError> {
    let cfg = load(global)?;
    let name = active_profile_name(global, &cfg);

    let mut sync = match cfg.profiles.get(&name) {
        Some(profile) => {
            let mut profile = profile.clone();
            if let Some(url) = &global.url {
                profile.url.clone_from(url);
            }
            iotdash_config::profile_to_sync_config(&profile, &cfg.defaults)?
        }
        None => {
            // A named profile that does not exist is an error even with --url
            if global.profile.is_some() {
                return Err(CliError::ProfileNotFound {
                    name,
                    available: available_profiles(&cfg),
                });
            }
            let url = global.url.as_deref().ok_or_else(|| CliError::NoConfig {
                path: config_path(global).display().to_string(),
            })?;
            let bare = Profile {
                url: url.to_owned(),
                ..Profile::default()
            };
            iotdash_config::profile_to_sync_config(&bare, &cfg.defaults)?
        }
    };

    if global.insecure {
        sync.tls = TlsVerification::DangerAcceptInvalid;
    }
    if let Some(raw) = &global.timeout {
        sync.timeout = iotdash_config::parse_duration("timeout", raw)?;
    }
    Ok(sync)
}

pub fn available_profiles(cfg: &Config) -> String {
    if cfg.profiles.is_empty() {
        "(none)".into()
    } else {
        cfg.profiles.keys().cloned().collect::<Vec<_>>().join(", ")
    }
}
