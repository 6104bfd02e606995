#![allow(clippy::unwrap_used)]
// Loading and saving config files on disk.

use std::time::Duration;

use pretty_assertions::assert_eq;

use iotdash_config::{
    Config, PollProfile, Profile, PushOption, load_config_from, profile_to_sync_config,
    save_config_to,
};

#[test]
fn test_missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config_from(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(config.default_profile.as_deref(), Some("default"));
    assert_eq!(config.defaults.output, "table");
    assert!(config.profiles.is_empty());
}

#[test]
fn test_profiles_load_from_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
default_profile = "plant"

[defaults]
output = "json"
timeout = "10s"

[profiles.plant]
url = "http://10.0.0.2:5000"
push = true
push_fallback = "3s"

[profiles.plant.poll]
relays = "2s"
system_stats = "0s"

[profiles.bench]
url = "http://127.0.0.1:5000"
push = "ws://127.0.0.1:5001/socket"
"#,
    )
    .unwrap();

    let config = load_config_from(&path).unwrap();
    assert_eq!(config.defaults.output, "json");
    // Defaults fill keys the file leaves out
    assert_eq!(config.defaults.color, "auto");

    let (name, plant) = config.profile(None).unwrap();
    assert_eq!(name, "plant");
    let sync = profile_to_sync_config(plant, &config.defaults).unwrap();
    assert_eq!(sync.timeout, Duration::from_secs(10));
    assert_eq!(sync.poll.relays, Duration::from_secs(2));
    assert!(sync.poll.system_stats.is_zero());
    let push = sync.push.unwrap();
    assert_eq!(push.url.as_str(), "ws://10.0.0.2:5000/ws");
    assert_eq!(push.fallback_after, Duration::from_secs(3));

    let (_, bench) = config.profile(Some("bench")).unwrap();
    assert_eq!(
        bench.push,
        Some(PushOption::Url("ws://127.0.0.1:5001/socket".into()))
    );
}

#[test]
fn test_save_then_load_keeps_profiles() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let mut config = Config::default();
    config.profiles.insert(
        "default".into(),
        Profile {
            url: "http://gateway:5000".into(),
            push: Some(PushOption::Enabled(true)),
            poll: PollProfile {
                motion_alerts: Some("1s".into()),
                ..PollProfile::default()
            },
            ..Profile::default()
        },
    );

    save_config_to(&path, &config).unwrap();
    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("[profiles.default]"));
    assert!(!written.contains("ca_cert"));

    let loaded = load_config_from(&path).unwrap();
    assert_eq!(loaded, config);
}
