use tvmkit_core::Location;
use tvmkit_settings::{Config, FeedPolicy, NozzleSettings, SettingsError};

fn customized() -> Config {
    let mut config = Config::default();
    config.connection.host = "10.0.0.20".to_string();
    config.connection.simulated = true;
    config.limits.max_x = 400.0;
    config.heartbeat.interval_ms = 75;
    config.homing.fiducial = Some(Location::new(300.0, 100.0, 0.0, 0.0));
    config.feeders.feed_policy = FeedPolicy::CloseThenOpen;
    config.nozzles = vec![NozzleSettings::new(0, -10.0, -20.0)];
    config
}

#[test]
fn test_toml_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("machine.toml");

    let config = customized();
    config.save_to_file(&path).unwrap();
    let loaded = Config::load_from_file(&path).unwrap();
    assert_eq!(loaded, config);

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("close_then_open"));
}

#[test]
fn test_json_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("machine.json");

    let config = customized();
    config.save_to_file(&path).unwrap();
    assert_eq!(Config::load_from_file(&path).unwrap(), config);
}

#[test]
fn test_invalid_file_is_rejected_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "[limits]\nhoming_speed = 0.0\n").unwrap();

    let err = Config::load_from_file(&path).unwrap_err();
    assert!(matches!(err, SettingsError::Config(_)));
}

#[test]
fn test_invalid_config_is_not_saved() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.json");

    let mut config = Config::default();
    config.limits.max_y = -5.0;
    assert!(config.save_to_file(&path).is_err());
    assert!(!path.exists());
}

#[test]
fn test_malformed_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{ not json").unwrap();
    assert!(matches!(
        Config::load_from_file(&path),
        Err(SettingsError::JsonError(_))
    ));
}

#[test]
fn test_unknown_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("machine.ini");
    assert!(matches!(
        Config::default().save_to_file(&path),
        Err(SettingsError::Config(_))
    ));
}
