use std::time::Duration;

use serial_test::serial;
use temp_env::with_vars;

use super::*;
use crate::Error;

fn cleanup_all_watch_env_vars() {
    for (key, _) in std::env::vars() {
        if key.starts_with("WATCH__") || key == "CONFIG_PATH" {
            std::env::remove_var(&key);
        }
    }
}

#[test]
#[serial]
fn default_settings_should_use_hardcoded_values() {
    let settings = WatchSettings::default();

    assert_eq!(settings.client.base_url, "http://localhost:3100");
    assert_eq!(settings.client.connect_timeout_in_ms, 1000);
    assert_eq!(settings.client.request_timeout_in_ms, 3000);
    assert_eq!(settings.watch.stale_after_ms, None);
    assert_eq!(settings.watch.max_unit_length, 4 * 1024 * 1024);
    assert!(settings.validate().is_ok());
}

#[test]
#[serial]
fn new_should_merge_environment_overrides() {
    cleanup_all_watch_env_vars();
    with_vars(
        vec![
            ("WATCH__CLIENT__BASE_URL", Some("https://argo.example.com")),
            ("WATCH__WATCH__STALE_AFTER_MS", Some("30000")),
        ],
        || {
            let settings = WatchSettings::new().unwrap();

            assert_eq!(settings.client.base_url, "https://argo.example.com");
            assert_eq!(settings.watch.stale_after(), Some(Duration::from_secs(30)));
            assert_eq!(settings.client.request_timeout_in_ms, 3000);
        },
    );
}

#[test]
#[serial]
fn new_should_load_file_from_config_path() {
    cleanup_all_watch_env_vars();
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("watch.toml");
    std::fs::write(
        &config_path,
        r#"
        [client]
        request_timeout_in_ms = 500

        [watch]
        max_unit_length = 65536
        "#,
    )
    .unwrap();

    with_vars(vec![("CONFIG_PATH", Some(config_path.to_str().unwrap()))], || {
        let settings = WatchSettings::new().unwrap();

        assert_eq!(settings.client.request_timeout_in_ms, 500);
        assert_eq!(settings.watch.max_unit_length, 65536);
        assert_eq!(settings.client.base_url, "http://localhost:3100");
    });
}

#[test]
#[serial]
fn with_override_config_should_merge_file_settings() {
    cleanup_all_watch_env_vars();
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("override.toml");
    std::fs::write(
        &config_path,
        r#"
        [client]
        base_url = "http://rollouts.internal:3100"

        [watch]
        stale_after_ms = 15000
        "#,
    )
    .unwrap();

    let empty_vars: Vec<(&str, Option<&str>)> = vec![];
    with_vars(empty_vars, || {
        let base = WatchSettings::new().expect("success");
        let settings = base.with_override_config(config_path.to_str().unwrap()).unwrap();

        assert_eq!(settings.client.base_url, "http://rollouts.internal:3100");
        assert_eq!(settings.watch.stale_after_ms, Some(15000));
        assert_eq!(settings.client.connect_timeout_in_ms, 1000);
    });
}

#[test]
#[serial]
fn environment_should_win_over_override_file() {
    cleanup_all_watch_env_vars();
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("override.toml");
    std::fs::write(&config_path, "[client]\nconnect_timeout_in_ms = 200\n").unwrap();

    with_vars(vec![("WATCH__CLIENT__CONNECT_TIMEOUT_IN_MS", Some("700"))], || {
        let settings = WatchSettings::new()
            .unwrap()
            .with_override_config(config_path.to_str().unwrap())
            .unwrap();

        assert_eq!(settings.client.connect_timeout_in_ms, 700);
    });
}

#[test]
#[serial]
fn missing_config_path_file_should_fail() {
    cleanup_all_watch_env_vars();
    with_vars(vec![("CONFIG_PATH", Some("/nonexistent/watch.toml"))], || {
        assert!(matches!(WatchSettings::new(), Err(Error::Config(_))));
    });
}

#[test]
fn validation_should_reject_bad_base_url() {
    let mut settings = WatchSettings::default();

    settings.client.base_url = "not a url".to_string();
    assert!(matches!(settings.clone().validate(), Err(Error::Config(_))));

    settings.client.base_url = "ftp://files.example.com".to_string();
    assert!(settings.validate().is_err());
}

#[test]
fn validation_should_reject_zero_timeouts() {
    let mut settings = WatchSettings::default();
    settings.client.request_timeout_in_ms = 0;
    assert!(settings.validate().is_err());

    let mut settings = WatchSettings::default();
    settings.client.connect_timeout_in_ms = 0;
    assert!(settings.validate().is_err());
}

#[test]
fn validation_should_check_watch_section() {
    let mut config = WatchConfig {
        stale_after_ms: Some(0),
        ..Default::default()
    };
    assert!(config.validate().is_err());

    config.stale_after_ms = Some(1);
    assert!(config.validate().is_ok());

    config.max_unit_length = 0;
    assert!(config.validate().is_err());

    config.max_unit_length = 64 * 1024 * 1024 + 1;
    assert!(config.validate().is_err());
}

#[test]
fn watch_config_should_build_subscription_options() {
    let config = WatchConfig {
        stale_after_ms: Some(2500),
        max_unit_length: 1024,
    };

    let options = config.options();
    assert_eq!(options.stale_after, Some(Duration::from_millis(2500)));
    assert_eq!(options.max_unit_length, 1024);
}
