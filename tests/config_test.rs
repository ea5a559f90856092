//! Integration tests for configuration loading

use car_finder::infra::{Config, ProviderKind};
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

#[test]
fn test_load_config_from_file() {
    let mut temp_file = NamedTempFile::new().unwrap();

    let config_content = r#"
[location]
timeout_ms = 3000
maximum_age_ms = 1000
enable_high_accuracy = true

[tracking]
poll_interval_ms = 5000
arrival_threshold_km = 0.02

[provider]
kind = "replay"
replay_file = "walks/parking.jsonl"

[store]
file = "state/car.json"
"#;

    temp_file.write_all(config_content.as_bytes()).unwrap();
    temp_file.flush().unwrap();

    let config = Config::from_file(temp_file.path()).unwrap();

    assert_eq!(config.location_timeout_ms(), 3000);
    assert!(config.enable_high_accuracy());
    assert_eq!(config.poll_interval(), Duration::from_millis(5000));
    assert_eq!(config.arrival_threshold_km(), 0.02);
    assert_eq!(config.provider_kind(), ProviderKind::Replay);
    assert_eq!(config.replay_file(), "walks/parking.jsonl");
    assert_eq!(config.gpsd_addr(), "127.0.0.1:2947");
    assert_eq!(config.store_file(), "state/car.json");

    let options = config.position_options();
    assert_eq!(options.timeout, Duration::from_millis(3000));
    assert_eq!(options.maximum_age, Duration::from_millis(1000));
}

#[test]
fn test_partial_config_keeps_defaults() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(b"[tracking]\npoll_interval_ms = 1000\n").unwrap();
    temp_file.flush().unwrap();

    let config = Config::from_file(temp_file.path()).unwrap();

    assert_eq!(config.poll_interval_ms(), 1000);
    assert_eq!(config.arrival_threshold_km(), 0.01);
    assert_eq!(config.location_timeout_ms(), 5000);
    assert_eq!(config.provider_kind(), ProviderKind::Gpsd);
}

#[test]
fn test_rejects_negative_threshold() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(b"[tracking]\narrival_threshold_km = -1.0\n").unwrap();
    temp_file.flush().unwrap();

    let err = Config::from_file(temp_file.path()).unwrap_err();
    assert!(err.to_string().contains("arrival_threshold_km"));
}

#[test]
fn test_rejects_unknown_provider() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(b"[provider]\nkind = \"bluetooth\"\n").unwrap();
    temp_file.flush().unwrap();

    assert!(Config::from_file(temp_file.path()).is_err());
}

#[test]
fn test_load_from_path_fallback() {
    let config = Config::load_from_path("/nonexistent/config.toml");
    assert_eq!(config.poll_interval_ms(), 15000);
    assert_eq!(config.arrival_threshold_km(), 0.01);
    assert_eq!(config.provider_kind(), ProviderKind::Gpsd);
}
