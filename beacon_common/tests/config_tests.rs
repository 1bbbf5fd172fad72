//! Configuration document tests.
//!
//! Tests for loading `beacon.toml`: full documents, partial documents with
//! defaults, unknown transport rejection and validation bounds.

use beacon_common::config::{BeaconConfig, ConfigError, ConfigLoader, LogLevel, TransportType};
use std::fs;
use tempfile::TempDir;

/// Write a complete configuration document into `dir` and return its path.
fn write_full_config(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("beacon.toml");
    fs::write(
        &path,
        r#"
log_level = "warn"

[registration]
refresh_ms = 250
timeout_ms = 5000
loopback = true
network_enabled = true
shm_transport_domain = "cell_a"
transport = "shm"

[registration.shm]
name = "beacon_test_registration"
queue_size = 32

[registration.udp]
group = "239.0.0.7"
local_address = "127.0.0.1"
port = 15000
ttl = 1
send_buffer = 65536
receive_buffer = 131072
"#,
    )
    .unwrap();
    path
}

#[test]
fn full_document_round_trips_every_field() {
    let dir = TempDir::new().unwrap();
    let config = BeaconConfig::load(&write_full_config(&dir)).unwrap();

    assert_eq!(config.log_level, LogLevel::Warn);
    let reg = &config.registration;
    assert_eq!(reg.refresh_ms, 250);
    assert_eq!(reg.timeout_ms, 5000);
    assert!(reg.loopback);
    assert!(reg.network_enabled);
    assert_eq!(reg.shm_transport_domain, "cell_a");
    assert_eq!(reg.transport, TransportType::Shm);
    assert_eq!(reg.shm.name, "beacon_test_registration");
    assert_eq!(reg.shm.queue_size, 32);
    assert_eq!(reg.udp.group, "239.0.0.7");
    assert_eq!(reg.udp.port, 15000);
    assert_eq!(reg.udp.ttl, 1);
    assert_eq!(reg.udp.receive_buffer, 131072);
    assert!(config.validate().is_ok());
    assert_eq!(reg.effective_shm_domain("host"), "cell_a");
}

#[test]
fn empty_document_uses_defaults() {
    let config = BeaconConfig::from_toml("").unwrap();
    assert_eq!(config, BeaconConfig::default());
    assert!(config.validate().is_ok());
}

#[test]
fn unknown_transport_is_a_parse_error() {
    let result = BeaconConfig::from_toml(
        r#"
[registration]
transport = "carrier_pigeon"
"#,
    );
    assert!(matches!(result, Err(ConfigError::ParseError(_))));
}

#[test]
fn timeout_shorter_than_refresh_fails_validation() {
    let config = BeaconConfig::from_toml(
        r#"
[registration]
refresh_ms = 2000
timeout_ms = 1000
"#,
    )
    .unwrap();

    let err = config.validate().unwrap_err();
    assert!(matches!(err, ConfigError::ValidationError(_)));
    assert!(err.to_string().contains("timeout_ms"));
}

#[test]
fn zero_queue_size_fails_validation() {
    let config = BeaconConfig::from_toml(
        r#"
[registration.shm]
queue_size = 0
"#,
    )
    .unwrap();
    assert!(config.validate().is_err());
}
