// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Gateway configuration loaded from disk.

use lora_bridge::gateway::{Bridge, ConfigError, GatewayConfig};
use lora_bridge::radio::SpreadingFactor;
use tempfile::tempdir;

#[test]
fn test_load_from_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("gateway.toml");
    std::fs::write(
        &path,
        r#"
[gateway]
topic_prefix = "factory"

[mqtt]
host = "10.0.0.5"
reconnect_backoff_secs = 3

[radio]
frequency_mhz = 868.0
spreading_factor = 7
bandwidth_khz = 250
"#,
    )
    .unwrap();

    let config = GatewayConfig::from_file(&path).unwrap();
    assert_eq!(config.mqtt.host, "10.0.0.5");
    assert_eq!(config.mqtt.reconnect_backoff_secs, 3);
    assert_eq!(config.radio.spreading_factor, SpreadingFactor::Sf7);

    let bridge = Bridge::new(config).unwrap();
    assert_eq!(bridge.config().gateway.handoff_capacity, 1);
}

#[test]
fn test_generated_file_validates() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("generated.toml");
    std::fs::write(&path, GatewayConfig::default().to_toml().unwrap()).unwrap();

    assert_eq!(
        GatewayConfig::from_file(&path).unwrap(),
        GatewayConfig::default()
    );
}

#[test]
fn test_missing_file() {
    let dir = tempdir().unwrap();
    let result = GatewayConfig::from_file(dir.path().join("absent.toml"));
    assert!(matches!(result, Err(ConfigError::Io(_))));
}

#[test]
fn test_wildcard_prefix_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "[gateway]\ntopic_prefix = \"factory/#\"\n").unwrap();

    let result = GatewayConfig::from_file(&path);
    assert!(matches!(result, Err(ConfigError::Invalid(_))));
}

#[test]
fn test_syntax_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "[gateway\ntopic_prefix = ").unwrap();

    assert!(matches!(
        GatewayConfig::from_file(&path),
        Err(ConfigError::Toml(_))
    ));
}
