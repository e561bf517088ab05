// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Gateway configuration.
//!
//! Loaded from TOML:
//!
//! ```toml
//! [gateway]
//! topic_prefix = "factory"
//!
//! [mqtt]
//! host = "broker.local"
//!
//! [radio]
//! frequency_mhz = 868.0
//! spreading_factor = 9
//! ```
//!
//! Every key has a default, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::radio::RadioConfig;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File is not valid TOML for this schema.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration could not be rendered.
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value is out of range.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Complete gateway configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Bridge behaviour.
    #[serde(default)]
    pub gateway: GatewaySettings,

    /// Upstream broker.
    #[serde(default)]
    pub mqtt: MqttConfig,

    /// LoRa channel. Must match the nodes.
    #[serde(default)]
    pub radio: RadioConfig,
}

/// `[gateway]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewaySettings {
    /// Gateway name (for identification in logs).
    #[serde(default = "default_gateway_name")]
    pub name: String,

    /// Topic prefix; readings go to `<prefix>/<machine_id>`.
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,

    /// Readings buffered between reception and delivery.
    #[serde(default = "default_handoff_capacity")]
    pub handoff_capacity: usize,

    /// Enable periodic statistics logging.
    #[serde(default = "default_true")]
    pub enable_stats: bool,

    /// Statistics reporting interval (seconds).
    #[serde(default = "default_stats_interval")]
    pub stats_interval_secs: u64,
}

/// `[mqtt]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MqttConfig {
    /// Broker host name or address.
    #[serde(default = "default_mqtt_host")]
    pub host: String,

    /// Broker port.
    #[serde(default = "default_mqtt_port")]
    pub port: u16,

    /// MQTT client identifier.
    #[serde(default = "default_gateway_name")]
    pub client_id: String,

    /// Keep-alive interval (seconds).
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,

    /// Fixed delay between reconnect attempts (seconds).
    #[serde(default = "default_reconnect_backoff")]
    pub reconnect_backoff_secs: u64,

    /// Time allowed for the broker to acknowledge a connect (seconds).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_gateway_name() -> String {
    "lora-gateway".to_string()
}

fn default_topic_prefix() -> String {
    "factory".to_string()
}

fn default_handoff_capacity() -> usize {
    1
}

fn default_true() -> bool {
    true
}

fn default_stats_interval() -> u64 {
    60
}

fn default_mqtt_host() -> String {
    "127.0.0.1".to_string()
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_keep_alive() -> u64 {
    30
}

fn default_reconnect_backoff() -> u64 {
    5
}

fn default_connect_timeout() -> u64 {
    10
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            name: default_gateway_name(),
            topic_prefix: default_topic_prefix(),
            handoff_capacity: default_handoff_capacity(),
            enable_stats: true,
            stats_interval_secs: default_stats_interval(),
        }
    }
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: default_mqtt_host(),
            port: default_mqtt_port(),
            client_id: default_gateway_name(),
            keep_alive_secs: default_keep_alive(),
            reconnect_backoff_secs: default_reconnect_backoff(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl MqttConfig {
    /// Reconnect backoff as a duration.
    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_secs(self.reconnect_backoff_secs)
    }

    /// Connect timeout as a duration.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Keep-alive as a duration.
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }
}

impl GatewayConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Render as TOML (used by `gen-config`).
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let prefix = &self.gateway.topic_prefix;
        if prefix.is_empty() {
            return Err(ConfigError::Invalid("topic_prefix is empty".into()));
        }
        if prefix.contains(['+', '#', '\0']) {
            return Err(ConfigError::Invalid(format!(
                "topic_prefix {:?} contains an MQTT wildcard",
                prefix
            )));
        }
        if prefix.ends_with('/') {
            return Err(ConfigError::Invalid(format!(
                "topic_prefix {:?} ends with a separator",
                prefix
            )));
        }

        if self.gateway.handoff_capacity == 0 {
            return Err(ConfigError::Invalid(
                "handoff_capacity must be at least 1".into(),
            ));
        }
        if self.gateway.enable_stats && self.gateway.stats_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "stats_interval_secs must be greater than 0".into(),
            ));
        }

        if self.mqtt.host.is_empty() {
            return Err(ConfigError::Invalid("mqtt host is empty".into()));
        }
        if self.mqtt.port == 0 {
            return Err(ConfigError::Invalid("mqtt port is 0".into()));
        }
        if self.mqtt.client_id.is_empty() {
            return Err(ConfigError::Invalid("mqtt client_id is empty".into()));
        }
        if self.mqtt.reconnect_backoff_secs == 0 {
            return Err(ConfigError::Invalid(
                "reconnect_backoff_secs must be greater than 0".into(),
            ));
        }
        if self.mqtt.connect_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "connect_timeout_secs must be greater than 0".into(),
            ));
        }

        self.radio
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}
