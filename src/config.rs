// src/config.rs - runtime configuration for the alarm service

use crate::error::{AlarmError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable overriding `database.url`
pub const ENV_DATABASE_URL: &str = "VIGIL_DATABASE_URL";
/// Environment variable overriding `mqtt.broker.host`
pub const ENV_MQTT_HOST: &str = "VIGIL_MQTT_HOST";
/// Environment variable overriding `mqtt.broker.port`
pub const ENV_MQTT_PORT: &str = "VIGIL_MQTT_PORT";
/// Environment variable overriding `web.bind`
pub const ENV_HTTP_BIND: &str = "VIGIL_HTTP_BIND";

// ============================================================================
// MAIN CONFIGURATION
// ============================================================================

/// Main VIGIL configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Engine configuration
    #[serde(default)]
    pub engine: EngineConfig,

    /// PostgreSQL store; the in-memory store is used when absent
    #[serde(default)]
    pub database: Option<DatabaseConfig>,

    /// MQTT measurement feed and event publication
    #[serde(default)]
    pub mqtt: Option<MqttConfig>,

    /// Operator HTTP API
    #[serde(default)]
    pub web: Option<WebConfig>,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.engine.sweep_interval_ms == 0 {
            return Err(AlarmError::Config(
                "engine.sweep_interval_ms must be greater than zero".into(),
            ));
        }

        if let Some(database) = &self.database {
            if database.url.trim().is_empty() {
                return Err(AlarmError::Config("database.url must not be empty".into()));
            }
            if database.max_connections == 0 {
                return Err(AlarmError::Config(
                    "database.max_connections must be greater than zero".into(),
                ));
            }
        }

        if let Some(mqtt) = &self.mqtt {
            if mqtt.broker.host.trim().is_empty() {
                return Err(AlarmError::Config("mqtt.broker.host must not be empty".into()));
            }
            if mqtt.measurement_topic.is_empty() || mqtt.event_topic.is_empty() {
                return Err(AlarmError::Config("mqtt topics must not be empty".into()));
            }
            if mqtt.event_topic.contains(['#', '+']) {
                return Err(AlarmError::Config(format!(
                    "mqtt.event_topic '{}' must not contain wildcards",
                    mqtt.event_topic
                )));
            }
        }

        if let Some(web) = &self.web {
            if web.bind.parse::<std::net::SocketAddr>().is_err() {
                return Err(AlarmError::Config(format!(
                    "web.bind '{}' is not a socket address",
                    web.bind
                )));
            }
        }

        Ok(())
    }

    /// Apply environment style overrides, then re-validate.
    ///
    /// `lookup` is `std::env::var(..).ok()` in the binary; tests pass a map.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_DATABASE_URL) {
            match &mut self.database {
                Some(database) => database.url = url,
                None => {
                    self.database = Some(DatabaseConfig {
                        url,
                        max_connections: default_max_connections(),
                    })
                }
            }
        }

        if let Some(host) = lookup(ENV_MQTT_HOST) {
            self.mqtt.get_or_insert_with(MqttConfig::default).broker.host = host;
        }

        if let Some(port) = lookup(ENV_MQTT_PORT) {
            let port = port
                .parse::<u16>()
                .map_err(|_| {
                    AlarmError::Config(format!("{} '{}' is not a port", ENV_MQTT_PORT, port))
                })?;
            self.mqtt.get_or_insert_with(MqttConfig::default).broker.port = port;
        }

        if let Some(bind) = lookup(ENV_HTTP_BIND) {
            self.web.get_or_insert_with(WebConfig::default).bind = bind;
        }

        self.validate()
    }
}

// ============================================================================
// ENGINE CONFIGURATION
// ============================================================================

/// Engine runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Shelving expiry sweep period in milliseconds
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_ms: u64,
}

impl EngineConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sweep_interval_ms: default_sweep_interval(),
        }
    }
}

// ============================================================================
// STORAGE CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Pool size
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

// ============================================================================
// MQTT CONFIGURATION
// ============================================================================

/// MQTT configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    /// Broker configuration
    #[serde(default)]
    pub broker: MqttBrokerConfig,

    /// Client ID
    #[serde(default = "default_mqtt_client_id")]
    pub client_id: String,

    /// Username
    #[serde(default)]
    pub username: Option<String>,

    /// Password
    #[serde(default)]
    pub password: Option<String>,

    /// Keep alive in seconds
    #[serde(default = "default_mqtt_keepalive")]
    pub keepalive_secs: u64,

    /// QoS level for subscriptions and published events
    #[serde(default)]
    pub qos: MqttQos,

    /// Topic filter carrying measurements
    #[serde(default = "default_measurement_topic")]
    pub measurement_topic: String,

    /// Topic alarm events are published to
    #[serde(default = "default_event_topic")]
    pub event_topic: String,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker: MqttBrokerConfig::default(),
            client_id: default_mqtt_client_id(),
            username: None,
            password: None,
            keepalive_secs: default_mqtt_keepalive(),
            qos: MqttQos::default(),
            measurement_topic: default_measurement_topic(),
            event_topic: default_event_topic(),
        }
    }
}

/// MQTT broker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttBrokerConfig {
    /// Broker host
    pub host: String,

    /// Broker port
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
}

impl Default for MqttBrokerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: default_mqtt_port(),
        }
    }
}

/// MQTT QoS levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MqttQos {
    AtMostOnce,
    #[default]
    AtLeastOnce,
    ExactlyOnce,
}

// ============================================================================
// WEB CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    /// Listen address of the operator API
    #[serde(default = "default_http_bind")]
    pub bind: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self { bind: default_http_bind() }
    }
}

// ============================================================================
// DEFAULT VALUE FUNCTIONS
// ============================================================================

fn default_sweep_interval() -> u64 { 1000 }
fn default_max_connections() -> u32 { 5 }
fn default_mqtt_client_id() -> String { "vigil".to_string() }
fn default_mqtt_keepalive() -> u64 { 60 }
fn default_mqtt_port() -> u16 { 1883 }
fn default_measurement_topic() -> String { "enterprise/#".to_string() }
fn default_event_topic() -> String { "sys/alarm/events".to_string() }
fn default_http_bind() -> String { "0.0.0.0:8080".to_string() }
