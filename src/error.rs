use crate::alarms::AlarmId;
use crate::fsm::{AlarmState, LifecycleEvent};
use thiserror::Error;

/// Application level error type used throughout the crate.
#[derive(Error, Debug)]
pub enum AlarmError {
    /// The lifecycle state machine refused the event in the current state
    #[error("invalid transition from {from} with event {event}")]
    InvalidTransition { from: AlarmState, event: LifecycleEvent },

    /// Suppressed alarms cannot be shelved by an operator
    #[error("cannot shelve suppressed alarm")]
    ShelveSuppressed,

    /// Shelving duration cannot be represented as a timestamp
    #[error("invalid shelve duration: {0}")]
    InvalidDuration(String),

    /// Operator command referenced an alarm that is not active
    #[error("alarm {0} not found or not active")]
    NotFound(AlarmId),

    /// The durable store rejected or failed a call
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Event could not be handed to the publisher
    #[error("Publish error: {0}")]
    Publish(String),

    /// A stored code could not be mapped onto a domain enumeration
    #[error("Decode error: {0}")]
    Decode(String),

    /// Invalid or inconsistent configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O related failure
    #[error("Io error: {0}")]
    Io(#[from] std::io::Error),

    /// Error while parsing YAML configuration files
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Error while encoding or decoding JSON payloads
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// PostgreSQL driver failure
    #[cfg(feature = "postgres")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// MQTT client failure
    #[cfg(feature = "mqtt")]
    #[error("MQTT error: {0}")]
    Mqtt(String),
}

impl AlarmError {
    /// True for failures caused by the lifecycle rules rather than infrastructure.
    pub fn is_rejection(&self) -> bool {
        matches!(self, AlarmError::InvalidTransition { .. } | AlarmError::ShelveSuppressed)
    }
}

/// Convenient alias over [`Result`] using [`AlarmError`]
pub type Result<T> = std::result::Result<T, AlarmError>;
