//! VIGIL - alarm lifecycle engine for streamed process measurements
//!
//! Measurements arrive as `(tag, value)` pairs, are evaluated against
//! operator-defined thresholds and drive each alarm through the ISA-18.2
//! lifecycle (activation, acknowledgment, shelving, clearance). Every
//! committed transition is persisted first and then published as an
//! [`AlarmEvent`].
//!
//! # Feature Flags
//!
//! - `mqtt` (default): MQTT measurement feed and event publisher
//! - `web` (default): operator HTTP API
//! - `postgres`: PostgreSQL persistence gateway
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vigil::{AlarmEngine, ComparisonKind, InMemoryGateway, LogPublisher, NewAlarmDefinition};
//!
//! # async fn run() -> vigil::Result<()> {
//! let gateway = Arc::new(InMemoryGateway::new());
//! let engine = Arc::new(AlarmEngine::new(gateway, Arc::new(LogPublisher)));
//! engine.load().await?;
//! engine
//!     .create_definition(NewAlarmDefinition::new("TT-101", ComparisonKind::High, 100.0))
//!     .await?;
//! engine.process_value("TT-101", 104.2).await;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// CORE MODULES (always available)
// ============================================================================

/// Error type shared by the engine and its adapters
pub mod error;

/// Definitions, active alarms and events
pub mod alarms;

/// Threshold predicate
pub mod evaluator;

/// ISA-18.2 lifecycle state machine
pub mod fsm;

/// In-memory definition cache and active alarm index
pub mod registry;

/// Orchestration of evaluation, commands and expiry
pub mod engine;

/// Background shelving expiry
pub mod sweeper;

/// Durable store contract and implementations
pub mod gateway;

/// Event emission contract and in-process publishers
pub mod publisher;

/// YAML configuration with environment overrides
pub mod config;

// ============================================================================
// ADAPTER MODULES (feature-gated)
// ============================================================================

#[cfg(feature = "mqtt")]
pub mod mqtt;

#[cfg(feature = "web")]
pub mod web;

// ============================================================================
// PUBLIC API EXPORTS
// ============================================================================

pub use alarms::{
    ActiveAlarm, AlarmDefinition, AlarmEvent, AlarmId, AlarmPriority, ComparisonKind, DefinitionId,
    NewActiveAlarm, NewAlarmDefinition,
};
pub use config::Config;
pub use engine::{AlarmEngine, EngineStats};
pub use error::{AlarmError, Result};
pub use evaluator::evaluate;
pub use fsm::{AlarmFsm, AlarmState, LifecycleEvent};
pub use gateway::{InMemoryGateway, PersistenceGateway};
pub use publisher::{BroadcastPublisher, EventPublisher, LogPublisher};
pub use sweeper::ExpirySweeper;

#[cfg(feature = "postgres")]
pub use gateway::PostgresGateway;

#[cfg(feature = "mqtt")]
pub use mqtt::{MqttEventPublisher, MqttTransport, SensorData};

/// VIGIL version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build information
pub mod build_info {
    /// Git commit hash (if available)
    pub const GIT_HASH: Option<&str> = option_env!("GIT_HASH");

    /// Build timestamp
    pub const BUILD_TIMESTAMP: Option<&str> = option_env!("VIGIL_BUILD_TIMESTAMP");

    /// Rust version used for compilation
    pub const RUSTC_VERSION: Option<&str> = option_env!("VIGIL_RUST_VERSION");

    /// Comma separated cargo features
    pub const FEATURES: Option<&str> = option_env!("VIGIL_FEATURES");
}

/// Install the fmt subscriber with `RUST_LOG` filtering, defaulting to
/// `vigil=info`. Later calls are no-ops.
pub fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("vigil=info"));

    // Already initialized by the host, ignore
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// One line build banner for startup logs
pub fn build_banner() -> String {
    format!(
        "VIGIL v{} ({}, built {}, features: {})",
        VERSION,
        build_info::GIT_HASH.unwrap_or("unknown"),
        build_info::BUILD_TIMESTAMP.unwrap_or("unknown"),
        build_info::FEATURES.filter(|f| !f.is_empty()).unwrap_or("none"),
    )
}
