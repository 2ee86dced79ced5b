// src/gateway/mod.rs
//
// Durable store behind the alarm engine. The engine awaits every call while
// it holds the registry's exclusive lock and commits to memory only after the
// call succeeded.

use crate::alarms::{
    ActiveAlarm, AlarmDefinition, AlarmId, DefinitionId, NewActiveAlarm, NewAlarmDefinition,
};
use crate::error::Result;
use crate::fsm::AlarmState;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::InMemoryGateway;

#[cfg(feature = "postgres")]
pub use postgres::PostgresGateway;

/// Persistence contract for definitions and active alarms
///
/// Implementations must assign active-alarm ids that are unique across all
/// definitions; the engine's secondary index relies on it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Store a new definition, assigning identity and timestamps.
    async fn create_definition(&self, draft: &NewAlarmDefinition) -> Result<AlarmDefinition>;

    async fn get_definition(&self, id: DefinitionId) -> Result<Option<AlarmDefinition>>;

    async fn list_definitions(&self) -> Result<Vec<AlarmDefinition>>;

    async fn get_definitions_by_tag(&self, tag: &str) -> Result<Vec<AlarmDefinition>>;

    /// Store a new active alarm, assigning identity and timestamps.
    async fn create_active_alarm(&self, alarm: &NewActiveAlarm) -> Result<ActiveAlarm>;

    /// Set the lifecycle state. Any state other than `Shelved` clears the
    /// stored shelving window.
    async fn update_active_alarm_state(&self, id: AlarmId, state: AlarmState) -> Result<()>;

    /// Record acknowledgment: state `AckActive` with the given time.
    async fn ack_active_alarm(&self, id: AlarmId, at: DateTime<Utc>) -> Result<()>;

    /// Record shelving: state `Shelved` with the given expiry.
    async fn shelve_active_alarm(&self, id: AlarmId, until: DateTime<Utc>) -> Result<()>;

    /// Every alarm whose state is not `Normal`.
    async fn get_active_alarms(&self) -> Result<Vec<ActiveAlarm>>;
}
