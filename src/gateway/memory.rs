// src/gateway/memory.rs - map-backed store
//
// Used by the binary when no database is configured and throughout the
// tests. Rows returned to Normal are kept, as a database table would keep
// them, and filtered out of `get_active_alarms`.

use super::PersistenceGateway;
use crate::alarms::{
    ActiveAlarm, AlarmDefinition, AlarmId, DefinitionId, NewActiveAlarm, NewAlarmDefinition,
};
use crate::error::{AlarmError, Result};
use crate::fsm::AlarmState;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::trace;

#[derive(Debug, Default)]
struct Tables {
    next_definition_id: DefinitionId,
    next_alarm_id: AlarmId,
    definitions: BTreeMap<DefinitionId, AlarmDefinition>,
    alarms: BTreeMap<AlarmId, ActiveAlarm>,
}

#[derive(Debug, Default)]
pub struct InMemoryGateway {
    tables: Mutex<Tables>,
    unavailable: AtomicBool,
    writes: AtomicU64,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully formed alarm row, keeping id allocation ahead of it.
    ///
    /// Lets callers restore a snapshot, including alarms whose shelving
    /// window already elapsed.
    pub fn insert_active_alarm(&self, alarm: ActiveAlarm) {
        let mut tables = self.tables.lock();
        tables.next_alarm_id = tables.next_alarm_id.max(alarm.id);
        tables.alarms.insert(alarm.id, alarm);
    }

    /// Stored row regardless of state.
    pub fn alarm(&self, id: AlarmId) -> Option<ActiveAlarm> {
        self.tables.lock().alarms.get(&id).cloned()
    }

    /// Make every subsequent call fail with a persistence error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of successful mutating calls so far.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AlarmError::Persistence("store unavailable".to_string()));
        }
        Ok(())
    }

    fn update_alarm<F>(&self, id: AlarmId, apply: F) -> Result<()>
    where
        F: FnOnce(&mut ActiveAlarm),
    {
        self.check_available()?;
        let mut tables = self.tables.lock();
        let alarm = tables
            .alarms
            .get_mut(&id)
            .ok_or_else(|| AlarmError::Persistence(format!("active alarm {} does not exist", id)))?;
        apply(alarm);
        alarm.updated_at = Utc::now();
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl PersistenceGateway for InMemoryGateway {
    async fn create_definition(&self, draft: &NewAlarmDefinition) -> Result<AlarmDefinition> {
        self.check_available()?;
        let now = Utc::now();
        let mut tables = self.tables.lock();
        tables.next_definition_id += 1;

        let definition = AlarmDefinition {
            id: tables.next_definition_id,
            tag: draft.tag.clone(),
            threshold: draft.threshold,
            kind: draft.kind.clone(),
            priority: draft.priority,
            enabled: draft.enabled,
            created_at: now,
            updated_at: now,
        };
        tables.definitions.insert(definition.id, definition.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        trace!("Stored definition {} for tag {}", definition.id, definition.tag);
        Ok(definition)
    }

    async fn get_definition(&self, id: DefinitionId) -> Result<Option<AlarmDefinition>> {
        self.check_available()?;
        Ok(self.tables.lock().definitions.get(&id).cloned())
    }

    async fn list_definitions(&self) -> Result<Vec<AlarmDefinition>> {
        self.check_available()?;
        Ok(self.tables.lock().definitions.values().cloned().collect())
    }

    async fn get_definitions_by_tag(&self, tag: &str) -> Result<Vec<AlarmDefinition>> {
        self.check_available()?;
        Ok(self
            .tables
            .lock()
            .definitions
            .values()
            .filter(|d| d.tag == tag)
            .cloned()
            .collect())
    }

    async fn create_active_alarm(&self, alarm: &NewActiveAlarm) -> Result<ActiveAlarm> {
        self.check_available()?;
        let now = Utc::now();
        let mut tables = self.tables.lock();
        tables.next_alarm_id += 1;

        let stored = ActiveAlarm {
            id: tables.next_alarm_id,
            definition_id: alarm.definition_id,
            state: alarm.state,
            activation_time: alarm.activation_time,
            ack_time: None,
            shelved_until: None,
            value: alarm.value,
            created_at: now,
            updated_at: now,
        };
        tables.alarms.insert(stored.id, stored.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        trace!("Stored active alarm {} for definition {}", stored.id, stored.definition_id);
        Ok(stored)
    }

    async fn update_active_alarm_state(&self, id: AlarmId, state: AlarmState) -> Result<()> {
        self.update_alarm(id, |alarm| {
            alarm.state = state;
            if state != AlarmState::Shelved {
                alarm.shelved_until = None;
            }
        })
    }

    async fn ack_active_alarm(&self, id: AlarmId, at: DateTime<Utc>) -> Result<()> {
        self.update_alarm(id, |alarm| {
            alarm.state = AlarmState::AckActive;
            alarm.ack_time = Some(at);
            alarm.shelved_until = None;
        })
    }

    async fn shelve_active_alarm(&self, id: AlarmId, until: DateTime<Utc>) -> Result<()> {
        self.update_alarm(id, |alarm| {
            alarm.state = AlarmState::Shelved;
            alarm.shelved_until = Some(until);
        })
    }

    async fn get_active_alarms(&self) -> Result<Vec<ActiveAlarm>> {
        self.check_available()?;
        Ok(self
            .tables
            .lock()
            .alarms
            .values()
            .filter(|alarm| alarm.state != AlarmState::Normal)
            .cloned()
            .collect())
    }
}
