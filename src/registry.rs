// src/registry.rs - in-memory view of definitions and active alarms
//
// The registry itself is not synchronized; `AlarmEngine` owns it behind a
// single tokio RwLock so that a lookup, the persistence call and the commit
// happen under one exclusive section.

use crate::alarms::{ActiveAlarm, AlarmDefinition, AlarmId, DefinitionId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::warn;

#[derive(Debug, Default)]
pub struct Registry {
    /// Enabled definitions by measurement tag
    definitions: HashMap<String, Vec<AlarmDefinition>>,
    /// Non-Normal alarms by owning definition
    active: HashMap<DefinitionId, ActiveAlarm>,
    /// alarm id -> owning definition
    by_alarm: HashMap<AlarmId, DefinitionId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every map with the given store contents.
    pub fn rebuild(&mut self, definitions: Vec<AlarmDefinition>, active: Vec<ActiveAlarm>) {
        self.definitions.clear();
        self.active.clear();
        self.by_alarm.clear();

        for definition in definitions {
            self.add_definition(definition);
        }
        for alarm in active {
            self.upsert(alarm);
        }
    }

    /// Append to the tag index. Disabled definitions are ignored.
    pub fn add_definition(&mut self, definition: AlarmDefinition) -> bool {
        if !definition.enabled {
            return false;
        }
        self.definitions
            .entry(definition.tag.clone())
            .or_default()
            .push(definition);
        true
    }

    pub fn definitions_for(&self, tag: &str) -> &[AlarmDefinition] {
        self.definitions.get(tag).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn get(&self, definition_id: DefinitionId) -> Option<&ActiveAlarm> {
        self.active.get(&definition_id)
    }

    pub fn get_by_alarm_id(&self, alarm_id: AlarmId) -> Option<&ActiveAlarm> {
        self.by_alarm
            .get(&alarm_id)
            .and_then(|definition_id| self.active.get(definition_id))
    }

    /// Insert or replace the entry for the alarm's definition and index it.
    pub fn upsert(&mut self, alarm: ActiveAlarm) {
        if let Some(&owner) = self.by_alarm.get(&alarm.id) {
            if owner != alarm.definition_id {
                warn!(
                    "Alarm id {} already indexed for definition {}, re-pointing to {}; \
                     the store must assign unique alarm ids",
                    alarm.id, owner, alarm.definition_id
                );
            }
        }

        if let Some(previous) = self.active.get(&alarm.definition_id) {
            if previous.id != alarm.id
                && self.by_alarm.get(&previous.id) == Some(&alarm.definition_id)
            {
                self.by_alarm.remove(&previous.id);
            }
        }

        self.by_alarm.insert(alarm.id, alarm.definition_id);
        self.active.insert(alarm.definition_id, alarm);
    }

    pub fn remove(&mut self, definition_id: DefinitionId) -> Option<ActiveAlarm> {
        let removed = self.active.remove(&definition_id)?;
        if self.by_alarm.get(&removed.id) == Some(&definition_id) {
            self.by_alarm.remove(&removed.id);
        }
        Some(removed)
    }

    /// Definitions whose alarm is Shelved with an elapsed window.
    pub fn expired_shelved(&self, now: DateTime<Utc>) -> Vec<DefinitionId> {
        let mut expired: Vec<DefinitionId> = self
            .active
            .values()
            .filter(|alarm| alarm.shelving_expired(now))
            .map(|alarm| alarm.definition_id)
            .collect();
        expired.sort_unstable();
        expired
    }

    /// Copy of every active alarm, ordered by alarm id.
    pub fn active_snapshot(&self) -> Vec<ActiveAlarm> {
        let mut alarms: Vec<ActiveAlarm> = self.active.values().cloned().collect();
        alarms.sort_by_key(|alarm| alarm.id);
        alarms
    }

    /// Copy of the definition cache, ordered by definition id.
    pub fn definitions_snapshot(&self) -> Vec<AlarmDefinition> {
        let mut definitions: Vec<AlarmDefinition> =
            self.definitions.values().flatten().cloned().collect();
        definitions.sort_by_key(|d| d.id);
        definitions
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn indexed_count(&self) -> usize {
        self.by_alarm.len()
    }
}
