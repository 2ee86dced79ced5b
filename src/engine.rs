// src/engine.rs - alarm lifecycle orchestration
//
// Every mutation runs under the registry's exclusive lock and awaits the
// gateway before touching memory, so the registry never holds a state the
// store has not accepted. Events are emitted while the lock is still held
// which keeps their order identical to commit order.

use crate::alarms::{
    ActiveAlarm, AlarmDefinition, AlarmEvent, AlarmId, NewActiveAlarm, NewAlarmDefinition,
};
use crate::error::{AlarmError, Result};
use crate::evaluator::evaluate;
use crate::fsm::{shelve_deadline, AlarmFsm, AlarmState, LifecycleEvent};
use crate::gateway::PersistenceGateway;
use crate::publisher::EventPublisher;
use crate::registry::Registry;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, info, trace, warn};

pub struct AlarmEngine {
    gateway: Arc<dyn PersistenceGateway>,
    publisher: Arc<dyn EventPublisher>,
    registry: RwLock<Registry>,
}

/// Point-in-time counters for health reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct EngineStats {
    pub definitions: usize,
    pub active_alarms: usize,
}

impl AlarmEngine {
    pub fn new(gateway: Arc<dyn PersistenceGateway>, publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            gateway,
            publisher,
            registry: RwLock::new(Registry::new()),
        }
    }

    /// Rebuild the definition cache and the active alarms from the store.
    ///
    /// Safe to call again; the previous contents are replaced.
    pub async fn load(&self) -> Result<()> {
        let mut registry = self.registry.write().await;
        let definitions = self.gateway.list_definitions().await?;
        let active = self.gateway.get_active_alarms().await?;

        let definition_count = definitions.len();
        let active_count = active.len();
        registry.rebuild(definitions, active);

        info!(
            "Alarm engine loaded {} definitions ({} enabled), {} active alarms",
            definition_count,
            registry.definitions_snapshot().len(),
            active_count
        );
        Ok(())
    }

    // ========== Measurement path ==========

    /// Evaluate one measurement against every definition watching `tag`.
    ///
    /// Returns the number of committed state changes. Failures for one
    /// definition are logged and do not stop its siblings.
    pub async fn process_value(&self, tag: &str, value: f64) -> usize {
        let definitions = self.registry.read().await.definitions_for(tag).to_vec();
        if definitions.is_empty() {
            trace!("No alarm definitions for tag {}", tag);
            return 0;
        }

        let mut changed = 0;
        for definition in &definitions {
            match self.evaluate_definition(definition, value).await {
                Ok(true) => changed += 1,
                Ok(false) => {}
                Err(e) => error!(
                    "Error evaluating definition {} for {}: {}",
                    definition.id, tag, e
                ),
            }
        }
        changed
    }

    async fn evaluate_definition(&self, definition: &AlarmDefinition, value: f64) -> Result<bool> {
        let now = Utc::now();
        let mut registry = self.registry.write().await;

        let current = registry.get(definition.id).cloned();
        let from = current.as_ref().map_or(AlarmState::Normal, |alarm| alarm.state);
        let mut fsm = current.as_ref().map_or(AlarmFsm::new(AlarmState::Normal), ActiveAlarm::fsm);

        let event = LifecycleEvent::from_evaluation(evaluate(definition, value));
        let next = match fsm.transition(event) {
            Ok(next) => next,
            Err(e) => {
                debug!("Definition {} ignored {}: {}", definition.id, event, e);
                return Ok(false);
            }
        };
        if next == from {
            return Ok(false);
        }

        let committed = match current {
            None => {
                let stored = self
                    .gateway
                    .create_active_alarm(&NewActiveAlarm {
                        definition_id: definition.id,
                        state: next,
                        activation_time: now,
                        value,
                    })
                    .await?;
                registry.upsert(stored.clone());
                stored
            }
            Some(mut alarm) => {
                self.gateway.update_active_alarm_state(alarm.id, next).await?;
                alarm.state = next;
                alarm.value = value;
                alarm.shelved_until = fsm.shelved_until();
                alarm.updated_at = now;
                commit(&mut registry, &alarm);
                alarm
            }
        };

        info!(
            "Alarm {} ({}) {} -> {} at value {}",
            committed.id, definition.tag, from, next, value
        );
        let message = format!("Alarm {} transitioned to {}", definition.tag, next);
        self.emit(AlarmEvent::for_alarm(&committed, message, now)).await;
        Ok(true)
    }

    // ========== Operator commands ==========

    /// Acknowledge an active alarm.
    ///
    /// Returns the alarm as committed; a `Normal` result has already left the
    /// registry.
    pub async fn acknowledge(&self, alarm_id: AlarmId) -> Result<ActiveAlarm> {
        let now = Utc::now();
        let mut registry = self.registry.write().await;

        let mut alarm = registry
            .get_by_alarm_id(alarm_id)
            .cloned()
            .ok_or(AlarmError::NotFound(alarm_id))?;
        let mut fsm = alarm.fsm();
        let next = fsm.transition(LifecycleEvent::Ack)?;

        match next {
            AlarmState::AckActive => self.gateway.ack_active_alarm(alarm_id, now).await?,
            other => self.gateway.update_active_alarm_state(alarm_id, other).await?,
        }

        alarm.state = next;
        alarm.ack_time = Some(now);
        alarm.shelved_until = None;
        alarm.updated_at = now;
        commit(&mut registry, &alarm);

        info!("Alarm {} acknowledged, now {}", alarm_id, next);
        self.emit(AlarmEvent::for_alarm(&alarm, "Alarm acknowledged", now)).await;
        Ok(alarm)
    }

    /// Shelve an active alarm for `duration`.
    ///
    /// A shelved alarm gets a fresh window; a suppressed one is refused.
    pub async fn shelve(&self, alarm_id: AlarmId, duration: Duration) -> Result<ActiveAlarm> {
        let now = Utc::now();
        let until = shelve_deadline(now, duration)?;
        let mut registry = self.registry.write().await;

        let mut alarm = registry
            .get_by_alarm_id(alarm_id)
            .cloned()
            .ok_or(AlarmError::NotFound(alarm_id))?;
        let mut fsm = alarm.fsm();
        fsm.shelve_until(until)?;

        self.gateway.shelve_active_alarm(alarm_id, until).await?;

        alarm.state = fsm.state();
        alarm.shelved_until = fsm.shelved_until();
        alarm.updated_at = now;
        registry.upsert(alarm.clone());

        info!("Alarm {} shelved until {}", alarm_id, until);
        let message = format!("Alarm shelved until {}", until.to_rfc3339());
        self.emit(AlarmEvent::for_alarm(&alarm, message, now)).await;
        Ok(alarm)
    }

    /// Store a new definition and start evaluating it if enabled.
    pub async fn create_definition(&self, draft: NewAlarmDefinition) -> Result<AlarmDefinition> {
        draft.validate()?;
        let definition = self.gateway.create_definition(&draft).await?;

        let mut registry = self.registry.write().await;
        if registry.add_definition(definition.clone()) {
            info!(
                "Definition {} watching {} ({} {})",
                definition.id, definition.tag, definition.kind, definition.threshold
            );
        } else {
            debug!("Definition {} stored disabled", definition.id);
        }
        Ok(definition)
    }

    // ========== Queries ==========

    pub async fn list_active(&self) -> Vec<ActiveAlarm> {
        self.registry.read().await.active_snapshot()
    }

    pub async fn list_definitions(&self) -> Vec<AlarmDefinition> {
        self.registry.read().await.definitions_snapshot()
    }

    pub async fn get_active(&self, alarm_id: AlarmId) -> Result<ActiveAlarm> {
        self.registry
            .read()
            .await
            .get_by_alarm_id(alarm_id)
            .cloned()
            .ok_or(AlarmError::NotFound(alarm_id))
    }

    pub async fn stats(&self) -> EngineStats {
        let registry = self.registry.read().await;
        EngineStats {
            definitions: registry.definitions_snapshot().len(),
            active_alarms: registry.active_count(),
        }
    }

    // ========== Shelving expiry ==========

    pub async fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Utc::now()).await
    }

    /// Unshelve every alarm whose window elapsed before `now`.
    ///
    /// The last observed value is not re-evaluated; a still violating tag
    /// raises a new alarm on its next measurement. An entry whose update
    /// fails stays shelved for the next sweep.
    pub async fn sweep_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut registry = self.registry.write().await;
        let mut released = 0;

        for definition_id in registry.expired_shelved(now) {
            let Some(mut alarm) = registry.get(definition_id).cloned() else {
                continue;
            };

            let mut fsm = alarm.fsm();
            let next = match fsm.transition(LifecycleEvent::Unshelve) {
                Ok(next) => next,
                Err(e) => {
                    warn!("Alarm {} could not be unshelved: {}", alarm.id, e);
                    continue;
                }
            };

            if let Err(e) = self.gateway.update_active_alarm_state(alarm.id, next).await {
                error!("Failed to persist unshelve of alarm {}: {}", alarm.id, e);
                continue;
            }

            alarm.state = next;
            alarm.shelved_until = None;
            alarm.updated_at = now;
            commit(&mut registry, &alarm);
            released += 1;

            info!("Alarm {} shelving expired", alarm.id);
            self.emit(AlarmEvent::for_alarm(&alarm, "Alarm unshelved (expired)", now)).await;
        }

        released
    }

    async fn emit(&self, event: AlarmEvent) {
        if let Err(e) = self.publisher.publish_alarm_event(&event).await {
            warn!("Failed to publish alarm event for alarm {}: {}", event.alarm_id, e);
        }
    }
}

/// Apply a persisted alarm to the registry; `Normal` removes the entry.
fn commit(registry: &mut Registry, alarm: &ActiveAlarm) {
    if alarm.state == AlarmState::Normal {
        registry.remove(alarm.definition_id);
    } else {
        registry.upsert(alarm.clone());
    }
}
