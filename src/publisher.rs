// src/publisher.rs - alarm event emission
//
// Delivery is fire-and-forget: the engine logs a failed publish and moves
// on, persisted state is never rolled back.

use crate::alarms::AlarmEvent;
use crate::error::Result;
use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{info, trace};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish_alarm_event(&self, event: &AlarmEvent) -> Result<()>;
}

/// In-process fan-out over a tokio broadcast channel
///
/// Slow subscribers lag and lose the oldest events; having no subscriber at
/// all is not an error.
pub struct BroadcastPublisher {
    sender: broadcast::Sender<AlarmEvent>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AlarmEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl EventPublisher for BroadcastPublisher {
    async fn publish_alarm_event(&self, event: &AlarmEvent) -> Result<()> {
        match self.sender.send(event.clone()) {
            Ok(receivers) => trace!(
                "Alarm event {} delivered to {} subscribers",
                event.alarm_id, receivers
            ),
            Err(_) => trace!("Alarm event {} dropped, no subscribers", event.alarm_id),
        }
        Ok(())
    }
}

/// Writes every event to the log
#[derive(Debug, Default)]
pub struct LogPublisher;

#[async_trait]
impl EventPublisher for LogPublisher {
    async fn publish_alarm_event(&self, event: &AlarmEvent) -> Result<()> {
        info!(
            alarm_id = event.alarm_id,
            definition_id = event.definition_id,
            state = %event.state,
            value = event.value,
            "{}",
            event.message
        );
        Ok(())
    }
}
