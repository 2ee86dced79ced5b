// src/mqtt.rs - MQTT measurement feed and alarm event publication

use crate::alarms::AlarmEvent;
use crate::config::{MqttConfig, MqttQos};
use crate::engine::AlarmEngine;
use crate::error::{AlarmError, Result};
use crate::publisher::EventPublisher;
use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

const REQUEST_CAPACITY: usize = 256;
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// One measurement as carried on the feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorData {
    #[serde(alias = "tag")]
    pub sensor_id: String,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<i32>,
}

/// Decode a measurement payload.
///
/// JSON `SensorData` is the primary format. A bare number is accepted too,
/// tagged with the last topic segment.
pub fn decode_measurement(topic: &str, payload: &[u8]) -> Result<SensorData> {
    if let Ok(data) = serde_json::from_slice::<SensorData>(payload) {
        return Ok(data);
    }

    let text = std::str::from_utf8(payload)
        .map_err(|_| AlarmError::Decode(format!("non UTF-8 payload on {}", topic)))?;
    let value = text
        .trim()
        .parse::<f64>()
        .map_err(|_| {
            AlarmError::Decode(format!("unrecognised measurement on {}: '{}'", topic, text.trim()))
        })?;
    let sensor_id = topic
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .ok_or_else(|| AlarmError::Decode(format!("no tag in topic '{}'", topic)))?;

    Ok(SensorData {
        sensor_id: sensor_id.to_string(),
        value,
        timestamp_ms: None,
        quality: None,
    })
}

pub fn qos(level: MqttQos) -> QoS {
    match level {
        MqttQos::AtMostOnce => QoS::AtMostOnce,
        MqttQos::AtLeastOnce => QoS::AtLeastOnce,
        MqttQos::ExactlyOnce => QoS::ExactlyOnce,
    }
}

pub fn options(config: &MqttConfig) -> MqttOptions {
    let mut options = MqttOptions::new(&config.client_id, &config.broker.host, config.broker.port);
    options.set_keep_alive(Duration::from_secs(config.keepalive_secs.max(5)));
    if let (Some(username), Some(password)) = (&config.username, &config.password) {
        options.set_credentials(username, password);
    }
    options
}

/// Subscribes to the measurement topic and feeds the engine
pub struct MqttTransport {
    client: AsyncClient,
    eventloop: EventLoop,
    config: MqttConfig,
}

impl MqttTransport {
    pub fn new(config: MqttConfig) -> Self {
        let (client, eventloop) = AsyncClient::new(options(&config), REQUEST_CAPACITY);
        Self { client, eventloop, config }
    }

    /// Publisher sharing this transport's connection.
    pub fn publisher(&self) -> MqttEventPublisher {
        MqttEventPublisher {
            client: self.client.clone(),
            topic: self.config.event_topic.clone(),
            qos: qos(self.config.qos),
        }
    }

    /// Drive the connection until the task is aborted.
    ///
    /// Measurements are handled in arrival order; the subscription is renewed
    /// on every (re)connect.
    pub async fn run(mut self, engine: Arc<AlarmEngine>) {
        info!(
            "MQTT transport connecting to {}:{} (measurements: {}, events: {})",
            self.config.broker.host,
            self.config.broker.port,
            self.config.measurement_topic,
            self.config.event_topic
        );

        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("Connected to MQTT broker");
                    if let Err(e) = self
                        .client
                        .try_subscribe(self.config.measurement_topic.as_str(), qos(self.config.qos))
                    {
                        error!("Failed to subscribe to {}: {}", self.config.measurement_topic, e);
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    Self::handle_measurement(&engine, &publish.topic, &publish.payload).await;
                }
                Ok(event) => trace!("MQTT event: {:?}", event),
                Err(e) => {
                    error!("MQTT connection error: {}", e);
                    tokio::time::sleep(RECONNECT_DELAY).await;
                }
            }
        }
    }

    async fn handle_measurement(engine: &AlarmEngine, topic: &str, payload: &[u8]) {
        let data = match decode_measurement(topic, payload) {
            Ok(data) => data,
            Err(e) => {
                warn!("Dropping measurement: {}", e);
                return;
            }
        };

        let changed = engine.process_value(&data.sensor_id, data.value).await;
        if changed > 0 {
            debug!("{} = {} changed {} alarms", data.sensor_id, data.value, changed);
        }
    }
}

/// Publishes JSON alarm events to the configured event topic
///
/// Uses the non-blocking request path so that a stalled connection never
/// holds up the engine; a full request queue is reported as a publish error.
#[derive(Clone)]
pub struct MqttEventPublisher {
    client: AsyncClient,
    topic: String,
    qos: QoS,
}

#[async_trait]
impl EventPublisher for MqttEventPublisher {
    async fn publish_alarm_event(&self, event: &AlarmEvent) -> Result<()> {
        let payload = serde_json::to_vec(event)?;
        self.client
            .try_publish(self.topic.as_str(), self.qos, false, payload)
            .map_err(|e| AlarmError::Mqtt(e.to_string()))
    }
}
