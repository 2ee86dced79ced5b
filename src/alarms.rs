// File: src/alarms.rs
// Alarm data model for VIGIL
//
// Definitions are operator-configured rules; active alarms are the live,
// non-Normal instances of a definition's lifecycle. String codes for kinds,
// priorities and states exist only at the persistence and wire boundaries.

use crate::error::{AlarmError, Result};
use crate::fsm::{AlarmFsm, AlarmState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identity assigned to a definition by the durable store
pub type DefinitionId = i64;

/// Identity assigned to an active alarm by the durable store
pub type AlarmId = i64;

// ==========================================
// SECTION 1: ALARM DEFINITIONS
// ==========================================

/// Threshold comparison applied by the evaluator
///
/// Codes other than `High` and `Low` are preserved as `Unsupported` so that a
/// rule written by a newer tool round-trips through the store; such rules
/// never fire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ComparisonKind {
    /// High alarm - value exceeds threshold
    High,

    /// Low alarm - value below threshold
    Low,

    /// Comparison code this engine does not evaluate
    Unsupported(String),
}

impl ComparisonKind {
    /// Stable code used at the persistence boundary.
    pub fn as_str(&self) -> &str {
        match self {
            ComparisonKind::High => "High",
            ComparisonKind::Low => "Low",
            ComparisonKind::Unsupported(code) => code,
        }
    }

    pub fn from_code(code: &str) -> Self {
        match code {
            "High" => ComparisonKind::High,
            "Low" => ComparisonKind::Low,
            other => ComparisonKind::Unsupported(other.to_string()),
        }
    }
}

impl From<String> for ComparisonKind {
    fn from(code: String) -> Self {
        ComparisonKind::from_code(&code)
    }
}

impl From<ComparisonKind> for String {
    fn from(kind: ComparisonKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for ComparisonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ISA-18.2 Alarm Priority Levels (Section 6.5)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord, Default)]
pub enum AlarmPriority {
    /// Immediate operator action required
    Critical,

    /// Prompt operator action required
    High,

    /// Operator action required
    #[default]
    Warning,

    /// Operator awareness required
    Low,
}

impl AlarmPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlarmPriority::Critical => "Critical",
            AlarmPriority::High => "High",
            AlarmPriority::Warning => "Warning",
            AlarmPriority::Low => "Low",
        }
    }
}

impl fmt::Display for AlarmPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlarmPriority {
    type Err = AlarmError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Critical" => Ok(AlarmPriority::Critical),
            "High" => Ok(AlarmPriority::High),
            "Warning" => Ok(AlarmPriority::Warning),
            "Low" => Ok(AlarmPriority::Low),
            other => Err(AlarmError::Decode(format!("unknown alarm priority '{}'", other))),
        }
    }
}

/// Operator-configured rule binding a measurement tag to a threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmDefinition {
    /// Store-assigned identity
    pub id: DefinitionId,

    /// Measurement stream this rule watches
    pub tag: String,

    /// Alarm setpoint
    pub threshold: f64,

    /// Comparison applied against the threshold
    #[serde(rename = "type", alias = "kind")]
    pub kind: ComparisonKind,

    /// Priority classification
    pub priority: AlarmPriority,

    /// Disabled rules are stored but never evaluated
    #[serde(default = "default_true")]
    pub enabled: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Definition as submitted by an operator, before the store assigns identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAlarmDefinition {
    pub tag: String,
    pub threshold: f64,
    #[serde(rename = "type", alias = "kind")]
    pub kind: ComparisonKind,
    #[serde(default)]
    pub priority: AlarmPriority,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl NewAlarmDefinition {
    /// Enabled rule with the default priority.
    pub fn new(tag: impl Into<String>, kind: ComparisonKind, threshold: f64) -> Self {
        Self {
            tag: tag.into(),
            threshold,
            kind,
            priority: AlarmPriority::default(),
            enabled: true,
        }
    }

    pub fn with_priority(mut self, priority: AlarmPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.tag.trim().is_empty() {
            return Err(AlarmError::Config("definition tag must not be empty".to_string()));
        }
        if !self.threshold.is_finite() {
            return Err(AlarmError::Config(format!(
                "definition threshold for '{}' must be finite",
                self.tag
            )));
        }
        Ok(())
    }
}

// ==========================================
// SECTION 2: ACTIVE ALARMS
// ==========================================

/// Live, non-Normal instance of a definition's lifecycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveAlarm {
    /// Store-assigned identity, unique across definitions
    pub id: AlarmId,

    /// Owning definition
    pub definition_id: DefinitionId,

    /// Current lifecycle state
    pub state: AlarmState,

    /// Timestamp when alarm first activated
    pub activation_time: DateTime<Utc>,

    /// Timestamp of acknowledgment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ack_time: Option<DateTime<Utc>>,

    /// End of the shelving window; present only while `Shelved`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shelved_until: Option<DateTime<Utc>>,

    /// Last observed process value
    pub value: f64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ActiveAlarm {
    /// State machine positioned at this alarm's state and shelving window.
    pub fn fsm(&self) -> AlarmFsm {
        AlarmFsm::with_window(self.state, self.shelved_until)
    }

    /// Shelving window has elapsed at `now`.
    pub fn shelving_expired(&self, now: DateTime<Utc>) -> bool {
        self.state == AlarmState::Shelved && !self.fsm().is_shelved(now)
    }
}

/// Active alarm as handed to the store for creation
#[derive(Debug, Clone, PartialEq)]
pub struct NewActiveAlarm {
    pub definition_id: DefinitionId,
    pub state: AlarmState,
    pub activation_time: DateTime<Utc>,
    pub value: f64,
}

// ==========================================
// SECTION 3: ALARM EVENTS
// ==========================================

/// Notification emitted for every committed state change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmEvent {
    pub alarm_id: AlarmId,
    pub definition_id: DefinitionId,
    pub state: AlarmState,
    pub value: f64,
    pub timestamp_ms: i64,
    pub message: String,
}

impl AlarmEvent {
    pub fn for_alarm(alarm: &ActiveAlarm, message: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            alarm_id: alarm.id,
            definition_id: alarm.definition_id,
            state: alarm.state,
            value: alarm.value,
            timestamp_ms: at.timestamp_millis(),
            message: message.into(),
        }
    }
}

fn default_true() -> bool {
    true
}
