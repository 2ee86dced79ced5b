// src/fsm.rs - ISA-18.2 alarm lifecycle state machine
//
// Pure transition table over alarm states. Nothing here touches the registry,
// the store or the clock; callers pass `now` explicitly.

use crate::error::{AlarmError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// ISA-18.2 Alarm States (Section 7.3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlarmState {
    /// Normal - No alarm condition exists
    Normal,

    /// Unacknowledged - Alarm active, not acknowledged
    UnackActive,

    /// Acknowledged - Alarm active and acknowledged
    AckActive,

    /// RTN-Unacknowledged - Returned to normal but not acknowledged
    #[serde(rename = "UnackRTN")]
    UnackRtn,

    /// Shelved - Temporarily disabled by operator
    Shelved,

    /// Suppressed - Alarm suppressed by design
    Suppressed,
}

impl AlarmState {
    /// Every lifecycle state, in table order.
    pub const ALL: [AlarmState; 6] = [
        AlarmState::Normal,
        AlarmState::UnackActive,
        AlarmState::AckActive,
        AlarmState::UnackRtn,
        AlarmState::Shelved,
        AlarmState::Suppressed,
    ];

    /// Stable code used at the persistence boundary.
    pub fn as_str(&self) -> &'static str {
        match self {
            AlarmState::Normal => "Normal",
            AlarmState::UnackActive => "UnackActive",
            AlarmState::AckActive => "AckActive",
            AlarmState::UnackRtn => "UnackRTN",
            AlarmState::Shelved => "Shelved",
            AlarmState::Suppressed => "Suppressed",
        }
    }
}

impl fmt::Display for AlarmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlarmState {
    type Err = AlarmError;

    fn from_str(s: &str) -> Result<Self> {
        AlarmState::ALL
            .iter()
            .copied()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| AlarmError::Decode(format!("unknown alarm state '{}'", s)))
    }
}

/// Inputs to the lifecycle state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleEvent {
    /// Threshold violated
    Trigger,
    /// Threshold no longer violated
    Clear,
    /// Operator acknowledgment
    Ack,
    Shelve,
    Unshelve,
}

impl LifecycleEvent {
    /// Every lifecycle event, in table order.
    pub const ALL: [LifecycleEvent; 5] = [
        LifecycleEvent::Trigger,
        LifecycleEvent::Clear,
        LifecycleEvent::Ack,
        LifecycleEvent::Shelve,
        LifecycleEvent::Unshelve,
    ];

    /// Map an evaluator result onto the event it drives.
    pub fn from_evaluation(fired: bool) -> Self {
        if fired {
            LifecycleEvent::Trigger
        } else {
            LifecycleEvent::Clear
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleEvent::Trigger => "Trigger",
            LifecycleEvent::Clear => "Clear",
            LifecycleEvent::Ack => "Ack",
            LifecycleEvent::Shelve => "Shelve",
            LifecycleEvent::Unshelve => "Unshelve",
        };
        f.write_str(name)
    }
}

/// Look up the next state for `(state, event)`.
///
/// Returns [`AlarmError::InvalidTransition`] for every cell the table leaves
/// empty; the caller's state is then unchanged.
pub fn next_state(state: AlarmState, event: LifecycleEvent) -> Result<AlarmState> {
    use AlarmState::*;
    use LifecycleEvent::*;

    let next = match (state, event) {
        (Normal, Trigger) => Some(UnackActive),
        (Normal, Shelve) => Some(Shelved),

        (UnackActive, Clear) => Some(UnackRtn),
        (UnackActive, Ack) => Some(AckActive),
        (UnackActive, Shelve) => Some(Shelved),

        (AckActive, Clear) => Some(Normal),
        (AckActive, Shelve) => Some(Shelved),

        (UnackRtn, Trigger) => Some(UnackActive),
        (UnackRtn, Ack) => Some(Normal),
        (UnackRtn, Shelve) => Some(Shelved),

        (Shelved, Unshelve) => Some(Normal),

        (Suppressed, Shelve) => Some(Shelved),

        _ => None,
    };

    next.ok_or(AlarmError::InvalidTransition { from: state, event })
}

/// Lifecycle state of one alarm together with its shelving window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmFsm {
    state: AlarmState,
    shelved_until: Option<DateTime<Utc>>,
}

impl AlarmFsm {
    pub fn new(state: AlarmState) -> Self {
        Self { state, shelved_until: None }
    }

    /// Resume a stored alarm, shelving window included.
    pub fn with_window(state: AlarmState, shelved_until: Option<DateTime<Utc>>) -> Self {
        Self { state, shelved_until }
    }

    pub fn state(&self) -> AlarmState {
        self.state
    }

    pub fn shelved_until(&self) -> Option<DateTime<Utc>> {
        self.shelved_until
    }

    /// Apply one event. On rejection the state is left untouched.
    pub fn transition(&mut self, event: LifecycleEvent) -> Result<AlarmState> {
        let next = next_state(self.state, event)?;
        if event == LifecycleEvent::Unshelve {
            self.shelved_until = None;
        }
        self.state = next;
        Ok(next)
    }

    /// Operator shelving with an explicit expiry.
    ///
    /// Forces `Shelved` from any state except `Suppressed`; an already shelved
    /// alarm gets the new window.
    pub fn shelve_until(&mut self, until: DateTime<Utc>) -> Result<()> {
        if self.state == AlarmState::Suppressed {
            return Err(AlarmError::ShelveSuppressed);
        }
        self.state = AlarmState::Shelved;
        self.shelved_until = Some(until);
        Ok(())
    }

    /// Shelve for `duration` starting at `now`.
    pub fn shelve(
        &mut self,
        duration: std::time::Duration,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>> {
        let until = shelve_deadline(now, duration)?;
        self.shelve_until(until)?;
        Ok(until)
    }

    /// Shelved and the window has not yet elapsed at `now`.
    pub fn is_shelved(&self, now: DateTime<Utc>) -> bool {
        if self.state != AlarmState::Shelved {
            return false;
        }
        match self.shelved_until {
            Some(until) => now <= until,
            None => true,
        }
    }
}

/// `now + duration`, rejecting durations chrono cannot represent.
pub fn shelve_deadline(now: DateTime<Utc>, duration: std::time::Duration) -> Result<DateTime<Utc>> {
    chrono::Duration::from_std(duration)
        .ok()
        .and_then(|d| now.checked_add_signed(d))
        .ok_or_else(|| AlarmError::InvalidDuration(format!("{:?}", duration)))
}
