// src/sweeper.rs - background shelving expiry

use crate::engine::AlarmEngine;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Periodically releases alarms whose shelving window has elapsed.
///
/// Runs until its `JoinHandle` is aborted.
pub struct ExpirySweeper {
    engine: Arc<AlarmEngine>,
    period: Duration,
}

impl ExpirySweeper {
    pub fn new(engine: Arc<AlarmEngine>, period: Duration) -> Self {
        Self {
            engine,
            period: if period.is_zero() { DEFAULT_SWEEP_INTERVAL } else { period },
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(self) {
        info!("Shelving expiry sweep every {:?}", self.period);
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let released = self.engine.sweep_expired().await;
            if released > 0 {
                debug!("Sweep released {} shelved alarms", released);
            }
        }
    }
}
