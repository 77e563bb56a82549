// src/scheduler/ticker.rs - Fixed-period tick source
use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Periodic tick that never bunches up: if a tick runs long, the missed
/// deadlines are dropped instead of firing back to back.
#[derive(Debug)]
pub struct Ticker {
    interval: Interval,
    period: Duration,
}

impl Ticker {
    /// First tick fires immediately.
    pub fn new(period: Duration) -> Self {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self { interval, period }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub async fn tick(&mut self) -> Instant {
        self.interval.tick().await
    }
}
