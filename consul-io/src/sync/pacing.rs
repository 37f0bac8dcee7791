use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{Interval, MissedTickBehavior};

/// Process-wide pacing shared by every upload task.
///
/// Slots are handed out one caller at a time from a single interval, so the
/// aggregate rate of remote attempts is capped, not the per-task rate. A zero
/// interval disables pacing.
pub struct RateLimiter {
    interval: Option<Mutex<Interval>>,
}

impl RateLimiter {
    /// Must be called from within a tokio runtime.
    pub fn new(period: Duration) -> Self {
        let interval = (!period.is_zero()).then(|| {
            let mut interval = tokio::time::interval(period);
            // A late caller must not receive a burst of catch-up ticks.
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            Mutex::new(interval)
        });
        Self { interval }
    }

    /// Waits for the next free slot.
    pub async fn tick(&self) {
        if let Some(interval) = &self.interval {
            interval.lock().await.tick().await;
        }
    }
}
