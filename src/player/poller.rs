//! The progress poller.
//!
//! The engine does not push position updates, so the adapter samples it on
//! a fixed interval. The poller is a deadline, not a thread: the player loop
//! sleeps until `next_deadline` and then asks `due`. At most one poller is
//! armed, and it is armed for exactly one engine instance.

use std::time::{Duration, Instant};

use super::types::InstanceId;

#[derive(Debug, Clone, Copy)]
struct Armed {
    instance: InstanceId,
    next_due: Instant,
}

#[derive(Debug)]
pub struct ProgressPoller {
    interval: Duration,
    armed: Option<Armed>,
}

impl ProgressPoller {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(1)),
            armed: None,
        }
    }

    #[cfg(test)]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Arm for `instance`, replacing whatever was armed before.
    pub fn start(&mut self, instance: InstanceId, now: Instant) {
        self.armed = Some(Armed {
            instance,
            next_due: now + self.interval,
        });
    }

    pub fn stop(&mut self) {
        self.armed = None;
    }

    pub fn is_running(&self) -> bool {
        self.armed.is_some()
    }

    pub fn instance(&self) -> Option<InstanceId> {
        self.armed.map(|a| a.instance)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.armed.map(|a| a.next_due)
    }

    /// If a sample is due at `now`, schedule the next one and return the
    /// instance to sample.
    pub fn due(&mut self, now: Instant) -> Option<InstanceId> {
        let armed = self.armed.as_mut()?;
        if now < armed.next_due {
            return None;
        }
        // Missed ticks are skipped rather than replayed.
        armed.next_due = now + self.interval;
        Some(armed.instance)
    }
}
