//! Recording timer
//!
//! Ticks once a second while listening. Each start opens a new epoch so a
//! tick that was already queued when the timer was cancelled can be told
//! apart from a live one.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

const TICK_PERIOD: Duration = Duration::from_secs(1);

/// One elapsed second of a timer epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerTick {
    pub epoch: u64,
}

/// Periodic one-second tick source
#[derive(Debug, Default)]
pub struct RecordingTimer {
    epoch: u64,
    task: Option<JoinHandle<()>>,
}

impl RecordingTimer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start ticking, cancelling any previous run; returns the new epoch
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<F>(&mut self, on_tick: F) -> u64
    where
        F: Fn(TimerTick) -> bool + Send + 'static,
    {
        self.cancel();
        let epoch = self.epoch;

        self.task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if !on_tick(TimerTick { epoch }) {
                    break;
                }
            }
        }));

        tracing::trace!(epoch, "recording timer started");
        epoch
    }

    /// Stop ticking; idempotent
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::trace!(epoch = self.epoch, "recording timer cancelled");
        }
        self.epoch += 1;
    }

    /// Whether `tick` belongs to the running epoch
    #[must_use]
    pub fn accepts(&self, tick: TimerTick) -> bool {
        self.task.is_some() && tick.epoch == self.epoch
    }

    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.task.is_some()
    }
}

impl Drop for RecordingTimer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
