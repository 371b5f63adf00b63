//! Tick source for the synchronization loop.
//!
//! The loop asks its [`Scheduler`] before every cycle whether to run. Keeping the
//! clock behind a trait lets tests drive cycles under tokio's paused clock or
//! with a plain counter.

use std::time::Duration;

use async_trait::async_trait;
use mockall::automock;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Scheduler: Send {
    /// Waits for the next cycle start. `false` means stop.
    async fn next_tick(&mut self) -> bool;
}

/// Fixed-rate ticks: the first fires immediately, later ones one `period` apart
/// measured between cycle starts. A late cycle delays the next tick instead of
/// bursting, so cycles never overlap.
///
/// Cancellation is only observed while waiting, never during a cycle.
#[derive(Debug)]
pub struct IntervalScheduler {
    interval: Interval,
    cancel: CancellationToken,
}

impl IntervalScheduler {
    /// Must be called from within a tokio runtime.
    pub fn new(period: Duration, cancel: CancellationToken) -> Self {
        let mut interval = interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval, cancel }
    }
}

#[async_trait]
impl Scheduler for IntervalScheduler {
    async fn next_tick(&mut self) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = self.interval.tick() => true,
        }
    }
}
