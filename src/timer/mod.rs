//! Cancellable one-second-resolution countdown.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

/// Countdown timer owned by the session state machine.
///
/// `start` reports the full duration right away, then the remaining count
/// once per elapsed second down to `0`, then calls `on_expire` exactly once.
/// Starting again cancels the running countdown, and dropping the timer
/// cancels it too. Requires a tokio runtime.
#[derive(Debug, Default)]
pub struct StageTimer {
    handle: Option<JoinHandle<()>>,
}

impl StageTimer {
    /// Create an idle timer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a countdown of `duration_seconds`.
    pub fn start<T, E>(&mut self, duration_seconds: u32, mut on_tick: T, on_expire: E)
    where
        T: FnMut(u32) + Send + 'static,
        E: FnOnce() + Send + 'static,
    {
        self.cancel();
        debug!(duration_seconds, "Stage timer started");

        self.handle = Some(tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(1));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            for remaining in (0..=duration_seconds).rev() {
                // first tick completes immediately
                ticker.tick().await;
                on_tick(remaining);
            }
            on_expire();
        }));
    }

    /// Stop the running countdown, if any. Safe to call repeatedly.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            if !handle.is_finished() {
                debug!("Stage timer cancelled");
            }
            handle.abort();
        }
    }

    /// Whether a countdown is still running.
    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for StageTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
