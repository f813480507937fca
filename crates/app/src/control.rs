//! Run control — the pause and stop intents of a single run.
//!
//! A [`RunControl`] is shared between the run that observes it and
//! whoever drives the engine. Both intents are plain flags; they only take
//! effect at suspension points (sleeps, polls, step boundaries). A stop
//! always wins over a pause.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use macrobot_domain::error::StepError;

/// How often a paused run re-checks its intents.
pub const PAUSE_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Default)]
pub struct RunControl {
    paused: Arc<AtomicBool>,
    stop: CancellationToken,
}

impl RunControl {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a pause. Returns `false` if already paused or stopped.
    pub fn pause(&self) -> bool {
        if self.is_stopped() {
            return false;
        }
        !self.paused.swap(true, Ordering::SeqCst)
    }

    /// Clear a pause request. Returns `false` if none was pending.
    pub fn resume(&self) -> bool {
        self.paused.swap(false, Ordering::SeqCst)
    }

    /// Request a stop, clearing any pending pause.
    pub fn stop(&self) {
        self.paused.store(false, Ordering::SeqCst);
        self.stop.cancel();
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Fail with [`StepError::Interrupted`] once a stop was requested.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::Interrupted`] when the run was stopped.
    pub fn checkpoint(&self) -> Result<(), StepError> {
        if self.is_stopped() {
            Err(StepError::Interrupted)
        } else {
            Ok(())
        }
    }

    /// Block while a pause is pending, waking early on stop.
    ///
    /// Returns `true` if the call actually waited.
    pub async fn wait_while_paused(&self) -> bool {
        let mut waited = false;
        while self.is_paused() && !self.is_stopped() {
            waited = true;
            tokio::select! {
                () = self.stop.cancelled() => {}
                () = tokio::time::sleep(PAUSE_POLL) => {}
            }
        }
        waited
    }

    /// Sleep for `duration`, or until a stop is requested.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::Interrupted`] if the run is stopped before or
    /// during the sleep.
    pub async fn sleep(&self, duration: Duration) -> Result<(), StepError> {
        if duration.is_zero() {
            return self.checkpoint();
        }
        tokio::select! {
            biased;
            () = self.stop.cancelled() => Err(StepError::Interrupted),
            () = tokio::time::sleep(duration) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[test]
    fn should_ignore_pause_when_already_stopped() {
        let control = RunControl::new();
        control.stop();
        assert!(!control.pause());
        assert!(!control.is_paused());
    }

    #[test]
    fn should_clear_pause_when_stopped() {
        let control = RunControl::new();
        assert!(control.pause());
        assert!(!control.pause());
        control.stop();
        assert!(!control.is_paused());
        assert!(control.checkpoint().unwrap_err().is_interrupted());
    }

    #[tokio::test(start_paused = true)]
    async fn should_complete_sleep_when_not_stopped() {
        let control = RunControl::new();
        let start = Instant::now();
        control.sleep(Duration::from_millis(250)).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn should_interrupt_sleep_when_stopped() {
        let control = RunControl::new();
        let stopper = control.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            stopper.stop();
        });

        let start = Instant::now();
        let result = control.sleep(Duration::from_secs(60)).await;
        assert!(matches!(result, Err(StepError::Interrupted)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn should_wait_until_resumed() {
        let control = RunControl::new();
        control.pause();
        let resumer = control.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(450)).await;
            resumer.resume();
        });

        let start = Instant::now();
        assert!(control.wait_while_paused().await);
        assert!(start.elapsed() >= Duration::from_millis(450));
        assert!(!control.is_paused());
    }

    #[tokio::test]
    async fn should_return_immediately_when_not_paused() {
        let control = RunControl::new();
        assert!(!control.wait_while_paused().await);
    }
}
