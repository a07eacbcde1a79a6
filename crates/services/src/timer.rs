//! Pausable one-second tick source.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::error::TimerError;

/// Lifecycle of a [`CountdownTimer`]. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Idle,
    Running,
    Paused,
    Stopped,
}

/// Calls a callback once per period while running.
///
/// The periodic task is spawned on `start` and aborted on `stop` or drop.
/// Pausing keeps the task alive and only suppresses the callback, so a tick
/// already executing finishes but the next one is skipped.
#[derive(Debug)]
pub struct CountdownTimer {
    period: Duration,
    state: TimerState,
    paused: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl Default for CountdownTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl CountdownTimer {
    #[must_use]
    pub fn new() -> Self {
        Self::with_period(Duration::from_secs(1))
    }

    #[must_use]
    pub fn with_period(period: Duration) -> Self {
        Self {
            period,
            state: TimerState::Idle,
            paused: Arc::new(AtomicBool::new(false)),
            task: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> TimerState {
        self.state
    }

    /// Spawn the periodic task on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `TimerError::AlreadyStarted` unless the timer is idle,
    /// `TimerError::Stopped` after `stop`, and `TimerError::NoRuntime` when
    /// called outside a runtime.
    pub fn start<F>(&mut self, mut on_tick: F) -> Result<(), TimerError>
    where
        F: FnMut() + Send + 'static,
    {
        match self.state {
            TimerState::Idle => {}
            TimerState::Stopped => return Err(TimerError::Stopped),
            TimerState::Running | TimerState::Paused => return Err(TimerError::AlreadyStarted),
        }
        let handle = Handle::try_current().map_err(|_| TimerError::NoRuntime)?;

        let paused = Arc::clone(&self.paused);
        let period = self.period;
        self.task = Some(handle.spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if !paused.load(Ordering::SeqCst) {
                    on_tick();
                }
            }
        }));
        self.state = TimerState::Running;
        Ok(())
    }

    /// Suppress ticks. Idempotent.
    pub fn pause(&mut self) {
        if self.state == TimerState::Running {
            self.paused.store(true, Ordering::SeqCst);
            self.state = TimerState::Paused;
        }
    }

    pub fn resume(&mut self) {
        if self.state == TimerState::Paused {
            self.paused.store(false, Ordering::SeqCst);
            self.state = TimerState::Running;
        }
    }

    /// Release the periodic task. Legal from any state.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.state = TimerState::Stopped;
    }
}

impl Drop for CountdownTimer {
    fn drop(&mut self) {
        self.stop();
    }
}
