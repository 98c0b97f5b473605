//! Cancelable timers
//!
//! Every delayed or repeating callback in the wizard (debounce, loading
//! sequence, payment countdown) is started through this module and owned
//! by a [`TimerHandle`]. Dropping or cancelling the handle aborts the task,
//! so no callback can fire after its owner is gone.

use parking_lot::Mutex;
use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Owned handle to a spawned timer task
///
/// Aborts the task on [`cancel`](Self::cancel) and on drop.
#[derive(Debug)]
#[must_use = "dropping a TimerHandle cancels the timer"]
pub struct TimerHandle {
    task: Option<JoinHandle<()>>,
}

impl TimerHandle {
    /// Spawn a future under a handle
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            task: Some(tokio::spawn(future)),
        }
    }

    /// Handle that owns nothing
    #[inline]
    pub fn detached() -> Self {
        Self { task: None }
    }

    /// Abort the task; returns true if it was still pending
    pub fn cancel(&mut self) -> bool {
        match self.task.take() {
            Some(task) => {
                let pending = !task.is_finished();
                task.abort();
                pending
            }
            None => false,
        }
    }

    /// True once the task ran to completion or was cancelled
    #[inline]
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Wait for the task to end
    pub async fn join(mut self) {
        if let Some(task) = self.task.take() {
            // A cancelled task resolves with a JoinError; either way it is over
            let _ = task.await;
        }
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Run `callback` once after `delay`
pub fn spawn_after<F>(delay: Duration, callback: F) -> TimerHandle
where
    F: FnOnce() + Send + 'static,
{
    TimerHandle::spawn(async move {
        time::sleep(delay).await;
        callback();
    })
}

/// Run `callback` every `period` until it breaks
///
/// The first call happens one full period after start.
pub fn spawn_interval<F>(period: Duration, mut callback: F) -> TimerHandle
where
    F: FnMut() -> ControlFlow<()> + Send + 'static,
{
    let period = period.max(Duration::from_millis(1));
    TimerHandle::spawn(async move {
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if callback().is_break() {
                break;
            }
        }
    })
}

/// Group of timers torn down together
///
/// A step or session registers every timer it starts here and calls
/// [`teardown`](Self::teardown) when it goes away.
#[derive(Debug, Default)]
pub struct TimerScope {
    handles: Mutex<Vec<TimerHandle>>,
}

impl TimerScope {
    /// Create empty scope
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of a handle
    pub fn track(&self, handle: TimerHandle) {
        let mut handles = self.handles.lock();
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
    }

    /// Timers that have neither finished nor been cancelled
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.handles.lock().iter().filter(|h| !h.is_finished()).count()
    }

    /// Cancel every tracked timer; returns how many were still pending
    pub fn teardown(&self) -> usize {
        let drained: Vec<TimerHandle> = self.handles.lock().drain(..).collect();
        let cancelled = drained
            .into_iter()
            .map(|mut h| h.cancel())
            .filter(|pending| *pending)
            .count();
        if cancelled > 0 {
            tracing::debug!("Cancelled {} pending timers", cancelled);
        }
        cancelled
    }
}

impl Drop for TimerScope {
    fn drop(&mut self) {
        self.teardown();
    }
}
