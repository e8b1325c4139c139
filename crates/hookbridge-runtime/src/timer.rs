//! Timers of the main context.
//!
//! A timer is ref'd by default: while it is scheduled it holds a keep-alive
//! on the main context. [`TimerHandle::unref`] lets the context exit
//! naturally even though the timer is still scheduled.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::AbortHandle;

use hookbridge_core::{Activity, KeepAlive};

/// Handle to a scheduled timeout or interval.
#[derive(Debug, Clone)]
pub struct TimerHandle {
    keep_alive: Arc<Mutex<KeepAlive>>,
    task: AbortHandle,
}

impl TimerHandle {
    /// Stops the timer from keeping the context alive.
    pub fn unref(&self) -> &Self {
        self.keep_alive.lock().unref();
        self
    }

    /// Makes a still-scheduled timer keep the context alive again.
    pub fn reref(&self) -> &Self {
        if !self.task.is_finished() {
            self.keep_alive.lock().reref();
        }
        self
    }

    /// Whether the timer currently keeps the context alive.
    pub fn has_ref(&self) -> bool {
        self.keep_alive.lock().is_held()
    }

    /// Cancels the timer.
    pub fn cancel(&self) {
        self.task.abort();
        self.keep_alive.lock().unref();
    }
}

pub(crate) fn timeout<F>(activity: &Activity, delay: Duration, callback: F) -> TimerHandle
where
    F: FnOnce() + Send + 'static,
{
    let keep_alive = Arc::new(Mutex::new(activity.keep_alive("timeout")));
    let held = Arc::clone(&keep_alive);
    let task = tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        held.lock().unref();
        callback();
    });
    TimerHandle {
        keep_alive,
        task: task.abort_handle(),
    }
}

pub(crate) fn interval<F>(activity: &Activity, period: Duration, mut callback: F) -> TimerHandle
where
    F: FnMut() + Send + 'static,
{
    let keep_alive = Arc::new(Mutex::new(activity.keep_alive("interval")));
    let task = tokio::spawn(async move {
        let mut ticks = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        loop {
            ticks.tick().await;
            callback();
        }
    });
    TimerHandle {
        keep_alive,
        task: task.abort_handle(),
    }
}
