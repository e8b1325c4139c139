//! Natural-exit detection for the main context.
//!
//! The main runtime signals [`Lifecycle::idle`] each time it is about to
//! park with no ref'd source outstanding. The watcher turns those signals
//! into the two-step exit sequence: the first idle point emits the
//! before-exit observers, and a second idle point with no ref taken in
//! between is the natural exit point. There the monitor gets the final
//! word; if it finds nothing blocked the process exits with the stored
//! exit code.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{debug, trace};

use crate::exit::{ExitOrigin, ExitRequest};
use crate::shared::Shared;

type Observer = Arc<dyn Fn() + Send + Sync>;

/// Exit-sequence state shared by the main context.
pub struct Lifecycle {
    idle: Notify,
    exit_code: AtomicI32,
    observers: Mutex<Vec<Observer>>,
}

impl Lifecycle {
    /// A lifecycle with exit code 0 and no observers.
    pub fn new() -> Self {
        Self {
            idle: Notify::new(),
            exit_code: AtomicI32::new(0),
            observers: Mutex::new(Vec::new()),
        }
    }

    /// Signals that the main runtime is idle. Called from the park hook.
    pub fn notify_idle(&self) {
        self.idle.notify_one();
    }

    /// Sets the code used at natural exit.
    pub fn set_exit_code(&self, code: i32) {
        self.exit_code.store(code, Ordering::SeqCst);
    }

    /// The code used at natural exit.
    pub fn exit_code(&self) -> i32 {
        self.exit_code.load(Ordering::SeqCst)
    }

    /// Adds a before-exit observer.
    pub fn on_before_exit(&self, observer: impl Fn() + Send + Sync + 'static) {
        self.observers.lock().push(Arc::new(observer));
    }

    /// Removes every before-exit observer.
    pub fn remove_all_before_exit(&self) -> usize {
        let mut observers = self.observers.lock();
        let removed = observers.len();
        observers.clear();
        removed
    }

    /// Number of registered observers.
    pub fn observer_count(&self) -> usize {
        self.observers.lock().len()
    }

    fn emit_before_exit(&self) {
        // Observers may add or remove observers while running.
        let snapshot: Vec<Observer> = self.observers.lock().clone();
        debug!(observers = snapshot.len(), "Emitting before-exit");
        for observer in snapshot {
            observer();
        }
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle")
            .field("exit_code", &self.exit_code())
            .field("observers", &self.observer_count())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Running,
    BeforeExit { epoch: u64 },
}

/// Drives the exit sequence until an exit is claimed.
pub(crate) async fn watch(shared: Arc<Shared>) -> Option<ExitRequest> {
    let mut phase = Phase::Running;
    loop {
        shared.lifecycle.idle.notified().await;
        if let Some(winner) = shared.exit.winner() {
            return Some(winner);
        }
        if !shared.is_quiescent() || shared.bridge.has_queued_frames() {
            trace!("Idle signal superseded by new work");
            phase = Phase::Running;
            continue;
        }

        let epoch = shared.activity.epoch();
        phase = match phase {
            Phase::BeforeExit { epoch: seen } if seen == epoch => {
                return natural_exit(&shared);
            }
            Phase::Running | Phase::BeforeExit { .. } => {
                shared.lifecycle.emit_before_exit();
                Phase::BeforeExit {
                    epoch: shared.activity.epoch(),
                }
            }
        };
    }
}

fn natural_exit(shared: &Shared) -> Option<ExitRequest> {
    if shared.monitor.check() {
        return shared.exit.winner();
    }
    let code = shared.lifecycle.exit_code();
    debug!(code, "Main context reached natural exit");
    shared.exit.request_exit(code, ExitOrigin::Natural);
    shared.exit.winner()
}
