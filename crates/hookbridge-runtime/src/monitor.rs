//! Never-settling monitor.
//!
//! A *blocking point* is a construct in the main context whose progress
//! waits on hook results: a suspended top-level evaluation or a
//! synchronous resolve. Invocations are tracked against the blocking point
//! that awaits them. When the main context reaches a natural exit point,
//! [`Monitor::check`] looks for a tracked invocation whose blocking point
//! is still open; if there is one, nothing can ever wake the main context
//! again and the process is ended with [`UNSETTLED_EXIT_CODE`].
//!
//! A blocking point closes as soon as the construct moves on, so a race
//! where one branch settles stands the whole point down even though its
//! sibling invocations stay pending.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::{debug, info};

use hookbridge_core::config::MonitorConfig;
use hookbridge_core::types::{InvocationId, InvocationKind};

use crate::exit::{ExitClaim, ExitCoordinator, ExitOrigin, UNSETTLED_EXIT_CODE};

/// One tracked invocation.
#[derive(Debug, Clone)]
struct Tracked {
    kind: Option<InvocationKind>,
    target: String,
    blocker: Option<(u64, Arc<AtomicBool>)>,
}

impl Tracked {
    fn blocks(&self) -> bool {
        self.blocker
            .as_ref()
            .is_some_and(|(_, open)| open.load(Ordering::SeqCst))
    }
}

/// A pending invocation that keeps an open blocking point from completing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockedInvocation {
    /// Correlation id.
    pub id: InvocationId,
    /// Invocation kind, `None` for hook initialization.
    pub kind: Option<InvocationKind>,
    /// Specifier or URL.
    pub target: String,
    /// Label of the blocking point waiting on it.
    pub blocking_point: &'static str,
}

#[derive(Default)]
struct Registry {
    tracked: BTreeMap<InvocationId, Tracked>,
    labels: BTreeMap<u64, &'static str>,
}

struct MonitorInner {
    config: MonitorConfig,
    exit: Arc<ExitCoordinator>,
    next_point: AtomicU64,
    registry: Mutex<Registry>,
}

/// Tracks pending invocations and forces exit on deadlock.
#[derive(Clone)]
pub struct Monitor {
    inner: Arc<MonitorInner>,
}

impl Monitor {
    /// Creates a monitor ending the process through `exit`.
    pub fn new(config: MonitorConfig, exit: Arc<ExitCoordinator>) -> Self {
        Self {
            inner: Arc::new(MonitorInner {
                config,
                exit,
                next_point: AtomicU64::new(1),
                registry: Mutex::new(Registry::default()),
            }),
        }
    }

    /// Opens a blocking point that stays open until the guard is dropped.
    pub fn open_blocking_point(&self, label: &'static str) -> BlockingPoint {
        let id = self.inner.next_point.fetch_add(1, Ordering::Relaxed);
        self.inner.registry.lock().labels.insert(id, label);
        debug!(point = id, label, "Blocking point opened");
        BlockingPoint {
            id,
            label,
            open: Arc::new(AtomicBool::new(true)),
            monitor: Arc::clone(&self.inner),
        }
    }

    /// Tracks an invocation until the returned guard is dropped.
    ///
    /// Only invocations tracked against an open `blocker` can trigger a
    /// forced exit.
    pub fn track(
        &self,
        id: InvocationId,
        kind: InvocationKind,
        target: impl Into<String>,
        blocker: Option<&BlockingPoint>,
    ) -> TrackedInvocation {
        self.insert(id, Some(kind), target.into(), blocker)
    }

    /// Tracks hook initialization, which runs under [`InvocationId::INIT`].
    pub fn track_initialization(&self, blocker: &BlockingPoint) -> TrackedInvocation {
        self.insert(
            InvocationId::INIT,
            None,
            "hook initialization".to_string(),
            Some(blocker),
        )
    }

    fn insert(
        &self,
        id: InvocationId,
        kind: Option<InvocationKind>,
        target: String,
        blocker: Option<&BlockingPoint>,
    ) -> TrackedInvocation {
        let tracked = Tracked {
            kind,
            target,
            blocker: blocker.map(|point| (point.id, Arc::clone(&point.open))),
        };
        self.inner.registry.lock().tracked.insert(id, tracked);
        TrackedInvocation {
            id,
            monitor: Arc::clone(&self.inner),
        }
    }

    /// Tracked invocations whose blocking point is still open.
    pub fn blocked(&self) -> Vec<BlockedInvocation> {
        let registry = self.inner.registry.lock();
        registry
            .tracked
            .iter()
            .filter(|(_, tracked)| tracked.blocks())
            .map(|(id, tracked)| {
                let point = tracked.blocker.as_ref().map(|(point, _)| *point);
                BlockedInvocation {
                    id: *id,
                    kind: tracked.kind,
                    target: tracked.target.clone(),
                    blocking_point: point
                        .and_then(|p| registry.labels.get(&p).copied())
                        .unwrap_or("unknown"),
                }
            })
            .collect()
    }

    /// Number of tracked invocations, blocking or not.
    pub fn tracked_count(&self) -> usize {
        self.inner.registry.lock().tracked.len()
    }

    /// Runs the quiescence check.
    ///
    /// Must only be called at a natural exit point. Returns `true` if a
    /// blocked invocation was found and exit was requested.
    pub fn check(&self) -> bool {
        let blocked = self.blocked();
        if blocked.is_empty() {
            return false;
        }

        if self.inner.config.log_pending_on_exit {
            for pending in &blocked {
                info!(
                    id = %pending.id,
                    kind = pending.kind.map_or("init", |kind| kind.as_str()),
                    target = %pending.target,
                    blocking_point = pending.blocking_point,
                    "Invocation never settled"
                );
            }
        }

        match self
            .inner
            .exit
            .request_exit(UNSETTLED_EXIT_CODE, ExitOrigin::Monitor)
        {
            ExitClaim::Granted => debug!(blocked = blocked.len(), "Forced exit on deadlock"),
            ExitClaim::AlreadyClaimed(winner) => {
                debug!(code = winner.code, "Forced exit suppressed by earlier claim")
            }
        }
        true
    }
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("tracked", &self.tracked_count())
            .finish()
    }
}

/// An open blocking point. Closes on drop.
pub struct BlockingPoint {
    id: u64,
    label: &'static str,
    open: Arc<AtomicBool>,
    monitor: Arc<MonitorInner>,
}

impl BlockingPoint {
    /// The label given at creation.
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Whether the point is still open.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Closes the point; invocations tracked against it stop blocking.
    pub fn close(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            debug!(point = self.id, label = self.label, "Blocking point closed");
        }
    }
}

impl Drop for BlockingPoint {
    fn drop(&mut self) {
        self.close();
        self.monitor.registry.lock().labels.remove(&self.id);
    }
}

impl std::fmt::Debug for BlockingPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingPoint")
            .field("label", &self.label)
            .field("open", &self.is_open())
            .finish()
    }
}

/// Guard removing an invocation from the monitor once it settles.
pub struct TrackedInvocation {
    id: InvocationId,
    monitor: Arc<MonitorInner>,
}

impl TrackedInvocation {
    /// The tracked id.
    pub fn id(&self) -> InvocationId {
        self.id
    }
}

impl Drop for TrackedInvocation {
    fn drop(&mut self) {
        self.monitor.registry.lock().tracked.remove(&self.id);
    }
}

impl std::fmt::Debug for TrackedInvocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("TrackedInvocation").field(&self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exit::{ExitRequest, ReturnTerminator};
    use crate::output::OutputSink;

    fn monitor() -> (Monitor, Arc<ExitCoordinator>) {
        let exit = Arc::new(ExitCoordinator::new(
            OutputSink::capture(64).0,
            Arc::new(ReturnTerminator),
        ));
        (Monitor::new(MonitorConfig::default(), Arc::clone(&exit)), exit)
    }

    #[test]
    fn test_open_blocker_forces_exit_13() {
        let (monitor, exit) = monitor();
        let point = monitor.open_blocking_point("entry evaluation");
        let _tracked = monitor.track(
            InvocationId(1),
            InvocationKind::Resolve,
            "never-settle-resolve",
            Some(&point),
        );

        assert!(monitor.check());
        assert_eq!(
            exit.winner(),
            Some(ExitRequest {
                code: UNSETTLED_EXIT_CODE,
                origin: ExitOrigin::Monitor,
            })
        );
    }

    #[test]
    fn test_settled_invocation_does_not_block() {
        let (monitor, exit) = monitor();
        let point = monitor.open_blocking_point("entry evaluation");
        let tracked = monitor.track(InvocationId(1), InvocationKind::Load, "x", Some(&point));
        drop(tracked);

        assert!(!monitor.check());
        assert!(!exit.is_claimed());
    }

    #[test]
    fn test_closed_point_stands_down_racing_siblings() {
        let (monitor, exit) = monitor();
        let point = monitor.open_blocking_point("entry evaluation");
        let _stuck = monitor.track(InvocationId(1), InvocationKind::Resolve, "a", Some(&point));
        let winner = monitor.track(InvocationId(2), InvocationKind::Resolve, "b", Some(&point));

        drop(winner);
        point.close();

        assert_eq!(monitor.tracked_count(), 1);
        assert!(monitor.blocked().is_empty());
        assert!(!monitor.check());
        assert!(!exit.is_claimed());
    }

    #[test]
    fn test_unblocked_pendings_never_force_exit() {
        let (monitor, exit) = monitor();
        let _tracked = monitor.track(InvocationId(1), InvocationKind::Resolve, "x", None);
        assert!(!monitor.check());
        assert!(!exit.is_claimed());
    }

    #[test]
    fn test_earlier_claim_wins_over_monitor() {
        let (monitor, exit) = monitor();
        let point = monitor.open_blocking_point("synchronous resolve");
        let _tracked = monitor.track(InvocationId(1), InvocationKind::Resolve, "x", Some(&point));

        exit.request_exit(42, ExitOrigin::HookContext);
        assert!(monitor.check());
        assert_eq!(exit.winner().map(|w| w.code), Some(42));
    }

    #[test]
    fn test_unfinished_initialization_blocks() {
        let (monitor, exit) = monitor();
        let point = monitor.open_blocking_point("hook initialization");
        let tracked = monitor.track_initialization(&point);
        assert_eq!(tracked.id(), InvocationId::INIT);
        assert_eq!(monitor.blocked()[0].kind, None);

        assert!(monitor.check());
        assert_eq!(exit.winner().map(|w| w.code), Some(UNSETTLED_EXIT_CODE));
    }

    #[test]
    fn test_blocked_reports_point_label() {
        let (monitor, _exit) = monitor();
        let point = monitor.open_blocking_point("synchronous resolve");
        let _tracked = monitor.track(InvocationId(3), InvocationKind::Resolve, "exit:", Some(&point));
        let blocked = monitor.blocked();
        assert_eq!(blocked.len(), 1);
        assert_eq!(blocked[0].blocking_point, "synchronous resolve");
        assert_eq!(blocked[0].target, "exit:");
    }
}
