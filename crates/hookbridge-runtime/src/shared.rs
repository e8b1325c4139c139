//! State shared by every task of the main context, and the handling of
//! bridge events.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use hookbridge_bridge::{BridgeEvent, InvocationBridge};
use hookbridge_core::{Activity, Watchlist};
use hookbridge_core::types::InvocationResult;

use crate::exit::{ExitCoordinator, ExitOrigin, PROTOCOL_EXIT_CODE};
use crate::formatter::Formatter;
use crate::lifecycle::Lifecycle;
use crate::monitor::Monitor;
use crate::output::OutputSink;
use crate::scope::ModuleRecord;

/// How hook initialization ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InitStatus {
    Ready,
    Failed,
    Exited,
    Lost,
}

pub(crate) struct Shared {
    pub(crate) activity: Activity,
    /// The entry task and everything spawned through a scope.
    pub(crate) tasks: Watchlist,
    pub(crate) bridge: InvocationBridge,
    pub(crate) exit: Arc<ExitCoordinator>,
    pub(crate) monitor: Monitor,
    pub(crate) formatter: Formatter,
    pub(crate) output: OutputSink,
    pub(crate) lifecycle: Lifecycle,
    pub(crate) trace: bool,
    pub(crate) modules: Mutex<HashMap<String, ModuleRecord>>,
    pub(crate) preload: Mutex<Vec<String>>,
    pub(crate) init: Mutex<Option<oneshot::Sender<InitStatus>>>,
}

impl Shared {
    /// Whether the main context has nothing left that could run: no ref'd
    /// source and no task a timer, channel or blocking job could wake.
    pub(crate) fn is_quiescent(&self) -> bool {
        self.activity.is_idle() && self.tasks.is_dormant()
    }

    /// Applies one bridge event to the main context.
    pub(crate) fn handle_event(&self, event: BridgeEvent) {
        match event {
            BridgeEvent::Ready { preload } => {
                debug!(preload = preload.len(), "Hooks ready");
                *self.preload.lock() = preload;
                self.finish_init(InitStatus::Ready);
            }
            BridgeEvent::InitFailed { module, error } => {
                self.finish_init(InitStatus::Failed);
                self.formatter.report(&error, Some(&module));
            }
            BridgeEvent::Fault { id, error } => {
                debug!(id = %id, "Hook threw outside any catch boundary");
                self.formatter.report(&error, None);
            }
            BridgeEvent::Exit { code } => {
                self.exit.request_exit(code, ExitOrigin::HookContext);
                self.finish_init(InitStatus::Exited);
            }
            BridgeEvent::ProtocolViolation(err) => {
                warn!(error = %err, "Hook context broke the bridge protocol");
                if !self.exit.is_claimed() {
                    self.output.eprint(&format!("hookbridge: {err}"));
                }
                self.exit.request_exit(PROTOCOL_EXIT_CODE, ExitOrigin::Fault);
            }
            BridgeEvent::ContextLost => {
                warn!("Hook context lost");
                self.finish_init(InitStatus::Lost);
            }
            BridgeEvent::Settled { .. } | BridgeEvent::Stalled { .. } => {}
        }
    }

    /// Prints the trace line of a completed invocation when tracing is on.
    pub(crate) fn trace_result(&self, result: &InvocationResult) {
        if !self.trace {
            return;
        }
        match result.trace_line() {
            Ok(line) => self.output.print(&line),
            Err(e) => warn!(error = %e, "Failed to encode trace line"),
        }
    }

    fn finish_init(&self, status: InitStatus) {
        if let Some(tx) = self.init.lock().take() {
            let _ = tx.send(status);
        }
    }
}

/// Drains bridge events until the channel closes or exit is claimed.
pub(crate) async fn pump(shared: Arc<Shared>) {
    while let Some(event) = shared.bridge.next_event().await {
        shared.handle_event(event);
        if shared.exit.is_claimed() {
            break;
        }
    }
    debug!("Bridge pump stopped");
}
