//! Main-context side of the invocation bridge.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use crossbeam_channel::TryRecvError;
use parking_lot::Mutex;
use tokio::sync::{Notify, mpsc, oneshot};
use tracing::{debug, warn};

use hookbridge_core::types::{
    IdAllocator, InvocationArgs, InvocationId, InvocationKind, InvocationResult, ThrownValue,
};
use hookbridge_core::{Activity, KeepAlive, Parked, parked};

use crate::channel::HostEndpoint;
use crate::error::BridgeError;
use crate::message::serializer::{decode_hook, encode_host};
use crate::message::types::{HookMessage, HostMessage};

/// Outcome of a bridged invocation.
pub type InvocationOutcome = Result<InvocationResult, BridgeError>;

/// What a processed hook → main frame means to the main context.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    /// Hook modules are installed.
    Ready {
        /// Global preload sources.
        preload: Vec<String>,
    },
    /// A hook module's top-level body threw.
    InitFailed {
        /// Module that threw.
        module: String,
        /// The thrown value.
        error: ThrownValue,
    },
    /// An invocation settled and its handle was notified.
    Settled {
        /// The settled id.
        id: InvocationId,
    },
    /// A hook panicked while handling an invocation.
    Fault {
        /// The faulted id.
        id: InvocationId,
        /// The panic, as a thrown error.
        error: ThrownValue,
    },
    /// Hook code requested process exit.
    Exit {
        /// Requested exit code.
        code: i32,
    },
    /// The hook context went idle with invocations unsettled.
    Stalled {
        /// Last id the hook context had received.
        generation: InvocationId,
        /// Whether that is the last id sent, i.e. nothing newer is in flight.
        current: bool,
    },
    /// The hook context broke the protocol.
    ProtocolViolation(BridgeError),
    /// The hook context is gone; every pending handle was rejected.
    ContextLost,
}

struct PendingSlot {
    kind: InvocationKind,
    tx: oneshot::Sender<InvocationOutcome>,
}

struct State {
    pending: HashMap<InvocationId, PendingSlot>,
    init_pending: bool,
    last_sent: InvocationId,
    stalled_at: Option<InvocationId>,
    busy: Option<KeepAlive>,
    lost: bool,
}

struct Inner {
    outbound: mpsc::UnboundedSender<Bytes>,
    inbound: crossbeam_channel::Receiver<Bytes>,
    notify: Arc<Notify>,
    ids: IdAllocator,
    activity: Activity,
    state: Mutex<State>,
}

/// Correlates requests sent to the hook context with their settlements.
///
/// While the hook context has outstanding work and has not reported a
/// stall, the bridge holds a keep-alive on the main context's
/// [`Activity`]. Hook initialization counts as outstanding work under
/// [`InvocationId::INIT`].
#[derive(Clone)]
pub struct InvocationBridge {
    inner: Arc<Inner>,
}

impl InvocationBridge {
    /// Creates the bridge over `endpoint`, accounting busy time on `activity`.
    pub fn new(endpoint: HostEndpoint, activity: Activity) -> Self {
        let bridge = Self {
            inner: Arc::new(Inner {
                outbound: endpoint.outbound,
                inbound: endpoint.inbound,
                notify: endpoint.notify,
                ids: IdAllocator::new(),
                activity,
                state: Mutex::new(State {
                    pending: HashMap::new(),
                    init_pending: true,
                    last_sent: InvocationId::INIT,
                    stalled_at: None,
                    busy: None,
                    lost: false,
                }),
            }),
        };
        bridge.refresh_busy(&mut bridge.inner.state.lock());
        bridge
    }

    /// Sends an invocation without waiting for it.
    pub fn send(&self, args: InvocationArgs) -> Result<PendingHandle, BridgeError> {
        let mut state = self.inner.state.lock();
        if state.lost {
            return Err(BridgeError::ContextLost);
        }

        let id = self.inner.ids.next();
        let kind = args.kind();
        debug!(id = %id, kind = %kind, target = %args.target(), "Sending invocation");

        let frame = encode_host(&HostMessage::invoke(id, args))
            .map_err(|e| BridgeError::Encode(e.to_string()))?;
        self.inner
            .outbound
            .send(frame)
            .map_err(|_| BridgeError::ContextLost)?;

        let (tx, rx) = oneshot::channel();
        state.pending.insert(id, PendingSlot { kind, tx });
        state.last_sent = id;
        self.refresh_busy(&mut state);

        Ok(PendingHandle {
            id,
            kind,
            rx: parked(rx),
        })
    }

    /// Processes the next frame if one is queued.
    pub fn poll_event(&self) -> Option<BridgeEvent> {
        match self.inner.inbound.try_recv() {
            Ok(frame) => Some(self.dispatch(&frame)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => self.disconnect(),
        }
    }

    /// Waits for and processes the next frame.
    ///
    /// Returns `None` once the channel is closed and its loss was reported.
    pub async fn next_event(&self) -> Option<BridgeEvent> {
        loop {
            let notified = self.inner.notify.notified();
            match self.inner.inbound.try_recv() {
                Ok(frame) => return Some(self.dispatch(&frame)),
                Err(TryRecvError::Empty) => notified.await,
                Err(TryRecvError::Disconnected) => return self.disconnect(),
            }
        }
    }

    /// Blocks the calling thread until a frame arrives, then processes it.
    ///
    /// Used while the main context is itself blocked, so nothing else can
    /// drain the channel.
    pub fn recv_blocking(&self) -> Option<BridgeEvent> {
        match self.inner.inbound.recv() {
            Ok(frame) => Some(self.dispatch(&frame)),
            Err(_) => self.disconnect(),
        }
    }

    /// Whether frames are waiting to be processed.
    pub fn has_queued_frames(&self) -> bool {
        !self.inner.inbound.is_empty()
    }

    /// Asks the hook context to stop.
    pub fn shutdown(&self) {
        if let Ok(frame) = encode_host(&HostMessage::Shutdown) {
            let _ = self.inner.outbound.send(frame);
        }
    }

    /// The most recently sent id.
    pub fn last_sent(&self) -> InvocationId {
        self.inner.state.lock().last_sent
    }

    /// Number of invocations awaiting settlement.
    pub fn pending_count(&self) -> usize {
        self.inner.state.lock().pending.len()
    }

    /// Whether the bridge currently keeps the main context alive.
    pub fn is_busy(&self) -> bool {
        self.inner.state.lock().busy.is_some()
    }

    /// Whether the hook context is gone.
    pub fn is_lost(&self) -> bool {
        self.inner.state.lock().lost
    }

    fn dispatch(&self, frame: &[u8]) -> BridgeEvent {
        let msg = match decode_hook(frame) {
            Ok(msg) => msg,
            Err(e) => {
                return BridgeEvent::ProtocolViolation(BridgeError::protocol(format!(
                    "undecodable frame: {e}"
                )));
            }
        };

        match msg {
            HookMessage::Ready { preload } => {
                self.finish_init();
                BridgeEvent::Ready { preload }
            }
            HookMessage::InitFailed { module, error } => {
                self.finish_init();
                BridgeEvent::InitFailed { module, error }
            }
            HookMessage::Response { id, result, error } => {
                let outcome = match (result, error) {
                    (Some(result), None) => Ok(result),
                    (None, Some(error)) => Err(BridgeError::Hook(error)),
                    _ => {
                        return BridgeEvent::ProtocolViolation(BridgeError::protocol(format!(
                            "response {id} must carry exactly one of result and error"
                        )));
                    }
                };
                match self.settle(id, outcome) {
                    Ok(()) => BridgeEvent::Settled { id },
                    Err(e) => BridgeEvent::ProtocolViolation(e),
                }
            }
            HookMessage::Fault { id, error } => {
                let outcome = Err(BridgeError::Fault {
                    error: error.clone(),
                });
                match self.settle(id, outcome) {
                    Ok(()) => BridgeEvent::Fault { id, error },
                    Err(e) => BridgeEvent::ProtocolViolation(e),
                }
            }
            HookMessage::Exit { code } => BridgeEvent::Exit { code },
            HookMessage::Stalled { generation } => {
                let mut state = self.inner.state.lock();
                let current = generation == state.last_sent;
                if current {
                    state.stalled_at = Some(generation);
                    self.refresh_busy(&mut state);
                }
                debug!(generation = %generation, current, "Hook context stalled");
                BridgeEvent::Stalled {
                    generation,
                    current,
                }
            }
        }
    }

    fn finish_init(&self) {
        let mut state = self.inner.state.lock();
        state.init_pending = false;
        self.refresh_busy(&mut state);
    }

    fn settle(&self, id: InvocationId, outcome: InvocationOutcome) -> Result<(), BridgeError> {
        let mut state = self.inner.state.lock();
        match state.pending.remove(&id) {
            Some(slot) => {
                debug!(id = %id, kind = %slot.kind, ok = outcome.is_ok(), "Invocation settled");
                // The receiver may be gone when the awaiting side lost a race.
                let _ = slot.tx.send(outcome);
                self.refresh_busy(&mut state);
                Ok(())
            }
            None if id != InvocationId::INIT && id <= state.last_sent => Err(
                BridgeError::protocol(format!("duplicate settlement for invocation {id}")),
            ),
            None => Err(BridgeError::protocol(format!(
                "settlement for unknown invocation {id}"
            ))),
        }
    }

    fn disconnect(&self) -> Option<BridgeEvent> {
        let mut state = self.inner.state.lock();
        if state.lost {
            return None;
        }
        state.lost = true;
        state.init_pending = false;

        if !state.pending.is_empty() {
            warn!(
                pending = state.pending.len(),
                "Hook context lost with invocations in flight"
            );
        }
        for (_, slot) in state.pending.drain() {
            let _ = slot.tx.send(Err(BridgeError::ContextLost));
        }
        self.refresh_busy(&mut state);
        Some(BridgeEvent::ContextLost)
    }

    fn refresh_busy(&self, state: &mut State) {
        let outstanding = state.init_pending || !state.pending.is_empty();
        let stalled = state.stalled_at == Some(state.last_sent);
        let hold = outstanding && !stalled && !state.lost;

        if hold && state.busy.is_none() {
            state.busy = Some(self.inner.activity.keep_alive("hook context busy"));
        } else if !hold && state.busy.is_some() {
            state.busy = None;
        }
    }
}

impl std::fmt::Debug for InvocationBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("InvocationBridge")
            .field("pending", &state.pending.len())
            .field("last_sent", &state.last_sent)
            .field("busy", &state.busy.is_some())
            .field("lost", &state.lost)
            .finish()
    }
}

/// Future settling with the outcome of one bridged invocation.
#[derive(Debug)]
pub struct PendingHandle {
    id: InvocationId,
    kind: InvocationKind,
    /// The hook context's answer. Waiting on it does not count as the
    /// waiting task being awake; the busy keep-alive covers that.
    rx: Parked<oneshot::Receiver<InvocationOutcome>>,
}

impl PendingHandle {
    /// The correlation id.
    pub fn id(&self) -> InvocationId {
        self.id
    }

    /// The invocation kind.
    pub fn kind(&self) -> InvocationKind {
        self.kind
    }

    /// Takes the outcome if it has already arrived.
    pub fn try_take(&mut self) -> Option<InvocationOutcome> {
        match self.rx.get_mut().try_recv() {
            Ok(outcome) => Some(outcome),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(BridgeError::ContextLost)),
        }
    }
}

impl Future for PendingHandle {
    type Output = InvocationOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(BridgeError::ContextLost)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{HookEndpoint, channel};
    use crate::message::serializer::decode_host;
    use hookbridge_core::types::{LoadArgs, LoadContext, ResolveArgs, ResolveContext};
    use hookbridge_hooks::HookError;

    fn setup() -> (InvocationBridge, HookEndpoint, Activity) {
        let (host, hook) = channel();
        let activity = Activity::new();
        let bridge = InvocationBridge::new(host, activity.clone());
        (bridge, hook, activity)
    }

    fn resolve(specifier: &str) -> InvocationArgs {
        InvocationArgs::Resolve(ResolveArgs::new(specifier, ResolveContext::default()))
    }

    fn ready(bridge: &InvocationBridge, hook: &HookEndpoint) {
        hook.sender.send(&HookMessage::Ready { preload: vec![] });
        assert_eq!(
            bridge.poll_event(),
            Some(BridgeEvent::Ready { preload: vec![] })
        );
    }

    #[tokio::test]
    async fn test_request_frames_reach_hook_side() {
        let (bridge, mut hook, _activity) = setup();
        let handle = bridge.send(resolve("./a.mjs")).unwrap();
        assert_eq!(handle.id(), InvocationId(1));

        let frame = hook.inbound.recv().await.unwrap();
        match decode_host(&frame).unwrap() {
            HostMessage::Resolve { id, args } => {
                assert_eq!(id, InvocationId(1));
                assert_eq!(args.specifier, "./a.mjs");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_responses_match_by_id_in_any_order() {
        let (bridge, hook, _activity) = setup();
        ready(&bridge, &hook);
        let first = bridge.send(resolve("a")).unwrap();
        let second = bridge
            .send(InvocationArgs::Load(LoadArgs::new("b", LoadContext::default())))
            .unwrap();

        hook.sender.send(&HookMessage::fulfilled(
            second.id(),
            InvocationResult::loaded("builtin", None),
        ));
        hook.sender.send(&HookMessage::rejected(
            first.id(),
            HookError::NotFound {
                specifier: "a".to_string(),
            },
        ));

        assert_eq!(
            bridge.next_event().await,
            Some(BridgeEvent::Settled { id: second.id() })
        );
        assert_eq!(
            bridge.next_event().await,
            Some(BridgeEvent::Settled { id: first.id() })
        );

        assert_eq!(second.await.unwrap().format.as_deref(), Some("builtin"));
        assert!(matches!(
            first.await,
            Err(BridgeError::Hook(HookError::NotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_response_is_protocol_violation() {
        let (bridge, hook, _activity) = setup();
        let handle = bridge.send(resolve("a")).unwrap();
        let id = handle.id();
        let response = HookMessage::fulfilled(id, InvocationResult::resolved("node:a"));

        hook.sender.send(&response);
        hook.sender.send(&response);

        assert_eq!(bridge.poll_event(), Some(BridgeEvent::Settled { id }));
        match bridge.poll_event() {
            Some(BridgeEvent::ProtocolViolation(err)) => {
                assert!(err.is_fatal());
                assert!(err.to_string().contains("duplicate"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(handle.await.unwrap().url.as_deref(), Some("node:a"));
    }

    #[tokio::test]
    async fn test_unknown_id_and_bad_frames_are_violations() {
        let (bridge, hook, _activity) = setup();
        hook.sender.send(&HookMessage::fulfilled(
            InvocationId(99),
            InvocationResult::resolved("x:y"),
        ));
        hook.sender.send_frame(Bytes::from_static(b"not json"));
        hook.sender.send(&HookMessage::Response {
            id: InvocationId(1),
            result: None,
            error: None,
        });

        for _ in 0..3 {
            assert!(matches!(
                bridge.poll_event(),
                Some(BridgeEvent::ProtocolViolation(_))
            ));
        }
        assert_eq!(bridge.poll_event(), None);
    }

    #[tokio::test]
    async fn test_disconnect_rejects_every_pending() {
        let (bridge, hook, activity) = setup();
        let a = bridge.send(resolve("a")).unwrap();
        let b = bridge.send(resolve("b")).unwrap();
        assert!(!activity.is_idle());

        drop(hook);
        assert_eq!(bridge.next_event().await, Some(BridgeEvent::ContextLost));
        assert_eq!(bridge.next_event().await, None);

        assert_eq!(a.await, Err(BridgeError::ContextLost));
        assert_eq!(b.await, Err(BridgeError::ContextLost));
        assert!(activity.is_idle());
        assert!(matches!(
            bridge.send(resolve("c")),
            Err(BridgeError::ContextLost)
        ));
    }

    #[tokio::test]
    async fn test_busy_ref_follows_outstanding_work() {
        let (bridge, hook, activity) = setup();
        assert!(bridge.is_busy(), "initialization keeps the context busy");
        ready(&bridge, &hook);
        assert!(activity.is_idle());

        let handle = bridge.send(resolve("a")).unwrap();
        assert_eq!(activity.refs(), 1);

        hook.sender.send(&HookMessage::fulfilled(
            handle.id(),
            InvocationResult::resolved("node:a"),
        ));
        bridge.poll_event();
        assert!(activity.is_idle());
    }

    #[tokio::test]
    async fn test_only_current_stall_releases_busy_ref() {
        let (bridge, hook, activity) = setup();
        ready(&bridge, &hook);
        let first = bridge.send(resolve("never")).unwrap();
        let _second = bridge.send(resolve("later")).unwrap();

        hook.sender.send(&HookMessage::Stalled {
            generation: first.id(),
        });
        assert_eq!(
            bridge.poll_event(),
            Some(BridgeEvent::Stalled {
                generation: first.id(),
                current: false,
            })
        );
        assert!(!activity.is_idle());

        hook.sender.send(&HookMessage::Stalled {
            generation: bridge.last_sent(),
        });
        bridge.poll_event();
        assert!(activity.is_idle());
        assert_eq!(bridge.pending_count(), 2);

        let _third = bridge.send(resolve("again")).unwrap();
        assert!(!activity.is_idle(), "a new request clears the stall");
    }

    #[tokio::test]
    async fn test_fault_settles_with_fault_error() {
        let (bridge, hook, _activity) = setup();
        let handle = bridge.send(resolve("a")).unwrap();
        let error = ThrownValue::error("Error", "boom");
        hook.sender.send(&HookMessage::Fault {
            id: handle.id(),
            error: error.clone(),
        });

        assert_eq!(
            bridge.poll_event(),
            Some(BridgeEvent::Fault {
                id: handle.id(),
                error: error.clone(),
            })
        );
        assert_eq!(handle.await, Err(BridgeError::Fault { error }));
    }

    #[test]
    fn test_recv_blocking_and_try_take() {
        let (bridge, hook, _activity) = setup();
        let mut handle = bridge.send(resolve("a")).unwrap();
        assert!(handle.try_take().is_none());

        let sender = hook.sender.clone();
        let id = handle.id();
        let worker = std::thread::spawn(move || {
            sender.send(&HookMessage::fulfilled(id, InvocationResult::resolved("node:a")));
        });

        assert_eq!(bridge.recv_blocking(), Some(BridgeEvent::Settled { id }));
        worker.join().unwrap();
        assert!(handle.try_take().unwrap().is_ok());
    }
}
