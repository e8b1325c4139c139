//! Hook context thread body.

use std::cell::Cell;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Once};
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use futures::FutureExt;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use hookbridge_core::{Activity, Watched, Watchlist};
use hookbridge_core::types::{InvocationArgs, InvocationId, ThrownValue};
use hookbridge_hooks::{HookError, HookModuleFactory, HookRegistry, HookScope, ProcessControl};

use crate::channel::{HookEndpoint, HookSender};
use crate::message::serializer::decode_host;
use crate::message::types::{HookMessage, HostMessage};

const NOT_REPORTED: u64 = u64::MAX;

/// Invocations (including initialization) the hook context has started
/// but not finished.
#[derive(Debug)]
struct InFlight {
    tasks: Watchlist,
    generation: AtomicU64,
    reported: AtomicU64,
}

impl InFlight {
    fn new() -> Self {
        Self {
            tasks: Watchlist::new(),
            generation: AtomicU64::new(InvocationId::INIT.get()),
            reported: AtomicU64::new(NOT_REPORTED),
        }
    }

    fn begin<F: Future>(&self, id: InvocationId, work: F) -> Watched<F> {
        self.generation.store(id.get(), Ordering::SeqCst);
        self.reported.store(NOT_REPORTED, Ordering::SeqCst);
        self.tasks.watch(work)
    }

    fn end(&self) {
        self.reported.store(NOT_REPORTED, Ordering::SeqCst);
    }

    /// Called right before the hook runtime parks: nothing is runnable.
    /// With work unfinished, no ref'd source left and no waker of that
    /// work held by a timer, channel or blocking task, nothing can finish
    /// it, so the main context is told once per generation.
    fn report_if_stalled(&self, activity: &Activity, sender: &HookSender) {
        if !activity.is_idle() || self.tasks.pending() == 0 || !self.tasks.is_dormant() {
            return;
        }
        let generation = self.generation.load(Ordering::SeqCst);
        if self.reported.swap(generation, Ordering::SeqCst) == generation {
            return;
        }
        sender.send(&HookMessage::Stalled {
            generation: InvocationId(generation),
        });
    }
}

/// Forwards hook-originated exit requests to the main context.
struct ExitForwarder {
    sender: HookSender,
}

impl ProcessControl for ExitForwarder {
    fn request_exit(&self, code: i32) {
        self.sender.send(&HookMessage::Exit { code });
    }
}

enum InitOutcome {
    Ready,
    Exited,
    Threw { module: String, error: ThrownValue },
}

thread_local! {
    static HOOK_CONTEXT: Cell<bool> = const { Cell::new(false) };
}

/// Keeps hook panics off stderr.
///
/// Every hook runs behind `catch_unwind` and its panic is reported to the
/// main context as a thrown value, which the formatter prints. Panics on
/// other threads still reach the previous hook.
fn silence_hook_panics() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            if HOOK_CONTEXT.with(Cell::get) {
                debug!(panic = %info, "Hook panicked");
                return;
            }
            previous(info);
        }));
    });
}

pub(super) fn run(factories: Vec<Arc<dyn HookModuleFactory>>, endpoint: HookEndpoint) {
    silence_hook_panics();
    HOOK_CONTEXT.with(|flag| flag.set(true));

    let HookEndpoint { inbound, sender } = endpoint;
    let activity = Activity::new();
    let in_flight = Arc::new(InFlight::new());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .on_thread_park({
            let activity = activity.clone();
            let in_flight = Arc::clone(&in_flight);
            let sender = sender.clone();
            move || in_flight.report_if_stalled(&activity, &sender)
        })
        .build();

    let runtime = match runtime {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to build hook context runtime");
            return;
        }
    };

    runtime.block_on(serve(factories, inbound, sender, activity, in_flight));
    debug!("Hook context stopped");
}

async fn serve(
    factories: Vec<Arc<dyn HookModuleFactory>>,
    mut inbound: mpsc::UnboundedReceiver<Bytes>,
    sender: HookSender,
    activity: Activity,
    in_flight: Arc<InFlight>,
) {
    let registry = Arc::new(HookRegistry::new());
    let control = Arc::new(ExitForwarder {
        sender: sender.clone(),
    });
    let scope = HookScope::new(control, activity);

    // A module body may never finish, so shutdown is honored meanwhile.
    let mut init = in_flight.begin(
        InvocationId::INIT,
        initialize(&factories, &registry, &scope),
    );
    let mut backlog = Vec::new();
    let outcome = loop {
        tokio::select! {
            outcome = &mut init => break outcome,
            frame = inbound.recv() => match frame {
                Some(frame) => match decode_host(&frame) {
                    Ok(HostMessage::Shutdown) => {
                        debug!("Shutdown during hook initialization");
                        return;
                    }
                    _ => backlog.push(frame),
                },
                None => return,
            },
        }
    };
    in_flight.end();

    match outcome {
        InitOutcome::Ready => {
            let preload = registry.global_preload().await;
            debug!(modules = factories.len(), "Hook context ready");
            sender.send(&HookMessage::Ready { preload });
        }
        InitOutcome::Exited => debug!("Hook module requested exit during evaluation"),
        InitOutcome::Threw { module, error } => {
            debug!(module = %module, kind = error.kind_name(), "Hook module threw during evaluation");
            sender.send(&HookMessage::InitFailed { module, error });
        }
    }

    for frame in backlog {
        if !dispatch(&frame, &registry, &sender, &in_flight) {
            return;
        }
    }
    while let Some(frame) = inbound.recv().await {
        if !dispatch(&frame, &registry, &sender, &in_flight) {
            break;
        }
    }
}

/// Starts handling one request frame. Returns `false` on shutdown.
fn dispatch(
    frame: &[u8],
    registry: &Arc<HookRegistry>,
    sender: &HookSender,
    in_flight: &Arc<InFlight>,
) -> bool {
    let (id, args) = match decode_host(frame) {
        Ok(HostMessage::Shutdown) => return false,
        Ok(HostMessage::Resolve { id, args }) => (id, InvocationArgs::Resolve(args)),
        Ok(HostMessage::Load { id, args }) => (id, InvocationArgs::Load(args)),
        Err(e) => {
            warn!(error = %e, "Dropping undecodable request frame");
            return true;
        }
    };

    let registry = Arc::clone(registry);
    let invocation = in_flight.begin(id, async move { registry.invoke(args).await });
    let sender = sender.clone();
    let in_flight = Arc::clone(in_flight);

    tokio::spawn(async move {
        let outcome = AssertUnwindSafe(invocation).catch_unwind().await;
        in_flight.end();

        let reply = match outcome {
            Ok(Ok(result)) => HookMessage::fulfilled(id, result),
            Ok(Err(HookError::ExitRequested)) => {
                debug!(id = %id, "Invocation ended by exit request");
                return;
            }
            Ok(Err(error)) => HookMessage::rejected(id, error),
            Err(panic) => HookMessage::Fault {
                id,
                error: ThrownValue::from_panic(panic),
            },
        };
        sender.send(&reply);
    });
    true
}

async fn initialize(
    factories: &[Arc<dyn HookModuleFactory>],
    registry: &HookRegistry,
    scope: &HookScope,
) -> InitOutcome {
    for factory in factories {
        let module = factory.id().to_string();
        let evaluated = AssertUnwindSafe(factory.instantiate(scope.clone()))
            .catch_unwind()
            .await;

        let error = match evaluated {
            Ok(Ok(hooks)) => {
                registry.register(&module, hooks).await;
                continue;
            }
            Ok(Err(HookError::ExitRequested)) => return InitOutcome::Exited,
            Ok(Err(HookError::Thrown { value })) => value,
            Ok(Err(other)) => ThrownValue::error("Error", other.to_string()),
            Err(panic) => ThrownValue::from_panic(panic),
        };
        return InitOutcome::Threw { module, error };
    }
    InitOutcome::Ready
}
