//! Waker liveness.
//!
//! A task that returned `Pending` runs again only if something still holds
//! its waker. [`Watched`] polls a future with a waker whose clones can be
//! counted, so the matching [`Liveness`] tells a task waiting on a timer, a
//! channel or the blocking pool apart from one nothing will ever wake.
//!
//! Waits on the other execution context go through [`Parked`]. Its waker
//! reaches the task without counting as a clone, so such a wait looks
//! dormant and the bridge's own keep-alive decides whether it is stuck.
//!
//! Use one [`Watched`] per task; nesting them makes the outer task look
//! permanently awake.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll, Wake, Waker};

use parking_lot::Mutex;

tokio::task_local! {
    static CURRENT: Weak<Relay>;
}

struct Relay {
    /// Set by a wake, cleared right before each poll.
    woken: AtomicBool,
    finished: AtomicBool,
    /// The waker of the task that owns the [`Watched`] future.
    target: Mutex<Option<Waker>>,
}

impl Relay {
    fn notify(&self) {
        self.woken.store(true, Ordering::SeqCst);
        let target = self.target.lock().clone();
        if let Some(waker) = target {
            waker.wake();
        }
    }
}

impl Wake for Relay {
    fn wake(self: Arc<Self>) {
        self.notify();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.notify();
    }
}

/// Wraps `future` so its liveness can be observed.
pub fn watch<F: Future>(future: F) -> (Watched<F>, Liveness) {
    let relay = Arc::new(Relay {
        // Not polled yet, so it is runnable.
        woken: AtomicBool::new(true),
        finished: AtomicBool::new(false),
        target: Mutex::new(None),
    });
    let liveness = Liveness {
        relay: Arc::downgrade(&relay),
    };
    let watched = Watched {
        future: Box::pin(future),
        relay,
    };
    (watched, liveness)
}

/// A future polled through a countable waker. See [`watch`].
pub struct Watched<F> {
    future: Pin<Box<F>>,
    relay: Arc<Relay>,
}

impl<F: Future> Future for Watched<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<F::Output> {
        let this = self.get_mut();
        {
            let mut target = this.relay.target.lock();
            if !target.as_ref().is_some_and(|w| w.will_wake(cx.waker())) {
                *target = Some(cx.waker().clone());
            }
        }
        this.relay.woken.store(false, Ordering::SeqCst);

        let waker = Waker::from(Arc::clone(&this.relay));
        let mut watched_cx = Context::from_waker(&waker);
        let future = this.future.as_mut();
        let poll = CURRENT.sync_scope(Arc::downgrade(&this.relay), || {
            future.poll(&mut watched_cx)
        });
        if poll.is_ready() {
            this.relay.finished.store(true, Ordering::SeqCst);
        }
        poll
    }
}

impl<F> Drop for Watched<F> {
    fn drop(&mut self) {
        self.relay.finished.store(true, Ordering::SeqCst);
    }
}

impl<F> fmt::Debug for Watched<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watched")
            .field("finished", &self.relay.finished.load(Ordering::SeqCst))
            .finish()
    }
}

/// Observer side of a [`Watched`] future.
#[derive(Clone)]
pub struct Liveness {
    relay: Weak<Relay>,
}

impl Liveness {
    /// Whether the future completed or was dropped.
    pub fn is_finished(&self) -> bool {
        self.relay
            .upgrade()
            .is_none_or(|relay| relay.finished.load(Ordering::SeqCst))
    }

    /// Whether nothing can ever poll the future again: it is pending, was
    /// not woken since its last poll, and no clone of its waker survives
    /// outside [`Parked`] waits.
    ///
    /// A finished future counts as dormant. Only meaningful while the
    /// owning runtime is between polls.
    pub fn is_dormant(&self) -> bool {
        let Some(relay) = self.relay.upgrade() else {
            return true;
        };
        if relay.finished.load(Ordering::SeqCst) {
            return true;
        }
        // One count is this upgrade, one is the `Watched` future itself.
        // Read before `woken`: a wake sets the flag before it drops its clone.
        let wakers = Arc::strong_count(&relay).saturating_sub(2);
        wakers == 0 && !relay.woken.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for Liveness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Liveness")
            .field("finished", &self.is_finished())
            .field("dormant", &self.is_dormant())
            .finish()
    }
}

/// The set of watched tasks of one execution context.
#[derive(Default)]
pub struct Watchlist {
    tasks: Mutex<Vec<Liveness>>,
}

impl Watchlist {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps `future` and adds it to the list until it finishes.
    pub fn watch<F: Future>(&self, future: F) -> Watched<F> {
        let (watched, liveness) = watch(future);
        self.tasks.lock().push(liveness);
        watched
    }

    /// Number of unfinished tasks.
    pub fn pending(&self) -> usize {
        let mut tasks = self.tasks.lock();
        tasks.retain(|task| !task.is_finished());
        tasks.len()
    }

    /// Whether every unfinished task is dormant. True when none is left.
    pub fn is_dormant(&self) -> bool {
        let mut tasks = self.tasks.lock();
        tasks.retain(|task| !task.is_finished());
        tasks.iter().all(Liveness::is_dormant)
    }
}

impl fmt::Debug for Watchlist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watchlist")
            .field("tasks", &self.tasks.lock().len())
            .finish()
    }
}

#[derive(Clone)]
enum Target {
    Idle,
    Watched(Weak<Relay>),
    Plain(Waker),
}

struct Detached {
    target: Mutex<Target>,
}

impl Wake for Detached {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        let target = self.target.lock().clone();
        match target {
            Target::Watched(relay) => {
                if let Some(relay) = relay.upgrade() {
                    relay.notify();
                }
            }
            Target::Plain(waker) => waker.wake(),
            Target::Idle => {}
        }
    }
}

/// Marks `inner` as a wait on the other execution context.
pub fn parked<F>(inner: F) -> Parked<F> {
    Parked {
        inner,
        detached: Arc::new(Detached {
            target: Mutex::new(Target::Idle),
        }),
    }
}

/// A wait whose waker does not keep a watched task alive. See [`parked`].
pub struct Parked<F> {
    inner: F,
    detached: Arc<Detached>,
}

impl<F> Parked<F> {
    /// The wrapped future.
    pub fn get_ref(&self) -> &F {
        &self.inner
    }

    /// The wrapped future, mutably.
    pub fn get_mut(&mut self) -> &mut F {
        &mut self.inner
    }

    /// Unwraps the future.
    pub fn into_inner(self) -> F {
        self.inner
    }
}

impl<F: Future + Unpin> Future for Parked<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<F::Output> {
        let this = self.get_mut();
        let target = CURRENT
            .try_with(Weak::clone)
            .map(Target::Watched)
            .unwrap_or_else(|_| Target::Plain(cx.waker().clone()));
        *this.detached.target.lock() = target;

        let waker = Waker::from(Arc::clone(&this.detached));
        Pin::new(&mut this.inner).poll(&mut Context::from_waker(&waker))
    }
}

impl<F: fmt::Debug> fmt::Debug for Parked<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Parked").field(&self.inner).finish()
    }
}
