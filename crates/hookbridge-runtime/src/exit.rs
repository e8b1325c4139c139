//! Exit coordination.
//!
//! Every way the process can end funnels through
//! [`ExitCoordinator::request_exit`]. The first request takes a
//! write-once token; its caller flushes output, signals shutdown and hands
//! the code to the [`Terminator`]. Every later request is a no-op.

use std::fmt;
use std::sync::{Arc, OnceLock};

use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

use crate::output::OutputSink;

/// Exit code used when the monitor finds a never-settling invocation.
pub const UNSETTLED_EXIT_CODE: i32 = 13;

/// Exit code used for an uncaught thrown value.
pub const UNCAUGHT_EXIT_CODE: i32 = 1;

/// Exit code used when the hook context breaks the bridge protocol.
pub const PROTOCOL_EXIT_CODE: i32 = 70;

/// Where an exit request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitOrigin {
    /// Application code called `exit`.
    Application,
    /// Hook code called `exit`.
    HookContext,
    /// The never-settling monitor.
    Monitor,
    /// An uncaught thrown value was reported.
    Formatter,
    /// The main context ran out of work.
    Natural,
    /// The engine hit an unrecoverable fault.
    Fault,
}

impl fmt::Display for ExitOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Application => "application",
            Self::HookContext => "hook_context",
            Self::Monitor => "monitor",
            Self::Formatter => "formatter",
            Self::Natural => "natural",
            Self::Fault => "fault",
        };
        write!(f, "{name}")
    }
}

/// A termination request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExitRequest {
    /// Process exit code.
    pub code: i32,
    /// Requesting path.
    pub origin: ExitOrigin,
}

/// Result of [`ExitCoordinator::request_exit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitClaim {
    /// This request won and is being carried out.
    Granted,
    /// An earlier request already won.
    AlreadyClaimed(ExitRequest),
}

/// Performs the actual termination.
pub trait Terminator: Send + Sync {
    /// Ends the process (or whatever the embedder considers the end) with `code`.
    fn terminate(&self, code: i32);
}

/// Terminates the OS process.
#[derive(Debug, Default)]
pub struct ProcessTerminator;

impl Terminator for ProcessTerminator {
    fn terminate(&self, code: i32) {
        std::process::exit(code);
    }
}

/// Leaves termination to the caller of the runtime, which observes the
/// winning request as its return value.
#[derive(Debug, Default)]
pub struct ReturnTerminator;

impl Terminator for ReturnTerminator {
    fn terminate(&self, _code: i32) {}
}

/// First-claim-wins arbiter of process exit.
pub struct ExitCoordinator {
    token: OnceLock<ExitRequest>,
    output: OutputSink,
    terminator: Arc<dyn Terminator>,
    shutdown: watch::Sender<Option<ExitRequest>>,
}

impl ExitCoordinator {
    /// Creates a coordinator flushing `output` and ending through `terminator`.
    pub fn new(output: OutputSink, terminator: Arc<dyn Terminator>) -> Self {
        let (shutdown, _) = watch::channel(None);
        Self {
            token: OnceLock::new(),
            output,
            terminator,
            shutdown,
        }
    }

    /// Requests termination with `code`.
    pub fn request_exit(&self, code: i32, origin: ExitOrigin) -> ExitClaim {
        let request = ExitRequest { code, origin };
        if self.token.set(request).is_err() {
            let winner = self.token.get().copied().unwrap_or(request);
            debug!(
                code,
                origin = %origin,
                winner_code = winner.code,
                winner_origin = %winner.origin,
                "Exit already claimed"
            );
            return ExitClaim::AlreadyClaimed(winner);
        }

        debug!(code, origin = %origin, "Exit claimed");
        self.output.close();
        self.shutdown.send_replace(Some(request));
        self.terminator.terminate(code);
        ExitClaim::Granted
    }

    /// The winning request, if any.
    pub fn winner(&self) -> Option<ExitRequest> {
        self.token.get().copied()
    }

    /// Whether an exit has been claimed.
    pub fn is_claimed(&self) -> bool {
        self.token.get().is_some()
    }

    /// Receiver observing the winning request.
    pub fn subscribe(&self) -> watch::Receiver<Option<ExitRequest>> {
        self.shutdown.subscribe()
    }
}

impl fmt::Debug for ExitCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExitCoordinator")
            .field("winner", &self.winner())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingTerminator {
        calls: AtomicUsize,
    }

    impl Terminator for CountingTerminator {
        fn terminate(&self, _code: i32) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_first_claim_wins() {
        let (output, captured) = OutputSink::capture(1024);
        let terminator = Arc::new(CountingTerminator::default());
        let exit = ExitCoordinator::new(output.clone(), terminator.clone());

        output.print("before exit");
        assert_eq!(exit.request_exit(42, ExitOrigin::HookContext), ExitClaim::Granted);
        assert_eq!(
            exit.request_exit(13, ExitOrigin::Monitor),
            ExitClaim::AlreadyClaimed(ExitRequest {
                code: 42,
                origin: ExitOrigin::HookContext,
            })
        );

        assert_eq!(terminator.calls.load(Ordering::SeqCst), 1);
        assert_eq!(captured.lock().stdout_text(), "before exit\n");
        assert!(output.is_closed());
    }

    #[test]
    fn test_concurrent_claims_have_one_winner() {
        let exit = Arc::new(ExitCoordinator::new(
            OutputSink::capture(16).0,
            Arc::new(ReturnTerminator),
        ));
        let handles: Vec<_> = (0..8)
            .map(|code| {
                let exit = Arc::clone(&exit);
                std::thread::spawn(move || exit.request_exit(code, ExitOrigin::Application))
            })
            .collect();
        let granted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|claim| *claim == ExitClaim::Granted)
            .count();
        assert_eq!(granted, 1);
    }

    #[tokio::test]
    async fn test_subscribers_observe_the_winner() {
        let exit = ExitCoordinator::new(OutputSink::capture(16).0, Arc::new(ReturnTerminator));
        let mut rx = exit.subscribe();
        exit.request_exit(0, ExitOrigin::Natural);
        let winner = *rx.wait_for(Option::is_some).await.unwrap();
        assert_eq!(winner.map(|w| w.code), Some(0));
    }
}
