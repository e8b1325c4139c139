//! The host surface available to hook code running in the hook context.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use hookbridge_core::{Activity, KeepAlive};

use crate::hooks::definitions::HookError;

/// Channel from the hook context to whoever arbitrates process exit.
pub trait ProcessControl: Send + Sync {
    /// Asks for the whole process to terminate with `code`.
    fn request_exit(&self, code: i32);
}

/// Handle hook modules capture to reach their host context.
///
/// Cloning is cheap; all clones share the same keep-alive accounting.
#[derive(Clone)]
pub struct HookScope {
    control: Arc<dyn ProcessControl>,
    activity: Activity,
}

impl HookScope {
    /// Creates a scope forwarding exits to `control`.
    pub fn new(control: Arc<dyn ProcessControl>, activity: Activity) -> Self {
        Self { control, activity }
    }

    /// Requests process exit with `code`.
    ///
    /// Returns the error the calling hook must propagate: once exit is
    /// requested no result for the current invocation is ever delivered.
    ///
    /// ```ignore
    /// if args.url == "data:exit" {
    ///     return Err(scope.exit(42));
    /// }
    /// ```
    pub fn exit(&self, code: i32) -> HookError {
        debug!(code, "Exit requested from hook context");
        self.control.request_exit(code);
        HookError::ExitRequested
    }

    /// Sleeps for `duration` while keeping the hook context busy.
    pub async fn sleep(&self, duration: Duration) {
        let _timer = self.activity.keep_alive("hook timer");
        tokio::time::sleep(duration).await;
    }

    /// Holds the hook context busy until the guard is dropped.
    pub fn keep_alive(&self, reason: &'static str) -> KeepAlive {
        self.activity.keep_alive(reason)
    }

    /// The hook context's keep-alive counter.
    pub fn activity(&self) -> &Activity {
        &self.activity
    }
}

impl fmt::Debug for HookScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookScope")
            .field("activity", &self.activity)
            .finish()
    }
}
