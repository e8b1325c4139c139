//! The hook execution context.
//!
//! Hook modules are evaluated and invoked on a dedicated OS thread running
//! its own current-thread tokio runtime. The thread talks to the main
//! context only through the frames of a [`HookEndpoint`].

mod worker;

use std::sync::Arc;
use std::thread::JoinHandle;

use tracing::{debug, warn};

use hookbridge_core::AppResult;
use hookbridge_core::config::BridgeConfig;
use hookbridge_core::error::AppError;
use hookbridge_hooks::HookModuleFactory;

use crate::channel::HookEndpoint;

/// Thread settings for the hook context.
#[derive(Debug, Clone)]
pub struct HostOptions {
    /// Thread name.
    pub thread_name: String,
    /// Stack size in bytes.
    pub stack_size: usize,
}

impl From<&BridgeConfig> for HostOptions {
    fn from(config: &BridgeConfig) -> Self {
        Self {
            thread_name: config.hook_thread_name.clone(),
            stack_size: config.hook_stack_size_kb * 1024,
        }
    }
}

impl Default for HostOptions {
    fn default() -> Self {
        Self::from(&BridgeConfig::default())
    }
}

/// Handle to the running hook context thread.
#[derive(Debug)]
pub struct HookHost {
    thread: Option<JoinHandle<()>>,
}

impl HookHost {
    /// Starts the hook context and evaluates `factories` there, in order.
    ///
    /// The outcome of evaluation arrives on the main side as a `Ready`,
    /// `InitFailed` or `Exit` message.
    pub fn spawn(
        options: HostOptions,
        factories: Vec<Arc<dyn HookModuleFactory>>,
        endpoint: HookEndpoint,
    ) -> AppResult<Self> {
        debug!(
            thread = %options.thread_name,
            modules = factories.len(),
            "Starting hook context"
        );
        let thread = std::thread::Builder::new()
            .name(options.thread_name)
            .stack_size(options.stack_size)
            .spawn(move || worker::run(factories, endpoint))
            .map_err(|e| AppError::internal(format!("Failed to spawn hook context thread: {e}")))?;

        Ok(Self {
            thread: Some(thread),
        })
    }

    /// Waits for the hook context thread to finish.
    pub fn join(mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Hook context thread panicked");
            }
        }
    }
}
