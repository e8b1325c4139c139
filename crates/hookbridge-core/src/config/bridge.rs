//! Invocation bridge configuration.

use serde::{Deserialize, Serialize};

/// Settings for the hook execution context and its channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Name given to the hook context thread.
    #[serde(default = "default_thread_name")]
    pub hook_thread_name: String,
    /// Stack size of the hook context thread, in KiB.
    #[serde(default = "default_stack_size")]
    pub hook_stack_size_kb: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            hook_thread_name: default_thread_name(),
            hook_stack_size_kb: default_stack_size(),
        }
    }
}

fn default_thread_name() -> String {
    "hookbridge-hooks".to_string()
}

fn default_stack_size() -> usize {
    2048
}
