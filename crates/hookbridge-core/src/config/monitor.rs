//! Never-settling monitor configuration.

use serde::{Deserialize, Serialize};

/// Settings for the never-settling monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Log the stuck invocations (at `info`) when forcing termination.
    #[serde(default = "default_true")]
    pub log_pending_on_exit: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            log_pending_on_exit: true,
        }
    }
}

fn default_true() -> bool {
    true
}
