//! Buffered output configuration.

use serde::{Deserialize, Serialize};

/// Settings for the buffered stdout/stderr sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Bytes buffered per stream before an intermediate flush.
    #[serde(default = "default_capacity")]
    pub buffer_capacity: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: default_capacity(),
        }
    }
}

fn default_capacity() -> usize {
    8192
}
