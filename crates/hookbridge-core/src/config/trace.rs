//! Diagnostic invocation tracing configuration.

use serde::{Deserialize, Serialize};

/// Diagnostic tracing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceConfig {
    /// Emit one JSON line on stdout per completed invocation.
    #[serde(default)]
    pub invocations: bool,
}
