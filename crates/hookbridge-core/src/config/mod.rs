//! Engine configuration schemas.
//!
//! All configuration structs are deserialized via the `config` crate from
//! an optional TOML file overlaid with `HOOKBRIDGE__*` environment
//! variables. Every field carries a serde default so an empty source
//! yields a working configuration.

pub mod bridge;
pub mod logging;
pub mod monitor;
pub mod output;
pub mod trace;

use serde::{Deserialize, Serialize};

pub use self::bridge::BridgeConfig;
pub use self::logging::LoggingConfig;
pub use self::monitor::MonitorConfig;
pub use self::output::OutputConfig;
pub use self::trace::TraceConfig;

use crate::error::AppError;

/// Root engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Invocation bridge and hook context settings.
    #[serde(default)]
    pub bridge: BridgeConfig,
    /// Never-settling monitor settings.
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// Buffered output settings.
    #[serde(default)]
    pub output: OutputConfig,
    /// Diagnostic invocation tracing.
    #[serde(default)]
    pub trace: TraceConfig,
}

impl EngineConfig {
    /// Load configuration from an optional TOML file and the environment.
    ///
    /// Environment variables are prefixed with `HOOKBRIDGE` and use `__` as
    /// the section separator, e.g. `HOOKBRIDGE__TRACE__INVOCATIONS=true`.
    pub fn load(path: Option<&str>) -> Result<Self, AppError> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix("HOOKBRIDGE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.output.buffer_capacity, 8192);
        assert!(!config.trace.invocations);
        assert!(config.monitor.log_pending_on_exit);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[trace]\ninvocations = true\n\n[output]\nbuffer_capacity = 16").unwrap();

        let config = EngineConfig::load(file.path().to_str()).unwrap();
        assert!(config.trace.invocations);
        assert_eq!(config.output.buffer_capacity, 16);
        assert_eq!(config.bridge.hook_thread_name, "hookbridge-hooks");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = EngineConfig::load(Some("/nonexistent/hookbridge.toml")).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Configuration);
    }
}
