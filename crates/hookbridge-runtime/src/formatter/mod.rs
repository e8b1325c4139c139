//! Uncaught thrown-value reporting.
//!
//! When an entry body or a synchronous hook throws and nothing catches it,
//! the value is rendered to stderr and the process exits with
//! [`UNCAUGHT_EXIT_CODE`], unless another exit was already claimed.

pub mod inspect;

use std::sync::Arc;

use tracing::debug;

use hookbridge_core::types::ThrownValue;

use crate::exit::{ExitClaim, ExitCoordinator, ExitOrigin, UNCAUGHT_EXIT_CODE};
use crate::output::{OutputSink, Stream};

pub use inspect::{CompactInspector, Inspect, js_number};

/// Top-level text of an uncaught value, or `None` when it prints nothing.
///
/// Errors print their stack (or `name: message` without one), primitives
/// their literal text with strings unquoted, and objects and functions
/// their inspected form. Symbols print nothing.
pub fn render(value: &ThrownValue, inspector: &dyn Inspect) -> Option<String> {
    let text = match value {
        ThrownValue::Error {
            name,
            message,
            stack,
        } => match stack {
            Some(stack) => stack.clone(),
            None if message.is_empty() => name.clone(),
            None => format!("{name}: {message}"),
        },
        ThrownValue::Null => "null".to_string(),
        ThrownValue::Undefined => "undefined".to_string(),
        ThrownValue::Boolean { value } => value.to_string(),
        ThrownValue::Number { value } => js_number(*value),
        ThrownValue::BigInt { digits } => digits.clone(),
        ThrownValue::String { value } => value.clone(),
        ThrownValue::Object { .. } | ThrownValue::Function { .. } => inspector.inspect(value),
        ThrownValue::Symbol { .. } => return None,
    };
    Some(text)
}

/// Reports uncaught thrown values and claims the failure exit.
#[derive(Clone)]
pub struct Formatter {
    exit: Arc<ExitCoordinator>,
    output: OutputSink,
    inspector: Arc<dyn Inspect>,
}

impl Formatter {
    /// Creates a formatter writing to `output`.
    pub fn new(exit: Arc<ExitCoordinator>, output: OutputSink) -> Self {
        Self::with_inspector(exit, output, Arc::new(CompactInspector::default()))
    }

    /// Creates a formatter using a custom inspector for objects and functions.
    pub fn with_inspector(
        exit: Arc<ExitCoordinator>,
        output: OutputSink,
        inspector: Arc<dyn Inspect>,
    ) -> Self {
        Self {
            exit,
            output,
            inspector,
        }
    }

    /// Renders `value` to stderr and requests exit 1.
    ///
    /// `origin` names the module the value escaped from; it is printed on
    /// its own line above the rendering. Nothing is written when an exit
    /// was already claimed.
    pub fn report(&self, value: &ThrownValue, origin: Option<&str>) -> ExitClaim {
        if let Some(winner) = self.exit.winner() {
            debug!(kind = value.kind_name(), code = winner.code, "Uncaught value ignored after exit");
            return ExitClaim::AlreadyClaimed(winner);
        }

        debug!(kind = value.kind_name(), origin, "Reporting uncaught value");
        if let Some(text) = render(value, self.inspector.as_ref()) {
            let report = match origin {
                Some(origin) => format!("{origin}\n\n{text}\n"),
                None => format!("{text}\n"),
            };
            self.output.write(Stream::Stderr, report.as_bytes());
        }
        self.exit.request_exit(UNCAUGHT_EXIT_CODE, ExitOrigin::Formatter)
    }
}

impl std::fmt::Debug for Formatter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Formatter").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    use crate::exit::{ExitRequest, ReturnTerminator};
    use crate::output::Captured;

    fn formatter() -> (Formatter, Arc<ExitCoordinator>, Arc<Mutex<Captured>>) {
        let (output, captured) = OutputSink::capture(1024);
        let exit = Arc::new(ExitCoordinator::new(
            output.clone(),
            Arc::new(ReturnTerminator),
        ));
        (Formatter::new(Arc::clone(&exit), output), exit, captured)
    }

    fn rendered(value: ThrownValue) -> Option<String> {
        render(&value, &CompactInspector::default())
    }

    #[test]
    fn test_literal_renderings() {
        assert_eq!(rendered(ThrownValue::Null).as_deref(), Some("null"));
        assert_eq!(rendered(ThrownValue::Undefined).as_deref(), Some("undefined"));
        assert_eq!(rendered(ThrownValue::boolean(true)).as_deref(), Some("true"));
        assert_eq!(rendered(ThrownValue::number(1.0)).as_deref(), Some("1"));
        assert_eq!(rendered(ThrownValue::bigint(1)).as_deref(), Some("1"));
        assert_eq!(
            rendered(ThrownValue::string("literal string")).as_deref(),
            Some("literal string")
        );
        assert_eq!(
            rendered(ThrownValue::object(Vec::<(String, _)>::new())).as_deref(),
            Some("{}")
        );
        assert_eq!(
            rendered(ThrownValue::function("fn")).as_deref(),
            Some("[Function: fn]")
        );
        assert_eq!(rendered(ThrownValue::symbol("symbol")), None);
    }

    #[test]
    fn test_error_prefers_stack() {
        let value = ThrownValue::error_at("error message", "file:///app/throw-error.mjs:1:7");
        assert_eq!(
            rendered(value).as_deref(),
            Some("Error: error message\n    at file:///app/throw-error.mjs:1:7")
        );
        assert_eq!(
            rendered(ThrownValue::error("TypeError", "bad")).as_deref(),
            Some("TypeError: bad")
        );
    }

    #[test]
    fn test_report_writes_origin_and_exits_1() {
        let (formatter, exit, captured) = formatter();
        let claim = formatter.report(&ThrownValue::Null, Some("data:text/javascript,throw null"));

        assert_eq!(claim, ExitClaim::Granted);
        assert_eq!(
            exit.winner(),
            Some(ExitRequest {
                code: UNCAUGHT_EXIT_CODE,
                origin: ExitOrigin::Formatter,
            })
        );
        assert_eq!(
            captured.lock().stderr_text(),
            "data:text/javascript,throw null\n\nnull\n"
        );
    }

    #[test]
    fn test_symbol_is_silent_but_still_exits() {
        let (formatter, exit, captured) = formatter();
        formatter.report(&ThrownValue::symbol("symbol"), Some("entry"));
        assert_eq!(exit.winner().map(|w| w.code), Some(UNCAUGHT_EXIT_CODE));
        assert!(captured.lock().stderr.is_empty());
    }

    #[test]
    fn test_report_after_exit_is_suppressed() {
        let (formatter, exit, captured) = formatter();
        exit.request_exit(42, ExitOrigin::HookContext);

        let claim = formatter.report(&ThrownValue::string("late"), None);
        assert!(matches!(claim, ExitClaim::AlreadyClaimed(w) if w.code == 42));
        assert!(captured.lock().stderr.is_empty());
    }
}
