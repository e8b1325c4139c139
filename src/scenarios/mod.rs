//! Built-in scenarios.
//!
//! Each scenario pairs a set of hook modules with an entry point and
//! reproduces one end-to-end behavior of the engine: a hook that never
//! answers, a hook that exits, a thrown value of some type, and so on.

mod exit;
mod hooks_input;
mod lifecycle;
mod loaders;
mod never_settling;
mod throw;

use std::sync::Arc;

use tempfile::TempDir;

use hookbridge_core::AppResult;
use hookbridge_hooks::HookModuleFactory;
use hookbridge_runtime::{Entry, UNCAUGHT_EXIT_CODE, UNSETTLED_EXIT_CODE};

/// Everything one run needs.
pub struct Fixture {
    /// Hook modules in install order.
    pub hooks: Vec<Arc<dyn HookModuleFactory>>,
    /// The entry point, if any.
    pub entry: Option<Entry>,
    /// Scratch directory holding files the entry imports; removed on drop.
    pub workspace: Option<TempDir>,
}

impl Fixture {
    fn new(entry: Entry) -> Self {
        Self {
            hooks: Vec::new(),
            entry: Some(entry),
            workspace: None,
        }
    }

    fn hook(mut self, factory: impl HookModuleFactory + 'static) -> Self {
        self.hooks.push(Arc::new(factory));
        self
    }

    fn in_workspace(mut self, dir: TempDir) -> Self {
        self.workspace = Some(dir);
        self
    }
}

/// A named, runnable scenario.
pub struct Scenario {
    /// Name passed to `hookbridge run`.
    pub name: &'static str,
    /// One-line description.
    pub description: &'static str,
    /// Exit code a correct engine produces.
    pub expected_exit: i32,
    /// Whether invocation tracing is forced on.
    pub trace: bool,
    build: fn() -> AppResult<Fixture>,
}

impl Scenario {
    const fn new(
        name: &'static str,
        description: &'static str,
        expected_exit: i32,
        build: fn() -> AppResult<Fixture>,
    ) -> Self {
        Self {
            name,
            description,
            expected_exit,
            trace: false,
            build,
        }
    }

    const fn traced(mut self) -> Self {
        self.trace = true;
        self
    }

    /// Builds a fresh fixture.
    pub fn fixture(&self) -> AppResult<Fixture> {
        (self.build)()
    }
}

static SCENARIOS: &[Scenario] = &[
    Scenario::new(
        "hooks-input",
        "Trace what resolve and load hooks receive and return",
        0,
        hooks_input::fixture,
    )
    .traced(),
    Scenario::new(
        "never-resolve",
        "Module awaits a resolve that never settles",
        UNSETTLED_EXIT_CODE,
        never_settling::never_resolve,
    ),
    Scenario::new(
        "never-load",
        "Module awaits a load that never settles",
        UNSETTLED_EXIT_CODE,
        never_settling::never_load,
    ),
    Scenario::new(
        "race",
        "Module races never-settling imports against one that settles",
        0,
        never_settling::race,
    ),
    Scenario::new(
        "import-meta-never-resolve",
        "Synchronous resolve that never settles",
        UNSETTLED_EXIT_CODE,
        never_settling::import_meta_never_resolve,
    ),
    Scenario::new(
        "never-resolve-cjs",
        "Script starts a never-settling resolve without awaiting it",
        0,
        never_settling::never_resolve_script,
    ),
    Scenario::new(
        "never-load-cjs",
        "Script starts a never-settling load without awaiting it",
        0,
        never_settling::never_load_script,
    ),
    Scenario::new(
        "race-cjs",
        "Script races never-settling imports in a detached task",
        0,
        never_settling::race_script,
    ),
    Scenario::new(
        "empty",
        "Pass-through hooks and an empty script",
        0,
        lifecycle::empty,
    ),
    Scenario::new(
        "remove-before-exit",
        "Slow hook while an unref'd timer removes before-exit observers",
        0,
        lifecycle::remove_before_exit,
    ),
    Scenario::new(
        "exit-async-hook",
        "Load hook exits with 42",
        42,
        exit::from_async_hook,
    ),
    Scenario::new(
        "exit-sync-hook",
        "Resolve hook exits with 42 during a synchronous resolve",
        42,
        exit::from_sync_hook,
    ),
    Scenario::new(
        "exit-hook-top-level",
        "Hook module exits with 42 while initializing",
        42,
        exit::from_hook_top_level,
    ),
    Scenario::new("throw-error", "Hook module throws an Error", UNCAUGHT_EXIT_CODE, throw::error),
    Scenario::new("throw-null", "Hook module throws null", UNCAUGHT_EXIT_CODE, throw::null),
    Scenario::new(
        "throw-undefined",
        "Hook module throws undefined",
        UNCAUGHT_EXIT_CODE,
        throw::undefined,
    ),
    Scenario::new("throw-boolean", "Hook module throws true", UNCAUGHT_EXIT_CODE, throw::boolean),
    Scenario::new(
        "throw-empty-object",
        "Hook module throws {}",
        UNCAUGHT_EXIT_CODE,
        throw::empty_object,
    ),
    Scenario::new(
        "throw-object",
        "Hook module throws an object with a function, a symbol and undefined",
        UNCAUGHT_EXIT_CODE,
        throw::object,
    ),
    Scenario::new("throw-number", "Hook module throws 1", UNCAUGHT_EXIT_CODE, throw::number),
    Scenario::new("throw-bigint", "Hook module throws 1n", UNCAUGHT_EXIT_CODE, throw::bigint),
    Scenario::new(
        "throw-string",
        "Hook module throws a string",
        UNCAUGHT_EXIT_CODE,
        throw::string,
    ),
    Scenario::new(
        "throw-symbol",
        "Hook module throws a symbol",
        UNCAUGHT_EXIT_CODE,
        throw::symbol,
    ),
    Scenario::new(
        "throw-function",
        "Hook module throws a named function",
        UNCAUGHT_EXIT_CODE,
        throw::function,
    ),
    Scenario::new(
        "throw-sync-hook",
        "Resolve hook panics while the entry imports",
        UNCAUGHT_EXIT_CODE,
        throw::sync_hook,
    ),
];

/// All scenarios in listing order.
pub fn all() -> &'static [Scenario] {
    SCENARIOS
}

/// Looks up a scenario by name.
pub fn find(name: &str) -> Option<&'static Scenario> {
    SCENARIOS.iter().find(|scenario| scenario.name == name)
}
