//! Run a built-in scenario.

use std::sync::Arc;

use clap::Args;
use tracing::info;

use hookbridge_core::config::EngineConfig;
use hookbridge_core::error::AppError;
use hookbridge_runtime::{ReturnTerminator, Runtime};

use crate::scenarios;

/// Arguments for the run command
#[derive(Debug, Args)]
pub struct RunArgs {
    /// Scenario name, see `hookbridge list`
    pub scenario: String,

    /// Print one JSON line per completed invocation
    #[arg(long)]
    pub trace: bool,
}

/// Execute the run command
pub fn execute(args: &RunArgs, config: EngineConfig) -> Result<i32, AppError> {
    let scenario = scenarios::find(&args.scenario)
        .ok_or_else(|| AppError::not_found(format!("Unknown scenario '{}'", args.scenario)))?;

    let fixture = scenario.fixture()?;
    let trace = args.trace || scenario.trace || config.trace.invocations;
    info!(scenario = scenario.name, trace, "Running scenario");

    // Return instead of exiting in place so the fixture's scratch files are
    // removed; the caller exits with the returned code.
    let mut builder = Runtime::builder(config)
        .hooks(fixture.hooks)
        .terminator(Arc::new(ReturnTerminator))
        .trace(trace);
    if let Some(entry) = fixture.entry {
        builder = builder.entry(entry);
    }

    let request = builder.build().run()?;
    drop(fixture.workspace);
    info!(code = request.code, origin = %request.origin, "Scenario finished");
    Ok(request.code)
}
