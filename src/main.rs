//! hookbridge: module-loader hook engine.
//!
//! Parses the command line, loads configuration, installs logging and
//! runs the selected command. The exit code of a `run` is the code the
//! engine's exit coordinator settled on.

mod commands;
mod scenarios;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use hookbridge_core::config::EngineConfig;

use crate::commands::Cli;

fn main() {
    let cli = Cli::parse();

    let config = match EngineConfig::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    match cli.execute(config) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

/// Initialize tracing. Logs go to stderr so stdout stays reserved for
/// program output and invocation traces.
fn init_logging(config: &EngineConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .with_writer(std::io::stderr)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}
