//! CLI command definitions and dispatch.

pub mod config;
pub mod list;
pub mod run;

use clap::{Parser, Subcommand};

use hookbridge_core::config::EngineConfig;
use hookbridge_core::error::AppError;

/// hookbridge command-line interface
#[derive(Debug, Parser)]
#[command(name = "hookbridge", version, about = "Module-loader hook engine", long_about = None)]
pub struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run a built-in scenario through the engine
    Run(run::RunArgs),
    /// List built-in scenarios
    List(list::ListArgs),
    /// Configuration management
    Config(config::ConfigArgs),
}

impl Cli {
    /// Execute the selected command and return the process exit code.
    pub fn execute(&self, config: EngineConfig) -> Result<i32, AppError> {
        match &self.command {
            Commands::Run(args) => run::execute(args, config),
            Commands::List(args) => list::execute(args).map(|()| 0),
            Commands::Config(args) => config::execute(args, config, self.config.as_deref()).map(|()| 0),
        }
    }
}
