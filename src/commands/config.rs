//! Configuration management CLI commands.

use clap::{Args, Subcommand};

use hookbridge_core::config::EngineConfig;
use hookbridge_core::error::AppError;

const DEFAULT_CONFIG: &str = include_str!("../../config/default.toml");

/// Arguments for config commands
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration as JSON
    Show,
    /// Validate the configuration file
    Validate,
    /// Write a default configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "hookbridge.toml")]
        output: String,
    },
}

/// Execute config commands
pub fn execute(
    args: &ConfigArgs,
    config: EngineConfig,
    config_path: Option<&str>,
) -> Result<(), AppError> {
    match &args.command {
        ConfigCommand::Show => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigCommand::Validate => {
            // Loading already succeeded, so only the values are left to check.
            if config.output.buffer_capacity == 0 {
                return Err(AppError::configuration(
                    "output.buffer_capacity must be greater than zero",
                ));
            }
            println!(
                "Configuration '{}' is valid",
                config_path.unwrap_or("<defaults>")
            );
            println!("  Hook thread: {}", config.bridge.hook_thread_name);
            println!("  Log level: {}", config.logging.level);
            println!("  Trace invocations: {}", config.trace.invocations);
        }
        ConfigCommand::Generate { output } => {
            if let Some(parent) = std::path::Path::new(output).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            std::fs::write(output, DEFAULT_CONFIG)?;
            println!("Default config written to '{output}'");
        }
    }
    Ok(())
}
