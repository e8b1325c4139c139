//! Shared test helpers for integration tests.

use std::process::Command;

use anyhow::{Context, Result};

/// Captured result of one binary invocation.
#[derive(Debug)]
pub struct Outcome {
    /// Process exit code.
    pub code: i32,
    /// Everything written to stdout.
    pub stdout: String,
    /// Everything written to stderr.
    pub stderr: String,
}

impl Outcome {
    /// Stdout split into lines.
    pub fn stdout_lines(&self) -> Vec<&str> {
        self.stdout.lines().collect()
    }
}

/// Runs `hookbridge` with `args` and a clean logging environment.
pub fn hookbridge(args: &[&str]) -> Result<Outcome> {
    let mut command = Command::new(env!("CARGO_BIN_EXE_hookbridge"));
    command.args(args).env_remove("RUST_LOG");
    for (key, _) in std::env::vars() {
        if key.starts_with("HOOKBRIDGE") {
            command.env_remove(key);
        }
    }

    let output = command
        .output()
        .with_context(|| format!("failed to spawn hookbridge {args:?}"))?;
    let code = output
        .status
        .code()
        .context("hookbridge was terminated by a signal")?;

    Ok(Outcome {
        code,
        stdout: String::from_utf8(output.stdout).context("stdout is not UTF-8")?,
        stderr: String::from_utf8(output.stderr).context("stderr is not UTF-8")?,
    })
}

/// Runs one scenario.
pub fn run_scenario(name: &str) -> Outcome {
    hookbridge(&["run", name]).expect("Failed to run scenario")
}
