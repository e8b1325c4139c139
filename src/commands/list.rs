//! List built-in scenarios.

use clap::Args;
use serde::Serialize;

use hookbridge_core::error::AppError;

use crate::scenarios::{self, Scenario};

/// Arguments for the list command
#[derive(Debug, Args)]
pub struct ListArgs {
    /// Print as JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct Row {
    name: &'static str,
    expected_exit: i32,
    description: &'static str,
}

impl From<&Scenario> for Row {
    fn from(scenario: &Scenario) -> Self {
        Self {
            name: scenario.name,
            expected_exit: scenario.expected_exit,
            description: scenario.description,
        }
    }
}

/// Execute the list command
pub fn execute(args: &ListArgs) -> Result<(), AppError> {
    let rows: Vec<Row> = scenarios::all().iter().map(Row::from).collect();

    if args.json {
        let json = serde_json::to_string_pretty(&rows)?;
        println!("{json}");
        return Ok(());
    }

    let width = rows.iter().map(|r| r.name.len()).max().unwrap_or(0);
    for row in &rows {
        println!(
            "{:<width$}  {:>3}  {}",
            row.name, row.expected_exit, row.description
        );
    }
    Ok(())
}
