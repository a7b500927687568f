//! Command-line interface for catchment analysis runs.
#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};

mod categories;
mod error;
mod progress;
mod run;

pub use error::CliError;
use run::RunArgs;

const ARG_CITY: &str = "city";
const ARG_RANGES: &str = "ranges";
const ARG_RANGE_TYPE: &str = "range-type";
const ARG_PROFILE: &str = "profile";
const ARG_THREADS: &str = "threads";
const ARG_CATEGORIES: &str = "categories";
const ARG_PROVIDER: &str = "provider";
const ARG_ORS_BASE_URL: &str = "ors-base-url";
const ARG_ORS_API_KEY: &str = "ors-api-key";
const ARG_VALHALLA_URL: &str = "valhalla-url";
const ARG_VALHALLA_API_KEY: &str = "valhalla-api-key";
const ARG_OHSOME_URL: &str = "ohsome-url";
const ARG_SEARCH_BBOX: &str = "search-bbox";
const ARG_SNAPSHOT: &str = "snapshot";
const ARG_POPULATION_GRID: &str = "population-grid";
const ARG_OUTPUT_DIR: &str = "output-dir";
const ARG_SCENARIO: &str = "scenario";
const ARG_RANK_BY: &str = "rank-by";
const ARG_TASK_TIMEOUT_SECS: &str = "task-timeout-secs";
const ARG_VERBOSITY: &str = "verbosity";
const ENV_CITY: &str = "CATCHMENT_CMDS_RUN_CITY";
const ENV_CATEGORIES: &str = "CATCHMENT_CMDS_RUN_CATEGORIES";
const ENV_ORS_API_KEY: &str = "CATCHMENT_CMDS_RUN_ORS_API_KEY";
const ENV_POPULATION_GRID: &str = "CATCHMENT_CMDS_RUN_POPULATION_GRID";

/// Run the catchment CLI with the current process arguments and environment.
///
/// # Errors
///
/// Returns a [`CliError`] when arguments or configuration are invalid, an
/// input cannot be loaded, or results cannot be written.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    match cli.command {
        Command::Run(args) => run::run_catchment(*args),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "catchment",
    about = "Measure how much of a city's population lives near its points of interest",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compute catchment regions for one or more cities.
    Run(Box<RunArgs>),
}

#[cfg(test)]
mod tests;
