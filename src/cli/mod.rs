pub mod actions;
pub mod commands;
pub mod dispatch;
pub mod telemetry;

use crate::cli::actions::Action;
use anyhow::Result;

/// Parse arguments, bring up logging and resolve the action to run.
///
/// The returned action is executed by the binary so that `main` stays a
/// two-liner and the CLI layer owns everything up to the server start.
///
/// # Errors
///
/// Returns an error if argument parsing, logging setup or dispatch fails.
pub fn start() -> Result<Action> {
    let matches = commands::new().get_matches();

    let verbosity = matches
        .get_one::<u8>(commands::logging::ARG_VERBOSITY)
        .copied()
        .unwrap_or(0);
    telemetry::init(verbosity)?;

    dispatch::handler(&matches)
}
