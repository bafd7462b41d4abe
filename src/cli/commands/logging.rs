//! Log verbosity argument shared by every invocation.
//!
//! On the command line verbosity is a repeat count (`-vvv`); through
//! `CHIAVI_LOG_LEVEL` it is either a named level or a numeric count.

use clap::{builder::ValueParser, Arg, Command};

pub const ARG_VERBOSITY: &str = "verbosity";

const MAX_VERBOSITY: u8 = 5;

/// Parse a named level or a numeric repeat count into the count the
/// telemetry layer expects.
#[must_use]
pub fn level_parser() -> ValueParser {
    ValueParser::from(|value: &str| -> std::result::Result<u8, String> {
        match value.to_ascii_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            numeric => match numeric.parse::<u8>() {
                Ok(count) if count <= MAX_VERBOSITY => Ok(count),
                _ => Err(format!("invalid log level: {value}")),
            },
        }
    })
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_VERBOSITY)
            .short('v')
            .long("verbose")
            .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
            .env("CHIAVI_LOG_LEVEL")
            .global(true)
            .action(clap::ArgAction::Count)
            .value_parser(level_parser()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Command;

    fn matches_with_env(value: &str) -> Result<clap::ArgMatches, clap::Error> {
        temp_env::with_vars([("CHIAVI_LOG_LEVEL", Some(value))], || {
            with_args(Command::new("test")).try_get_matches_from(vec!["test"])
        })
    }

    #[test]
    fn named_levels_map_to_counts() -> Result<(), clap::Error> {
        for (value, expected) in [
            ("error", 0),
            ("WARN", 1),
            ("info", 2),
            ("Debug", 3),
            ("trace", 4),
        ] {
            let matches = matches_with_env(value)?;
            assert_eq!(
                matches.get_one::<u8>(ARG_VERBOSITY).copied(),
                Some(expected),
                "level {value}"
            );
        }
        Ok(())
    }

    #[test]
    fn numeric_levels_pass_through() -> Result<(), clap::Error> {
        let matches = matches_with_env("3")?;
        assert_eq!(matches.get_one::<u8>(ARG_VERBOSITY).copied(), Some(3));
        let matches = matches_with_env("5")?;
        assert_eq!(matches.get_one::<u8>(ARG_VERBOSITY).copied(), Some(5));
        Ok(())
    }

    #[test]
    fn unknown_levels_are_rejected() {
        assert!(matches_with_env("loud").is_err());
        assert!(matches_with_env("9").is_err());
        assert!(matches_with_env("-1").is_err());
    }
}
