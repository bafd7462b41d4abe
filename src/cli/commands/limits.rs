//! Rate-limit arguments.

use clap::{builder::ValueParser, Arg, Command};

pub const ARG_RATE_LIMIT: &str = "rate-limit";
pub const ARG_RATE_TTL: &str = "rate-ttl";

/// The counter TTL must outlive the one-minute window and stay bounded so
/// stale counters evaporate.
#[must_use]
pub fn validator_rate_ttl() -> ValueParser {
    ValueParser::from(move |ttl: &str| -> std::result::Result<u64, String> {
        let parsed: u64 = ttl
            .parse()
            .map_err(|_| "rate counter TTL must be an integer".to_string())?;
        if parsed <= 60 {
            return Err("rate counter TTL must be strictly greater than 60 seconds".to_string());
        }
        if parsed > 300 {
            return Err("rate counter TTL must be at most 300 seconds".to_string());
        }
        Ok(parsed)
    })
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_RATE_LIMIT)
                .long(ARG_RATE_LIMIT)
                .help("Validations allowed per key per minute")
                .default_value("100")
                .env("CHIAVI_RATE_LIMIT")
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new(ARG_RATE_TTL)
                .long(ARG_RATE_TTL)
                .help("Rate counter TTL in seconds, in (60, 300]")
                .default_value("120")
                .env("CHIAVI_RATE_TTL")
                .value_parser(validator_rate_ttl()),
        )
}
