//! Argon2id parameter arguments.
//!
//! Raising the memory cost is a breaking change for verification only if old
//! verifiers were dropped; stored verifiers carry their own parameters and
//! keep verifying either way.

use clap::{Arg, Command};

pub const ARG_TIME_COST: &str = "verifier-time-cost";
pub const ARG_MEMORY_KIB: &str = "verifier-memory-kib";
pub const ARG_PARALLELISM: &str = "verifier-parallelism";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_TIME_COST)
                .long(ARG_TIME_COST)
                .help("Argon2id iteration count")
                .default_value("3")
                .env("CHIAVI_VERIFIER_TIME_COST")
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new(ARG_MEMORY_KIB)
                .long(ARG_MEMORY_KIB)
                .help("Argon2id memory cost in KiB")
                .default_value("65536")
                .env("CHIAVI_VERIFIER_MEMORY_KIB")
                .value_parser(clap::value_parser!(u32).range(8..)),
        )
        .arg(
            Arg::new(ARG_PARALLELISM)
                .long(ARG_PARALLELISM)
                .help("Argon2id lane count")
                .default_value("1")
                .env("CHIAVI_VERIFIER_PARALLELISM")
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
}
