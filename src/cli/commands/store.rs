//! Backing-store connection arguments, one credential set per principal.

use clap::{Arg, Command};

pub const ARG_REDIS_HOST: &str = "redis-host";
pub const ARG_REDIS_PORT: &str = "redis-port";
pub const ARG_REDIS_DB: &str = "redis-db";
pub const ARG_VALIDATOR_USERNAME: &str = "redis-validator-username";
pub const ARG_VALIDATOR_PASSWORD: &str = "redis-validator-password";
pub const ARG_MANAGER_USERNAME: &str = "redis-manager-username";
pub const ARG_MANAGER_PASSWORD: &str = "redis-manager-password";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_REDIS_HOST)
                .long(ARG_REDIS_HOST)
                .help("Store hostname")
                .default_value("localhost")
                .env("CHIAVI_REDIS_HOST"),
        )
        .arg(
            Arg::new(ARG_REDIS_PORT)
                .long(ARG_REDIS_PORT)
                .help("Store port")
                .default_value("6379")
                .env("CHIAVI_REDIS_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_REDIS_DB)
                .long(ARG_REDIS_DB)
                .help("Store database index")
                .default_value("0")
                .env("CHIAVI_REDIS_DB")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_VALIDATOR_USERNAME)
                .long(ARG_VALIDATOR_USERNAME)
                .help("Read-mostly principal used by the validation path")
                .default_value("validator")
                .env("CHIAVI_REDIS_VALIDATOR_USERNAME"),
        )
        .arg(
            Arg::new(ARG_VALIDATOR_PASSWORD)
                .long(ARG_VALIDATOR_PASSWORD)
                .help("Password for the validator principal")
                .env("CHIAVI_REDIS_VALIDATOR_PASSWORD"),
        )
        .arg(
            Arg::new(ARG_MANAGER_USERNAME)
                .long(ARG_MANAGER_USERNAME)
                .help("Read-write principal used by admin operations")
                .default_value("manager")
                .env("CHIAVI_REDIS_MANAGER_USERNAME"),
        )
        .arg(
            Arg::new(ARG_MANAGER_PASSWORD)
                .long(ARG_MANAGER_PASSWORD)
                .help("Password for the manager principal")
                .env("CHIAVI_REDIS_MANAGER_PASSWORD"),
        )
}
