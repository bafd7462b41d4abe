use clap::{Arg, Command};

pub const ARG_ADMIN_SECRET: &str = "admin-secret";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_ADMIN_SECRET)
            .long(ARG_ADMIN_SECRET)
            .help("Shared admin bearer secret; when unset, admin endpoints answer 503")
            .env("CHIAVI_ADMIN_SECRET"),
    )
}
