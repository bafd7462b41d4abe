use crate::cli::{
    actions::{server::Args, Action},
    commands::{admin, hashing, limits, store},
};
use anyhow::{Context, Result};

fn required_string(matches: &clap::ArgMatches, name: &str) -> Result<String> {
    matches
        .get_one::<String>(name)
        .cloned()
        .with_context(|| format!("missing required argument: --{name}"))
}

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let host = required_string(matches, "host")?;
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8000);

    let redis_host = required_string(matches, store::ARG_REDIS_HOST)?;
    let redis_port = matches
        .get_one::<u16>(store::ARG_REDIS_PORT)
        .copied()
        .unwrap_or(6379);
    let redis_db = matches
        .get_one::<i64>(store::ARG_REDIS_DB)
        .copied()
        .unwrap_or(0);

    let validator_username = required_string(matches, store::ARG_VALIDATOR_USERNAME)?;
    let validator_password = matches
        .get_one::<String>(store::ARG_VALIDATOR_PASSWORD)
        .cloned();
    let manager_username = required_string(matches, store::ARG_MANAGER_USERNAME)?;
    let manager_password = matches
        .get_one::<String>(store::ARG_MANAGER_PASSWORD)
        .cloned();

    let admin_secret = matches.get_one::<String>(admin::ARG_ADMIN_SECRET).cloned();

    let rate_limit = matches
        .get_one::<u32>(limits::ARG_RATE_LIMIT)
        .copied()
        .unwrap_or(100);
    let rate_ttl = matches
        .get_one::<u64>(limits::ARG_RATE_TTL)
        .copied()
        .unwrap_or(120);

    let verifier_time_cost = matches
        .get_one::<u32>(hashing::ARG_TIME_COST)
        .copied()
        .unwrap_or(3);
    let verifier_memory_kib = matches
        .get_one::<u32>(hashing::ARG_MEMORY_KIB)
        .copied()
        .unwrap_or(65536);
    let verifier_parallelism = matches
        .get_one::<u32>(hashing::ARG_PARALLELISM)
        .copied()
        .unwrap_or(1);

    Ok(Action::Server(Args {
        host,
        port,
        redis_host,
        redis_port,
        redis_db,
        validator_username,
        validator_password,
        manager_username,
        manager_password,
        admin_secret,
        rate_limit,
        rate_ttl,
        verifier_time_cost,
        verifier_memory_kib,
        verifier_parallelism,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handler_builds_server_action_from_defaults() -> Result<()> {
        temp_env::with_vars(
            [
                ("CHIAVI_PORT", None::<&str>),
                ("CHIAVI_HOST", None),
                ("CHIAVI_REDIS_HOST", None),
                ("CHIAVI_ADMIN_SECRET", None),
                ("CHIAVI_RATE_LIMIT", None),
                ("CHIAVI_RATE_TTL", None),
            ],
            || {
                let command = crate::cli::commands::new();
                let matches = command.get_matches_from(vec!["chiavi"]);
                let Action::Server(args) = handler(&matches)?;
                assert_eq!(args.port, 8000);
                assert_eq!(args.redis_host, "localhost");
                assert_eq!(args.redis_port, 6379);
                assert_eq!(args.validator_username, "validator");
                assert_eq!(args.manager_username, "manager");
                assert_eq!(args.admin_secret, None);
                assert_eq!(args.rate_limit, 100);
                assert_eq!(args.rate_ttl, 120);
                assert_eq!(args.verifier_memory_kib, 65536);
                Ok(())
            },
        )
    }

    #[test]
    fn handler_reads_overrides() -> Result<()> {
        temp_env::with_vars([("CHIAVI_ADMIN_SECRET", None::<&str>)], || {
            let command = crate::cli::commands::new();
            let matches = command.get_matches_from(vec![
                "chiavi",
                "--port",
                "9100",
                "--redis-host",
                "redis.internal",
                "--admin-secret",
                "hunter2",
                "--rate-limit",
                "3",
                "--rate-ttl",
                "90",
            ]);
            let Action::Server(args) = handler(&matches)?;
            assert_eq!(args.port, 9100);
            assert_eq!(args.redis_host, "redis.internal");
            assert_eq!(args.admin_secret.as_deref(), Some("hunter2"));
            assert_eq!(args.rate_limit, 3);
            assert_eq!(args.rate_ttl, 90);
            Ok(())
        })
    }
}
