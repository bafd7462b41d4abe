use crate::{
    api::{self, handlers::ServiceConfig},
    store::{rate::RateLimit, ManagerStore, StoreConfig, ValidatorStore},
    verifier::{Verifier, VerifierParams},
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug)]
pub struct Args {
    pub host: String,
    pub port: u16,
    pub redis_host: String,
    pub redis_port: u16,
    pub redis_db: i64,
    pub validator_username: String,
    pub validator_password: Option<String>,
    pub manager_username: String,
    pub manager_password: Option<String>,
    pub admin_secret: Option<String>,
    pub rate_limit: u32,
    pub rate_ttl: u64,
    pub verifier_time_cost: u32,
    pub verifier_memory_kib: u32,
    pub verifier_parallelism: u32,
}

impl Args {
    fn store_config(&self, username: &str, password: Option<&String>) -> StoreConfig {
        StoreConfig {
            host: self.redis_host.clone(),
            port: self.redis_port,
            db: self.redis_db,
            username: username.to_string(),
            password: password.map(|value| SecretString::from(value.clone())),
        }
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the store is unreachable under either principal or
/// the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let verifier = Verifier::new(VerifierParams {
        time_cost: args.verifier_time_cost,
        memory_kib: args.verifier_memory_kib,
        parallelism: args.verifier_parallelism,
    })
    .context("Invalid verifier parameters")?;

    let rate = RateLimit::new(args.rate_limit, args.rate_ttl)
        .context("Invalid rate limit configuration")?;

    let validator_store = ValidatorStore::connect(
        &args.store_config(&args.validator_username, args.validator_password.as_ref()),
    )
    .await
    .context("Failed to connect to the store with validator credentials")?;

    let manager_store = ManagerStore::connect(
        &args.store_config(&args.manager_username, args.manager_password.as_ref()),
    )
    .await
    .context("Failed to connect to the store with manager credentials")?;

    validator_store
        .ping()
        .await
        .context("Store did not answer a ping as the validator principal")?;
    manager_store
        .ping()
        .await
        .context("Store did not answer a ping as the manager principal")?;

    info!("Connected to the store with both validator and manager credentials");

    let admin_secret = args.admin_secret.map(SecretString::from);
    if admin_secret.is_none() {
        warn!("Admin secret not set - admin endpoints are disabled");
    } else {
        info!("Admin authentication configured");
    }

    let config = Arc::new(ServiceConfig { admin_secret, rate });

    api::new(
        &args.host,
        args.port,
        validator_store,
        manager_store,
        Arc::new(verifier),
        config,
    )
    .await
}

fn log_startup_args(args: &Args) {
    let entries = [
        ("listen", format!("{}:{}", args.host, args.port)),
        ("store", format!("{}:{}", args.redis_host, args.redis_port)),
        ("store_db", args.redis_db.to_string()),
        ("validator_principal", args.validator_username.clone()),
        (
            "validator_password_set",
            args.validator_password.is_some().to_string(),
        ),
        ("manager_principal", args.manager_username.clone()),
        (
            "manager_password_set",
            args.manager_password.is_some().to_string(),
        ),
        ("admin_secret_set", args.admin_secret.is_some().to_string()),
        ("rate_limit", args.rate_limit.to_string()),
        ("rate_ttl", args.rate_ttl.to_string()),
        (
            "verifier",
            format!(
                "m={},t={},p={}",
                args.verifier_memory_kib, args.verifier_time_cost, args.verifier_parallelism
            ),
        ),
    ];

    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = "Startup configuration:".to_string();
    for (key, value) in entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}
