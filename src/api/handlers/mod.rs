//! Route handlers and the shared per-process service configuration.

pub mod gate;
pub mod health;
pub mod keys;
pub mod projects;
pub mod validate;

use crate::store::rate::RateLimit;
use secrecy::SecretString;
use std::time::SystemTime;

/// Configuration frozen at startup and shared with every handler.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Shared admin bearer secret; `None` disables the admin endpoints.
    pub admin_secret: Option<SecretString>,
    pub rate: RateLimit,
}

/// Wall-clock time as float seconds since the epoch, the unit every persisted
/// timestamp uses.
pub(crate) fn now_epoch_seconds() -> f64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64())
        .unwrap_or(0.0)
}
