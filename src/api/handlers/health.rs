//! Health endpoint: the service is healthy when the store answers under both
//! principals.

use crate::store::{ManagerStore, ValidatorStore};
use axum::{
    extract::Extension,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Health {
    name: String,
    version: String,
    validator_store: String,
    manager_store: String,
}

fn status_label(healthy: bool) -> String {
    if healthy { "ok" } else { "error" }.to_string()
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Store reachable under both principals", body = Health),
        (status = 503, description = "Store unreachable under at least one principal", body = Health)
    ),
    tag = "health"
)]
pub async fn health(
    Extension(validator): Extension<ValidatorStore>,
    Extension(manager): Extension<ManagerStore>,
) -> impl IntoResponse {
    let validator_ok = match validator.ping().await {
        Ok(()) => true,
        Err(err) => {
            error!("validator store ping failed: {err}");
            false
        }
    };
    let manager_ok = match manager.ping().await {
        Ok(()) => true,
        Err(err) => {
            error!("manager store ping failed: {err}");
            false
        }
    };

    let health = Health {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        validator_store: status_label(validator_ok),
        manager_store: status_label(manager_ok),
    };

    let mut headers = HeaderMap::new();
    match format!("{}:{}", health.name, health.version).parse::<HeaderValue>() {
        Ok(value) => {
            headers.insert("X-App", value);
        }
        Err(err) => {
            error!("Failed to build X-App header: {err}");
        }
    }

    if validator_ok && manager_ok {
        debug!("store reachable under both principals");
        (StatusCode::OK, headers, Json(health))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, headers, Json(health))
    }
}
