//! Shared-secret admin gate.
//!
//! Admin endpoints are guarded by a single bearer secret. The presented and
//! configured values are hashed before comparison so the check is
//! constant-time and independent of either length.

use crate::api::error::ApiError;
use axum::http::{header::AUTHORIZATION, HeaderMap};
use secrecy::ExposeSecret;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use super::ServiceConfig;

/// Check the `Authorization: Bearer` header against the configured admin
/// secret.
///
/// # Errors
/// `AdminDisabled` when no secret is configured, `AdminUnauthorized` when the
/// header is missing, malformed or wrong.
pub fn require_admin(headers: &HeaderMap, config: &ServiceConfig) -> Result<(), ApiError> {
    let Some(secret) = config.admin_secret.as_ref() else {
        return Err(ApiError::AdminDisabled);
    };

    let presented = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(ApiError::AdminUnauthorized)?;

    let presented_digest = Sha256::digest(presented.as_bytes());
    let expected_digest = Sha256::digest(secret.expose_secret().as_bytes());

    if bool::from(presented_digest.as_slice().ct_eq(expected_digest.as_slice())) {
        Ok(())
    } else {
        Err(ApiError::AdminUnauthorized)
    }
}
