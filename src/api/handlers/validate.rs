//! Public key-validation endpoint.

use crate::{
    api::error::{ApiError, ErrorResponse},
    store::ValidatorStore,
    validate::validate_bearer,
    verifier::Verifier,
};
use axum::{
    extract::rejection::JsonRejection,
    extract::Extension,
    response::Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;

use super::{now_epoch_seconds, ServiceConfig};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct ValidateKeyRequest {
    /// Bearer credential, `sk-proj.{project_id}.{key_id}.{secret}`.
    pub api_key: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ValidateKeyResponse {
    pub project_id: String,
    pub key_id: String,
    pub owner: String,
    pub metadata: String,
}

#[utoipa::path(
    post,
    path = "/v1/validate-key",
    request_body = ValidateKeyRequest,
    responses(
        (status = 200, description = "Key accepted; routing payload returned", body = ValidateKeyResponse),
        (status = 400, description = "Request body is not valid JSON", body = ErrorResponse),
        (status = 401, description = "Key denied", body = ErrorResponse),
        (status = 429, description = "Per-key rate limit exceeded", body = ErrorResponse),
        (status = 503, description = "Store unavailable", body = ErrorResponse)
    ),
    tag = "keys"
)]
#[instrument(skip_all)]
pub async fn validate_key(
    Extension(store): Extension<ValidatorStore>,
    Extension(verifier): Extension<Arc<Verifier>>,
    Extension(config): Extension<Arc<ServiceConfig>>,
    payload: Result<Json<ValidateKeyRequest>, JsonRejection>,
) -> Result<Json<ValidateKeyResponse>, ApiError> {
    let Json(request) =
        payload.map_err(|_| ApiError::Validation("Invalid request body".to_string()))?;

    let validated = validate_bearer(
        &store,
        &verifier,
        config.rate,
        &request.api_key,
        now_epoch_seconds(),
    )
    .await?;

    Ok(Json(ValidateKeyResponse {
        project_id: validated.project_id,
        key_id: validated.key_id,
        owner: validated.owner,
        metadata: validated.metadata,
    }))
}
