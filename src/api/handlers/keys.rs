//! Admin key lifecycle endpoints: mint, revoke, list.

use crate::{
    admin::{self, MintRequest, LIST_LIMIT_DEFAULT, METADATA_MAX_BYTES},
    api::error::{ApiError, ErrorResponse},
    credential,
    store::ManagerStore,
    verifier::Verifier,
};
use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    extract::{Extension, Query},
    http::{HeaderMap, StatusCode},
    response::Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use utoipa::{IntoParams, ToSchema};

use super::{gate, now_epoch_seconds, ServiceConfig};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct MintKeyRequest {
    pub project_id: String,
    pub owner: String,
    /// Free-form routing hint; any string up to 4 KiB, including JSON blobs.
    pub metadata: String,
    /// Epoch seconds after which the key stops validating.
    #[serde(default)]
    pub expires_at: Option<f64>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MintKeyResponse {
    /// The full bearer credential. Returned exactly once; only the verifier
    /// is kept server-side.
    pub api_key: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct RevokeKeyRequest {
    pub project_id: String,
    pub key_id: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RevokeKeyResponse {
    pub revoked: bool,
}

#[derive(IntoParams, Deserialize, Debug)]
#[into_params(parameter_in = Query)]
pub struct ListKeysParams {
    pub project_id: String,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

/// Listing entry; deliberately has no field for the verifier.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct KeyItem {
    pub key_id: String,
    pub owner: String,
    pub metadata: String,
    pub created_at: f64,
    pub disabled: bool,
    pub expires_at: Option<f64>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ListKeysResponse {
    pub items: Vec<KeyItem>,
    /// Offset of the next page, or null when this page was the last.
    pub next: Option<u64>,
}

#[utoipa::path(
    post,
    path = "/v1/mint-key",
    request_body = MintKeyRequest,
    responses(
        (status = 201, description = "Key minted", body = MintKeyResponse),
        (status = 400, description = "Request failed schema constraints", body = ErrorResponse),
        (status = 401, description = "Admin credentials rejected", body = ErrorResponse),
        (status = 503, description = "Store unavailable or admin disabled", body = ErrorResponse)
    ),
    security(("admin_token" = [])),
    tag = "admin"
)]
#[instrument(skip_all)]
pub async fn mint_key(
    Extension(store): Extension<ManagerStore>,
    Extension(verifier): Extension<Arc<Verifier>>,
    Extension(config): Extension<Arc<ServiceConfig>>,
    headers: HeaderMap,
    payload: Result<Json<MintKeyRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MintKeyResponse>), ApiError> {
    gate::require_admin(&headers, &config)?;

    let Json(request) =
        payload.map_err(|_| ApiError::Validation("Invalid request body".to_string()))?;

    if !credential::valid_project_id(&request.project_id) {
        return Err(ApiError::Validation(
            "project_id must match [A-Za-z0-9_-]{1,64}".to_string(),
        ));
    }
    if request.metadata.len() > METADATA_MAX_BYTES {
        return Err(ApiError::Validation(format!(
            "metadata must not exceed {METADATA_MAX_BYTES} bytes"
        )));
    }

    let minted = admin::mint_key(
        &store,
        &verifier,
        &MintRequest {
            project_id: request.project_id,
            owner: request.owner,
            metadata: request.metadata,
            expires_at: request.expires_at,
        },
        now_epoch_seconds(),
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(MintKeyResponse {
            api_key: minted.api_key,
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/v1/revoke-key",
    request_body = RevokeKeyRequest,
    responses(
        (status = 200, description = "Key disabled (idempotent)", body = RevokeKeyResponse),
        (status = 401, description = "Admin credentials rejected", body = ErrorResponse),
        (status = 404, description = "No such key", body = ErrorResponse)
    ),
    security(("admin_token" = [])),
    tag = "admin"
)]
#[instrument(skip_all)]
pub async fn revoke_key(
    Extension(store): Extension<ManagerStore>,
    Extension(config): Extension<Arc<ServiceConfig>>,
    headers: HeaderMap,
    payload: Result<Json<RevokeKeyRequest>, JsonRejection>,
) -> Result<Json<RevokeKeyResponse>, ApiError> {
    gate::require_admin(&headers, &config)?;

    let Json(request) =
        payload.map_err(|_| ApiError::Validation("Invalid request body".to_string()))?;

    admin::revoke_key(&store, &request.project_id, &request.key_id).await?;

    Ok(Json(RevokeKeyResponse { revoked: true }))
}

#[utoipa::path(
    get,
    path = "/v1/list-keys",
    params(ListKeysParams),
    responses(
        (status = 200, description = "One page of keys, key_id ascending", body = ListKeysResponse),
        (status = 400, description = "Invalid pagination parameters", body = ErrorResponse),
        (status = 401, description = "Admin credentials rejected", body = ErrorResponse)
    ),
    security(("admin_token" = [])),
    tag = "admin"
)]
#[instrument(skip_all)]
pub async fn list_keys(
    Extension(store): Extension<ManagerStore>,
    Extension(config): Extension<Arc<ServiceConfig>>,
    headers: HeaderMap,
    params: Result<Query<ListKeysParams>, QueryRejection>,
) -> Result<Json<ListKeysResponse>, ApiError> {
    gate::require_admin(&headers, &config)?;

    let Query(params) =
        params.map_err(|_| ApiError::Validation("Invalid query parameters".to_string()))?;

    let page = admin::list_keys(
        &store,
        &params.project_id,
        params.offset.unwrap_or(0),
        params.limit.unwrap_or(LIST_LIMIT_DEFAULT),
    )
    .await?;

    let items = page
        .items
        .into_iter()
        .map(|doc| KeyItem {
            key_id: doc.key_id,
            owner: doc.owner,
            metadata: doc.metadata,
            created_at: doc.created_at,
            disabled: doc.disabled,
            expires_at: doc.expires_at,
        })
        .collect();

    Ok(Json(ListKeysResponse {
        items,
        next: page.next,
    }))
}
