//! Admin project endpoints.

use crate::{
    admin,
    api::error::{ApiError, ErrorResponse},
    credential,
    store::{ManagerStore, ProjectDoc},
};
use axum::{
    extract::rejection::QueryRejection,
    extract::{Extension, Path, Query},
    http::{HeaderMap, StatusCode},
    response::Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use utoipa::{IntoParams, ToSchema};

use super::{gate, now_epoch_seconds, ServiceConfig};

#[derive(IntoParams, Deserialize, Debug)]
#[into_params(parameter_in = Query)]
pub struct CreateProjectParams {
    pub project_id: String,
    /// Human-readable project label.
    pub label: String,
    pub owner: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ProjectResponse {
    pub project_id: String,
    pub label: String,
    pub owner: String,
    pub created_at: f64,
}

#[utoipa::path(
    post,
    path = "/v1/admin/create-project",
    params(CreateProjectParams),
    responses(
        (status = 201, description = "Project created", body = ProjectResponse),
        (status = 401, description = "Admin credentials rejected", body = ErrorResponse),
        (status = 409, description = "Project already exists", body = ErrorResponse)
    ),
    security(("admin_token" = [])),
    tag = "admin"
)]
#[instrument(skip_all)]
pub async fn create_project(
    Extension(store): Extension<ManagerStore>,
    Extension(config): Extension<Arc<ServiceConfig>>,
    headers: HeaderMap,
    params: Result<Query<CreateProjectParams>, QueryRejection>,
) -> Result<(StatusCode, Json<ProjectResponse>), ApiError> {
    gate::require_admin(&headers, &config)?;

    let Query(params) =
        params.map_err(|_| ApiError::Validation("Invalid query parameters".to_string()))?;

    if !credential::valid_project_id(&params.project_id) {
        return Err(ApiError::Validation(
            "project_id must match [A-Za-z0-9_-]{1,64}".to_string(),
        ));
    }

    let doc = ProjectDoc {
        project_id: params.project_id,
        label: params.label,
        owner: params.owner,
        created_at: now_epoch_seconds(),
    };
    admin::create_project(&store, &doc).await?;

    Ok((
        StatusCode::CREATED,
        Json(ProjectResponse {
            project_id: doc.project_id,
            label: doc.label,
            owner: doc.owner,
            created_at: doc.created_at,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/v1/admin/project/{project_id}",
    params(("project_id" = String, Path, description = "Project identifier")),
    responses(
        (status = 200, description = "Project document", body = ProjectResponse),
        (status = 401, description = "Admin credentials rejected", body = ErrorResponse),
        (status = 404, description = "No such project", body = ErrorResponse)
    ),
    security(("admin_token" = [])),
    tag = "admin"
)]
#[instrument(skip_all)]
pub async fn get_project(
    Extension(store): Extension<ManagerStore>,
    Extension(config): Extension<Arc<ServiceConfig>>,
    headers: HeaderMap,
    Path(project_id): Path<String>,
) -> Result<Json<ProjectResponse>, ApiError> {
    gate::require_admin(&headers, &config)?;

    let doc = admin::get_project(&store, &project_id).await?;

    Ok(Json(ProjectResponse {
        project_id: doc.project_id,
        label: doc.label,
        owner: doc.owner,
        created_at: doc.created_at,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn project_response_mirrors_document_shape() -> Result<()> {
        let response = ProjectResponse {
            project_id: "merlin".to_string(),
            label: "Research".to_string(),
            owner: "Mario".to_string(),
            created_at: 1_700_000_000.0,
        };
        let value = serde_json::to_value(&response)?;
        let decoded: ProjectDoc = serde_json::from_value(value)?;
        assert_eq!(decoded.label, "Research");
        Ok(())
    }
}
