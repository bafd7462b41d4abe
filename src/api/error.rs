//! Stable error taxonomy for the HTTP surface.
//!
//! Every failure renders as `{"error": {"code": ..., "message": ...}}`. All
//! key-validation denials collapse into a single variant so the response body
//! is byte-identical regardless of cause.

use crate::{admin::AdminError, validate::ValidateError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ApiError {
    /// Any denial of a presented bearer credential.
    #[error("Invalid or expired API key")]
    Unauthorized,
    #[error("Rate limit exceeded")]
    RateLimited,
    /// Admin gate refused the request.
    #[error("Invalid admin credentials")]
    AdminUnauthorized,
    /// No admin shared secret is configured.
    #[error("Admin endpoints are disabled")]
    AdminDisabled,
    #[error("API key not found")]
    KeyNotFound,
    #[error("Project not found")]
    ProjectNotFound,
    #[error("Project already exists")]
    ProjectExists,
    /// Request body or parameters failed schema constraints.
    #[error("{0}")]
    Validation(String),
    #[error("Service temporarily unavailable")]
    Unavailable,
    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized | Self::AdminUnauthorized => StatusCode::UNAUTHORIZED,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::KeyNotFound | Self::ProjectNotFound => StatusCode::NOT_FOUND,
            Self::ProjectExists => StatusCode::CONFLICT,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::AdminDisabled | Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized | Self::AdminUnauthorized => "unauthorized",
            Self::RateLimited => "rate_limited",
            Self::AdminDisabled => "admin_disabled",
            Self::KeyNotFound => "key_not_found",
            Self::ProjectNotFound => "project_not_found",
            Self::ProjectExists => "project_exists",
            Self::Validation(_) => "validation_error",
            Self::Unavailable => "unavailable",
            Self::Internal => "internal_error",
        }
    }

    fn body(&self) -> ErrorResponse {
        ErrorResponse {
            error: ErrorDetail {
                code: self.code().to_string(),
                message: self.to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}

impl From<ValidateError> for ApiError {
    fn from(err: ValidateError) -> Self {
        match err {
            ValidateError::Denied => Self::Unauthorized,
            ValidateError::RateLimited => Self::RateLimited,
            ValidateError::Unavailable => Self::Unavailable,
            ValidateError::Internal => Self::Internal,
        }
    }
}

impl From<AdminError> for ApiError {
    fn from(err: AdminError) -> Self {
        match err {
            AdminError::KeyNotFound => Self::KeyNotFound,
            AdminError::ProjectNotFound => Self::ProjectNotFound,
            AdminError::ProjectExists => Self::ProjectExists,
            AdminError::Unavailable => Self::Unavailable,
            AdminError::Internal(detail) => {
                tracing::error!("admin operation failed: {detail}");
                Self::Internal
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn rendered(err: ApiError) -> Result<String> {
        Ok(serde_json::to_string(&err.body())?)
    }

    #[test]
    fn status_mapping() {
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::RateLimited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(ApiError::KeyNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::ProjectExists.status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::Validation("bad".to_string()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::Unavailable.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(ApiError::Internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn denial_body_is_byte_identical_across_causes() -> Result<()> {
        // Missing key, disabled key, expired key and wrong secret all funnel
        // through ValidateError::Denied; the rendered body must not vary.
        let from_pipeline = rendered(ApiError::from(ValidateError::Denied))?;
        let direct = rendered(ApiError::Unauthorized)?;
        assert_eq!(from_pipeline, direct);
        assert_eq!(
            direct,
            r#"{"error":{"code":"unauthorized","message":"Invalid or expired API key"}}"#
        );
        Ok(())
    }

    #[test]
    fn rate_limited_body() -> Result<()> {
        assert_eq!(
            rendered(ApiError::from(ValidateError::RateLimited))?,
            r#"{"error":{"code":"rate_limited","message":"Rate limit exceeded"}}"#
        );
        Ok(())
    }

    #[test]
    fn admin_errors_map_to_specific_codes() {
        assert_eq!(ApiError::from(AdminError::KeyNotFound).code(), "key_not_found");
        assert_eq!(
            ApiError::from(AdminError::ProjectExists).code(),
            "project_exists"
        );
        assert_eq!(
            ApiError::from(AdminError::Internal("boom".to_string())),
            ApiError::Internal
        );
    }

    #[test]
    fn validation_message_is_preserved() -> Result<()> {
        let rendered = rendered(ApiError::Validation("metadata too large".to_string()))?;
        assert!(rendered.contains("metadata too large"));
        assert!(rendered.contains("validation_error"));
        Ok(())
    }
}
