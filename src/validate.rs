//! The key validation pipeline.
//!
//! Order is part of the protocol: parse → existence → disabled → expired →
//! secret → rate. Every denial is reported to the caller as the same
//! [`ValidateError::Denied`] so the cause is visible only in the audit stream
//! and service logs.

use crate::{
    credential::Credential,
    store::{
        audit::{AuditEvent, AuditResult},
        rate::RateLimit,
        KeyDoc, StoreError, ValidatorStore, USAGE_FIELD_DENIED, USAGE_FIELD_LAST_SEEN,
        USAGE_FIELD_OK,
    },
    verifier::{Verifier, VerifierError},
};
use tracing::warn;

/// Store operations the validation pipeline depends on.
///
/// [`ValidatorStore`] is the production implementation; tests substitute an
/// in-memory double.
#[allow(async_fn_in_trait)]
pub trait ValidationStore {
    async fn get_key(&self, project_id: &str, key_id: &str) -> Result<KeyDoc, StoreError>;
    async fn append_audit(&self, event: &AuditEvent) -> Result<(), StoreError>;
    async fn incr_rate(
        &self,
        project_id: &str,
        key_id: &str,
        minute: i64,
        ttl_seconds: u64,
    ) -> Result<i64, StoreError>;
    async fn bump_usage(
        &self,
        project_id: &str,
        key_id: &str,
        field: &str,
        delta: i64,
    ) -> Result<(), StoreError>;
    async fn set_usage_ts(
        &self,
        project_id: &str,
        key_id: &str,
        field: &str,
        ts: f64,
    ) -> Result<(), StoreError>;
}

impl ValidationStore for ValidatorStore {
    async fn get_key(&self, project_id: &str, key_id: &str) -> Result<KeyDoc, StoreError> {
        Self::get_key(self, project_id, key_id).await
    }

    async fn append_audit(&self, event: &AuditEvent) -> Result<(), StoreError> {
        Self::append_audit(self, event).await
    }

    async fn incr_rate(
        &self,
        project_id: &str,
        key_id: &str,
        minute: i64,
        ttl_seconds: u64,
    ) -> Result<i64, StoreError> {
        Self::incr_rate(self, project_id, key_id, minute, ttl_seconds).await
    }

    async fn bump_usage(
        &self,
        project_id: &str,
        key_id: &str,
        field: &str,
        delta: i64,
    ) -> Result<(), StoreError> {
        Self::bump_usage(self, project_id, key_id, field, delta).await
    }

    async fn set_usage_ts(
        &self,
        project_id: &str,
        key_id: &str,
        field: &str,
        ts: f64,
    ) -> Result<(), StoreError> {
        Self::set_usage_ts(self, project_id, key_id, field, ts).await
    }
}

/// Routing payload returned on a successful validation. Never carries the
/// verifier or any timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedKey {
    pub project_id: String,
    pub key_id: String,
    pub owner: String,
    pub metadata: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidateError {
    /// Malformed, missing, disabled, expired or wrong-secret credential.
    #[error("invalid or expired API key")]
    Denied,
    /// Per-key request budget for the current minute is spent.
    #[error("rate limit exceeded")]
    RateLimited,
    /// The store is unreachable or a round trip timed out.
    #[error("store unavailable")]
    Unavailable,
    /// Corrupted stored data or a non-retryable store failure.
    #[error("internal failure")]
    Internal,
}

/// Run the full validation pipeline for one bearer string.
///
/// `now` is the request's wall-clock time in epoch seconds; passing it in
/// keeps expiry and window arithmetic deterministic under test.
///
/// # Errors
/// See [`ValidateError`]; all denial causes collapse into `Denied`.
pub async fn validate_bearer<S: ValidationStore>(
    store: &S,
    verifier: &Verifier,
    limits: RateLimit,
    bearer: &str,
    now: f64,
) -> Result<ValidatedKey, ValidateError> {
    let Ok(credential) = Credential::parse(bearer) else {
        audit(store, AuditEvent::new("", "", AuditResult::Denied, now)).await;
        return Err(ValidateError::Denied);
    };

    let project_id = credential.project_id.as_str();
    let key_id = credential.key_id.as_str();

    let doc = match store.get_key(project_id, key_id).await {
        Ok(doc) => doc,
        Err(StoreError::NotFound) => {
            audit(
                store,
                AuditEvent::new(project_id, key_id, AuditResult::Denied, now),
            )
            .await;
            return Err(ValidateError::Denied);
        }
        Err(StoreError::Transient(_)) => return Err(ValidateError::Unavailable),
        Err(err) => {
            warn!("unusable key document for {project_id}:{key_id}: {err}");
            audit(
                store,
                AuditEvent::new(project_id, key_id, AuditResult::Denied, now),
            )
            .await;
            return Err(ValidateError::Internal);
        }
    };

    if doc.disabled {
        return deny(store, project_id, key_id, now).await;
    }

    if doc.is_expired(now) {
        return deny(store, project_id, key_id, now).await;
    }

    match verifier.verify(&credential.secret, &doc.secret_hash) {
        Ok(()) => {}
        Err(VerifierError::Mismatch) => {
            return deny(store, project_id, key_id, now).await;
        }
        Err(err) => {
            warn!("unusable verifier for {project_id}:{key_id}: {err}");
            audit(
                store,
                AuditEvent::new(project_id, key_id, AuditResult::Denied, now),
            )
            .await;
            return Err(ValidateError::Internal);
        }
    }

    let minute = RateLimit::window(now);
    let count = store
        .incr_rate(project_id, key_id, minute, limits.counter_ttl_seconds)
        .await
        .map_err(store_failure)?;

    if limits.exceeded(count) {
        audit(
            store,
            AuditEvent::new(project_id, key_id, AuditResult::RateLimited, now),
        )
        .await;
        return Err(ValidateError::RateLimited);
    }

    audit(
        store,
        AuditEvent::new(project_id, key_id, AuditResult::Ok, now),
    )
    .await;

    store
        .bump_usage(project_id, key_id, USAGE_FIELD_OK, 1)
        .await
        .map_err(store_failure)?;
    store
        .set_usage_ts(project_id, key_id, USAGE_FIELD_LAST_SEEN, now)
        .await
        .map_err(store_failure)?;

    Ok(ValidatedKey {
        project_id: doc.project_id,
        key_id: doc.key_id,
        owner: doc.owner,
        metadata: doc.metadata,
    })
}

/// Denial of a key that exists: audit it and charge the denied counter.
async fn deny<S: ValidationStore>(
    store: &S,
    project_id: &str,
    key_id: &str,
    now: f64,
) -> Result<ValidatedKey, ValidateError> {
    audit(
        store,
        AuditEvent::new(project_id, key_id, AuditResult::Denied, now),
    )
    .await;

    // Denied-counter accounting must not change the response.
    if let Err(err) = store
        .bump_usage(project_id, key_id, USAGE_FIELD_DENIED, 1)
        .await
    {
        warn!("failed to bump denied counter for {project_id}:{key_id}: {err}");
    }

    Err(ValidateError::Denied)
}

fn store_failure(err: StoreError) -> ValidateError {
    match err {
        StoreError::Transient(_) => ValidateError::Unavailable,
        _ => ValidateError::Internal,
    }
}

/// Audit writes are best-effort: failure is logged and swallowed.
async fn audit<S: ValidationStore>(store: &S, event: AuditEvent) {
    if let Err(err) = store.append_audit(&event).await {
        warn!("failed to append audit record: {err}");
    }
}
