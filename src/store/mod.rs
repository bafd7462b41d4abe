//! Typed gateway over the backing Redis keyspace.
//!
//! All key-name construction and document serialization lives here; no other
//! module talks to the store directly. Store-native failures never escape:
//! every operation reports one of the four [`StoreError`] kinds.
//!
//! Two access principals exist on the store side. [`ValidatorStore`] wraps a
//! connection authenticated as the read-mostly `validator` principal and
//! [`ManagerStore`] wraps the read-write `manager` principal, so the type
//! system keeps admin writes off the validation connection.

pub mod audit;
pub mod rate;

use crate::store::audit::AuditEvent;
use redis::{aio::ConnectionManager, ConnectionAddr, ConnectionInfo, RedisConnectionInfo};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;

/// Stream every validation outcome is appended to.
pub const AUDIT_STREAM: &str = "audit:keylookup";

/// Usage hash field bumped on successful validations.
pub const USAGE_FIELD_OK: &str = "validations_ok";
/// Usage hash field bumped on denials of an existing key.
pub const USAGE_FIELD_DENIED: &str = "validations_denied";
/// Usage hash field holding the last validation timestamp.
pub const USAGE_FIELD_LAST_SEEN: &str = "last_seen_ts";

// Per-round-trip deadline; requests span at most three round trips.
const OP_TIMEOUT: Duration = Duration::from_secs(1);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
    #[error("already exists")]
    AlreadyExists,
    /// The store is unreachable or the operation deadline expired. Retryable
    /// by a higher layer, never within a request.
    #[error("store unavailable: {0}")]
    Transient(String),
    /// Corrupted stored data or a non-retryable store failure.
    #[error("store failure: {0}")]
    Permanent(String),
}

impl StoreError {
    fn from_redis(err: &redis::RedisError) -> Self {
        if err.is_timeout()
            || err.is_connection_refusal()
            || err.is_connection_dropped()
            || err.is_io_error()
        {
            Self::Transient(err.to_string())
        } else {
            Self::Permanent(err.to_string())
        }
    }

    fn deadline() -> Self {
        Self::Transient("operation deadline exceeded".to_string())
    }
}

/// Persisted document for one issued credential, `apikey:{p}:{k}`.
///
/// The decoder rejects unknown fields so a corrupted or foreign document
/// surfaces as `Permanent` instead of being silently accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyDoc {
    pub key_id: String,
    pub project_id: String,
    pub owner: String,
    pub metadata: String,
    pub secret_hash: String,
    pub disabled: bool,
    pub created_at: f64,
    pub expires_at: Option<f64>,
}

impl KeyDoc {
    /// A key with `expires_at` exactly equal to `now` counts as expired.
    #[must_use]
    pub fn is_expired(&self, now: f64) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

/// Persisted project document, `project:{p}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectDoc {
    pub project_id: String,
    pub label: String,
    pub owner: String,
    pub created_at: f64,
}

/// Connection parameters for one store principal.
#[derive(Clone)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    pub db: i64,
    pub username: String,
    pub password: Option<SecretString>,
}

impl StoreConfig {
    fn connection_info(&self) -> ConnectionInfo {
        ConnectionInfo {
            addr: ConnectionAddr::Tcp(self.host.clone(), self.port),
            redis: RedisConnectionInfo {
                db: self.db,
                username: Some(self.username.clone()),
                password: self
                    .password
                    .as_ref()
                    .map(|secret| secret.expose_secret().to_string()),
                ..RedisConnectionInfo::default()
            },
        }
    }
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("db", &self.db)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

// Key-name templates. Every persisted entity is named here and nowhere else.

fn project_name(project_id: &str) -> String {
    format!("project:{project_id}")
}

fn apikey_name(project_id: &str, key_id: &str) -> String {
    format!("apikey:{project_id}:{key_id}")
}

fn index_name(project_id: &str) -> String {
    format!("apiprojectkeys:{project_id}")
}

fn usage_name(project_id: &str, key_id: &str) -> String {
    format!("apimeta:{project_id}:{key_id}")
}

fn ratelimit_name(project_id: &str, key_id: &str, minute: i64) -> String {
    format!("ratelimit:key:{project_id}:{key_id}:{minute}")
}

/// Deterministic pagination over an unordered member list: lexicographic sort
/// on `key_id`, then slice. `next` is the follow-up offset, or `None` when the
/// page was the last.
fn paginate(mut members: Vec<String>, offset: usize, limit: usize) -> (Vec<String>, Option<u64>) {
    members.sort();
    let total = members.len();
    let page: Vec<String> = members.into_iter().skip(offset).take(limit).collect();
    let next = match offset.checked_add(limit) {
        Some(end) if end < total => Some(end as u64),
        _ => None,
    };
    (page, next)
}

#[derive(Clone)]
struct StoreGateway {
    conn: ConnectionManager,
}

impl StoreGateway {
    async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let client = redis::Client::open(config.connection_info())
            .map_err(|err| StoreError::from_redis(&err))?;

        let conn = match timeout(CONNECT_TIMEOUT, client.get_connection_manager()).await {
            Ok(Ok(conn)) => conn,
            Ok(Err(err)) => return Err(StoreError::from_redis(&err)),
            Err(_) => return Err(StoreError::deadline()),
        };

        Ok(Self { conn })
    }

    async fn run<T: redis::FromRedisValue>(&self, cmd: &redis::Cmd) -> Result<T, StoreError> {
        let mut conn = self.conn.clone();
        match timeout(OP_TIMEOUT, cmd.query_async(&mut conn)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(StoreError::from_redis(&err)),
            Err(_) => Err(StoreError::deadline()),
        }
    }

    async fn run_pipe<T: redis::FromRedisValue>(
        &self,
        pipe: &redis::Pipeline,
    ) -> Result<T, StoreError> {
        let mut conn = self.conn.clone();
        match timeout(OP_TIMEOUT, pipe.query_async(&mut conn)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(StoreError::from_redis(&err)),
            Err(_) => Err(StoreError::deadline()),
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let _: String = self.run(&redis::cmd("PING")).await?;
        Ok(())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        name: &str,
    ) -> Result<T, StoreError> {
        let mut cmd = redis::cmd("JSON.GET");
        cmd.arg(name).arg("$");
        let raw: Option<String> = self.run(&cmd).await?;
        let raw = raw.ok_or(StoreError::NotFound)?;

        // JSON.GET with a `$` path wraps the root document in an array.
        let docs: Vec<T> = serde_json::from_str(&raw)
            .map_err(|err| StoreError::Permanent(format!("undecodable document {name}: {err}")))?;
        docs.into_iter().next().ok_or(StoreError::NotFound)
    }

    async fn put_json_create_only<T: Serialize>(
        &self,
        name: &str,
        doc: &T,
    ) -> Result<(), StoreError> {
        let body = serde_json::to_string(doc)
            .map_err(|err| StoreError::Permanent(format!("unencodable document {name}: {err}")))?;

        let mut cmd = redis::cmd("JSON.SET");
        cmd.arg(name).arg("$").arg(body).arg("NX");
        let reply: Option<String> = self.run(&cmd).await?;
        match reply {
            Some(_) => Ok(()),
            None => Err(StoreError::AlreadyExists),
        }
    }

    async fn get_key(&self, project_id: &str, key_id: &str) -> Result<KeyDoc, StoreError> {
        self.get_json(&apikey_name(project_id, key_id)).await
    }

    async fn put_key(&self, doc: &KeyDoc) -> Result<(), StoreError> {
        self.put_json_create_only(&apikey_name(&doc.project_id, &doc.key_id), doc)
            .await
    }

    async fn set_key_disabled(&self, project_id: &str, key_id: &str) -> Result<(), StoreError> {
        // XX: update the single field only when the document already exists.
        let mut cmd = redis::cmd("JSON.SET");
        cmd.arg(apikey_name(project_id, key_id))
            .arg("$.disabled")
            .arg("true")
            .arg("XX");
        let reply: Option<String> = self.run(&cmd).await?;
        match reply {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound),
        }
    }

    async fn add_key_to_index(&self, project_id: &str, key_id: &str) -> Result<(), StoreError> {
        let mut cmd = redis::cmd("SADD");
        cmd.arg(index_name(project_id)).arg(key_id);
        let _: i64 = self.run(&cmd).await?;
        Ok(())
    }

    async fn remove_key_from_index(
        &self,
        project_id: &str,
        key_id: &str,
    ) -> Result<(), StoreError> {
        let mut cmd = redis::cmd("SREM");
        cmd.arg(index_name(project_id)).arg(key_id);
        let _: i64 = self.run(&cmd).await?;
        Ok(())
    }

    async fn scan_index(
        &self,
        project_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<String>, Option<u64>), StoreError> {
        let mut cmd = redis::cmd("SMEMBERS");
        cmd.arg(index_name(project_id));
        let members: Vec<String> = self.run(&cmd).await?;
        Ok(paginate(members, offset, limit))
    }

    async fn get_project(&self, project_id: &str) -> Result<ProjectDoc, StoreError> {
        self.get_json(&project_name(project_id)).await
    }

    async fn put_project(&self, doc: &ProjectDoc) -> Result<(), StoreError> {
        self.put_json_create_only(&project_name(&doc.project_id), doc)
            .await
    }

    async fn append_audit(&self, event: &AuditEvent) -> Result<(), StoreError> {
        let mut cmd = redis::cmd("XADD");
        cmd.arg(AUDIT_STREAM).arg("*");
        for (field, value) in event.to_stream_fields() {
            cmd.arg(field).arg(value);
        }
        let _: String = self.run(&cmd).await?;
        Ok(())
    }

    async fn incr_rate(
        &self,
        project_id: &str,
        key_id: &str,
        minute: i64,
        ttl_seconds: u64,
    ) -> Result<i64, StoreError> {
        let name = ratelimit_name(project_id, key_id, minute);
        let mut pipe = redis::pipe();
        pipe.atomic()
            .cmd("INCR")
            .arg(&name)
            .cmd("EXPIRE")
            .arg(&name)
            .arg(ttl_seconds)
            .ignore();
        let (count,): (i64,) = self.run_pipe(&pipe).await?;
        Ok(count)
    }

    async fn init_usage(&self, project_id: &str, key_id: &str) -> Result<(), StoreError> {
        let mut cmd = redis::cmd("HSET");
        cmd.arg(usage_name(project_id, key_id))
            .arg(USAGE_FIELD_OK)
            .arg(0)
            .arg(USAGE_FIELD_DENIED)
            .arg(0)
            .arg(USAGE_FIELD_LAST_SEEN)
            .arg(0);
        let _: i64 = self.run(&cmd).await?;
        Ok(())
    }

    async fn bump_usage(
        &self,
        project_id: &str,
        key_id: &str,
        field: &str,
        delta: i64,
    ) -> Result<(), StoreError> {
        let mut cmd = redis::cmd("HINCRBY");
        cmd.arg(usage_name(project_id, key_id)).arg(field).arg(delta);
        let _: i64 = self.run(&cmd).await?;
        Ok(())
    }

    async fn set_usage_ts(
        &self,
        project_id: &str,
        key_id: &str,
        field: &str,
        ts: f64,
    ) -> Result<(), StoreError> {
        let mut cmd = redis::cmd("HSET");
        cmd.arg(usage_name(project_id, key_id))
            .arg(field)
            .arg(ts.to_string());
        let _: i64 = self.run(&cmd).await?;
        Ok(())
    }
}

/// Store access as the read-mostly `validator` principal.
///
/// Carries exactly the operations the validation pipeline needs; the store's
/// ACL layer enforces the same boundary server-side.
#[derive(Clone)]
pub struct ValidatorStore {
    gateway: StoreGateway,
}

impl ValidatorStore {
    /// Connect with validator credentials.
    ///
    /// # Errors
    /// Returns `Transient` when the store is unreachable.
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        Ok(Self {
            gateway: StoreGateway::connect(config).await?,
        })
    }

    /// # Errors
    /// Returns an error when the store does not answer a PING.
    pub async fn ping(&self) -> Result<(), StoreError> {
        self.gateway.ping().await
    }

    /// # Errors
    /// `NotFound` when no document exists for `(project_id, key_id)`.
    pub async fn get_key(&self, project_id: &str, key_id: &str) -> Result<KeyDoc, StoreError> {
        self.gateway.get_key(project_id, key_id).await
    }

    /// # Errors
    /// Returns an error when the stream append fails; callers treat this as
    /// best-effort.
    pub async fn append_audit(&self, event: &AuditEvent) -> Result<(), StoreError> {
        self.gateway.append_audit(event).await
    }

    /// Increment the per-minute rate counter and return the post-increment
    /// value. The increment and TTL refresh run in one atomic transaction.
    ///
    /// # Errors
    /// Returns an error when the store round trip fails.
    pub async fn incr_rate(
        &self,
        project_id: &str,
        key_id: &str,
        minute: i64,
        ttl_seconds: u64,
    ) -> Result<i64, StoreError> {
        self.gateway
            .incr_rate(project_id, key_id, minute, ttl_seconds)
            .await
    }

    /// # Errors
    /// Returns an error when the counter update fails.
    pub async fn bump_usage(
        &self,
        project_id: &str,
        key_id: &str,
        field: &str,
        delta: i64,
    ) -> Result<(), StoreError> {
        self.gateway.bump_usage(project_id, key_id, field, delta).await
    }

    /// # Errors
    /// Returns an error when the timestamp write fails.
    pub async fn set_usage_ts(
        &self,
        project_id: &str,
        key_id: &str,
        field: &str,
        ts: f64,
    ) -> Result<(), StoreError> {
        self.gateway.set_usage_ts(project_id, key_id, field, ts).await
    }
}

/// Store access as the read-write `manager` principal, used by admin
/// operations only.
#[derive(Clone)]
pub struct ManagerStore {
    gateway: StoreGateway,
}

impl ManagerStore {
    /// Connect with manager credentials.
    ///
    /// # Errors
    /// Returns `Transient` when the store is unreachable.
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        Ok(Self {
            gateway: StoreGateway::connect(config).await?,
        })
    }

    /// # Errors
    /// Returns an error when the store does not answer a PING.
    pub async fn ping(&self) -> Result<(), StoreError> {
        self.gateway.ping().await
    }

    /// # Errors
    /// `NotFound` when no document exists for `(project_id, key_id)`.
    pub async fn get_key(&self, project_id: &str, key_id: &str) -> Result<KeyDoc, StoreError> {
        self.gateway.get_key(project_id, key_id).await
    }

    /// Write a key document with create-only semantics.
    ///
    /// # Errors
    /// `AlreadyExists` when a document with the same name is present.
    pub async fn put_key(&self, doc: &KeyDoc) -> Result<(), StoreError> {
        self.gateway.put_key(doc).await
    }

    /// Set `disabled=true` on a key document, leaving every other field
    /// untouched.
    ///
    /// # Errors
    /// `NotFound` when the document is absent.
    pub async fn set_key_disabled(&self, project_id: &str, key_id: &str) -> Result<(), StoreError> {
        self.gateway.set_key_disabled(project_id, key_id).await
    }

    /// # Errors
    /// Returns an error when the membership write fails.
    pub async fn add_key_to_index(&self, project_id: &str, key_id: &str) -> Result<(), StoreError> {
        self.gateway.add_key_to_index(project_id, key_id).await
    }

    /// # Errors
    /// Returns an error when the membership write fails.
    pub async fn remove_key_from_index(
        &self,
        project_id: &str,
        key_id: &str,
    ) -> Result<(), StoreError> {
        self.gateway.remove_key_from_index(project_id, key_id).await
    }

    /// Page through a project's key ids in lexicographic order.
    ///
    /// # Errors
    /// Returns an error when the member scan fails.
    pub async fn scan_index(
        &self,
        project_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<String>, Option<u64>), StoreError> {
        self.gateway.scan_index(project_id, offset, limit).await
    }

    /// # Errors
    /// `NotFound` when the project document is absent.
    pub async fn get_project(&self, project_id: &str) -> Result<ProjectDoc, StoreError> {
        self.gateway.get_project(project_id).await
    }

    /// Write a project document with create-only semantics.
    ///
    /// # Errors
    /// `AlreadyExists` when the project is already present.
    pub async fn put_project(&self, doc: &ProjectDoc) -> Result<(), StoreError> {
        self.gateway.put_project(doc).await
    }

    /// # Errors
    /// Returns an error when the hash write fails.
    pub async fn init_usage(&self, project_id: &str, key_id: &str) -> Result<(), StoreError> {
        self.gateway.init_usage(project_id, key_id).await
    }
}
