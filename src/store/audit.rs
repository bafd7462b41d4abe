//! Append-only audit records for validation outcomes.

/// Constant tag identifying this service in audit records.
pub const AUDIT_CLIENT_TAG: &str = "chiavi";

/// Terminal outcome of one validation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditResult {
    Ok,
    Denied,
    RateLimited,
}

impl AuditResult {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Denied => "denied",
            Self::RateLimited => "rate_limited",
        }
    }
}

/// One entry in the `audit:keylookup` stream.
///
/// `project_id` and `key_id` are empty when the bearer string never parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEvent {
    pub ts: f64,
    pub project_id: String,
    pub key_id: String,
    pub result: AuditResult,
}

impl AuditEvent {
    #[must_use]
    pub fn new(project_id: &str, key_id: &str, result: AuditResult, ts: f64) -> Self {
        Self {
            ts,
            project_id: project_id.to_string(),
            key_id: key_id.to_string(),
            result,
        }
    }

    /// Field/value pairs in stream order.
    #[must_use]
    pub fn to_stream_fields(&self) -> [(&'static str, String); 5] {
        [
            ("ts", self.ts.to_string()),
            ("project_id", self.project_id.clone()),
            ("key_id", self.key_id.clone()),
            ("result", self.result.as_str().to_string()),
            ("client", AUDIT_CLIENT_TAG.to_string()),
        ]
    }
}
