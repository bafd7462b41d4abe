//! Bearer credential codec.
//!
//! A bearer credential is four dot-separated segments:
//! `sk-proj.{project_id}.{key_id}.{secret}`. Parsing is all-or-nothing so a
//! caller cannot tell which segment was wrong; every violation reports the
//! same error.

use anyhow::{Context, Result};
use rand::{rngs::OsRng, RngCore};
use regex::Regex;
use thiserror::Error;

/// Literal first segment of every bearer credential.
pub const BEARER_PREFIX: &str = "sk-proj";

const KEY_ID_PREFIX: &str = "k_";
const KEY_ID_RANDOM_LEN: usize = 7;
const SECRET_LEN: usize = 32;

const KEY_ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
// 64 characters so a random byte maps onto the alphabet without bias.
const SECRET_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

#[derive(Debug, Error, PartialEq, Eq)]
#[error("malformed credential")]
pub struct MalformedCredential;

/// Parsed components of a bearer credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub project_id: String,
    pub key_id: String,
    pub secret: String,
}

impl Credential {
    /// Parse a bearer string into its components.
    ///
    /// # Errors
    /// Returns `MalformedCredential` on any violation of the segment grammar.
    pub fn parse(bearer: &str) -> Result<Self, MalformedCredential> {
        let parts: Vec<&str> = bearer.split('.').collect();
        let [prefix, project_id, key_id, secret] = parts[..] else {
            return Err(MalformedCredential);
        };

        if prefix != BEARER_PREFIX
            || !valid_project_id(project_id)
            || !valid_key_id(key_id)
            || !valid_secret(secret)
        {
            return Err(MalformedCredential);
        }

        Ok(Self {
            project_id: project_id.to_string(),
            key_id: key_id.to_string(),
            secret: secret.to_string(),
        })
    }

    /// Format the components back into a bearer string. Inverse of [`parse`].
    ///
    /// [`parse`]: Credential::parse
    #[must_use]
    pub fn format(&self) -> String {
        format!(
            "{BEARER_PREFIX}.{}.{}.{}",
            self.project_id, self.key_id, self.secret
        )
    }
}

/// Project identifiers are opaque, URL-safe and at most 64 characters.
pub fn valid_project_id(project_id: &str) -> bool {
    Regex::new(r"^[A-Za-z0-9_-]{1,64}$").is_ok_and(|re| re.is_match(project_id))
}

/// Key identifiers carry the `k_` prefix followed by a short random token.
pub fn valid_key_id(key_id: &str) -> bool {
    Regex::new(r"^k_[A-Za-z0-9_-]{4,32}$").is_ok_and(|re| re.is_match(key_id))
}

/// Secrets are URL-safe tokens between 16 and 128 characters.
pub fn valid_secret(secret: &str) -> bool {
    Regex::new(r"^[A-Za-z0-9_-]{16,128}$").is_ok_and(|re| re.is_match(secret))
}

/// Generate a new key identifier, e.g. `k_2J6Hqk3`.
///
/// # Errors
/// Returns an error if the system randomness source fails.
pub fn generate_key_id() -> Result<String> {
    let random = random_string(KEY_ID_ALPHABET, KEY_ID_RANDOM_LEN)?;
    Ok(format!("{KEY_ID_PREFIX}{random}"))
}

/// Generate a new 32-character secret from the URL-safe alphabet.
///
/// # Errors
/// Returns an error if the system randomness source fails.
pub fn generate_secret() -> Result<String> {
    random_string(SECRET_ALPHABET, SECRET_LEN)
}

fn random_string(alphabet: &[u8], len: usize) -> Result<String> {
    let mut bytes = vec![0u8; len];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to draw randomness for credential generation")?;

    let mut out = String::with_capacity(len);
    for byte in bytes {
        let idx = usize::from(byte) % alphabet.len();
        if let Some(&ch) = alphabet.get(idx) {
            out.push(ch as char);
        }
    }
    Ok(out)
}
