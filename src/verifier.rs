//! Argon2id secret verifiers.
//!
//! The service never stores a key's secret. It stores a PHC-encoded Argon2id
//! verifier (algorithm tag, parameters, salt and digest) and recomputes the
//! hash on every presentation. Verification parameters are read back from the
//! stored string, so verifiers minted under older parameters keep working.

use anyhow::{anyhow, Result};
use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
};
use thiserror::Error;

/// Default iteration count.
pub const DEFAULT_TIME_COST: u32 = 3;
/// Default memory cost in KiB (64 MiB).
pub const DEFAULT_MEMORY_KIB: u32 = 65536;
/// Default lane count.
pub const DEFAULT_PARALLELISM: u32 = 1;

const HASH_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum VerifierError {
    /// The presented secret does not match the stored verifier.
    #[error("secret does not match stored verifier")]
    Mismatch,
    /// The stored verifier string cannot be parsed or recomputed.
    #[error("stored verifier is malformed: {0}")]
    Malformed(String),
    /// Deriving a fresh verifier failed.
    #[error("failed to derive verifier: {0}")]
    Derive(String),
}

/// Argon2id parameters used when minting new verifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifierParams {
    pub time_cost: u32,
    pub memory_kib: u32,
    pub parallelism: u32,
}

impl Default for VerifierParams {
    fn default() -> Self {
        Self {
            time_cost: DEFAULT_TIME_COST,
            memory_kib: DEFAULT_MEMORY_KIB,
            parallelism: DEFAULT_PARALLELISM,
        }
    }
}

/// Derives and checks Argon2id verifiers.
#[derive(Debug, Clone)]
pub struct Verifier {
    hasher: Argon2<'static>,
}

impl Verifier {
    /// Build a verifier from the given parameters.
    ///
    /// # Errors
    /// Returns an error if the parameter combination is rejected by Argon2.
    pub fn new(params: VerifierParams) -> Result<Self> {
        let params = Params::new(
            params.memory_kib,
            params.time_cost,
            params.parallelism,
            Some(HASH_LEN),
        )
        .map_err(|err| anyhow!("invalid Argon2id parameters: {err}"))?;

        Ok(Self {
            hasher: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    /// Derive a PHC-encoded verifier for a secret with a fresh random salt.
    ///
    /// # Errors
    /// Returns `VerifierError::Derive` if hashing fails.
    pub fn hash(&self, secret: &str) -> Result<String, VerifierError> {
        let salt = SaltString::generate(&mut OsRng);
        self.hasher
            .hash_password(secret.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|err| VerifierError::Derive(err.to_string()))
    }

    /// Check a presented secret against a stored verifier.
    ///
    /// Comparison of the recomputed digest is constant-time.
    ///
    /// # Errors
    /// Returns `VerifierError::Mismatch` on a wrong secret and
    /// `VerifierError::Malformed` when the stored string is unusable.
    pub fn verify(&self, secret: &str, encoded: &str) -> Result<(), VerifierError> {
        let parsed =
            PasswordHash::new(encoded).map_err(|err| VerifierError::Malformed(err.to_string()))?;

        self.hasher
            .verify_password(secret.as_bytes(), &parsed)
            .map_err(|err| match err {
                argon2::password_hash::Error::Password => VerifierError::Mismatch,
                other => VerifierError::Malformed(other.to_string()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    // Cheap parameters so the suite stays fast; production defaults are
    // exercised in `encodes_configured_parameters`.
    fn test_verifier() -> Result<Verifier> {
        Verifier::new(VerifierParams {
            time_cost: 1,
            memory_kib: 8,
            parallelism: 1,
        })
    }

    #[test]
    fn hash_verify_round_trip() -> Result<()> {
        let verifier = test_verifier()?;
        let encoded = verifier.hash("correct-horse-battery")?;
        verifier.verify("correct-horse-battery", &encoded)?;
        Ok(())
    }

    #[test]
    fn wrong_secret_is_mismatch() -> Result<()> {
        let verifier = test_verifier()?;
        let encoded = verifier.hash("correct-horse-battery")?;
        let result = verifier.verify("tampered", &encoded);
        assert!(matches!(result, Err(VerifierError::Mismatch)));
        Ok(())
    }

    #[test]
    fn unparseable_verifier_is_malformed() -> Result<()> {
        let verifier = test_verifier()?;
        let result = verifier.verify("anything", "not-a-phc-string");
        assert!(matches!(result, Err(VerifierError::Malformed(_))));
        Ok(())
    }

    #[test]
    fn salts_are_per_secret() -> Result<()> {
        let verifier = test_verifier()?;
        let first = verifier.hash("same-secret")?;
        let second = verifier.hash("same-secret")?;
        assert_ne!(first, second);
        verifier.verify("same-secret", &first)?;
        verifier.verify("same-secret", &second)?;
        Ok(())
    }

    #[test]
    fn encodes_configured_parameters() -> Result<()> {
        let verifier = Verifier::new(VerifierParams::default())?;
        let encoded = verifier.hash("secret-value")?;
        assert!(encoded.starts_with("$argon2id$"));
        assert!(encoded.contains("m=65536,t=3,p=1"));
        Ok(())
    }

    #[test]
    fn old_parameters_remain_verifiable() -> Result<()> {
        // A verifier minted with different parameters must still check out:
        // the parameters are read back from the encoded string.
        let old = Verifier::new(VerifierParams {
            time_cost: 2,
            memory_kib: 16,
            parallelism: 1,
        })?;
        let encoded = old.hash("legacy-secret")?;

        let current = test_verifier()?;
        current.verify("legacy-secret", &encoded)?;
        Ok(())
    }

    #[test]
    fn rejects_invalid_parameters() {
        let result = Verifier::new(VerifierParams {
            time_cost: 0,
            memory_kib: 8,
            parallelism: 1,
        });
        assert!(result.is_err());
    }
}
