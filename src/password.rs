use argon2::{Algorithm, Argon2, Params, PasswordHasher as _, PasswordVerifier as _, Version};
use password_hash::{PasswordHash, SaltString};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("salt generation failed: {0}")]
    Salt(String),
    #[error("argon2: {0}")]
    Argon2(String),
}

/// PasswordHasher
///
/// One-way salted hashing of plaintext passwords. Hashes are Argon2id PHC
/// strings, so each one carries its own salt and cost parameters and can be
/// verified after the configured costs change.
#[derive(Clone, Default)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
}

pub type HasherState = Arc<PasswordHasher>;

impl PasswordHasher {
    /// Builds a hasher with explicit Argon2id costs. Missing values fall back
    /// to the crate defaults.
    pub fn with_params(
        m_cost: Option<u32>,
        t_cost: Option<u32>,
        p_cost: Option<u32>,
    ) -> Result<Self, PasswordError> {
        let params = Params::new(
            m_cost.unwrap_or(Params::DEFAULT_M_COST),
            t_cost.unwrap_or(Params::DEFAULT_T_COST),
            p_cost.unwrap_or(Params::DEFAULT_P_COST),
            None,
        )
        .map_err(|e| PasswordError::Argon2(e.to_string()))?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    /// hash
    ///
    /// Hashes `plaintext` under a fresh 16-byte random salt. Two calls with the
    /// same input give different strings.
    pub fn hash(&self, plaintext: &str) -> Result<String, PasswordError> {
        let mut salt_bytes = [0u8; 16];
        getrandom::getrandom(&mut salt_bytes).map_err(|e| PasswordError::Salt(e.to_string()))?;
        let salt =
            SaltString::encode_b64(&salt_bytes).map_err(|e| PasswordError::Salt(e.to_string()))?;

        let phc = self
            .argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| PasswordError::Argon2(e.to_string()))?
            .to_string();
        Ok(phc)
    }

    /// verify
    ///
    /// True iff `plaintext` produced `hash`. The derived output is compared in
    /// constant time by the argon2 verifier. A stored hash that does not parse
    /// is a mismatch.
    pub fn verify(&self, plaintext: &str, hash: &str) -> bool {
        match PasswordHash::new(hash) {
            Ok(parsed) => self
                .argon2
                .verify_password(plaintext.as_bytes(), &parsed)
                .is_ok(),
            Err(e) => {
                tracing::warn!(error = %e, "stored password hash is malformed");
                false
            }
        }
    }
}
