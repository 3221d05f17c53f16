//! Password hashing and verification using Argon2id

use crate::{config::AppConfig, error::AppError};
use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString,
    },
    Algorithm, Argon2, Params, Version,
};
use thiserror::Error;

/// Why a candidate password was not accepted
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerifyError {
    #[error("password does not match")]
    Mismatch,

    #[error("stored password hash is malformed")]
    MalformedHash,
}

/// Password hasher with configurable parameters
pub struct PasswordHasher {
    argon2: Argon2<'static>,
}

impl PasswordHasher {
    /// Create hasher with default parameters (OWASP recommended)
    pub fn new() -> Self {
        // m=64MiB, t=3 iterations, p=4 lanes
        Self::with_argon2(Argon2::new(Algorithm::Argon2id, Version::V0x13, owasp_params()))
    }

    /// Create hasher with explicit cost parameters
    pub fn with_params(memory_kib: u32, iterations: u32, parallelism: u32) -> Result<Self, AppError> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| AppError::Config(format!("Invalid Argon2 params: {}", e)))?;

        Ok(Self::with_argon2(Argon2::new(Algorithm::Argon2id, Version::V0x13, params)))
    }

    /// Create hasher from the security section of the config
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        Self::with_params(
            config.security.argon2_memory_kib,
            config.security.argon2_iterations,
            config.security.argon2_parallelism,
        )
    }

    fn with_argon2(argon2: Argon2<'static>) -> Self {
        Self { argon2 }
    }

    /// Hash a password into a self-describing PHC string
    pub fn hash(&self, password: &str) -> Result<String, AppError> {
        let salt = SaltString::generate(&mut OsRng);

        let password_hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| {
                tracing::error!("Failed to hash password: {:?}", e);
                AppError::Internal(format!("Failed to hash password: {}", e))
            })?
            .to_string();

        Ok(password_hash)
    }

    /// Check a candidate password against a stored hash.
    ///
    /// The cost parameters and salt come from the stored hash itself, so hashes
    /// produced under older settings keep verifying. The final comparison is
    /// constant-time.
    pub fn check(&self, candidate: &str, stored_hash: &str) -> Result<(), VerifyError> {
        let parsed_hash = PasswordHash::new(stored_hash).map_err(|e| {
            tracing::debug!("Failed to parse password hash: {:?}", e);
            VerifyError::MalformedHash
        })?;

        match self.argon2.verify_password(candidate.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(()),
            Err(argon2::password_hash::Error::Password) => Err(VerifyError::Mismatch),
            Err(e) => {
                tracing::debug!("Password hash rejected by verifier: {:?}", e);
                Err(VerifyError::MalformedHash)
            }
        }
    }

    /// Boolean form of [`check`](Self::check)
    pub fn verify(&self, candidate: &str, stored_hash: &str) -> bool {
        self.check(candidate, stored_hash).is_ok()
    }

    /// Validate password against policy
    pub fn validate_password_policy(password: &str, config: &AppConfig) -> Result<(), AppError> {
        let min_length = config.security.password_min_length;

        if password.chars().count() < min_length {
            return Err(AppError::BadRequest(format!(
                "Password must be at least {} characters",
                min_length
            )));
        }

        Ok(())
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new()
    }
}

fn owasp_params() -> Params {
    Params::new(65536, 3, 4, None).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_hasher() -> PasswordHasher {
        PasswordHasher::with_params(1024, 1, 1).unwrap()
    }

    #[test]
    fn test_hash_and_verify() {
        let hasher = fast_hasher();
        let password = "TestPassword123!";

        let hash = hasher.hash(password).unwrap();
        assert!(hasher.verify(password, &hash));
        assert!(hash.starts_with("$argon2id$"));
    }

    #[test]
    fn test_verify_fails_with_wrong_password() {
        let hasher = fast_hasher();
        let hash = hasher.hash("TestPassword123!").unwrap();

        assert_eq!(hasher.check("WrongPassword", &hash), Err(VerifyError::Mismatch));
        assert!(!hasher.verify("TestPassword123", &hash));
    }

    #[test]
    fn test_hash_is_different_each_time() {
        let hasher = fast_hasher();
        let password = "TestPassword123!";

        let hash1 = hasher.hash(password).unwrap();
        let hash2 = hasher.hash(password).unwrap();

        // Hashes should be different due to salt
        assert_ne!(hash1, hash2);

        // But both should verify correctly
        assert!(hasher.verify(password, &hash1));
        assert!(hasher.verify(password, &hash2));
    }

    #[test]
    fn test_malformed_hash_is_not_a_panic() {
        let hasher = fast_hasher();
        assert_eq!(hasher.check("anything", "not-a-phc-string"), Err(VerifyError::MalformedHash));
        assert_eq!(hasher.check("anything", ""), Err(VerifyError::MalformedHash));
        assert!(!hasher.verify("anything", "$argon2id$v=19$broken"));
    }

    #[test]
    fn test_verification_uses_embedded_params() {
        let weak = fast_hasher();
        let stronger = PasswordHasher::with_params(2048, 2, 1).unwrap();

        let hash = weak.hash("same-password").unwrap();
        assert!(stronger.verify("same-password", &hash));
    }

    #[test]
    fn test_invalid_params_rejected() {
        assert!(PasswordHasher::with_params(1, 0, 0).is_err());
    }
}
