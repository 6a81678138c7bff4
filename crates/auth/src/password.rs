//! Credential verification using Argon2id.

use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// The stored hash could not be parsed (corrupt row, wrong format).
    /// Distinct from a mismatch: this is an operational fault, not a
    /// failed login.
    #[error("stored credential hash is malformed")]
    MalformedHash,

    #[error("credential hashing failed: {0}")]
    Hash(String),
}

/// Verify a candidate secret against a stored Argon2id PHC-format hash.
///
/// Returns `Ok(true)` on match, `Ok(false)` on mismatch. The comparison is
/// performed by the Argon2 primitive and is constant-time with respect to
/// the candidate. The candidate is never logged.
pub fn verify_password(candidate: &str, stored_hash: &str) -> Result<bool, CredentialError> {
    let parsed = argon2::PasswordHash::new(stored_hash)
        .map_err(|_| CredentialError::MalformedHash)?;

    match Argon2::default().verify_password(candidate.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(_) => Err(CredentialError::MalformedHash),
    }
}

/// Hash a secret for storage (PHC string, random salt).
///
/// Used when creating staff accounts and by the startup bootstrap.
pub fn hash_password(secret: &str) -> Result<String, CredentialError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| CredentialError::Hash(e.to_string()))
}
