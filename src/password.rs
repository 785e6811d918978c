//! Password hashing (argon2id, PHC string format)

use argon2::{
    Argon2,
    password_hash::{
        Error as HashError, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
        rand_core::OsRng,
    },
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PasswordError {
    #[error("Hashing failed: {0}")]
    Hash(String),

    #[error("Password does not match")]
    Mismatch,
}

pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::Hash(e.to_string()))?;
    Ok(hash.to_string())
}

/// Checks `password` against a stored PHC hash string
pub fn check_password(password: &str, hashed_password: &str) -> Result<(), PasswordError> {
    let parsed =
        PasswordHash::new(hashed_password).map_err(|e| PasswordError::Hash(e.to_string()))?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|e| match e {
            HashError::Password => PasswordError::Mismatch,
            other => PasswordError::Hash(other.to_string()),
        })
}
