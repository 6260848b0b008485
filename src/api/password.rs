//! Password hashing for stored credentials.
//!
//! Passwords are hashed with Argon2id and a random per-password salt; the PHC
//! string (algorithm, parameters, salt and hash) is what ends up in the
//! `users.password` column.

use argon2::{Algorithm, Argon2, Params, PasswordHasher, Version, password_hash::SaltString};
use rand::rngs::OsRng;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MEMORY_KIB: u32 = 19 * 1024;
const ITERATIONS: u32 = 2;
const LANES: u32 = 1;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("invalid argon2 parameters: {0}")]
    Params(argon2::Error),
    #[error("failed to hash password: {0}")]
    Hash(argon2::password_hash::Error),
    #[error("hashing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

fn hasher() -> Result<Argon2<'static>, PasswordError> {
    let params = Params::new(MEMORY_KIB, ITERATIONS, LANES, None).map_err(PasswordError::Params)?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hash a password, returning its PHC string.
///
/// # Errors
/// Returns an error if hashing fails.
pub fn hash_password(password: &SecretString) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = hasher()?
        .hash_password(password.expose_secret().as_bytes(), &salt)
        .map_err(PasswordError::Hash)?;
    Ok(hash.to_string())
}

/// [`hash_password`] on the blocking pool, for use from request handlers.
///
/// # Errors
/// Returns an error if hashing fails or the blocking task panics.
pub async fn hash_password_blocking(password: SecretString) -> Result<String, PasswordError> {
    tokio::task::spawn_blocking(move || hash_password(&password)).await?
}
