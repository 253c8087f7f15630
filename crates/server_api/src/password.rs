use anyhow::{anyhow, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use storage::PasswordCredential;
use tracing::warn;

/// Argon2id credential for `password`, stored as a PHC string.
pub fn hash_password(password: &str) -> Result<PasswordCredential> {
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| anyhow!("password hashing failed: {err}"))?;
    Ok(PasswordCredential { password_hash })
}

/// False for a wrong candidate and for a stored hash that does not parse.
pub fn verify_password(credential: &PasswordCredential, candidate: &str) -> bool {
    let parsed = match PasswordHash::new(&credential.password_hash) {
        Ok(parsed) => parsed,
        Err(error) => {
            warn!(%error, "password: stored hash is not a valid PHC string");
            return false;
        }
    };
    Argon2::default()
        .verify_password(candidate.as_bytes(), &parsed)
        .is_ok()
}
