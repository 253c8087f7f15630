use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use shared::domain::Principal;

const ISSUER: &str = "presskit-dev-identity";

#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub secret: String,
    pub ttl_seconds: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    iss: String,
    sub: String,
    iat: i64,
    exp: i64,
}

/// Stable principal derived from a login name.
///
/// Names are compared case-insensitively and the digest is rendered as
/// dash-separated groups of five hex characters.
pub fn principal_for_username(username: &str) -> Principal {
    let mut hasher = Sha256::new();
    hasher.update(ISSUER.as_bytes());
    hasher.update(b":");
    hasher.update(username.trim().to_lowercase().as_bytes());
    let digest = hex::encode(hasher.finalize());

    let groups: Vec<&str> = digest
        .as_bytes()
        .chunks(5)
        .take(6)
        .filter_map(|chunk| std::str::from_utf8(chunk).ok())
        .collect();
    Principal(groups.join("-"))
}

pub fn mint_session_token(
    cfg: &IdentityConfig,
    principal: &Principal,
) -> Result<(String, DateTime<Utc>), jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let expires_at = now + Duration::seconds(cfg.ttl_seconds);
    let claims = SessionClaims {
        iss: ISSUER.to_string(),
        sub: principal.as_str().to_string(),
        iat: now.timestamp(),
        exp: expires_at.timestamp(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(cfg.secret.as_bytes()),
    )?;
    Ok((token, expires_at))
}

pub fn verify_session_token(
    cfg: &IdentityConfig,
    token: &str,
) -> Result<Principal, jsonwebtoken::errors::Error> {
    let mut validation = Validation::default();
    validation.set_issuer(&[ISSUER]);
    let decoded = decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(cfg.secret.as_bytes()),
        &validation,
    )?;
    Ok(Principal(decoded.claims.sub))
}

#[cfg(test)]
#[path = "tests/identity_tests.rs"]
mod tests;
