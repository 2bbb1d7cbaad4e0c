//! Session token signing and password hashing.

use std::time::Duration;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: i64,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
    /// Random per-token id; keeps tokens minted in the same second distinct.
    pub jti: String,
}

/// A freshly signed token and the instant its session row should expire.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Signs and verifies HS256 session tokens.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn issue(&self, user_id: i64, email: &str) -> AppResult<IssuedToken> {
        let now = Utc::now();
        let ttl = chrono::Duration::from_std(self.ttl)
            .map_err(|e| AppError::Internal(format!("token lifetime out of range: {e}")))?;
        let expires_at = now + ttl;

        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::default(), &claims, &self.encoding)?;
        Ok(IssuedToken { token, expires_at })
    }

    pub fn verify(&self, token: &str) -> AppResult<Claims> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())?;
        Ok(data.claims)
    }
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {e}")))
}

/// Returns `Ok(false)` on a mismatch; only a corrupt stored hash is an error.
pub fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("Invalid stored hash: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::errors::ErrorKind;

    fn service() -> TokenService {
        TokenService::new("test-secret-key-for-jwt", Duration::from_secs(3600))
    }

    #[test]
    fn issued_token_verifies() {
        let tokens = service();
        let issued = tokens.issue(42, "reader@example.com").expect("issue");
        let claims = tokens.verify(&issued.token).expect("verify");

        assert_eq!(claims.sub, 42);
        assert_eq!(claims.email, "reader@example.com");
        assert_eq!(claims.exp, issued.expires_at.timestamp());
    }

    #[test]
    fn tokens_minted_back_to_back_differ() {
        let tokens = service();
        let a = tokens.issue(1, "a@example.com").expect("issue");
        let b = tokens.issue(1, "a@example.com").expect("issue");
        assert_ne!(a.token, b.token);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let issued = service().issue(7, "x@example.com").expect("issue");
        let other = TokenService::new("another-secret", Duration::from_secs(3600));
        assert!(matches!(other.verify(&issued.token), Err(AppError::Jwt(_))));
    }

    #[test]
    fn expired_token_reports_expiry() {
        let now = Utc::now();
        let claims = Claims {
            sub: 1,
            email: "old@example.com".into(),
            iat: (now - chrono::Duration::hours(3)).timestamp(),
            exp: (now - chrono::Duration::hours(2)).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test-secret-key-for-jwt"),
        )
        .expect("encode");

        match service().verify(&token) {
            Err(AppError::Jwt(e)) => assert_eq!(e.kind(), &ErrorKind::ExpiredSignature),
            other => panic!("expected expiry error, got {other:?}"),
        }
    }

    #[test]
    fn password_round_trip() {
        let hash = hash_password("correct horse").expect("hash");
        assert!(verify_password("correct horse", &hash).expect("verify"));
        assert!(!verify_password("battery staple", &hash).expect("verify"));
    }
}
