//! Authentication utilities
//!
//! Provides:
//! - Argon2 password hashing for admin accounts
//! - JWT token generation and validation
//! - Actor extraction from a bearer token

use crate::errors::{AppError, Result};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Authenticated administrator, available to handlers as an extractor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    /// Username from the token subject
    pub actor: String,
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (admin username)
    pub sub: String,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    pub iat: i64,
}

/// JWT token manager
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiration_secs: i64,
}

impl JwtManager {
    /// Create a new JWT manager with the given secret
    pub fn new(secret: &str, expiration_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiration_secs: expiration_secs as i64,
        }
    }

    /// Token lifetime in seconds
    pub fn expiration_secs(&self) -> i64 {
        self.expiration_secs
    }

    /// Generate a new JWT token for `username`
    pub fn generate_token(&self, username: &str) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.expiration_secs);

        let claims = JwtClaims {
            sub: username.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| AppError::Internal {
            message: format!("Failed to generate token: {}", e),
        })
    }

    /// Validate and decode a JWT token
    pub fn validate_token(&self, token: &str) -> Result<JwtClaims> {
        decode::<JwtClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::ExpiredToken,
                _ => AppError::Unauthorized {
                    message: "Invalid token".to_string(),
                },
            })
    }
}

/// Random 256-bit signing secret, hex encoded
pub fn generate_secret() -> String {
    let random_bytes: [u8; 32] = rand::random();
    hex::encode(random_bytes)
}

/// Hash a password into an Argon2 PHC string
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut rand::rngs::OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal {
            message: format!("Failed to hash password: {}", e),
        })
}

/// Check a password against a stored PHC string.
///
/// A malformed stored hash counts as a mismatch.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "stored password hash is malformed");
            false
        }
    }
}

/// Extract the token from an Authorization header value
pub fn extract_bearer(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Axum extractor for AuthContext
impl<S> FromRequestParts<S> for AuthContext
where
    Arc<JwtManager>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized {
                message: "Missing Authorization header".to_string(),
            })?;

        let token = extract_bearer(auth_header).ok_or_else(|| AppError::Unauthorized {
            message: "Expected a Bearer token".to_string(),
        })?;

        let jwt = Arc::<JwtManager>::from_ref(state);
        let claims = jwt.validate_token(token)?;

        Ok(AuthContext { actor: claims.sub })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_roundtrip() {
        let hash = hash_password("correct horse").unwrap();

        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
        assert_ne!(hash, hash_password("correct horse").unwrap());
    }

    #[test]
    fn test_malformed_hash_never_verifies() {
        assert!(!verify_password("anything", "not-a-phc-string"));
        assert!(!verify_password("", ""));
    }

    #[test]
    fn test_generate_secret() {
        let secret = generate_secret();
        assert_eq!(secret.len(), 64);
        assert_ne!(secret, generate_secret());
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer("Bearer abc.def"), Some("abc.def"));
        assert_eq!(extract_bearer("Bearer "), None);
        assert_eq!(extract_bearer("abc.def"), None);
        assert_eq!(extract_bearer("Basic abc"), None);
    }

    #[test]
    fn test_jwt_roundtrip() {
        let manager = JwtManager::new("test_secret", 3600);

        let token = manager.generate_token("admin").unwrap();
        let claims = manager.validate_token(&token).unwrap();

        assert_eq!(claims.sub, "admin");
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_jwt_rejects_foreign_and_expired_tokens() {
        let ours = JwtManager::new("secret-a", 3600);
        let theirs = JwtManager::new("secret-b", 3600);
        let token = theirs.generate_token("mallory").unwrap();
        assert!(matches!(
            ours.validate_token(&token),
            Err(AppError::Unauthorized { .. })
        ));

        // Past the default 60s leeway
        let stale = JwtManager::new("secret-a", 0);
        let claims = JwtClaims {
            sub: "admin".into(),
            exp: Utc::now().timestamp() - 600,
            iat: Utc::now().timestamp() - 4200,
        };
        let expired = encode(&Header::default(), &claims, &stale.encoding_key).unwrap();
        assert!(matches!(ours.validate_token(&expired), Err(AppError::ExpiredToken)));
    }

    #[tokio::test]
    async fn test_extractor_reads_actor_from_bearer() {
        let jwt = Arc::new(JwtManager::new("secret", 60));
        let token = jwt.generate_token("registrar").unwrap();

        let (mut parts, _) = axum::http::Request::builder()
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .body(())
            .unwrap()
            .into_parts();
        let ctx = AuthContext::from_request_parts(&mut parts, &jwt).await.unwrap();
        assert_eq!(ctx.actor, "registrar");

        let (mut parts, _) = axum::http::Request::builder().body(()).unwrap().into_parts();
        let err = AuthContext::from_request_parts(&mut parts, &jwt).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized { .. }));
    }
}
