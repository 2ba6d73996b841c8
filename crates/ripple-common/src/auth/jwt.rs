//! JWT utilities for session authentication
//!
//! Tokens carry the identity a gateway connection is bound to: the user id,
//! the device, and the platform. Signed HS256 via the `jsonwebtoken` crate.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id the session belongs to
    pub uid: String,
    /// Device presenting the token
    pub device_id: String,
    /// Client platform (ios / android / web)
    pub platform: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    /// Check if the token is expired
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.exp
    }
}

/// JWT service for encoding and decoding session tokens
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_expiry: i64,
}

impl JwtService {
    /// Create a new JWT service with the given secret and expiry (seconds)
    #[must_use]
    pub fn new(secret: &str, token_expiry: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            token_expiry,
        }
    }

    /// Issue a token for a session
    ///
    /// # Errors
    /// Returns an error if token encoding fails
    pub fn generate_token(
        &self,
        uid: &str,
        device_id: &str,
        platform: &str,
    ) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            uid: uid.to_string(),
            device_id: device_id.to_string(),
            platform: platform.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(self.token_expiry)).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to encode JWT: {e}")))
    }

    /// Decode and validate a token
    ///
    /// # Errors
    /// Returns `TokenExpired` past expiry, `InvalidToken` for anything else
    pub fn validate_token(&self, token: &str) -> Result<Claims, AppError> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::TokenExpired,
                _ => AppError::InvalidToken,
            })?;

        Ok(token_data.claims)
    }
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("token_expiry", &self.token_expiry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_service() -> JwtService {
        JwtService::new("test-secret-key-that-is-long-enough", 3600)
    }

    #[test]
    fn test_generate_and_validate() {
        let service = create_test_service();
        let token = service.generate_token("alice", "dev-1", "ios").unwrap();

        let claims = service.validate_token(&token).unwrap();
        assert_eq!(claims.uid, "alice");
        assert_eq!(claims.device_id, "dev-1");
        assert_eq!(claims.platform, "ios");
        assert!(!claims.is_expired());
    }

    #[test]
    fn test_invalid_token() {
        let service = create_test_service();
        let result = service.validate_token("invalid.token.here");
        assert!(matches!(result, Err(AppError::InvalidToken)));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let issuer = create_test_service();
        let verifier = JwtService::new("a-completely-different-secret", 3600);

        let token = issuer.generate_token("alice", "dev-1", "web").unwrap();
        assert!(matches!(
            verifier.validate_token(&token),
            Err(AppError::InvalidToken)
        ));
    }

    #[test]
    fn test_expired_token() {
        // Issue a token that expired an hour ago.
        let service = JwtService::new("test-secret-key-that-is-long-enough", -3600);
        let token = service.generate_token("alice", "dev-1", "web").unwrap();
        assert!(matches!(
            service.validate_token(&token),
            Err(AppError::TokenExpired)
        ));
    }
}
