use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::auth::models::Role;
use crate::db::models::User;
use crate::error::AppError;

/// Claims carried by an AcsoGuard bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub role: Role,
    pub tenant_id: String,
    /// Issued-at (Unix seconds).
    pub iat: i64,
    /// Expiry (Unix seconds).
    pub exp: i64,
}

/// Longest token lifetime accepted; larger settings are clamped.
pub const MAX_TTL_HOURS: i64 = 24 * 365;

/// HS256 signing and verification keys, built once from the configured secret.
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl JwtKeys {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(ttl_hours.clamp(-MAX_TTL_HOURS, MAX_TTL_HOURS)),
        }
    }

    /// Issue a token for `user`.
    pub fn issue(&self, user: &User) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.clone(),
            role: user.role,
            tenant_id: user.tenant_id.clone(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("Failed to sign token: {e}")))
    }

    /// Verify signature and expiry, returning the claims.
    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| AppError::Auth(format!("Invalid token: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: "user-1".to_string(),
            email: "admin@example.com".to_string(),
            password_hash: String::new(),
            name: "Admin".to_string(),
            phone: None,
            role: Role::Admin,
            tenant_id: "user-1".to_string(),
            site_id: None,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_issue_and_verify() {
        let keys = JwtKeys::new("test-secret", 1);
        let token = keys.issue(&sample_user()).unwrap();

        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.tenant_id, "user-1");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = JwtKeys::new("secret-a", 1).issue(&sample_user()).unwrap();
        match JwtKeys::new("secret-b", 1).verify(&token) {
            Err(AppError::Auth(msg)) => assert!(msg.contains("Invalid token")),
            other => panic!("Expected Auth error, got: {:?}", other),
        }
    }

    #[test]
    fn test_expired_token_rejected() {
        // Negative TTL puts expiry well beyond the default 60s leeway.
        let keys = JwtKeys::new("test-secret", -2);
        let token = keys.issue(&sample_user()).unwrap();
        assert!(keys.verify(&token).is_err());
    }

    #[test]
    fn test_oversized_ttl_is_clamped() {
        let keys = JwtKeys::new("test-secret", i64::MAX);
        let claims = keys.verify(&keys.issue(&sample_user()).unwrap()).unwrap();
        assert_eq!(claims.exp - claims.iat, MAX_TTL_HOURS * 3600);
    }

    #[test]
    fn test_garbage_rejected() {
        let keys = JwtKeys::new("test-secret", 1);
        assert!(keys.verify("not-a-jwt").is_err());
    }
}
