//! Signed bearer tokens. The server issues a short-lived HS256 JWT at
//! register/login; handlers take identity from the verified claims instead of
//! trusting client-held username/tier fields.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::user::{Role, User};

/// Token payload: identity and role only. Tier is not carried in the token —
/// it can change while a token is live, so it is always read from the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Username (subject).
    pub sub: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JwtKeys {
    pub fn new(secret: &str) -> Self {
        JwtKeys {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn issue(&self, user: &User, ttl_hours: i64) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.username.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: (now + Duration::hours(ttl_hours)).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("token signing failed: {e}")))
    }

    /// Verifies signature and expiry. Any failure is `Unauthorized`; the
    /// caller never learns whether the token was malformed, tampered with,
    /// or expired.
    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| AppError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiers::Tier;

    fn test_user() -> User {
        User {
            username: "abc".to_string(),
            password_hash: String::new(),
            role: Role::User,
            tier: Tier::Free,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_issue_then_verify() {
        let keys = JwtKeys::new("test-secret-at-least-32-characters!!");
        let token = keys.issue(&test_user(), 24).unwrap();
        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.sub, "abc");
        assert_eq!(claims.role, Role::User);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let keys = JwtKeys::new("test-secret-at-least-32-characters!!");
        let token = keys.issue(&test_user(), 24).unwrap();
        let other = JwtKeys::new("a-completely-different-signing-key!!");
        assert!(matches!(
            other.verify(&token),
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn test_tampered_token_rejected() {
        let keys = JwtKeys::new("test-secret-at-least-32-characters!!");
        let mut token = keys.issue(&test_user(), 24).unwrap();
        token.push('x');
        assert!(keys.verify(&token).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let keys = JwtKeys::new("test-secret-at-least-32-characters!!");
        // Issued two hours in the past; default validation leeway is 60s.
        let token = keys.issue(&test_user(), -2).unwrap();
        assert!(matches!(keys.verify(&token), Err(AppError::Unauthorized)));
    }
}
