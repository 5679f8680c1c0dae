pub mod password;
pub mod tokens;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::access::Role;
use crate::config;

/// Identity claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: Option<Role>,
    pub venue: Option<Uuid>,
    pub impersonating: Option<Uuid>,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(user_id: Uuid, email: String, role: Option<Role>, venue: Option<Uuid>) -> Self {
        let expiry_hours = config::config().security.jwt_expiry_hours;
        Self::with_ttl(user_id, email, role, venue, Duration::hours(expiry_hours as i64))
    }

    pub fn with_ttl(user_id: Uuid, email: String, role: Option<Role>, venue: Option<Uuid>, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id,
            email,
            role,
            venue,
            impersonating: None,
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        }
    }

    /// Short-lived token acting inside `venue_id`.
    pub fn impersonate(mut self, venue_id: Uuid) -> Self {
        let minutes = config::config().security.impersonation_expiry_minutes;
        let now = Utc::now();
        self.impersonating = Some(venue_id);
        self.iat = now.timestamp();
        self.exp = (now + Duration::minutes(minutes as i64)).timestamp();
        self
    }
}

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("JWT generation error: {0}")]
    TokenGeneration(String),

    #[error("Invalid JWT token: {0}")]
    InvalidToken(String),

    #[error("JWT secret not configured")]
    InvalidSecret,
}

fn secret() -> Result<&'static str, JwtError> {
    let secret = config::config().security.jwt_secret.as_str();
    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }
    Ok(secret)
}

pub fn generate_jwt(claims: &Claims) -> Result<String, JwtError> {
    encode_with_secret(claims, secret()?)
}

pub fn validate_jwt(token: &str) -> Result<Claims, JwtError> {
    decode_with_secret(token, secret()?)
}

pub fn encode_with_secret(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), claims, &encoding_key).map_err(|e| JwtError::TokenGeneration(e.to_string()))
}

pub fn decode_with_secret(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    decode::<Claims>(token, &decoding_key, &Validation::default())
        .map(|data| data.claims)
        .map_err(|e| JwtError::InvalidToken(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_claims() {
        let venue = Uuid::new_v4();
        let claims = Claims::with_ttl(
            Uuid::new_v4(),
            "staff@example.com".into(),
            Some(Role::Staff),
            Some(venue),
            Duration::hours(1),
        );
        let token = encode_with_secret(&claims, "s3cret").unwrap();
        let decoded = decode_with_secret(&token, "s3cret").unwrap();
        assert_eq!(decoded, claims);
    }

    #[test]
    fn rejects_wrong_secret_and_expired_tokens() {
        let claims = Claims::with_ttl(Uuid::new_v4(), "a@b.c".into(), None, None, Duration::hours(1));
        let token = encode_with_secret(&claims, "one").unwrap();
        assert!(matches!(decode_with_secret(&token, "two"), Err(JwtError::InvalidToken(_))));

        let expired = Claims::with_ttl(Uuid::new_v4(), "a@b.c".into(), None, None, Duration::hours(-2));
        let token = encode_with_secret(&expired, "one").unwrap();
        assert!(decode_with_secret(&token, "one").is_err());
    }

    #[test]
    fn impersonation_sets_venue_and_shortens_expiry() {
        let venue = Uuid::new_v4();
        let claims = Claims::with_ttl(Uuid::new_v4(), "root@x.io".into(), Some(Role::SuperAdmin), None, Duration::days(7))
            .impersonate(venue);
        assert_eq!(claims.impersonating, Some(venue));
        assert!(claims.exp < (Utc::now() + Duration::days(1)).timestamp());
    }
}
