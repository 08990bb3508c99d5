//! HS256 access tokens.
//!
//! A token identifies the user and carries the profile role current at
//! login. There are no refresh tokens; clients log in again on expiry.

use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use taskflow_core::types::DbId;
use uuid::Uuid;

pub type TokenResult<T> = Result<T, jsonwebtoken::errors::Error>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: DbId,
    /// `admin` or `member`.
    pub role: String,
    pub exp: i64,
    pub iat: i64,
    /// Random per-token id, useful when correlating logs.
    pub jti: String,
}

impl Claims {
    fn issue(user_id: DbId, role: &str, lifetime_secs: i64) -> Self {
        let iat = Utc::now().timestamp();
        Self {
            sub: user_id,
            role: role.to_owned(),
            exp: iat + lifetime_secs,
            iat,
            jti: Uuid::new_v4().to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Shared signing secret.
    pub secret: String,
    pub access_token_expiry_mins: i64,
}

impl JwtConfig {
    /// Reads `JWT_SECRET` (required, non-empty) and
    /// `JWT_ACCESS_EXPIRY_MINS` (default 15).
    ///
    /// # Panics
    ///
    /// Panics when the secret is missing or the expiry is not an integer.
    pub fn from_env() -> Self {
        let secret = std::env::var("JWT_SECRET").unwrap_or_default();
        assert!(!secret.is_empty(), "JWT_SECRET must be set to a non-empty value");

        let access_token_expiry_mins = match std::env::var("JWT_ACCESS_EXPIRY_MINS") {
            Ok(raw) => raw
                .parse()
                .unwrap_or_else(|_| panic!("JWT_ACCESS_EXPIRY_MINS is not an integer: {raw}")),
            Err(_) => 15,
        };

        Self {
            secret,
            access_token_expiry_mins,
        }
    }

    /// Token lifetime in seconds, as reported in the login response.
    pub fn access_token_expiry_secs(&self) -> i64 {
        self.access_token_expiry_mins * 60
    }

    fn encoding_key(&self) -> EncodingKey {
        EncodingKey::from_secret(self.secret.as_bytes())
    }

    fn decoding_key(&self) -> DecodingKey {
        DecodingKey::from_secret(self.secret.as_bytes())
    }
}

pub fn generate_access_token(user_id: DbId, role: &str, config: &JwtConfig) -> TokenResult<String> {
    let claims = Claims::issue(user_id, role, config.access_token_expiry_secs());
    encode(&Header::default(), &claims, &config.encoding_key())
}

/// Check signature and expiry and return the claims.
pub fn validate_token(token: &str, config: &JwtConfig) -> TokenResult<Claims> {
    decode::<Claims>(token, &config.decoding_key(), &Validation::default()).map(|data| data.claims)
}
