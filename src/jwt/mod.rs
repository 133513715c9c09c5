//! JWT token handling

use crate::config::JwtConfig;
use crate::domain::{StringUuid, User};
use crate::error::{AppError, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

pub const TOKEN_TYPE_ACCESS: &str = "access";
pub const TOKEN_TYPE_REFRESH: &str = "refresh";

/// Claims carried by both access and refresh tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub uid: String,
    pub login: String,
    pub role: String,
    /// Token type discriminator (prevents using a refresh token as an access token)
    pub token_type: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    pub fn user_id(&self) -> Result<StringUuid> {
        self.uid
            .parse()
            .map_err(|_| AppError::InvalidArgument("invalid token: malformed uid".to_string()))
    }
}

/// Access and refresh token issued together
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

/// HS256 token issuer and verifier holding the process-wide signing secret
#[derive(Clone)]
pub struct TokenManager {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl TokenManager {
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());
        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// Validation with a 5 second leeway instead of the default 60.
    fn strict_validation(&self) -> Validation {
        let mut v = Validation::new(Algorithm::HS256);
        v.leeway = 5;
        v.validate_aud = false;
        v
    }

    fn sign(&self, user: &User, token_type: &str, ttl_secs: i64) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(ttl_secs);

        let claims = Claims {
            uid: user.id.to_string(),
            login: user.login.clone(),
            role: user.role.clone(),
            token_type: token_type.to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };
        let header = Header::new(Algorithm::HS256);
        encode(&header, &claims, &self.encoding_key).map_err(|e| AppError::Internal(e.into()))
    }

    /// Issue an access/refresh pair for `user` at the current time.
    pub fn issue_pair(&self, user: &User) -> Result<TokenPair> {
        Ok(TokenPair {
            access_token: self.sign(user, TOKEN_TYPE_ACCESS, self.config.access_token_ttl_secs)?,
            refresh_token: self.sign(
                user,
                TOKEN_TYPE_REFRESH,
                self.config.refresh_token_ttl_secs,
            )?,
            expires_in: self.config.access_token_ttl_secs,
        })
    }

    fn verify(&self, token: &str, expected_type: &str) -> Result<Claims> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.strict_validation())?;
        if token_data.claims.token_type != expected_type {
            return Err(AppError::InvalidArgument(format!(
                "invalid token: expected {} token",
                expected_type
            )));
        }
        Ok(token_data.claims)
    }

    pub fn verify_access(&self, token: &str) -> Result<Claims> {
        self.verify(token, TOKEN_TYPE_ACCESS)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<Claims> {
        self.verify(token, TOKEN_TYPE_REFRESH)
    }
}
