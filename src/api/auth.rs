//! Login, registration and token refresh endpoints

use crate::api::{MessageResponse, ValidatedJson};
use crate::domain::Credentials;
use crate::error::Result;
use crate::jwt::TokenPair;
use crate::state::HasGateway;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Token pair as returned to HTTP clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

impl From<TokenPair> for TokenResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: pair.expires_in,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RefreshRequest {
    #[validate(length(min = 1))]
    pub refresh_token: String,
}

/// POST /api/v1/login
pub async fn login<S: HasGateway>(
    State(state): State<S>,
    ValidatedJson(creds): ValidatedJson<Credentials>,
) -> Result<impl IntoResponse> {
    let pair = state
        .gateway()
        .login(state.deadline(), &creds.login, &creds.password)
        .await?;
    Ok(Json(TokenResponse::from(pair)))
}

/// POST /api/v1/register
pub async fn register<S: HasGateway>(
    State(state): State<S>,
    ValidatedJson(creds): ValidatedJson<Credentials>,
) -> Result<impl IntoResponse> {
    let user = state
        .gateway()
        .register(state.deadline(), creds.login, creds.password)
        .await?;
    tracing::info!(user_id = %user.id, "User registered");
    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /api/v1/refresh
pub async fn refresh<S: HasGateway>(
    State(state): State<S>,
    ValidatedJson(input): ValidatedJson<RefreshRequest>,
) -> Result<impl IntoResponse> {
    let pair = state
        .gateway()
        .refresh(state.deadline(), &input.refresh_token)
        .await?;
    Ok(Json(TokenResponse::from(pair)))
}

/// POST /api/v1/logout
///
/// Tokens are stateless; the client discards its pair.
pub async fn logout() -> impl IntoResponse {
    Json(MessageResponse::new("Logged out"))
}
