//! Admin guard for the user-management routes
//!
//! The bearer token is verified locally with the shared secret; whether its
//! subject is an administrator is asked of the credential service, so a role
//! change takes effect before the token expires.

use crate::domain::StringUuid;
use crate::error::{AppError, ErrorKind};
use crate::state::HasGateway;
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

/// Caller identity established by the guard, available to handlers as a
/// request extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: StringUuid,
    pub login: String,
    pub role: String,
}

/// Guard rejections. These belong to the HTTP edge and never cross an RPC.
#[derive(Debug)]
pub enum AuthError {
    /// No Authorization header present
    MissingToken,
    /// Invalid Authorization header format
    InvalidHeader(String),
    /// Token validation failed
    InvalidToken(String),
    /// Authenticated, but not an administrator
    Forbidden,
    /// The admin lookup itself failed
    Upstream(AppError),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            AuthError::MissingToken => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Missing authorization token",
            ),
            AuthError::InvalidHeader(_) => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Invalid authorization header",
            ),
            AuthError::InvalidToken(_) => {
                (StatusCode::UNAUTHORIZED, "unauthorized", "Invalid token")
            }
            AuthError::Forbidden => (
                StatusCode::FORBIDDEN,
                "forbidden",
                "Administrator role required",
            ),
            AuthError::Upstream(e) => return e.into_response(),
        };

        let body = serde_json::json!({
            "error": error,
            "message": message,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Extract the Bearer token from the Authorization header
fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let auth_header = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?
        .to_str()
        .map_err(|_| AuthError::InvalidHeader("Invalid header encoding".to_string()))?;

    auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        AuthError::InvalidHeader("Authorization header must use Bearer scheme".to_string())
    })
}

/// Admin guard, installed with `axum::middleware::from_fn_with_state`.
///
/// A no-op unless `require_admin` is set.
pub async fn require_admin<S: HasGateway>(
    State(state): State<S>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    if !state.settings().require_admin {
        return Ok(next.run(request).await);
    }

    let token = extract_bearer_token(request.headers())?;
    let tokens = state.token_manager().ok_or_else(|| {
        tracing::error!("Admin guard enabled without a token verifier");
        AuthError::InvalidToken("no verifier configured".to_string())
    })?;
    let claims = tokens
        .verify_access(token)
        .map_err(|e| AuthError::InvalidToken(e.to_string()))?;
    let user_id = claims
        .user_id()
        .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

    let is_admin = match state.gateway().is_admin(state.deadline(), user_id).await {
        Ok(is_admin) => is_admin,
        // The token outlived its subject.
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(AuthError::InvalidToken(e.to_string()))
        }
        Err(e) => return Err(AuthError::Upstream(e.context("is_admin"))),
    };
    if !is_admin {
        tracing::warn!(user_id = %user_id, "Rejected non-admin caller");
        return Err(AuthError::Forbidden);
    }

    request.extensions_mut().insert(AuthUser {
        user_id,
        login: claims.login,
        role: claims.role,
    });
    Ok(next.run(request).await)
}
