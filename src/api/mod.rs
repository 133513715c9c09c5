//! REST API handlers and shared extractors

pub mod auth;
pub mod health;
pub mod metrics;
pub mod user;

use crate::domain::StringUuid;
use crate::error::{AppError, Result};
use axum::extract::{FromRequest, Request};
use axum::Json;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// JSON body that is deserialized and validated before the handler runs.
///
/// Malformed bodies are rejected with the taxonomy's `InvalidArgument`, so
/// clients always see the `{error, message}` shape.
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> std::result::Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::InvalidArgument(rejection.body_text()))?;
        value.validate()?;
        Ok(Self(value))
    }
}

/// Parse the `{id}` path segment.
pub(crate) fn parse_path_id(raw: &str) -> Result<StringUuid> {
    raw.parse::<StringUuid>()
        .map_err(|_| AppError::InvalidArgument(format!("Invalid user id: {:?}", raw)))
}

/// Message response (logout, etc.)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
