//! Error taxonomy shared by the gateway, the credential service and the user directory.
//!
//! Every boundary (SQL driver, Redis driver, JWT, gRPC status, HTTP response)
//! converts into or out of [`AppError`] so that one of the five kinds survives
//! the trip unchanged.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tonic::{Code, Status};

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Transport-independent error kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    InvalidArgument,
    DeadlineExceeded,
    Internal,
}

impl ErrorKind {
    pub fn http_status(self) -> StatusCode {
        match self {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::AlreadyExists => StatusCode::CONFLICT,
            ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
            ErrorKind::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn grpc_code(self) -> Code {
        match self {
            ErrorKind::NotFound => Code::NotFound,
            ErrorKind::AlreadyExists => Code::AlreadyExists,
            ErrorKind::InvalidArgument => Code::InvalidArgument,
            ErrorKind::DeadlineExceeded => Code::DeadlineExceeded,
            ErrorKind::Internal => Code::Internal,
        }
    }

    /// Stable identifier used in HTTP error bodies
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::AlreadyExists => "already_exists",
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::DeadlineExceeded => "deadline_exceeded",
            ErrorKind::Internal => "internal_error",
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            AppError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            AppError::DeadlineExceeded(_) => ErrorKind::DeadlineExceeded,
            AppError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn internal(msg: impl std::fmt::Display) -> Self {
        AppError::Internal(anyhow::anyhow!("{}", msg))
    }

    /// Prefix the diagnostic with the operation that failed. The kind never changes.
    pub fn context(self, op: &'static str) -> Self {
        match self {
            AppError::NotFound(msg) => AppError::NotFound(format!("{op}: {msg}")),
            AppError::AlreadyExists(msg) => AppError::AlreadyExists(format!("{op}: {msg}")),
            AppError::InvalidArgument(msg) => AppError::InvalidArgument(format!("{op}: {msg}")),
            AppError::DeadlineExceeded(msg) => AppError::DeadlineExceeded(format!("{op}: {msg}")),
            AppError::Internal(e) => AppError::Internal(e.context(op)),
        }
    }

    /// Client-safe message. Internal details stay in the logs.
    fn public_message(&self) -> String {
        match self {
            AppError::NotFound(msg)
            | AppError::AlreadyExists(msg)
            | AppError::InvalidArgument(msg)
            | AppError::DeadlineExceeded(msg) => msg.clone(),
            AppError::Internal(_) => "An internal error occurred".to_string(),
        }
    }
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Internal(e) = &self {
            tracing::error!("Internal error: {:?}", e);
        }
        let kind = self.kind();
        let body = Json(ErrorResponse {
            error: kind.as_str().to_string(),
            message: self.public_message(),
        });

        (kind.http_status(), body).into_response()
    }
}

impl From<AppError> for Status {
    fn from(err: AppError) -> Self {
        if let AppError::Internal(e) = &err {
            tracing::error!("Internal error: {:?}", e);
        }
        Status::new(err.kind().grpc_code(), err.public_message())
    }
}

impl From<Status> for AppError {
    fn from(status: Status) -> Self {
        let msg = status.message().to_string();
        match status.code() {
            Code::NotFound => AppError::NotFound(msg),
            Code::AlreadyExists => AppError::AlreadyExists(msg),
            Code::InvalidArgument => AppError::InvalidArgument(msg),
            Code::DeadlineExceeded => AppError::DeadlineExceeded(msg),
            code => AppError::Internal(anyhow::anyhow!("rpc failed with {:?}: {}", code, msg)),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if matches!(err, sqlx::Error::RowNotFound) {
            return AppError::NotFound("record not found".to_string());
        }
        if let sqlx::Error::Database(db) = &err {
            if db.is_unique_violation() {
                return AppError::AlreadyExists(db.message().to_string());
            }
        }
        AppError::Internal(anyhow::Error::new(err).context("database error"))
    }
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        AppError::Internal(anyhow::Error::new(err).context("cache error"))
    }
}

// Verification failures only; signing failures are mapped to Internal at the call site.
impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        AppError::InvalidArgument(format!("invalid token: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::InvalidArgument(errors.to_string())
    }
}
