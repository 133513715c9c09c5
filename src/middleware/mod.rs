//! HTTP middleware for the gateway
//!
//! - admin guard for the user-management routes
//! - request id propagation and request metrics
//! - log-safe request spans

pub mod auth;
pub mod metrics;
pub mod trace;

pub use auth::{require_admin, AuthError, AuthUser};
pub use metrics::{ObservabilityLayer, RequestId, REQUEST_ID_HEADER};
pub use trace::SanitizedMakeSpan;
