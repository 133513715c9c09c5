//! Request-scoped deadline propagated across HTTP and gRPC hops.

use crate::error::{AppError, Result};
use std::time::Duration;
use tokio::time::Instant;
use tonic::metadata::MetadataMap;

const GRPC_TIMEOUT_HEADER: &str = "grpc-timeout";

/// Cooperative deadline checked at the entry of every remote or cache call.
///
/// A call accepted before expiry is allowed to finish; no new call starts after it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    /// No deadline; checks always pass.
    pub fn none() -> Self {
        Deadline(None)
    }

    pub fn after(timeout: Duration) -> Self {
        Deadline(Instant::now().checked_add(timeout))
    }

    /// A deadline that has already passed.
    pub fn expired() -> Self {
        Deadline(Some(Instant::now()))
    }

    pub fn is_expired(&self) -> bool {
        self.0.is_some_and(|at| Instant::now() >= at)
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.0.map(|at| at.saturating_duration_since(Instant::now()))
    }

    pub fn check(&self, op: &str) -> Result<()> {
        if self.is_expired() {
            return Err(AppError::DeadlineExceeded(format!(
                "{}: deadline exceeded",
                op
            )));
        }
        Ok(())
    }

    /// Rebuild the caller's deadline from the `grpc-timeout` request header.
    pub fn from_metadata(metadata: &MetadataMap) -> Self {
        metadata
            .get(GRPC_TIMEOUT_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_grpc_timeout)
            .map(Deadline::after)
            .unwrap_or_default()
    }

    /// Forward the remaining budget as the outgoing request timeout.
    pub fn apply<T>(&self, request: &mut tonic::Request<T>) {
        if let Some(remaining) = self.remaining() {
            request.set_timeout(remaining);
        }
    }
}

/// Parse a gRPC timeout value: up to 8 ASCII digits followed by one unit of
/// `H`, `M`, `S`, `m`, `u` or `n`.
fn parse_grpc_timeout(value: &str) -> Option<Duration> {
    if value.len() < 2 {
        return None;
    }
    let (digits, unit) = value.split_at(value.len() - 1);
    if digits.len() > 8 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let amount: u64 = digits.parse().ok()?;
    let duration = match unit {
        "H" => Duration::from_secs(amount * 3600),
        "M" => Duration::from_secs(amount * 60),
        "S" => Duration::from_secs(amount),
        "m" => Duration::from_millis(amount),
        "u" => Duration::from_micros(amount),
        "n" => Duration::from_nanos(amount),
        _ => return None,
    };
    Some(duration)
}
