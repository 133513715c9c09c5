//! Span maker for `TraceLayer` that keeps secrets out of request logs.

use axum::http::{Request, Uri};
use tower_http::trace::MakeSpan;
use tracing::Span;

use super::metrics::RequestId;

/// Query parameters whose values are never logged.
const REDACTED_PARAMS: &[&str] = &[
    "access_token",
    "refresh_token",
    "token",
    "password",
    "api_key",
];

#[derive(Clone, Debug, Default)]
pub struct SanitizedMakeSpan;

impl<B> MakeSpan<B> for SanitizedMakeSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        let request_id = request
            .extensions()
            .get::<RequestId>()
            .map(|id| id.0.as_str())
            .unwrap_or("-");

        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %sanitize_uri(request.uri()),
            request_id = %request_id,
        )
    }
}

/// `/api/v1/users?access_token=eyJ...&page=2` is logged as
/// `/api/v1/users?access_token=[REDACTED]&page=2`.
fn sanitize_uri(uri: &Uri) -> String {
    let Some(query) = uri.query() else {
        return uri.path().to_string();
    };

    let pairs: Vec<String> = query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((key, _)) if is_redacted(key) => format!("{key}=[REDACTED]"),
            _ => pair.to_string(),
        })
        .collect();

    format!("{}?{}", uri.path(), pairs.join("&"))
}

fn is_redacted(key: &str) -> bool {
    REDACTED_PARAMS
        .iter()
        .any(|param| key.eq_ignore_ascii_case(param))
}
