//! HTTP observability layer: request ids and request metrics
//!
//! A plain tower `Layer`/`Service` pair so it wraps the whole router,
//! including 404s and guard rejections.

use axum::{body::Body, http::HeaderValue, http::Request, response::Response};
use metrics::{counter, gauge, histogram};
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::Instant,
};
use tower::{Layer, Service};
use tracing::Instrument;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest inbound request id that is trusted as-is.
const MAX_REQUEST_ID_LEN: usize = 128;

/// Request id attached to every request as an extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

const IN_FLIGHT_GAUGE: &str = "identity_http_requests_in_flight";

/// Counts a request as in flight until dropped, so a dropped handler future
/// (client disconnect) is released as well.
struct InFlight;

impl InFlight {
    fn start() -> Self {
        gauge!(IN_FLIGHT_GAUGE).increment(1.0);
        InFlight
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        gauge!(IN_FLIGHT_GAUGE).decrement(1.0);
    }
}

#[derive(Clone, Default)]
pub struct ObservabilityLayer;

impl<S> Layer<S> for ObservabilityLayer {
    type Service = ObservabilityMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ObservabilityMiddleware { inner }
    }
}

#[derive(Clone)]
pub struct ObservabilityMiddleware<S> {
    inner: S,
}

impl<S> Service<Request<Body>> for ObservabilityMiddleware<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<Body>) -> Self::Future {
        let method = request.method().to_string();
        let route = route_label(request.uri().path());
        let request_id = inbound_request_id(request.headers().get(REQUEST_ID_HEADER))
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        request
            .extensions_mut()
            .insert(RequestId(request_id.clone()));

        let in_flight = InFlight::start();
        let started = Instant::now();

        // Take the service that was driven to readiness, leave a fresh clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let span = tracing::info_span!("http", request_id = %request_id);

        Box::pin(
            async move {
                let result = inner.call(request).await;
                drop(in_flight);
                let mut response = result?;

                let status = response.status().as_u16().to_string();
                counter!(
                    "identity_http_requests_total",
                    "method" => method.clone(),
                    "path" => route.clone(),
                    "status" => status
                )
                .increment(1);
                histogram!("identity_http_request_duration_seconds", "method" => method, "path" => route)
                    .record(started.elapsed().as_secs_f64());

                if let Ok(value) = HeaderValue::from_str(&request_id) {
                    response.headers_mut().insert(REQUEST_ID_HEADER, value);
                }
                Ok(response)
            }
            .instrument(span),
        )
    }
}

/// Accept a caller-supplied request id only when it is short, printable ASCII.
fn inbound_request_id(value: Option<&HeaderValue>) -> Option<String> {
    let raw = value?.to_str().ok()?.trim();
    if raw.is_empty() || raw.len() > MAX_REQUEST_ID_LEN {
        return None;
    }
    Some(raw.to_string())
}

/// Metric label for a path: user ids collapse to `{id}`.
fn route_label(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if segment.len() == 36 && Uuid::parse_str(segment).is_ok() {
                "{id}"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::get, Extension, Router};
    use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
    use std::convert::Infallible;
    use tower::ServiceExt;

    fn in_flight(handle: &PrometheusHandle) -> f64 {
        handle
            .render()
            .lines()
            .find_map(|line| line.strip_prefix("identity_http_requests_in_flight "))
            .and_then(|value| value.trim().parse().ok())
            .unwrap_or(0.0)
    }

    #[test]
    fn test_in_flight_released_when_request_future_is_dropped() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            let hanging = tower::service_fn(|_: Request<Body>| {
                std::future::pending::<Result<Response, Infallible>>()
            });
            let mut service = ObservabilityLayer.layer(hanging);

            let future = service.call(Request::new(Body::empty()));
            assert_eq!(in_flight(&handle), 1.0);

            // Client went away before the handler finished.
            drop(future);
            assert_eq!(in_flight(&handle), 0.0);
        });
    }

    #[test]
    fn test_route_label_collapses_user_id() {
        assert_eq!(
            route_label("/api/v1/users/550e8400-e29b-41d4-a716-446655440000"),
            "/api/v1/users/{id}"
        );
        assert_eq!(route_label("/api/v1/users"), "/api/v1/users");
        assert_eq!(route_label("/api/v1/users/42"), "/api/v1/users/42");
    }

    #[test]
    fn test_inbound_request_id() {
        let value = HeaderValue::from_static("req-123");
        assert_eq!(inbound_request_id(Some(&value)).as_deref(), Some("req-123"));
        assert_eq!(inbound_request_id(None), None);
        assert_eq!(inbound_request_id(Some(&HeaderValue::from_static("  "))), None);

        let long = HeaderValue::from_str(&"a".repeat(MAX_REQUEST_ID_LEN + 1)).unwrap();
        assert_eq!(inbound_request_id(Some(&long)), None);
    }

    fn app() -> Router {
        Router::new()
            .route(
                "/echo",
                get(|Extension(id): Extension<RequestId>| async move { id.0 }),
            )
            .layer(ObservabilityLayer)
    }

    #[tokio::test]
    async fn test_request_id_is_propagated() {
        let request = Request::builder()
            .uri("/echo")
            .header(REQUEST_ID_HEADER, "req-abc")
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(request).await.unwrap();

        assert_eq!(response.headers()[REQUEST_ID_HEADER], "req-abc");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"req-abc");
    }

    #[tokio::test]
    async fn test_request_id_is_generated() {
        let request = Request::builder()
            .uri("/missing")
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(request).await.unwrap();

        let id = response.headers()[REQUEST_ID_HEADER].to_str().unwrap();
        assert!(Uuid::parse_str(id).is_ok());
    }
}
