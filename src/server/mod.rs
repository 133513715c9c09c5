//! Server initialization and routing for the three roles

use crate::api;
use crate::cache::CacheBackend;
use crate::config::{Config, GrpcSecurityConfig, AUTH_GRPC_PORT, USERS_GRPC_PORT};
use crate::credential::{CredentialService, GrpcCredentialClient};
use crate::directory::{GrpcUserDirectory, UserDirectoryService};
use crate::gateway::UserGateway;
use crate::grpc::interceptor::{ApiKeyAuthenticator, AuthInterceptor, ClientKeyInterceptor};
use crate::grpc::proto::auth::auth_server::AuthServer;
use crate::grpc::proto::users::users_manager_server::UsersManagerServer;
use crate::grpc::{AuthGrpcService, UsersGrpcService};
use crate::jwt::TokenManager;
use crate::middleware::{self, ObservabilityLayer, SanitizedMakeSpan};
use crate::repository::UserRepositoryImpl;
use crate::state::{GatewaySettings, HasGateway};
use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::mysql::MySqlPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tonic::transport::Server as TonicServer;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

type ProductionGateway = UserGateway<GrpcUserDirectory, CacheBackend, GrpcCredentialClient>;

/// Gateway state: gRPC upstreams plus the configured cache backend
#[derive(Clone)]
pub struct AppState {
    gateway: Arc<ProductionGateway>,
    settings: GatewaySettings,
    token_manager: Option<TokenManager>,
}

impl HasGateway for AppState {
    type Directory = GrpcUserDirectory;
    type Cache = CacheBackend;
    type Credentials = GrpcCredentialClient;

    fn gateway(&self) -> &ProductionGateway {
        &self.gateway
    }

    fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    fn token_manager(&self) -> Option<&TokenManager> {
        self.token_manager.as_ref()
    }
}

/// Users role: the directory over MySQL, served as `users.UsersManager`.
pub async fn run_users(config: Config, prometheus: Option<PrometheusHandle>) -> Result<()> {
    spawn_metrics_listener(&config, prometheus).await?;
    let database = config.require_database()?;
    let pool = MySqlPoolOptions::new()
        .max_connections(database.max_connections)
        .min_connections(database.min_connections)
        .connect(&database.url)
        .await
        .context("failed to connect to database")?;
    info!("Connected to database");

    let repo = Arc::new(UserRepositoryImpl::new(pool));
    let directory = Arc::new(UserDirectoryService::new(repo));
    let service = UsersGrpcService::new(directory);

    let interceptor = create_grpc_auth_interceptor(&config.grpc_security)?;
    let addr = grpc_socket_addr(&config, USERS_GRPC_PORT)?;
    info!(auth_mode = interceptor.mode_name(), "Users gRPC server started on {}", addr);

    TonicServer::builder()
        .add_service(UsersManagerServer::with_interceptor(service, interceptor))
        .serve_with_shutdown(addr, shutdown_signal())
        .await?;
    Ok(())
}

/// Auth role: credential service over the remote directory, served as `auth.Auth`.
pub async fn run_auth(config: Config, prometheus: Option<PrometheusHandle>) -> Result<()> {
    spawn_metrics_listener(&config, prometheus).await?;
    let tokens = TokenManager::new(config.require_jwt()?.clone());
    let client_key = ClientKeyInterceptor::new(config.grpc_security.client_api_key.as_deref())?;
    let directory = Arc::new(GrpcUserDirectory::connect_lazy(
        &config.upstream.users_service_url,
        client_key,
    )?);
    info!(upstream = %config.upstream.users_service_url, "Using users service");

    let credentials = Arc::new(CredentialService::new(directory, tokens));
    let service = AuthGrpcService::new(credentials);

    let interceptor = create_grpc_auth_interceptor(&config.grpc_security)?;
    let addr = grpc_socket_addr(&config, AUTH_GRPC_PORT)?;
    info!(auth_mode = interceptor.mode_name(), "Auth gRPC server started on {}", addr);

    TonicServer::builder()
        .add_service(AuthServer::with_interceptor(service, interceptor))
        .serve_with_shutdown(addr, shutdown_signal())
        .await?;
    Ok(())
}

/// Gateway role: the HTTP edge.
pub async fn run_gateway(config: Config, prometheus: Option<PrometheusHandle>) -> Result<()> {
    let client_key = ClientKeyInterceptor::new(config.grpc_security.client_api_key.as_deref())?;
    let directory = Arc::new(GrpcUserDirectory::connect_lazy(
        &config.upstream.users_service_url,
        client_key.clone(),
    )?);
    let credentials = Arc::new(GrpcCredentialClient::connect_lazy(
        &config.upstream.auth_service_url,
        client_key,
    )?);

    let cache = Arc::new(CacheBackend::from_config(&config.cache).await?);
    info!(backend = cache.name(), ttl_secs = config.cache.ttl_secs, "Cache ready");

    let token_manager = if config.gateway.require_admin {
        Some(TokenManager::new(config.require_jwt()?.clone()))
    } else {
        None
    };
    let state = AppState {
        gateway: Arc::new(UserGateway::new(
            directory,
            cache,
            credentials,
            config.cache.ttl(),
        )),
        settings: GatewaySettings {
            request_timeout: config.request_timeout(),
            require_admin: config.gateway.require_admin,
        },
        token_manager,
    };

    let app = build_router(state, prometheus);
    let http_addr = config.http_addr();
    let listener = TcpListener::bind(&http_addr).await?;
    info!(
        require_admin = config.gateway.require_admin,
        "HTTP server started on {}", http_addr
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

/// gRPC roles expose `/metrics` on the HTTP address when metrics are enabled.
async fn spawn_metrics_listener(config: &Config, prometheus: Option<PrometheusHandle>) -> Result<()> {
    if prometheus.is_none() {
        return Ok(());
    }
    let http_addr = config.http_addr();
    let listener = TcpListener::bind(&http_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", http_addr))?;
    info!("Metrics endpoint listening on {}", http_addr);

    let app = metrics_router(prometheus);
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "Metrics listener stopped");
        }
    });
    Ok(())
}

fn metrics_router(prometheus: Option<PrometheusHandle>) -> Router {
    Router::new()
        .route("/metrics", get(api::metrics::metrics_handler))
        .with_state(Arc::new(prometheus))
}

fn grpc_socket_addr(config: &Config, default_port: u16) -> Result<SocketAddr> {
    let addr = config.grpc_addr(default_port);
    addr.parse()
        .with_context(|| format!("invalid gRPC listen address {}", addr))
}

/// Server-side interceptor for the configured `GRPC_AUTH_MODE`.
///
/// `api_key` without any keys refuses to start rather than serving unauthenticated.
fn create_grpc_auth_interceptor(config: &GrpcSecurityConfig) -> Result<AuthInterceptor> {
    match config.auth_mode.as_str() {
        "api_key" => {
            let authenticator = ApiKeyAuthenticator::new(config.api_keys.clone());
            if !authenticator.has_keys() {
                anyhow::bail!("GRPC_AUTH_MODE is 'api_key' but GRPC_API_KEYS is empty");
            }
            info!(
                "gRPC authentication enabled: API key mode ({} keys configured)",
                config.api_keys.len()
            );
            Ok(AuthInterceptor::api_key(authenticator))
        }
        "none" => {
            info!("gRPC authentication disabled");
            Ok(AuthInterceptor::noop())
        }
        other => anyhow::bail!("unknown GRPC_AUTH_MODE {:?}", other),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Build the gateway router.
///
/// Generic over the state so tests drive the same routes with in-memory fakes.
pub fn build_router<S: HasGateway>(state: S, prometheus: Option<PrometheusHandle>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let user_routes = Router::new()
        .route(
            "/api/v1/users",
            get(api::user::list::<S>).post(api::user::create::<S>),
        )
        .route(
            "/api/v1/users/{id}",
            get(api::user::get::<S>)
                .put(api::user::update::<S>)
                .delete(api::user::delete::<S>),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_admin::<S>,
        ));

    Router::new()
        .route("/api/v1/health-check", get(api::health::health))
        .route("/ready", get(api::health::ready::<S>))
        .route("/api/v1/login", post(api::auth::login::<S>))
        .route("/api/v1/register", post(api::auth::register::<S>))
        .route("/api/v1/refresh", post(api::auth::refresh::<S>))
        .route("/api/v1/logout", post(api::auth::logout))
        .merge(user_routes)
        .with_state(state)
        .merge(metrics_router(prometheus))
        .layer(TraceLayer::new_for_http().make_span_with(SanitizedMakeSpan))
        .layer(cors)
        .layer(ObservabilityLayer)
}
