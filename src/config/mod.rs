//! Configuration loaded from environment variables
//!
//! One `Config` serves all three roles. Sections a role does not need are
//! optional and only demanded when that role starts.

use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Default listen port of the users role
pub const USERS_GRPC_PORT: u16 = 50051;
/// Default listen port of the auth role
pub const AUTH_GRPC_PORT: u16 = 50052;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server host (gateway)
    pub http_host: String,
    /// HTTP server port (gateway)
    pub http_port: u16,
    /// gRPC server host (users and auth)
    pub grpc_host: String,
    /// Explicit gRPC port; each role falls back to its own default when unset
    pub grpc_port: Option<u16>,
    /// Required by the users role
    pub database: Option<DatabaseConfig>,
    pub cache: CacheConfig,
    /// Required by the auth role, and by the gateway when the admin guard is on
    pub jwt: Option<JwtConfig>,
    pub upstream: UpstreamConfig,
    pub gateway: GatewayConfig,
    pub grpc_security: GrpcSecurityConfig,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackendKind {
    Redis,
    Memory,
    None,
}

impl FromStr for CacheBackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "redis" => Ok(CacheBackendKind::Redis),
            "memory" => Ok(CacheBackendKind::Memory),
            "none" | "off" | "disabled" => Ok(CacheBackendKind::None),
            other => Err(anyhow::anyhow!("unknown cache backend {:?}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub backend: CacheBackendKind,
    pub redis_url: String,
    /// Lifetime of a cached user entry
    pub ttl_secs: u64,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"[REDACTED]")
            .field("access_token_ttl_secs", &self.access_token_ttl_secs)
            .field("refresh_token_ttl_secs", &self.refresh_token_ttl_secs)
            .finish()
    }
}

/// Where the gateway and the auth service find their upstreams
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub users_service_url: String,
    pub auth_service_url: String,
    /// Per-request budget applied at the HTTP edge
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Default)]
pub struct GatewayConfig {
    /// Require an admin access token on the user-management routes
    pub require_admin: bool,
}

/// Internal gRPC authentication
#[derive(Clone)]
pub struct GrpcSecurityConfig {
    /// Authentication mode: "none" or "api_key"
    pub auth_mode: String,
    /// Keys accepted by the servers (comma-separated in env var)
    pub api_keys: Vec<String>,
    /// Key attached by the gateway and auth clients
    pub client_api_key: Option<String>,
}

impl Default for GrpcSecurityConfig {
    fn default() -> Self {
        Self {
            auth_mode: "none".to_string(),
            api_keys: vec![],
            client_api_key: None,
        }
    }
}

impl std::fmt::Debug for GrpcSecurityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrpcSecurityConfig")
            .field("auth_mode", &self.auth_mode)
            .field("api_keys", &format!("[{} keys]", self.api_keys.len()))
            .field("client_api_key", &self.client_api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub metrics_enabled: bool,
    /// "json" or "pretty"
    pub log_format: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            log_format: "pretty".to_string(),
        }
    }
}

fn parse_bool(value: Option<String>) -> bool {
    value
        .map(|s| matches!(s.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let or = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());

        Ok(Self {
            http_host: or("HTTP_HOST", "0.0.0.0"),
            http_port: or("HTTP_PORT", "8080")
                .parse()
                .context("Invalid HTTP_PORT")?,
            grpc_host: or("GRPC_HOST", "0.0.0.0"),
            grpc_port: var("GRPC_PORT")
                .map(|port| port.parse::<u16>().context("Invalid GRPC_PORT"))
                .transpose()?,
            database: match var("DATABASE_URL") {
                Some(url) => Some(DatabaseConfig {
                    url,
                    max_connections: or("DATABASE_MAX_CONNECTIONS", "10")
                        .parse()
                        .context("Invalid DATABASE_MAX_CONNECTIONS")?,
                    min_connections: or("DATABASE_MIN_CONNECTIONS", "2")
                        .parse()
                        .context("Invalid DATABASE_MIN_CONNECTIONS")?,
                }),
                None => None,
            },
            cache: CacheConfig {
                backend: or("CACHE_BACKEND", "redis")
                    .parse()
                    .context("Invalid CACHE_BACKEND")?,
                redis_url: or("REDIS_URL", "redis://localhost:6379"),
                ttl_secs: or("CACHE_TTL_SECS", "600")
                    .parse()
                    .context("Invalid CACHE_TTL_SECS")?,
            },
            jwt: match var("JWT_SECRET").filter(|s| !s.is_empty()) {
                Some(secret) => Some(JwtConfig {
                    secret,
                    access_token_ttl_secs: or("JWT_ACCESS_TOKEN_TTL_SECS", "900")
                        .parse()
                        .context("Invalid JWT_ACCESS_TOKEN_TTL_SECS")?,
                    refresh_token_ttl_secs: or("JWT_REFRESH_TOKEN_TTL_SECS", "604800")
                        .parse()
                        .context("Invalid JWT_REFRESH_TOKEN_TTL_SECS")?,
                }),
                None => None,
            },
            upstream: UpstreamConfig {
                users_service_url: var("USERS_SERVICE_URL")
                    .unwrap_or_else(|| format!("http://127.0.0.1:{}", USERS_GRPC_PORT)),
                auth_service_url: var("AUTH_SERVICE_URL")
                    .unwrap_or_else(|| format!("http://127.0.0.1:{}", AUTH_GRPC_PORT)),
                request_timeout_ms: or("REQUEST_TIMEOUT_MS", "5000")
                    .parse()
                    .context("Invalid REQUEST_TIMEOUT_MS")?,
            },
            gateway: GatewayConfig {
                require_admin: parse_bool(var("GATEWAY_REQUIRE_ADMIN")),
            },
            grpc_security: GrpcSecurityConfig {
                auth_mode: or("GRPC_AUTH_MODE", "none"),
                api_keys: var("GRPC_API_KEYS")
                    .map(|s| {
                        s.split(',')
                            .map(|k| k.trim().to_string())
                            .filter(|k| !k.is_empty())
                            .collect()
                    })
                    .unwrap_or_default(),
                client_api_key: var("GRPC_CLIENT_API_KEY").filter(|s| !s.is_empty()),
            },
            telemetry: TelemetryConfig {
                metrics_enabled: parse_bool(var("METRICS_ENABLED")),
                log_format: or("LOG_FORMAT", "pretty"),
            },
        })
    }

    /// Get HTTP server address
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }

    /// gRPC listen address for a role whose default port is `default_port`
    pub fn grpc_addr(&self, default_port: u16) -> String {
        format!(
            "{}:{}",
            self.grpc_host,
            self.grpc_port.unwrap_or(default_port)
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream.request_timeout_ms)
    }

    pub fn require_database(&self) -> Result<&DatabaseConfig> {
        self.database
            .as_ref()
            .context("DATABASE_URL is required for the users service")
    }

    pub fn require_jwt(&self) -> Result<&JwtConfig> {
        self.jwt.as_ref().context("JWT_SECRET is required")
    }
}
