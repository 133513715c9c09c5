//! Shared test infrastructure
//!
//! An in-memory `UserRepository` sits under the production directory,
//! credential service and gateway, so tests exercise the real code paths
//! without MySQL or Redis.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use identity_hub::cache::InMemoryUserCache;
use identity_hub::config::JwtConfig;
use identity_hub::context::Deadline;
use identity_hub::credential::CredentialService;
use identity_hub::directory::UserDirectoryService;
use identity_hub::domain::{StringUuid, User};
use identity_hub::error::{AppError, ErrorKind, Result};
use identity_hub::gateway::UserGateway;
use identity_hub::jwt::TokenManager;
use identity_hub::repository::UserRepository;
use identity_hub::server::build_router;
use identity_hub::state::{GatewaySettings, HasGateway};
use serde_json::Value;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tower::ServiceExt;

// ============================================================================
// In-memory repository
// ============================================================================

/// `users` table stand-in with the same uniqueness rules as the SQL schema.
#[derive(Default)]
pub struct TestUserRepository {
    users: RwLock<Vec<User>>,
    fail_next: Mutex<Option<ErrorKind>>,
}

impl TestUserRepository {
    /// Make the next repository call fail with an error of `kind`.
    pub fn fail_next(&self, kind: ErrorKind) {
        *self.fail_next.lock().unwrap() = Some(kind);
    }

    pub fn len(&self) -> usize {
        self.users.read().unwrap().len()
    }

    pub fn insert_raw(&self, user: User) -> User {
        self.users.write().unwrap().push(user.clone());
        user
    }

    fn injected(&self) -> Result<()> {
        match self.fail_next.lock().unwrap().take() {
            None => Ok(()),
            Some(ErrorKind::NotFound) => Err(AppError::NotFound("injected".to_string())),
            Some(ErrorKind::AlreadyExists) => Err(AppError::AlreadyExists("injected".to_string())),
            Some(ErrorKind::InvalidArgument) => {
                Err(AppError::InvalidArgument("injected".to_string()))
            }
            Some(ErrorKind::DeadlineExceeded) => {
                Err(AppError::DeadlineExceeded("injected".to_string()))
            }
            Some(ErrorKind::Internal) => Err(AppError::internal(
                "connection to mysql://root:hunter2@db refused",
            )),
        }
    }
}

#[async_trait]
impl UserRepository for TestUserRepository {
    async fn list(&self) -> Result<Vec<User>> {
        self.injected()?;
        let mut users = self.users.read().unwrap().clone();
        users.sort_by(|a, b| a.login.cmp(&b.login));
        Ok(users)
    }

    async fn find_by_id(&self, id: StringUuid) -> Result<Option<User>> {
        self.injected()?;
        Ok(self
            .users
            .read()
            .unwrap()
            .iter()
            .find(|u| u.id == id)
            .cloned())
    }

    async fn find_by_login(&self, login: &str) -> Result<Option<User>> {
        self.injected()?;
        Ok(self
            .users
            .read()
            .unwrap()
            .iter()
            .find(|u| u.login == login)
            .cloned())
    }

    async fn create(&self, user: &User) -> Result<User> {
        self.injected()?;
        let mut users = self.users.write().unwrap();
        if users.iter().any(|u| u.id == user.id || u.login == user.login) {
            return Err(AppError::AlreadyExists(format!(
                "User {:?} already exists",
                user.login
            )));
        }
        users.push(user.clone());
        Ok(user.clone())
    }

    async fn update(&self, id: StringUuid, user: &User) -> Result<User> {
        self.injected()?;
        let mut users = self.users.write().unwrap();
        if users.iter().any(|u| u.id != id && u.login == user.login) {
            return Err(AppError::AlreadyExists(format!(
                "User {:?} already exists",
                user.login
            )));
        }
        let existing = users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))?;
        existing.login = user.login.clone();
        existing.password = user.password.clone();
        existing.role = user.role.clone();
        Ok(existing.clone())
    }

    async fn delete(&self, id: StringUuid) -> Result<User> {
        self.injected()?;
        let mut users = self.users.write().unwrap();
        let index = users
            .iter()
            .position(|u| u.id == id)
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))?;
        Ok(users.remove(index))
    }
}

// ============================================================================
// Test application state
// ============================================================================

pub type TestDirectory = UserDirectoryService<TestUserRepository>;
pub type TestCredentials = CredentialService<TestDirectory>;
pub type TestGateway = UserGateway<TestDirectory, InMemoryUserCache, TestCredentials>;

pub const TEST_SECRET: &str = "integration-test-secret";

pub fn test_tokens() -> TokenManager {
    TokenManager::new(JwtConfig {
        secret: TEST_SECRET.to_string(),
        access_token_ttl_secs: 900,
        refresh_token_ttl_secs: 604800,
    })
}

/// `HasGateway` implementation over in-memory fakes
#[derive(Clone)]
pub struct TestAppState {
    pub repo: Arc<TestUserRepository>,
    pub directory: Arc<TestDirectory>,
    pub cache: InMemoryUserCache,
    pub tokens: TokenManager,
    gateway: Arc<TestGateway>,
    settings: GatewaySettings,
    guard: Option<TokenManager>,
}

impl TestAppState {
    pub fn new() -> Self {
        Self::build(GatewaySettings::default())
    }

    pub fn with_admin_guard() -> Self {
        Self::build(GatewaySettings {
            require_admin: true,
            ..GatewaySettings::default()
        })
    }

    pub fn with_request_timeout(timeout: Duration) -> Self {
        Self::build(GatewaySettings {
            request_timeout: timeout,
            ..GatewaySettings::default()
        })
    }

    fn build(settings: GatewaySettings) -> Self {
        let repo = Arc::new(TestUserRepository::default());
        let directory = Arc::new(UserDirectoryService::new(repo.clone()));
        let tokens = test_tokens();
        let credentials = Arc::new(CredentialService::new(directory.clone(), tokens.clone()));
        let cache = InMemoryUserCache::new();
        let gateway = UserGateway::new(
            directory.clone(),
            Arc::new(cache.clone()),
            credentials,
            Duration::from_secs(60),
        );
        let guard = settings.require_admin.then(|| tokens.clone());

        Self {
            repo,
            directory,
            cache,
            tokens,
            gateway: Arc::new(gateway),
            settings,
            guard,
        }
    }

    /// Production router over this state
    pub fn router(&self) -> Router {
        build_router(self.clone(), None)
    }

    /// Store a user directly, bypassing the gateway and its cache.
    pub fn seed(&self, login: &str, password: &str, role: &str) -> User {
        self.repo
            .insert_raw(User::new(login, password, role).with_id(StringUuid::new_v4()))
    }

    pub fn access_token_for(&self, user: &User) -> String {
        self.tokens.issue_pair(user).unwrap().access_token
    }

    pub async fn login(&self, login: &str, password: &str) -> Result<identity_hub::jwt::TokenPair> {
        self.gateway
            .login(Deadline::none(), login, password)
            .await
    }
}

impl HasGateway for TestAppState {
    type Directory = TestDirectory;
    type Cache = InMemoryUserCache;
    type Credentials = TestCredentials;

    fn gateway(&self) -> &TestGateway {
        &self.gateway
    }

    fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    fn token_manager(&self) -> Option<&TokenManager> {
        self.guard.as_ref()
    }
}

// ============================================================================
// HTTP helpers
// ============================================================================

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

/// Send a request through the router. Non-JSON bodies come back as `Value::Null`.
pub async fn send(
    app: &Router,
    method: Method,
    path: &str,
    body: Option<Value>,
    bearer: Option<&str>,
) -> TestResponse {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap_or_default();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

    TestResponse {
        status,
        headers,
        body,
    }
}

pub async fn get_json(app: &Router, path: &str) -> TestResponse {
    send(app, Method::GET, path, None, None).await
}

pub async fn post_json(app: &Router, path: &str, body: Value) -> TestResponse {
    send(app, Method::POST, path, Some(body), None).await
}

pub async fn put_json(app: &Router, path: &str, body: Value) -> TestResponse {
    send(app, Method::PUT, path, Some(body), None).await
}

pub async fn delete_json(app: &Router, path: &str) -> TestResponse {
    send(app, Method::DELETE, path, None, None).await
}
