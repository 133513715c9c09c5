//! Credential service: login, registration, role check and token refresh.

pub mod client;

pub use client::GrpcCredentialClient;

use crate::context::Deadline;
use crate::directory::UserDirectory;
use crate::domain::{StringUuid, User, ROLE_USER};
use crate::error::{AppError, ErrorKind, Result};
use crate::jwt::{TokenManager, TokenPair};
use async_trait::async_trait;
use metrics::counter;
use std::sync::Arc;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialIssuer: Send + Sync {
    /// Verify `login`/`password` and issue a token pair.
    async fn login(&self, deadline: Deadline, login: &str, password: &str) -> Result<TokenPair>;
    async fn register(&self, deadline: Deadline, user: User) -> Result<User>;
    async fn is_admin(&self, deadline: Deadline, id: StringUuid) -> Result<bool>;
    /// Exchange a valid refresh token for a new pair.
    async fn refresh(&self, deadline: Deadline, refresh_token: &str) -> Result<TokenPair>;
}

pub struct CredentialService<D: UserDirectory> {
    directory: Arc<D>,
    tokens: TokenManager,
}

impl<D: UserDirectory> CredentialService<D> {
    pub fn new(directory: Arc<D>, tokens: TokenManager) -> Self {
        Self { directory, tokens }
    }
}

/// Constant-time byte comparison
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

fn invalid_credentials() -> AppError {
    AppError::NotFound("invalid login or password".to_string())
}

#[async_trait]
impl<D: UserDirectory + 'static> CredentialIssuer for CredentialService<D> {
    async fn login(&self, deadline: Deadline, login: &str, password: &str) -> Result<TokenPair> {
        let user = match self.directory.get_user_by_login(deadline, login).await {
            Ok(user) => user,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                counter!("identity_auth_login_total", "result" => "failure").increment(1);
                return Err(invalid_credentials());
            }
            Err(e) => return Err(e.context("login")),
        };

        if !constant_time_eq(user.password.as_bytes(), password.as_bytes()) {
            counter!("identity_auth_login_total", "result" => "failure").increment(1);
            tracing::info!(login = %login, "Login rejected");
            return Err(invalid_credentials());
        }

        let pair = self.tokens.issue_pair(&user)?;
        counter!("identity_auth_login_total", "result" => "success").increment(1);
        tracing::info!(user_id = %user.id, "Login succeeded");
        Ok(pair)
    }

    async fn register(&self, deadline: Deadline, mut user: User) -> Result<User> {
        match self.directory.get_user_by_login(deadline, &user.login).await {
            Ok(existing) if constant_time_eq(existing.password.as_bytes(), user.password.as_bytes()) => {
                return Err(AppError::AlreadyExists(format!(
                    "User {:?} is already registered",
                    user.login
                )));
            }
            // A different password under the same login is rejected by the directory.
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.context("register")),
        }

        user.role = ROLE_USER.to_string();
        self.directory
            .insert(deadline, user)
            .await
            .map_err(|e| e.context("register"))
    }

    async fn is_admin(&self, deadline: Deadline, id: StringUuid) -> Result<bool> {
        let user = self
            .directory
            .get_user_by_id(deadline, id)
            .await
            .map_err(|e| e.context("is_admin"))?;
        Ok(user.is_admin())
    }

    async fn refresh(&self, deadline: Deadline, refresh_token: &str) -> Result<TokenPair> {
        let claims = self.tokens.verify_refresh(refresh_token)?;
        let id = claims.user_id()?;

        deadline.check("refresh")?;
        let user = self
            .directory
            .get_user_by_id(deadline, id)
            .await
            .map_err(|e| e.context("refresh"))?;

        self.tokens.issue_pair(&user)
    }
}
