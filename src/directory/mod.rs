//! User directory: the authoritative CRUD store for user records.
//!
//! [`UserDirectory`] is the capability the credential service and the gateway
//! depend on. [`UserDirectoryService`] implements it over SQL inside the users
//! process; [`GrpcUserDirectory`] implements it remotely over gRPC.

pub mod client;

pub use client::GrpcUserDirectory;

use crate::context::Deadline;
use crate::domain::{StringUuid, User};
use crate::error::{AppError, Result};
use crate::repository::UserRepository;
use async_trait::async_trait;
use std::sync::Arc;
use validator::Validate;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_users(&self, deadline: Deadline) -> Result<Vec<User>>;
    async fn get_user_by_id(&self, deadline: Deadline, id: StringUuid) -> Result<User>;
    async fn get_user_by_login(&self, deadline: Deadline, login: &str) -> Result<User>;
    /// Create a user. A nil id is replaced with a fresh one.
    async fn insert(&self, deadline: Deadline, user: User) -> Result<User>;
    /// Replace login, password and role of `id`. Returns the post-write record.
    async fn update(&self, deadline: Deadline, id: StringUuid, user: User) -> Result<User>;
    /// Remove `id`. Returns the record as it was before deletion.
    async fn delete(&self, deadline: Deadline, id: StringUuid) -> Result<User>;
}

pub struct UserDirectoryService<R: UserRepository> {
    repo: Arc<R>,
}

impl<R: UserRepository> UserDirectoryService<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl<R: UserRepository + 'static> UserDirectory for UserDirectoryService<R> {
    async fn get_users(&self, deadline: Deadline) -> Result<Vec<User>> {
        deadline.check("get_users")?;
        self.repo.list().await.map_err(|e| e.context("get_users"))
    }

    async fn get_user_by_id(&self, deadline: Deadline, id: StringUuid) -> Result<User> {
        deadline.check("get_user_by_id")?;
        self.repo
            .find_by_id(id)
            .await
            .map_err(|e| e.context("get_user_by_id"))?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))
    }

    async fn get_user_by_login(&self, deadline: Deadline, login: &str) -> Result<User> {
        deadline.check("get_user_by_login")?;
        if login.is_empty() {
            return Err(AppError::InvalidArgument("login must not be empty".to_string()));
        }
        self.repo
            .find_by_login(login)
            .await
            .map_err(|e| e.context("get_user_by_login"))?
            .ok_or_else(|| AppError::NotFound(format!("User with login {:?} not found", login)))
    }

    async fn insert(&self, deadline: Deadline, mut user: User) -> Result<User> {
        deadline.check("insert")?;
        user.validate()?;
        if user.id.is_nil() {
            user.id = StringUuid::new_v4();
        }

        let created = self
            .repo
            .create(&user)
            .await
            .map_err(|e| e.context("insert"))?;
        tracing::info!(user_id = %created.id, login = %created.login, "User created");
        Ok(created)
    }

    async fn update(&self, deadline: Deadline, id: StringUuid, user: User) -> Result<User> {
        deadline.check("update")?;
        user.validate()?;

        let updated = self
            .repo
            .update(id, &user)
            .await
            .map_err(|e| e.context("update"))?;
        tracing::info!(user_id = %id, role = %updated.role, "User updated");
        Ok(updated)
    }

    async fn delete(&self, deadline: Deadline, id: StringUuid) -> Result<User> {
        deadline.check("delete")?;

        let deleted = self.repo.delete(id).await.map_err(|e| e.context("delete"))?;
        tracing::info!(user_id = %id, "User deleted");
        Ok(deleted)
    }
}
