//! User repository

use crate::domain::{StringUuid, User};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use sqlx::MySqlPool;

/// SQL access to the `users` table.
///
/// ```sql
/// CREATE TABLE users (
///     id       CHAR(36)     NOT NULL PRIMARY KEY,
///     login    VARCHAR(64)  NOT NULL UNIQUE,
///     password VARCHAR(128) NOT NULL,
///     role     VARCHAR(16)  NOT NULL DEFAULT 'user'
/// );
/// ```
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn list(&self) -> Result<Vec<User>>;
    async fn find_by_id(&self, id: StringUuid) -> Result<Option<User>>;
    async fn find_by_login(&self, login: &str) -> Result<Option<User>>;
    /// Insert a user whose id has already been assigned.
    async fn create(&self, user: &User) -> Result<User>;
    /// Replace login, password and role. Fails `NotFound` when the row is absent.
    async fn update(&self, id: StringUuid, user: &User) -> Result<User>;
    /// Remove the row and return it as it was before deletion.
    async fn delete(&self, id: StringUuid) -> Result<User>;
}

pub struct UserRepositoryImpl {
    pool: MySqlPool,
}

impl UserRepositoryImpl {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for UserRepositoryImpl {
    async fn list(&self) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, login, password, role
            FROM users
            ORDER BY login
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn find_by_id(&self, id: StringUuid) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, login, password, role
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_login(&self, login: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, login, password, role
            FROM users
            WHERE login = ?
            "#,
        )
        .bind(login)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn create(&self, user: &User) -> Result<User> {
        sqlx::query(
            r#"
            INSERT INTO users (id, login, password, role)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(user.id)
        .bind(&user.login)
        .bind(&user.password)
        .bind(&user.role)
        .execute(&self.pool)
        .await?;

        self.find_by_id(user.id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to create user")))
    }

    async fn update(&self, id: StringUuid, user: &User) -> Result<User> {
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_as::<_, User>(
            "SELECT id, login, password, role FROM users WHERE id = ? FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        if existing.is_none() {
            return Err(AppError::NotFound(format!("User {} not found", id)));
        }

        sqlx::query(
            r#"
            UPDATE users
            SET login = ?, password = ?, role = ?
            WHERE id = ?
            "#,
        )
        .bind(&user.login)
        .bind(&user.password)
        .bind(&user.role)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let updated = sqlx::query_as::<_, User>(
            "SELECT id, login, password, role FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(updated)
    }

    async fn delete(&self, id: StringUuid) -> Result<User> {
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_as::<_, User>(
            "SELECT id, login, password, role FROM users WHERE id = ? FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))?;

        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(existing)
    }
}
