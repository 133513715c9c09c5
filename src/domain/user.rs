//! User domain model

use super::common::StringUuid;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::{Validate, ValidationError};

pub const ROLE_USER: &str = "user";
pub const ROLE_ADMIN: &str = "admin";

/// User record owned by the directory.
///
/// `password` is an opaque secret: it is skipped on serialization and redacted
/// from `Debug` output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, Validate)]
pub struct User {
    #[serde(default)]
    pub id: StringUuid,
    #[validate(length(min = 1, max = 64))]
    pub login: String,
    #[serde(skip_serializing, default)]
    #[validate(length(min = 1, max = 128))]
    pub password: String,
    #[validate(custom(function = "validate_role"))]
    pub role: String,
}

impl Default for User {
    fn default() -> Self {
        Self {
            id: StringUuid::nil(),
            login: String::new(),
            password: String::new(),
            role: ROLE_USER.to_string(),
        }
    }
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("login", &self.login)
            .field("password", &"[REDACTED]")
            .field("role", &self.role)
            .finish()
    }
}

impl User {
    pub fn new(login: impl Into<String>, password: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id: StringUuid::nil(),
            login: login.into(),
            password: password.into(),
            role: role.into(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }

    pub fn with_id(mut self, id: StringUuid) -> Self {
        self.id = id;
        self
    }
}

pub fn validate_role(role: &str) -> Result<(), ValidationError> {
    match role {
        ROLE_USER | ROLE_ADMIN => Ok(()),
        _ => Err(ValidationError::new("unknown_role")),
    }
}

/// Credentials submitted to login or register
#[derive(Clone, Deserialize, Validate)]
pub struct Credentials {
    #[validate(length(min = 1, max = 64))]
    pub login: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Input for creating or replacing a user through the admin API
#[derive(Clone, Deserialize, Validate)]
pub struct UserInput {
    #[validate(length(min = 1, max = 64))]
    pub login: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
    #[serde(default = "default_role")]
    #[validate(custom(function = "validate_role"))]
    pub role: String,
}

fn default_role() -> String {
    ROLE_USER.to_string()
}

impl From<UserInput> for User {
    fn from(input: UserInput) -> Self {
        User::new(input.login, input.password, input.role)
    }
}
