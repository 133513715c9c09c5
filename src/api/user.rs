//! User management endpoints

use crate::api::{parse_path_id, ValidatedJson};
use crate::domain::{User, UserInput};
use crate::error::Result;
use crate::middleware::AuthUser;
use crate::state::HasGateway;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};

/// Acting caller for the audit log line. Only set when the admin guard is on.
type Actor = Option<Extension<AuthUser>>;

fn actor_login(actor: &Actor) -> &str {
    actor
        .as_ref()
        .map(|Extension(user)| user.login.as_str())
        .unwrap_or("anonymous")
}

/// GET /api/v1/users
pub async fn list<S: HasGateway>(State(state): State<S>) -> Result<impl IntoResponse> {
    let users = state.gateway().get_users(state.deadline()).await?;
    Ok(Json(users))
}

/// GET /api/v1/users/{id}
pub async fn get<S: HasGateway>(
    State(state): State<S>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let id = parse_path_id(&id)?;
    let user = state.gateway().get_user(state.deadline(), id).await?;
    Ok(Json(user))
}

/// POST /api/v1/users
pub async fn create<S: HasGateway>(
    State(state): State<S>,
    actor: Actor,
    ValidatedJson(input): ValidatedJson<UserInput>,
) -> Result<impl IntoResponse> {
    let user = state
        .gateway()
        .insert(state.deadline(), User::from(input))
        .await?;
    tracing::info!(user_id = %user.id, actor = actor_login(&actor), "User created");
    Ok((StatusCode::CREATED, Json(user)))
}

/// PUT /api/v1/users/{id}
pub async fn update<S: HasGateway>(
    State(state): State<S>,
    actor: Actor,
    Path(id): Path<String>,
    ValidatedJson(input): ValidatedJson<UserInput>,
) -> Result<impl IntoResponse> {
    let id = parse_path_id(&id)?;
    let user = User::from(input).with_id(id);
    let user = state.gateway().update(state.deadline(), id, user).await?;
    tracing::info!(user_id = %user.id, role = %user.role, actor = actor_login(&actor), "User updated");
    Ok(Json(user))
}

/// DELETE /api/v1/users/{id}
pub async fn delete<S: HasGateway>(
    State(state): State<S>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let id = parse_path_id(&id)?;
    let user = state.gateway().delete(state.deadline(), id).await?;
    tracing::info!(user_id = %user.id, actor = actor_login(&actor), "User deleted");
    Ok(Json(user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StringUuid;

    #[test]
    fn test_actor_login() {
        assert_eq!(actor_login(&None), "anonymous");

        let admin = AuthUser {
            user_id: StringUuid::new_v4(),
            login: "root".to_string(),
            role: "admin".to_string(),
        };
        assert_eq!(actor_login(&Some(Extension(admin))), "root");
    }
}
