//! User API endpoints.
//!
//! - GET `/current` - The authenticated user's own identity
//! - GET `/admin` - Admin-only demonstration of the role gate
//! - GET `/moderator` - Admins and moderators

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use serde::Serialize;
use std::sync::Arc;

use super::error::{ApiError, ResultExt};
use crate::auth::{ApiAuth, AuthzError, HasAuthState, authorize};
use crate::db::{Database, UserRole};
use crate::jwt::JwtConfig;

#[derive(Clone)]
pub struct UsersState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
}

impl HasAuthState for UsersState {
    fn jwt(&self) -> &JwtConfig {
        &self.jwt
    }

    fn db(&self) -> &Database {
        &self.db
    }
}

pub fn router(state: UsersState) -> Router {
    Router::new()
        .route("/current", get(current_user))
        .route("/admin", get(admin_route))
        .route("/moderator", get(moderator_route))
        .with_state(state)
}

#[derive(Serialize)]
struct CurrentUserResponse {
    id: String,
    name: String,
    email: String,
}

async fn current_user(
    State(state): State<UsersState>,
    ApiAuth(auth): ApiAuth,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .users()
        .get_by_uuid(&auth.user_uuid)
        .await
        .db_err("Failed to look up user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok((
        StatusCode::OK,
        Json(CurrentUserResponse {
            id: user.uuid,
            name: user.name,
            email: user.email,
        }),
    ))
}

async fn admin_route(
    State(state): State<UsersState>,
    ApiAuth(auth): ApiAuth,
) -> Result<impl IntoResponse, AuthzError> {
    authorize(&state.db, &auth.user_uuid, &[UserRole::Admin]).await?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "message": "Only admins can access this route!" })),
    ))
}

async fn moderator_route(
    State(state): State<UsersState>,
    ApiAuth(auth): ApiAuth,
) -> Result<impl IntoResponse, AuthzError> {
    authorize(
        &state.db,
        &auth.user_uuid,
        &[UserRole::Admin, UserRole::Moderator],
    )
    .await?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "message": "Only admins and moderators can access this route!" })),
    ))
}
