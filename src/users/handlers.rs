use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::{
        repo_types::{Role, User, UserStatus},
        services::{normalize_email, require_role, AuthUser},
        PublicUser,
    },
    error::ApiError,
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct EmailQuery {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/email", get(get_user_by_email))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    AuthUser(current): AuthUser,
) -> Result<Json<Vec<PublicUser>>, ApiError> {
    require_role(&current, Role::Admin)?;
    let users = User::list(&state.db).await?;
    Ok(Json(users.into_iter().map(PublicUser::from).collect()))
}

/// Email lookup stays open to any authenticated user: the share flow needs
/// to resolve a recipient before sharing a contact.
#[instrument(skip(state))]
pub async fn get_user_by_email(
    State(state): State<AppState>,
    AuthUser(_current): AuthUser,
    Query(q): Query<EmailQuery>,
) -> Result<Json<PublicUser>, ApiError> {
    let email = normalize_email(&q.email);
    if email.is_empty() {
        return Err(ApiError::Validation("Email is required".into()));
    }
    let user = User::find_by_email(&state.db, &email)
        .await?
        .ok_or(ApiError::NotFound("User not found"))?;
    Ok(Json(user.into()))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    AuthUser(current): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<PublicUser>, ApiError> {
    require_role(&current, Role::Admin)?;
    let user = User::find_by_id(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("User not found"))?;
    Ok(Json(user.into()))
}

/// Activation happens here: an admin flips `status` to `active`. Role
/// changes are reserved to super-admins; passwords are never touched.
#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    AuthUser(current): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<PublicUser>, ApiError> {
    require_role(&current, Role::Admin)?;
    if payload.role.is_some() {
        require_role(&current, Role::SuperAdmin)?;
    }

    let user = User::update_profile(
        &state.db,
        id,
        payload.first_name.as_deref(),
        payload.last_name.as_deref(),
        payload.role,
        payload.status,
    )
    .await?
    .ok_or(ApiError::NotFound("User not found"))?;

    info!(user_id = %user.id, admin = %current.id, "user updated");
    Ok(Json(user.into()))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    AuthUser(current): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    require_role(&current, Role::SuperAdmin)?;
    if !User::delete(&state.db, id).await? {
        return Err(ApiError::NotFound("User not found"));
    }
    info!(user_id = %id, admin = %current.id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}
