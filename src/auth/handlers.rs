use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{
            AuthResponse, ForgotPasswordRequest, LoginRequest, MessageResponse, PublicUser,
            ResetPasswordRequest, SignupRequest,
        },
        repo_types::{User, UserStatus},
        services::{
            hash_password, is_valid_email, normalize_email, verify_password, AuthUser, JwtKeys,
        },
    },
    error::ApiError,
    state::AppState,
};

/// Identical acknowledgement for known and unknown emails, so the endpoint
/// cannot be used to probe account existence.
const RESET_ACK: &str = "If an account exists, password reset instructions will be sent";

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password", post(reset_password))
        .route("/auth/me", get(get_me))
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    Json(mut payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    payload.email = normalize_email(&payload.email);

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::Validation("Invalid email".into()));
    }
    if payload.password.len() < 8 {
        warn!("password too short");
        return Err(ApiError::Validation("Password too short".into()));
    }
    if payload.first_name.trim().is_empty() || payload.last_name.trim().is_empty() {
        return Err(ApiError::Validation("First and last name are required".into()));
    }

    let hash = hash_password(&payload.password)?;
    let user = User::create(
        &state.db,
        &payload.email,
        &hash,
        payload.first_name.trim(),
        payload.last_name.trim(),
    )
    .await?;

    info!(user_id = %user.id, email = %user.email, "user signed up, pending activation");
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "User created, waiting for admin approval",
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    payload.email = normalize_email(&payload.email);

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::Validation("Invalid email".into()));
    }

    // Unknown, inactive and wrong-password all answer the same way.
    let user = match User::find_by_email(&state.db, &payload.email).await? {
        Some(u) if u.status == UserStatus::Active => u,
        Some(u) => {
            warn!(email = %payload.email, user_id = %u.id, "login on inactive account");
            return Err(ApiError::Unauthenticated("Invalid credentials"));
        }
        None => {
            warn!(email = %payload.email, "login unknown email");
            return Err(ApiError::Unauthenticated("Invalid credentials"));
        }
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(email = %payload.email, user_id = %user.id, "login invalid password");
        return Err(ApiError::Unauthenticated("Invalid credentials"));
    }

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign_session(user.id)?;

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(AuthResponse {
        token,
        user: user.into(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(mut payload): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    payload.email = normalize_email(&payload.email);

    let Some(user) = User::find_by_email(&state.db, &payload.email).await? else {
        return Ok(Json(MessageResponse { message: RESET_ACK }));
    };

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign_reset(user.id)?;
    let expires =
        OffsetDateTime::now_utc() + time::Duration::seconds(keys.reset_ttl.as_secs() as i64);
    User::set_reset_token(&state.db, user.id, &token, expires).await?;

    // Mail failure is logged, not surfaced: the caller already gets the
    // generic acknowledgement either way.
    let reset_link = format!("{}/reset-password?token={}", state.config.app_url, token);
    if let Err(e) = state.mailer.send_reset_email(&user.email, &reset_link).await {
        error!(error = %e, user_id = %user.id, "failed to send reset email");
    } else {
        info!(user_id = %user.id, "reset email dispatched");
    }

    Ok(Json(MessageResponse { message: RESET_ACK }))
}

/// True iff the presented token is the one stored on the user record and the
/// stored expiry is still in the future.
fn stored_reset_token_is_valid(user: &User, token: &str, now: OffsetDateTime) -> bool {
    match (&user.reset_token, user.reset_token_expires) {
        (Some(stored), Some(expires)) => stored == token && expires > now,
        _ => false,
    }
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    if payload.token.is_empty() {
        return Err(ApiError::Validation("Reset token is required".into()));
    }
    if payload.new_password.len() < 8 {
        return Err(ApiError::Validation("Password too short".into()));
    }

    // Bad signature, wrong purpose, unknown user, token mismatch and expiry
    // all collapse into one uniform rejection.
    let invalid = || ApiError::Validation("Invalid or expired reset token".into());

    let keys = JwtKeys::from_ref(&state);
    let claims = keys.verify_reset(&payload.token).map_err(|e| {
        warn!(error = %e, "reset token failed verification");
        invalid()
    })?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(invalid)?;

    if !stored_reset_token_is_valid(&user, &payload.token, OffsetDateTime::now_utc()) {
        warn!(user_id = %user.id, "reset token not current for user");
        return Err(invalid());
    }

    let hash = hash_password(&payload.new_password)?;
    User::consume_reset_token(&state.db, user.id, &hash).await?;

    info!(user_id = %user.id, "password reset");
    Ok(Json(MessageResponse {
        message: "Password has been reset",
    }))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(current): AuthUser,
) -> Result<Json<PublicUser>, ApiError> {
    let user = User::find_by_id(&state.db, current.id)
        .await?
        .ok_or(ApiError::NotFound("User not found"))?;
    Ok(Json(user.into()))
}

#[cfg(test)]
mod reset_tests {
    use super::*;
    use crate::auth::repo_types::Role;
    use time::Duration;
    use uuid::Uuid;

    fn user_with_reset(token: Option<&str>, expires: Option<OffsetDateTime>) -> User {
        User {
            id: Uuid::new_v4(),
            email: "a@x.com".into(),
            password_hash: "hash".into(),
            first_name: "A".into(),
            last_name: "B".into(),
            role: Role::User,
            status: UserStatus::Active,
            reset_token: token.map(String::from),
            reset_token_expires: expires,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn matching_unexpired_token_is_valid() {
        let now = OffsetDateTime::now_utc();
        let user = user_with_reset(Some("tok"), Some(now + Duration::hours(1)));
        assert!(stored_reset_token_is_valid(&user, "tok", now));
    }

    #[test]
    fn mismatched_token_is_invalid() {
        let now = OffsetDateTime::now_utc();
        let user = user_with_reset(Some("tok"), Some(now + Duration::hours(1)));
        assert!(!stored_reset_token_is_valid(&user, "other", now));
    }

    #[test]
    fn expired_stored_token_is_invalid() {
        let now = OffsetDateTime::now_utc();
        let user = user_with_reset(Some("tok"), Some(now - Duration::minutes(1)));
        assert!(!stored_reset_token_is_valid(&user, "tok", now));
    }

    #[test]
    fn consumed_token_state_is_invalid() {
        // After consume_reset_token both fields are NULL; resubmitting the
        // same signed token must fail even before its embedded expiry.
        let now = OffsetDateTime::now_utc();
        let user = user_with_reset(None, None);
        assert!(!stored_reset_token_is_valid(&user, "tok", now));
    }
}

#[cfg(test)]
mod dto_tests {
    use crate::auth::dto::PublicUser;
    use crate::auth::repo_types::{Role, UserStatus};

    #[test]
    fn public_user_serialization_has_no_password_field() {
        let response = PublicUser {
            id: uuid::Uuid::new_v4(),
            email: "test@example.com".to_string(),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            role: Role::User,
            status: UserStatus::Active,
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("test@example.com"));
        assert!(json.contains(r#""status":"active""#));
        assert!(!json.contains("password"));
    }
}
