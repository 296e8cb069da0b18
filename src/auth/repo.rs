use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::{Role, User, UserStatus};
use crate::error::{is_unique_violation, ApiError};

const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, role, status, \
                            reset_token, reset_token_expires, created_at";

impl User {
    /// Find a user by (already normalized) email.
    pub async fn find_by_email(db: &PgPool, email: &str) -> Result<Option<User>, ApiError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> Result<Option<User>, ApiError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Create a new user with an already-hashed password. The unique index on
    /// `email` is the duplicate-identity check; a violation maps to CONFLICT.
    pub async fn create(
        db: &PgPool,
        email: &str,
        password_hash: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<User, ApiError> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (email, password_hash, first_name, last_name)
             VALUES ($1, $2, $3, $4)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(email)
        .bind(password_hash)
        .bind(first_name)
        .bind(last_name)
        .fetch_one(db)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ApiError::Conflict("Email already registered")
            } else {
                e.into()
            }
        })
    }

    pub async fn list(db: &PgPool) -> Result<Vec<User>, ApiError> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC"
        ))
        .fetch_all(db)
        .await?;
        Ok(users)
    }

    /// Partial profile update; absent fields keep their stored value. The
    /// password is deliberately not updatable through this path.
    pub async fn update_profile(
        db: &PgPool,
        id: Uuid,
        first_name: Option<&str>,
        last_name: Option<&str>,
        role: Option<Role>,
        status: Option<UserStatus>,
    ) -> Result<Option<User>, ApiError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users
             SET first_name = COALESCE($2, first_name),
                 last_name  = COALESCE($3, last_name),
                 role       = COALESCE($4, role),
                 status     = COALESCE($5, status)
             WHERE id = $1
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(first_name)
        .bind(last_name)
        .bind(role)
        .bind(status)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn delete(db: &PgPool, id: Uuid) -> Result<bool, ApiError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Persist an in-flight reset token with its own expiry. The stored
    /// expiry is checked independently of the JWT exp, so clearing the row
    /// revokes the token immediately.
    pub async fn set_reset_token(
        db: &PgPool,
        id: Uuid,
        token: &str,
        expires: OffsetDateTime,
    ) -> Result<(), ApiError> {
        sqlx::query("UPDATE users SET reset_token = $2, reset_token_expires = $3 WHERE id = $1")
            .bind(id)
            .bind(token)
            .bind(expires)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Replace the password and clear the reset-token state in one statement,
    /// making the consumed token permanently unusable.
    pub async fn consume_reset_token(
        db: &PgPool,
        id: Uuid,
        password_hash: &str,
    ) -> Result<(), ApiError> {
        sqlx::query(
            "UPDATE users
             SET password_hash = $2, reset_token = NULL, reset_token_expires = NULL
             WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(db)
        .await?;
        Ok(())
    }
}
