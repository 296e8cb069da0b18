use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::contacts::repo_types::{Contact, SharedWith};
use crate::error::ApiError;

const CONTACT_COLUMNS: &str = "id, owner, first_name, last_name, contact_number, email_address, \
                               photo, shared_with, created_at";

impl Contact {
    pub async fn create(
        db: &PgPool,
        owner: Uuid,
        first_name: &str,
        last_name: &str,
        contact_number: &str,
        email_address: &str,
        photo: Option<&str>,
    ) -> Result<Contact, ApiError> {
        let contact = sqlx::query_as::<_, Contact>(&format!(
            "INSERT INTO contacts (owner, first_name, last_name, contact_number, email_address, photo)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {CONTACT_COLUMNS}"
        ))
        .bind(owner)
        .bind(first_name)
        .bind(last_name)
        .bind(contact_number)
        .bind(email_address)
        .bind(photo)
        .fetch_one(db)
        .await?;
        Ok(contact)
    }

    /// Everything the user may read: owned contacts plus contacts shared
    /// with them (JSONB containment on the share list).
    pub async fn list_for_user(db: &PgPool, user_id: Uuid) -> Result<Vec<Contact>, ApiError> {
        let shared_probe = serde_json::json!([{ "user_id": user_id }]);
        let contacts = sqlx::query_as::<_, Contact>(&format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts
             WHERE owner = $1 OR shared_with @> $2
             ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .bind(shared_probe)
        .fetch_all(db)
        .await?;
        Ok(contacts)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> Result<Option<Contact>, ApiError> {
        let contact = sqlx::query_as::<_, Contact>(&format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(contact)
    }

    /// Owner-scoped fetch: non-owners see the same absence as a missing row.
    pub async fn find_owned(
        db: &PgPool,
        id: Uuid,
        owner: Uuid,
    ) -> Result<Option<Contact>, ApiError> {
        let contact = sqlx::query_as::<_, Contact>(&format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = $1 AND owner = $2"
        ))
        .bind(id)
        .bind(owner)
        .fetch_optional(db)
        .await?;
        Ok(contact)
    }

    /// Partial field update on an owned contact; `photo` replaces only when
    /// a new key is supplied.
    pub async fn update_owned(
        db: &PgPool,
        id: Uuid,
        owner: Uuid,
        first_name: Option<&str>,
        last_name: Option<&str>,
        contact_number: Option<&str>,
        email_address: Option<&str>,
        photo: Option<&str>,
    ) -> Result<Option<Contact>, ApiError> {
        let contact = sqlx::query_as::<_, Contact>(&format!(
            "UPDATE contacts
             SET first_name     = COALESCE($3, first_name),
                 last_name      = COALESCE($4, last_name),
                 contact_number = COALESCE($5, contact_number),
                 email_address  = COALESCE($6, email_address),
                 photo          = COALESCE($7, photo)
             WHERE id = $1 AND owner = $2
             RETURNING {CONTACT_COLUMNS}"
        ))
        .bind(id)
        .bind(owner)
        .bind(first_name)
        .bind(last_name)
        .bind(contact_number)
        .bind(email_address)
        .bind(photo)
        .fetch_optional(db)
        .await?;
        Ok(contact)
    }

    pub async fn delete_owned(db: &PgPool, id: Uuid, owner: Uuid) -> Result<bool, ApiError> {
        let result = sqlx::query("DELETE FROM contacts WHERE id = $1 AND owner = $2")
            .bind(id)
            .bind(owner)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Persist the share list. Single-row update; concurrent writers resolve
    /// last-write-wins at the store.
    pub async fn save_shared_with(
        db: &PgPool,
        id: Uuid,
        shared_with: &[SharedWith],
    ) -> Result<(), ApiError> {
        sqlx::query("UPDATE contacts SET shared_with = $2 WHERE id = $1")
            .bind(id)
            .bind(Json(shared_with))
            .execute(db)
            .await?;
        Ok(())
    }
}
