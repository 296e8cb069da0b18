use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::User;
use crate::error::ApiError;

/// A read-access grant on a contact. Emails are stored in their normalized
/// (trimmed, lowercased) form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SharedWith {
    pub user_id: Uuid,
    pub email: String,
}

/// Address-book entry. `owner` is immutable after creation; `shared_with`
/// lives in a single JSONB column so share/unshare is a one-row update.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Contact {
    pub id: Uuid,
    pub owner: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub contact_number: String,
    pub email_address: String,
    pub photo: Option<String>, // object-storage key, presigned on read
    pub shared_with: Json<Vec<SharedWith>>,
    pub created_at: OffsetDateTime,
}

impl Contact {
    pub fn is_owner(&self, user_id: Uuid) -> bool {
        self.owner == user_id
    }

    /// Read access: the owner, or anyone on the share list.
    pub fn can_read(&self, user_id: Uuid) -> bool {
        self.is_owner(user_id) || self.shared_with.iter().any(|s| s.user_id == user_id)
    }

    /// Append a grant for `user`, keeping insertion order. Rejects a second
    /// grant for the same email without touching the list.
    pub fn share_with(&mut self, user: &User) -> Result<(), ApiError> {
        if self.shared_with.iter().any(|s| s.email == user.email) {
            return Err(ApiError::Conflict("Contact already shared with this user"));
        }
        self.shared_with.push(SharedWith {
            user_id: user.id,
            email: user.email.clone(),
        });
        Ok(())
    }

    /// Remove any grant matching the (normalized) email. Returns whether the
    /// list changed.
    pub fn unshare(&mut self, email: &str) -> bool {
        let before = self.shared_with.len();
        self.shared_with.retain(|s| s.email != email);
        self.shared_with.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo_types::{Role, UserStatus};

    fn contact_owned_by(owner: Uuid) -> Contact {
        Contact {
            id: Uuid::new_v4(),
            owner,
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            contact_number: "+44 20 1234 5678".into(),
            email_address: "ada@example.com".into(),
            photo: None,
            shared_with: Json(Vec::new()),
            created_at: OffsetDateTime::now_utc(),
        }
    }

    fn user_with_email(email: &str) -> User {
        User {
            id: Uuid::new_v4(),
            email: email.into(),
            password_hash: "hash".into(),
            first_name: "B".into(),
            last_name: "C".into(),
            role: Role::User,
            status: UserStatus::Active,
            reset_token: None,
            reset_token_expires: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn owner_reads_and_strangers_do_not() {
        let owner = Uuid::new_v4();
        let contact = contact_owned_by(owner);
        assert!(contact.can_read(owner));
        assert!(!contact.can_read(Uuid::new_v4()));
    }

    #[test]
    fn shared_user_gains_read_access_only() {
        let owner = Uuid::new_v4();
        let mut contact = contact_owned_by(owner);
        let grantee = user_with_email("b@x.com");
        contact.share_with(&grantee).unwrap();

        assert!(contact.can_read(grantee.id));
        assert!(!contact.is_owner(grantee.id));
    }

    #[test]
    fn sharing_twice_with_same_email_is_a_conflict() {
        let mut contact = contact_owned_by(Uuid::new_v4());
        let grantee = user_with_email("b@x.com");
        contact.share_with(&grantee).unwrap();

        let err = contact.share_with(&grantee).unwrap_err();
        assert_eq!(err.code(), "CONFLICT");
        assert_eq!(contact.shared_with.len(), 1);
    }

    #[test]
    fn share_list_keeps_insertion_order() {
        let mut contact = contact_owned_by(Uuid::new_v4());
        let first = user_with_email("first@x.com");
        let second = user_with_email("second@x.com");
        contact.share_with(&first).unwrap();
        contact.share_with(&second).unwrap();

        let emails: Vec<&str> = contact.shared_with.iter().map(|s| s.email.as_str()).collect();
        assert_eq!(emails, vec!["first@x.com", "second@x.com"]);
    }

    #[test]
    fn unshare_removes_the_grant() {
        let mut contact = contact_owned_by(Uuid::new_v4());
        let grantee = user_with_email("b@x.com");
        contact.share_with(&grantee).unwrap();

        assert!(contact.unshare("b@x.com"));
        assert!(contact.shared_with.is_empty());
        assert!(!contact.can_read(grantee.id));
    }

    #[test]
    fn unshare_of_unknown_email_changes_nothing() {
        let mut contact = contact_owned_by(Uuid::new_v4());
        let grantee = user_with_email("b@x.com");
        contact.share_with(&grantee).unwrap();

        assert!(!contact.unshare("nobody@x.com"));
        assert_eq!(contact.shared_with.len(), 1);
    }
}
