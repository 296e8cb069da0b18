use axum::extract::Multipart;
use bytes::Bytes;
use tracing::warn;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

pub struct PhotoUpload {
    pub body: Bytes,
    pub content_type: String,
}

/// Multipart form for contact create/update. All fields optional at the
/// parsing layer; the create handler enforces which are required.
#[derive(Default)]
pub struct ContactForm {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub contact_number: Option<String>,
    pub email_address: Option<String>,
    pub photo: Option<PhotoUpload>,
}

pub async fn parse_contact_form(mut mp: Multipart) -> Result<ContactForm, ApiError> {
    let mut form = ContactForm::default();
    while let Ok(Some(field)) = mp.next_field().await {
        let Some(name) = field.name().map(|s| s.to_string()) else {
            continue;
        };
        match name.as_str() {
            "first_name" => form.first_name = Some(text_field(field).await?),
            "last_name" => form.last_name = Some(text_field(field).await?),
            "contact_number" => form.contact_number = Some(text_field(field).await?),
            "email_address" => form.email_address = Some(text_field(field).await?),
            "photo" => {
                let content_type = field
                    .content_type()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "application/octet-stream".into());
                let body = field
                    .bytes()
                    .await
                    .map_err(|_| ApiError::Validation("Malformed photo upload".into()))?;
                form.photo = Some(PhotoUpload { body, content_type });
            }
            _ => {}
        }
    }
    Ok(form)
}

async fn text_field(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|_| ApiError::Validation("Malformed form field".into()))
}

/// Upload a contact photo and return its storage key.
pub async fn store_photo(
    st: &AppState,
    owner: Uuid,
    contact_id: Uuid,
    photo: &PhotoUpload,
) -> anyhow::Result<String> {
    let ext = ext_from_mime(&photo.content_type).unwrap_or("bin");
    let key = format!("contacts/{}/{}-{}.{}", owner, contact_id, Uuid::new_v4(), ext);
    st.storage
        .put_object(&key, photo.body.clone(), &photo.content_type)
        .await?;
    Ok(key)
}

const PHOTO_URL_TTL_SECS: u64 = 30 * 60;

/// Presign a stored photo key for reading. Presign failure degrades to no
/// photo rather than failing the surrounding read.
pub async fn presign_photo(st: &AppState, key: &str) -> Option<String> {
    match st.storage.presign_get(key, PHOTO_URL_TTL_SECS).await {
        Ok(url) => Some(url),
        Err(e) => {
            warn!(error = %e, key, "presign photo failed");
            None
        }
    }
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;

    #[test]
    fn test_ext_from_mime() {
        assert_eq!(ext_from_mime("image/jpeg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/jpg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/png"), Some("png"));
        assert_eq!(ext_from_mime("image/gif"), Some("gif"));
        assert_eq!(ext_from_mime("image/webp"), Some("webp"));
        assert_eq!(ext_from_mime("application/octet-stream"), None);
        assert_eq!(ext_from_mime("whatever/else"), None);
    }

    #[tokio::test]
    async fn store_photo_keys_are_scoped_to_owner_and_contact() {
        let state = AppState::fake();
        let owner = Uuid::new_v4();
        let contact_id = Uuid::new_v4();
        let photo = PhotoUpload {
            body: Bytes::from_static(b"fake-jpeg"),
            content_type: "image/jpeg".into(),
        };
        let key = store_photo(&state, owner, contact_id, &photo).await.unwrap();
        assert!(key.starts_with(&format!("contacts/{}/{}-", owner, contact_id)));
        assert!(key.ends_with(".jpg"));
    }

    #[tokio::test]
    async fn presign_photo_returns_a_url() {
        let state = AppState::fake();
        let url = presign_photo(&state, "contacts/a/b.jpg").await;
        assert_eq!(url.as_deref(), Some("https://fake.local/contacts/a/b.jpg"));
    }
}
