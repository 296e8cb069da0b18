use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        repo_types::User,
        services::{normalize_email, AuthUser},
    },
    contacts::{
        dto::{ContactResponse, DeletedResponse, ShareRequest, UnshareRequest},
        repo_types::Contact,
        services::{parse_contact_form, presign_photo, store_photo},
    },
    error::ApiError,
    state::AppState,
};

pub fn contact_routes() -> Router<AppState> {
    Router::new()
        .route("/contacts", get(list_contacts).post(create_contact))
        .route(
            "/contacts/:id",
            get(get_contact).put(update_contact).delete(delete_contact),
        )
        .route(
            "/contacts/:id/share",
            post(share_contact).delete(unshare_contact),
        )
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024)) // 20MB
}

async fn to_response(st: &AppState, contact: Contact) -> ContactResponse {
    let photo = match &contact.photo {
        Some(key) => presign_photo(st, key).await,
        None => None,
    };
    ContactResponse {
        id: contact.id,
        owner: contact.owner,
        first_name: contact.first_name,
        last_name: contact.last_name,
        contact_number: contact.contact_number,
        email_address: contact.email_address,
        photo,
        shared_with: contact.shared_with.0,
        created_at: contact.created_at,
    }
}

/// POST /contacts (multipart: first_name, last_name, contact_number,
/// email_address, optional photo file). A failed photo upload degrades to a
/// contact without a photo; the contact itself is always persisted.
#[instrument(skip(state, mp))]
pub async fn create_contact(
    State(state): State<AppState>,
    AuthUser(current): AuthUser,
    mp: Multipart,
) -> Result<(StatusCode, HeaderMap, Json<ContactResponse>), ApiError> {
    let form = parse_contact_form(mp).await?;

    let (Some(first_name), Some(last_name), Some(contact_number), Some(email_address)) = (
        form.first_name.as_deref(),
        form.last_name.as_deref(),
        form.contact_number.as_deref(),
        form.email_address.as_deref(),
    ) else {
        return Err(ApiError::Validation("Missing required fields".into()));
    };

    let mut contact = Contact::create(
        &state.db,
        current.id,
        first_name,
        last_name,
        contact_number,
        email_address,
        None,
    )
    .await?;

    if let Some(photo) = &form.photo {
        match store_photo(&state, current.id, contact.id, photo).await {
            Ok(key) => {
                contact = Contact::update_owned(
                    &state.db,
                    contact.id,
                    current.id,
                    None,
                    None,
                    None,
                    None,
                    Some(key.as_str()),
                )
                .await?
                .unwrap_or(contact);
            }
            Err(e) => {
                warn!(error = %e, contact_id = %contact.id, "photo upload failed, contact saved without photo");
            }
        }
    }

    info!(contact_id = %contact.id, owner = %current.id, "contact created");

    let mut headers = HeaderMap::new();
    if let Ok(location) = format!("/api/v1/contacts/{}", contact.id).parse() {
        headers.insert(axum::http::header::LOCATION, location);
    }
    Ok((
        StatusCode::CREATED,
        headers,
        Json(to_response(&state, contact).await),
    ))
}

#[instrument(skip(state))]
pub async fn list_contacts(
    State(state): State<AppState>,
    AuthUser(current): AuthUser,
) -> Result<Json<Vec<ContactResponse>>, ApiError> {
    let contacts = Contact::list_for_user(&state.db, current.id).await?;
    let mut items = Vec::with_capacity(contacts.len());
    for contact in contacts {
        items.push(to_response(&state, contact).await);
    }
    Ok(Json(items))
}

/// Readable by the owner and anyone on the share list; everyone else gets
/// the same not-found as a missing id.
#[instrument(skip(state))]
pub async fn get_contact(
    State(state): State<AppState>,
    AuthUser(current): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ContactResponse>, ApiError> {
    let contact = Contact::find_by_id(&state.db, id)
        .await?
        .filter(|c| c.can_read(current.id))
        .ok_or(ApiError::NotFound("Contact not found"))?;
    Ok(Json(to_response(&state, contact).await))
}

/// PUT /contacts/:id (multipart, all fields optional). If a new photo was
/// explicitly supplied and its upload fails, the whole update aborts; the
/// old photo is never silently kept behind a success response.
#[instrument(skip(state, mp))]
pub async fn update_contact(
    State(state): State<AppState>,
    AuthUser(current): AuthUser,
    Path(id): Path<Uuid>,
    mp: Multipart,
) -> Result<Json<ContactResponse>, ApiError> {
    let existing = Contact::find_owned(&state.db, id, current.id)
        .await?
        .ok_or(ApiError::NotFound("Contact not found"))?;

    let form = parse_contact_form(mp).await?;

    let photo_key = match &form.photo {
        Some(photo) => match store_photo(&state, current.id, existing.id, photo).await {
            Ok(key) => Some(key),
            Err(e) => {
                warn!(error = %e, contact_id = %existing.id, "photo upload failed, aborting update");
                return Err(ApiError::Upstream("Failed to upload new photo".into()));
            }
        },
        None => None,
    };

    let contact = Contact::update_owned(
        &state.db,
        id,
        current.id,
        form.first_name.as_deref(),
        form.last_name.as_deref(),
        form.contact_number.as_deref(),
        form.email_address.as_deref(),
        photo_key.as_deref(),
    )
    .await?
    .ok_or(ApiError::NotFound("Contact not found"))?;

    info!(contact_id = %contact.id, owner = %current.id, "contact updated");
    Ok(Json(to_response(&state, contact).await))
}

#[instrument(skip(state))]
pub async fn delete_contact(
    State(state): State<AppState>,
    AuthUser(current): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<DeletedResponse>, ApiError> {
    if !Contact::delete_owned(&state.db, id, current.id).await? {
        return Err(ApiError::NotFound("Contact not found"));
    }
    info!(contact_id = %id, owner = %current.id, "contact deleted");
    Ok(Json(DeletedResponse {
        message: "Contact deleted",
    }))
}

/// POST /contacts/:id/share { email }. Owner only. The recipient must be a
/// registered user; a duplicate grant for the same email is a conflict.
#[instrument(skip(state, payload))]
pub async fn share_contact(
    State(state): State<AppState>,
    AuthUser(current): AuthUser,
    Path(id): Path<Uuid>,
    Json(mut payload): Json<ShareRequest>,
) -> Result<Json<ContactResponse>, ApiError> {
    payload.email = normalize_email(&payload.email);

    let recipient = User::find_by_email(&state.db, &payload.email)
        .await?
        .ok_or(ApiError::NotFound("User with this email not found"))?;

    let mut contact = Contact::find_owned(&state.db, id, current.id)
        .await?
        .ok_or(ApiError::NotFound("Contact not found"))?;

    contact.share_with(&recipient)?;
    Contact::save_shared_with(&state.db, contact.id, &contact.shared_with).await?;

    info!(contact_id = %contact.id, owner = %current.id, recipient = %recipient.id, "contact shared");
    Ok(Json(to_response(&state, contact).await))
}

/// DELETE /contacts/:id/share { email }. Owner only.
#[instrument(skip(state, payload))]
pub async fn unshare_contact(
    State(state): State<AppState>,
    AuthUser(current): AuthUser,
    Path(id): Path<Uuid>,
    Json(mut payload): Json<UnshareRequest>,
) -> Result<Json<ContactResponse>, ApiError> {
    payload.email = normalize_email(&payload.email);

    let mut contact = Contact::find_owned(&state.db, id, current.id)
        .await?
        .ok_or(ApiError::NotFound("Contact not found"))?;

    if contact.unshare(&payload.email) {
        Contact::save_shared_with(&state.db, contact.id, &contact.shared_with).await?;
        info!(contact_id = %contact.id, owner = %current.id, "contact unshared");
    }
    Ok(Json(to_response(&state, contact).await))
}
