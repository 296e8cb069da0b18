use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::contacts::repo_types::SharedWith;

#[derive(Debug, Serialize)]
pub struct ContactResponse {
    pub id: Uuid,
    pub owner: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub contact_number: String,
    pub email_address: String,
    pub photo: Option<String>, // presigned GET url, when a photo exists
    pub shared_with: Vec<SharedWith>,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Deserialize)]
pub struct ShareRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct UnshareRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub message: &'static str,
}
