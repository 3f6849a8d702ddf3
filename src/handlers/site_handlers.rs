//! Handlers for the static site boundary (contact details).

use crate::models::site::ContactInfo;
use axum::Json;

/// GET `/api/site/contact` — fixed contact and location details.
pub async fn contact() -> Json<ContactInfo> {
    Json(ContactInfo::current())
}
