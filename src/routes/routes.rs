//! Defines routes for the gallery service.
//!
//! ## Structure
//! - **Gallery endpoints**
//!   - `GET    /api/gallery/photos` — snapshot of the photo sequence
//!   - `PUT    /api/gallery/photos` — replace the sequence in full
//!   - `POST   /api/gallery/photos` — append one photo (server-assigned id)
//!   - `DELETE /api/gallery/photos` — delete the gallery document
//!   - `GET    /api/gallery/photos/events` — SSE change feed
//!   - `POST   /api/gallery/uploads` — multipart image upload
//!   - `DELETE /api/gallery/uploads/{*filename}` — delete a stored image
//!
//! - **Site endpoints**
//!   - `GET    /api/site/contact` — fixed contact details
//!   - `GET    /media/{*path}` — stored image bytes
//!
//! The wildcard `{*filename}` allows nested paths like `gallery/1700000000000_img.jpg`.

use crate::{
    handlers::{
        gallery_handlers::{
            append_photo, delete_upload, get_media, list_photos, photo_events, reset_photos,
            save_photos, upload_photo,
        },
        health_handlers::{healthz, readyz},
        site_handlers::contact,
    },
    services::gallery_service::GalleryService,
};
use axum::{
    Router,
    routing::{delete, get, post},
};

/// Build and return the router for all gallery service routes.
///
/// The router carries shared state (`GalleryService`) to all handlers.
pub fn routes() -> Router<GalleryService> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // gallery document routes
        .route(
            "/api/gallery/photos",
            get(list_photos)
                .put(save_photos)
                .post(append_photo)
                .delete(reset_photos),
        )
        .route("/api/gallery/photos/events", get(photo_events))
        // upload routes
        .route("/api/gallery/uploads", post(upload_photo))
        .route("/api/gallery/uploads/{*filename}", delete(delete_upload))
        // site routes
        .route("/api/site/contact", get(contact))
        .route("/media/{*path}", get(get_media))
}
