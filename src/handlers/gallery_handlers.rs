//! HTTP handlers for the gallery photo collection and its uploads.
//!
//! Read paths mirror the service's degrade-to-empty contract; save, reset,
//! and storage-delete report their boolean outcome in the response body so
//! the admin UI can surface failures without the request itself erroring.

use crate::{
    errors::AppError,
    models::photo::{Photo, UploadFile, UploadedPhoto, next_photo_id},
    services::gallery_service::GalleryService,
};
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, State},
    http::{HeaderValue, StatusCode, header},
    response::{
        Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;

#[derive(Serialize)]
pub struct SaveOutcome {
    pub saved: bool,
}

#[derive(Serialize)]
pub struct ResetOutcome {
    pub reset: bool,
}

#[derive(Serialize)]
pub struct DeleteOutcome {
    pub deleted: bool,
}

/// GET `/api/gallery/photos` — snapshot of the photo sequence.
/// Never errors; backend failures degrade to an empty array.
pub async fn list_photos(State(service): State<GalleryService>) -> Json<Vec<Photo>> {
    Json(service.fetch_photos().await)
}

/// PUT `/api/gallery/photos` — replace the photo sequence in full.
pub async fn save_photos(
    State(service): State<GalleryService>,
    Json(photos): Json<Vec<Photo>>,
) -> Json<SaveOutcome> {
    let saved = service.save_photos(&photos).await;
    Json(SaveOutcome { saved })
}

/// Request body for appending one photo; the id is allocated server-side.
#[derive(Deserialize)]
pub struct AppendPhotoReq {
    pub url: String,
    pub alt: String,
    #[serde(default)]
    pub filename: Option<String>,
}

#[derive(Serialize)]
pub struct AppendOutcome {
    pub saved: bool,
    pub photo: Photo,
}

/// POST `/api/gallery/photos` — append one photo.
///
/// Reads the latest sequence, allocates the next id, and writes the whole
/// sequence back. There is no transaction, so concurrent appends race and
/// the last write wins.
pub async fn append_photo(
    State(service): State<GalleryService>,
    Json(req): Json<AppendPhotoReq>,
) -> Json<AppendOutcome> {
    let mut photos = service.fetch_photos().await;
    let photo = Photo {
        id: next_photo_id(&photos),
        url: req.url,
        alt: req.alt,
        filename: req.filename,
    };
    photos.push(photo.clone());
    let saved = service.save_photos(&photos).await;
    Json(AppendOutcome { saved, photo })
}

/// DELETE `/api/gallery/photos` — delete the gallery document.
pub async fn reset_photos(State(service): State<GalleryService>) -> Json<ResetOutcome> {
    let reset = service.reset_photos().await;
    Json(ResetOutcome { reset })
}

/// GET `/api/gallery/photos/events` — SSE feed of the photo sequence:
/// the current state first, then one event per observed change.
pub async fn photo_events(
    State(service): State<GalleryService>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let watch = service.watch_photos().await?;

    let stream = futures::stream::unfold((watch, true), |(mut watch, first)| async move {
        if !first && !watch.changed().await {
            return None;
        }
        let payload =
            serde_json::to_string(&watch.current()).unwrap_or_else(|_| "[]".to_string());
        let event = Event::default().event("photos").data(payload);
        Some((Ok(event), (watch, false)))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// POST `/api/gallery/uploads` — multipart image upload. Responds with the
/// resolved URL and object path, or propagates the failure (503 when the
/// object store is not configured).
pub async fn upload_photo(
    State(service): State<GalleryService>,
    mut multipart: Multipart,
) -> Result<Json<UploadedPhoto>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::new(StatusCode::BAD_REQUEST, err.to_string()))?
    {
        let Some(name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let bytes = field
            .bytes()
            .await
            .map_err(|err| AppError::new(StatusCode::BAD_REQUEST, err.to_string()))?;

        let uploaded = service.upload_photo(UploadFile { name, bytes }).await?;
        return Ok(Json(uploaded));
    }

    Err(AppError::new(
        StatusCode::BAD_REQUEST,
        "multipart request contained no file field",
    ))
}

/// DELETE `/api/gallery/uploads/{*filename}` — delete a stored image.
pub async fn delete_upload(
    State(service): State<GalleryService>,
    Path(filename): Path<String>,
) -> Json<DeleteOutcome> {
    let deleted = service.delete_photo_from_storage(&filename).await;
    Json(DeleteOutcome { deleted })
}

/// GET `/media/{*path}` — serve stored image bytes.
pub async fn get_media(
    State(service): State<GalleryService>,
    Path(path): Path<String>,
) -> Result<Response, AppError> {
    let bytes = service.read_object(&path).await?;

    let mut response = Response::new(Body::from(bytes));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(content_type_for(&path)),
    );
    Ok(response)
}

fn content_type_for(path: &str) -> &'static str {
    match path.rsplit('.').next() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}
