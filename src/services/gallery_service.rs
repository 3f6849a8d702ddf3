//! GalleryService — orchestrates the document and object store adapters to
//! maintain the single ordered photo collection and its paired binary
//! assets.
//!
//! Error policy, per operation: read-side operations never fail, they
//! degrade to an empty sequence; `save_photos`, `delete_photo_from_storage`
//! and `reset_photos` report a boolean; only `upload_photo` propagates its
//! error, because a lost upload must not be conflated with "no photos to
//! show". Every swallowed failure is logged.

use crate::{
    models::photo::{Photo, UploadFile, UploadedPhoto},
    stores::{DocumentStore, DocumentWatch, Fields, ObjectStore, StoreError},
};
use bytes::Bytes;
use chrono::Utc;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::error;

/// Fixed address of the gallery document.
pub const GALLERY_COLLECTION: &str = "nirgun_admin";
pub const GALLERY_DOC_ID: &str = "gallery_photos";

/// Field of the gallery document that holds the photo sequence.
pub const PHOTOS_FIELD: &str = "photos";

/// Object-store prefix for uploaded gallery images.
pub const UPLOAD_PREFIX: &str = "gallery";

#[derive(Debug, Error)]
pub enum GalleryError {
    #[error("object storage is not initialized")]
    ObjectStoreUnavailable,
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone)]
pub struct GalleryService {
    documents: Arc<dyn DocumentStore>,
    objects: Option<Arc<dyn ObjectStore>>,
}

impl GalleryService {
    pub fn new(documents: Arc<dyn DocumentStore>, objects: Option<Arc<dyn ObjectStore>>) -> Self {
        Self { documents, objects }
    }

    pub fn document_store(&self) -> &Arc<dyn DocumentStore> {
        &self.documents
    }

    pub fn object_store(&self) -> Option<&Arc<dyn ObjectStore>> {
        self.objects.as_ref()
    }

    fn require_object_store(&self) -> Result<&Arc<dyn ObjectStore>, GalleryError> {
        self.objects.as_ref().ok_or(GalleryError::ObjectStoreUnavailable)
    }

    /// Fetch the photo sequence once. Never fails: an absent or malformed
    /// document and any store failure all degrade to the empty sequence.
    pub async fn fetch_photos(&self) -> Vec<Photo> {
        match self
            .documents
            .read_once(GALLERY_COLLECTION, GALLERY_DOC_ID)
            .await
        {
            Ok(fields) => photos_from_fields(fields),
            Err(err) => {
                error!("failed to fetch gallery photos: {err}");
                Vec::new()
            }
        }
    }

    /// Open a typed live feed of the photo sequence.
    pub async fn watch_photos(&self) -> Result<PhotoWatch, GalleryError> {
        let inner = self
            .documents
            .subscribe(GALLERY_COLLECTION, GALLERY_DOC_ID)
            .await?;
        Ok(PhotoWatch { inner })
    }

    /// Subscribe with callbacks: `on_update` once for the initial state and
    /// once per observed change, `on_error` once on terminal failure. If
    /// establishment fails, `on_error` fires and `on_update` never does.
    ///
    /// The returned handle cancels the subscription; cancellation is
    /// idempotent and safe to invoke before establishment completes.
    pub fn subscribe_photos<U, E>(&self, on_update: U, on_error: E) -> PhotoSubscription
    where
        U: Fn(Vec<Photo>) + Send + 'static,
        E: FnOnce(GalleryError) + Send + 'static,
    {
        let service = self.clone();
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();

        let task = tokio::spawn(async move {
            let mut watch = match service.watch_photos().await {
                Ok(watch) => watch,
                Err(err) => {
                    error!("failed to subscribe to gallery photos: {err}");
                    if !flag.load(Ordering::SeqCst) {
                        on_error(err);
                    }
                    return;
                }
            };
            loop {
                if flag.load(Ordering::SeqCst) {
                    return;
                }
                on_update(watch.current());
                if !watch.changed().await {
                    if !flag.load(Ordering::SeqCst) {
                        on_error(GalleryError::Store(StoreError::FeedClosed));
                    }
                    return;
                }
            }
        });

        PhotoSubscription { cancelled, task }
    }

    /// Overwrite the photo sequence in full. Last writer wins; there is no
    /// read-modify-write transaction. Returns whether the write succeeded.
    pub async fn save_photos(&self, photos: &[Photo]) -> bool {
        let mut fields = Fields::new();
        fields.insert(
            PHOTOS_FIELD.to_string(),
            serde_json::to_value(photos).unwrap_or_default(),
        );
        match self
            .documents
            .write(GALLERY_COLLECTION, GALLERY_DOC_ID, fields)
            .await
        {
            Ok(()) => true,
            Err(err) => {
                error!("failed to save gallery photos: {err}");
                false
            }
        }
    }

    /// Upload an image and return its resolved URL together with the object
    /// path used. Propagates failures: the caller must know the upload did
    /// not happen before referencing it in a photo record.
    pub async fn upload_photo(&self, file: UploadFile) -> Result<UploadedPhoto, GalleryError> {
        let objects = self.require_object_store()?;
        let filename = format!(
            "{}/{}_{}",
            UPLOAD_PREFIX,
            Utc::now().timestamp_millis(),
            file.name
        );
        objects.upload(&filename, file.bytes).await?;
        let url = objects.resolve_url(&filename);
        Ok(UploadedPhoto { url, filename })
    }

    /// Delete the object backing a photo. Soft-fail: a missing object or an
    /// uninitialized store is logged and reported as `false`.
    pub async fn delete_photo_from_storage(&self, filename: &str) -> bool {
        let objects = match self.require_object_store() {
            Ok(objects) => objects,
            Err(err) => {
                error!("failed to delete photo `{filename}`: {err}");
                return false;
            }
        };
        match objects.delete(filename).await {
            Ok(()) => true,
            Err(err) => {
                error!("failed to delete photo `{filename}` from storage: {err}");
                false
            }
        }
    }

    /// Delete the gallery document entirely. Subsequent reads yield the
    /// empty sequence.
    pub async fn reset_photos(&self) -> bool {
        match self
            .documents
            .delete(GALLERY_COLLECTION, GALLERY_DOC_ID)
            .await
        {
            Ok(()) => true,
            Err(err) => {
                error!("failed to reset gallery photos: {err}");
                false
            }
        }
    }

    /// Read raw object bytes; backs the `/media` route.
    pub async fn read_object(&self, path: &str) -> Result<Bytes, GalleryError> {
        let objects = self.require_object_store()?;
        Ok(objects.read(path).await?)
    }
}

/// A live feed of the photo sequence.
pub struct PhotoWatch {
    inner: DocumentWatch,
}

impl PhotoWatch {
    /// The latest observed photo sequence.
    pub fn current(&self) -> Vec<Photo> {
        photos_from_fields(self.inner.current())
    }

    /// Wait for the next change; `false` once the store has gone away.
    pub async fn changed(&mut self) -> bool {
        self.inner.changed().await
    }
}

/// Cancellation handle for a callback subscription.
///
/// Dropping the handle cancels the subscription as well.
pub struct PhotoSubscription {
    cancelled: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl PhotoSubscription {
    /// Tear down the subscription. Idempotent; no callback fires after the
    /// cancellation flag is set.
    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            self.task.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Drop for PhotoSubscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Normalize raw document fields to a photo sequence. An absent document,
/// a missing `photos` field, or a malformed sequence all yield empty.
fn photos_from_fields(fields: Option<Fields>) -> Vec<Photo> {
    match fields.and_then(|mut f| f.remove(PHOTOS_FIELD)) {
        Some(value) => serde_json::from_value(value).unwrap_or_default(),
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::memory::{MemoryDocumentStore, MemoryObjectStore};
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    const RECV_TIMEOUT: Duration = Duration::from_secs(1);
    const QUIET_TIMEOUT: Duration = Duration::from_millis(200);

    fn service_with(
        documents: Arc<MemoryDocumentStore>,
        objects: Option<Arc<MemoryObjectStore>>,
    ) -> GalleryService {
        GalleryService::new(
            documents,
            objects.map(|o| o as Arc<dyn crate::stores::ObjectStore>),
        )
    }

    fn service() -> (GalleryService, Arc<MemoryDocumentStore>) {
        let documents = MemoryDocumentStore::new();
        let service = service_with(documents.clone(), Some(MemoryObjectStore::new()));
        (service, documents)
    }

    fn photo(id: i64) -> Photo {
        Photo {
            id,
            url: format!("memory://media/gallery/{id}.jpg"),
            alt: format!("photo {id}"),
            filename: Some(format!("gallery/{id}.jpg")),
        }
    }

    #[tokio::test]
    async fn fetch_of_absent_document_is_empty() {
        let (service, _) = service();
        assert!(service.fetch_photos().await.is_empty());
    }

    #[tokio::test]
    async fn save_then_fetch_round_trips() {
        let (service, _) = service();
        let photos = vec![photo(1), photo(2)];
        assert!(service.save_photos(&photos).await);
        assert_eq!(service.fetch_photos().await, photos);
    }

    #[tokio::test]
    async fn fetch_soft_fails_to_empty_when_store_is_down() {
        let (service, documents) = service();
        assert!(service.save_photos(&[photo(1)]).await);
        documents.set_failing(true);
        assert!(service.fetch_photos().await.is_empty());
    }

    #[tokio::test]
    async fn save_reports_false_when_store_is_down() {
        let (service, documents) = service();
        documents.set_failing(true);
        assert!(!service.save_photos(&[photo(1)]).await);
    }

    #[tokio::test]
    async fn reset_then_fetch_is_empty() {
        let (service, _) = service();
        assert!(service.save_photos(&[photo(1)]).await);
        assert!(service.reset_photos().await);
        assert!(service.fetch_photos().await.is_empty());
    }

    #[tokio::test]
    async fn reset_reports_false_when_store_is_down() {
        let (service, documents) = service();
        documents.set_failing(true);
        assert!(!service.reset_photos().await);
    }

    #[tokio::test]
    async fn missing_photos_field_normalizes_to_empty() {
        let (service, documents) = service();
        let fields = json!({"unrelated": true}).as_object().unwrap().clone();
        documents
            .write(GALLERY_COLLECTION, GALLERY_DOC_ID, fields)
            .await
            .unwrap();
        assert!(service.fetch_photos().await.is_empty());
    }

    #[tokio::test]
    async fn non_array_photos_field_normalizes_to_empty() {
        let (service, documents) = service();
        let fields = json!({"photos": "oops"}).as_object().unwrap().clone();
        documents
            .write(GALLERY_COLLECTION, GALLERY_DOC_ID, fields)
            .await
            .unwrap();
        assert!(service.fetch_photos().await.is_empty());
    }

    #[tokio::test]
    async fn subscription_delivers_initial_state_then_updates() {
        let (service, _) = service();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sub = service.subscribe_photos(
            move |photos| {
                let _ = tx.send(photos);
            },
            |err| panic!("unexpected subscription error: {err}"),
        );

        let initial = timeout(RECV_TIMEOUT, rx.recv()).await.unwrap().unwrap();
        assert!(initial.is_empty());

        let photos = vec![photo(1)];
        assert!(service.save_photos(&photos).await);
        let update = timeout(RECV_TIMEOUT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(update, photos);

        sub.cancel();
    }

    #[tokio::test]
    async fn cancellation_stops_deliveries() {
        let (service, _) = service();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sub = service.subscribe_photos(
            move |photos| {
                let _ = tx.send(photos);
            },
            |_| {},
        );

        timeout(RECV_TIMEOUT, rx.recv()).await.unwrap().unwrap();
        sub.cancel();
        sub.cancel(); // idempotent
        assert!(sub.is_cancelled());

        assert!(service.save_photos(&[photo(1)]).await);
        match timeout(QUIET_TIMEOUT, rx.recv()).await {
            Err(_) => {}    // nothing delivered within the window
            Ok(None) => {}  // sender dropped with the cancelled task
            Ok(Some(photos)) => panic!("delivery after cancellation: {photos:?}"),
        }
    }

    #[tokio::test]
    async fn failed_establishment_fires_on_error_and_never_on_update() {
        let documents = MemoryDocumentStore::new();
        documents.set_failing(true);
        let service = service_with(documents, None);

        let (err_tx, mut err_rx) = mpsc::unbounded_channel();
        let _sub = service.subscribe_photos(
            |_| panic!("on_update must not fire when establishment fails"),
            move |err| {
                let _ = err_tx.send(err.to_string());
            },
        );

        let err = timeout(RECV_TIMEOUT, err_rx.recv()).await.unwrap().unwrap();
        assert!(err.contains("unavailable"));
    }

    #[tokio::test]
    async fn upload_returns_url_and_object_path() {
        let (service, _) = service();
        let uploaded = service
            .upload_photo(UploadFile {
                name: "photo.jpg".into(),
                bytes: Bytes::from_static(b"jpegbytes"),
            })
            .await
            .unwrap();

        assert!(!uploaded.url.is_empty());
        let rest = uploaded.filename.strip_prefix("gallery/").unwrap();
        let (millis, name) = rest.split_once('_').unwrap();
        assert!(!millis.is_empty());
        assert!(millis.bytes().all(|b| b.is_ascii_digit()));
        assert_eq!(name, "photo.jpg");
        assert!(uploaded.url.ends_with(&uploaded.filename));
    }

    #[tokio::test]
    async fn upload_fails_fast_without_object_store() {
        let service = service_with(MemoryDocumentStore::new(), None);
        let err = service
            .upload_photo(UploadFile {
                name: "photo.jpg".into(),
                bytes: Bytes::from_static(b"x"),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GalleryError::ObjectStoreUnavailable));
    }

    #[tokio::test]
    async fn deleting_missing_object_reports_false() {
        let (service, _) = service();
        assert!(!service.delete_photo_from_storage("gallery/never_uploaded.jpg").await);
    }

    #[tokio::test]
    async fn uploaded_object_can_be_deleted_once() {
        let (service, _) = service();
        let uploaded = service
            .upload_photo(UploadFile {
                name: "photo.jpg".into(),
                bytes: Bytes::from_static(b"x"),
            })
            .await
            .unwrap();
        assert!(service.delete_photo_from_storage(&uploaded.filename).await);
        assert!(!service.delete_photo_from_storage(&uploaded.filename).await);
    }

    #[tokio::test]
    async fn delete_without_object_store_reports_false() {
        let service = service_with(MemoryDocumentStore::new(), None);
        assert!(!service.delete_photo_from_storage("gallery/1_a.jpg").await);
    }
}
