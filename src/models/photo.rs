//! Represents one entry in the gallery photo sequence.

use serde::{Deserialize, Serialize};

/// A single photo record in the gallery document.
///
/// Records are stored as an ordered sequence inside the `photos` field of
/// the gallery document; the sequence order is the display order.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Photo {
    /// Caller-assigned identifier, allocated with [`next_photo_id`].
    /// Missing ids in stored data deserialize as 0.
    #[serde(default)]
    pub id: i64,

    /// Resolved download URL for the image bytes.
    pub url: String,

    /// Display text for the photo.
    pub alt: String,

    /// Object-store path the image was uploaded to. Used when the photo is
    /// removed so the paired object can be deleted as well.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

/// Result of a successful photo upload: the resolved URL to embed in a
/// photo record and the object path to remember for later deletion.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct UploadedPhoto {
    pub url: String,
    pub filename: String,
}

/// An incoming file to upload: original name plus raw bytes.
#[derive(Clone, Debug)]
pub struct UploadFile {
    pub name: String,
    pub bytes: bytes::Bytes,
}

/// Next available photo id: `1` for an empty sequence, otherwise
/// `max(id) + 1`.
///
/// Best-effort allocation only. If ids were tampered with externally this
/// can hand out a colliding id; the caller owns uniqueness.
pub fn next_photo_id(photos: &[Photo]) -> i64 {
    photos.iter().map(|p| p.id).max().map_or(1, |max| max + 1)
}
