//! Document store wire models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single document as returned by the store
#[derive(Debug, Clone, Deserialize)]
pub struct Document<T> {
    #[serde(default)]
    pub id: String,
    pub fields: T,
}

/// Response of a collection listing
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentList<T> {
    #[serde(default = "Vec::new")]
    pub documents: Vec<Document<T>>,
}

/// Error payload returned by the store on non-success responses
#[derive(Debug, Clone, Deserialize)]
pub struct StoreErrorBody {
    pub error: StoreErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreErrorDetail {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

/// Track metadata record from the `tracks` collection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackRecord {
    /// Document id; filled from the document envelope when listing
    pub id: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub year: String,
    /// Preformatted "m:ss"
    pub duration: String,
    #[serde(rename = "imageUrl")]
    pub image_url: String,
    pub liked: bool,
}

impl From<Document<TrackRecord>> for TrackRecord {
    fn from(doc: Document<TrackRecord>) -> Self {
        let mut record = doc.fields;
        if record.id.is_empty() {
            record.id = doc.id;
        }
        record
    }
}

/// Merge-write payload for a track document.
///
/// Carries the display fields alongside the flag so that a merge against a
/// missing document creates a complete one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackPatch {
    pub liked: bool,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub year: String,
    pub duration: String,
    #[serde(rename = "imageUrl")]
    pub image_url: String,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

/// Body of a merge-write request
#[derive(Debug, Clone, Serialize)]
pub struct PatchBody<'a, T> {
    pub fields: &'a T,
}

/// Legacy per-user document listing liked track keys
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UserLikes {
    #[serde(rename = "likedSongs")]
    pub liked_songs: Vec<String>,
}
