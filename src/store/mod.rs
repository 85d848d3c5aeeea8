//! Remote document store module

pub mod client;
#[cfg(test)]
pub mod memory;
pub mod models;

use async_trait::async_trait;

pub use client::RestDocumentStore;
pub use models::*;

/// Errors from the remote document store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("document not found: {0}")]
    NotFound(String),

    #[error("store unreachable: {0}")]
    Network(#[from] reqwest::Error),

    #[error("store error {status}: {message}")]
    Status { status: u16, message: String },

    #[error("malformed store response: {0}")]
    Malformed(String),

    #[error("invalid store url: {0}")]
    InvalidUrl(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Key-value document service holding track metadata and like flags
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// List every record of the `tracks` collection, in store order
    async fn list_tracks(&self) -> Result<Vec<TrackRecord>, StoreError>;

    /// Fetch a single track document by key
    async fn get_track(&self, key: &str) -> Result<TrackRecord, StoreError>;

    /// Merge fields into a track document, creating it when missing
    async fn merge_track(&self, key: &str, patch: &TrackPatch) -> Result<(), StoreError>;

    /// Fetch the legacy liked-ids list of a user
    async fn get_user_liked(&self, user: &str) -> Result<Vec<String>, StoreError>;
}
