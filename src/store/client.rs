//! HTTP client for the document store REST API

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::models::*;
use super::{DocumentStore, StoreError};

const TRACKS: &str = "tracks";
const USERS: &str = "users";

/// HTTP client for a JSON document store
#[derive(Clone)]
pub struct RestDocumentStore {
    base_url: Url,
    token: Option<String>,
    http_client: Client,
}

impl RestDocumentStore {
    /// Create a new store client
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self, StoreError> {
        // A trailing slash keeps the last path segment when joining
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let base_url =
            Url::parse(&normalized).map_err(|e| StoreError::InvalidUrl(format!("{}: {}", base_url, e)))?;

        let http_client = Client::builder()
            .user_agent(concat!("tunedeck/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            base_url,
            token,
            http_client,
        })
    }

    /// Build a document URL: `{base}/collections/{collection}/documents[/{key}]`
    fn document_url(&self, collection: &str, key: Option<&str>) -> Result<Url, StoreError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| StoreError::InvalidUrl(self.base_url.to_string()))?;
            segments.pop_if_empty();
            segments.extend(["collections", collection, "documents"]);
            if let Some(key) = key {
                segments.push(key);
            }
        }
        Ok(url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, key: &str) -> Result<T, StoreError> {
        debug!("GET {}", url);

        let response = self.authorize(self.http_client.get(url)).send().await?;
        let response = check_response(response, key).await?;

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| StoreError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl DocumentStore for RestDocumentStore {
    async fn list_tracks(&self) -> Result<Vec<TrackRecord>, StoreError> {
        let url = self.document_url(TRACKS, None)?;
        let list: DocumentList<TrackRecord> = self.get_json(url, TRACKS).await?;

        let records: Vec<TrackRecord> = list.documents.into_iter().map(Into::into).collect();
        debug!("Fetched {} track records", records.len());
        Ok(records)
    }

    async fn get_track(&self, key: &str) -> Result<TrackRecord, StoreError> {
        let url = self.document_url(TRACKS, Some(key))?;
        let doc: Document<TrackRecord> = self.get_json(url, key).await?;
        Ok(doc.into())
    }

    async fn merge_track(&self, key: &str, patch: &TrackPatch) -> Result<(), StoreError> {
        let mut url = self.document_url(TRACKS, Some(key))?;
        url.query_pairs_mut().append_pair("merge", "true");
        debug!("PATCH {} (liked={})", url, patch.liked);

        let response = self
            .authorize(self.http_client.patch(url))
            .json(&PatchBody { fields: patch })
            .send()
            .await?;

        check_response(response, key).await?;
        Ok(())
    }

    async fn get_user_liked(&self, user: &str) -> Result<Vec<String>, StoreError> {
        let url = self.document_url(USERS, Some(user))?;
        let doc: Document<UserLikes> = self.get_json(url, user).await?;
        Ok(doc.fields.liked_songs)
    }
}

/// Map non-success responses onto store errors
async fn check_response(response: Response, key: &str) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(StoreError::NotFound(key.to_string()));
    }

    let body = response.bytes().await.unwrap_or_default();
    let message = serde_json::from_slice::<StoreErrorBody>(&body)
        .map(|b| format!("{} (code {})", b.error.message, b.error.code))
        .unwrap_or_else(|_| String::from_utf8_lossy(&body).trim().to_string());

    Err(StoreError::Status {
        status: status.as_u16(),
        message,
    })
}
