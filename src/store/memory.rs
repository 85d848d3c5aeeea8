//! In-memory document store used by tests

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Notify;

use super::models::{TrackPatch, TrackRecord};
use super::{DocumentStore, StoreError};

#[derive(Default)]
pub struct MemoryStore {
    tracks: Mutex<Vec<(String, TrackRecord)>>,
    users: Mutex<HashMap<String, Vec<String>>>,
    pub fail_reads: AtomicBool,
    pub fail_writes: AtomicBool,
    pub writes: AtomicUsize,
    /// When set, writes wait for a notification before completing
    write_gate: Mutex<Option<std::sync::Arc<Notify>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tracks(records: Vec<TrackRecord>) -> Self {
        let store = Self::new();
        for record in records {
            store.insert(&record.id.clone(), record);
        }
        store
    }

    pub fn insert(&self, key: &str, record: TrackRecord) {
        self.tracks.lock().unwrap().push((key.to_string(), record));
    }

    pub fn set_user_likes(&self, user: &str, keys: &[&str]) {
        self.users
            .lock()
            .unwrap()
            .insert(user.to_string(), keys.iter().map(|k| k.to_string()).collect());
    }

    pub fn document(&self, key: &str) -> Option<TrackRecord> {
        self.tracks
            .lock()
            .unwrap()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, r)| r.clone())
    }

    pub fn gate_writes(&self) -> std::sync::Arc<Notify> {
        let notify = std::sync::Arc::new(Notify::new());
        *self.write_gate.lock().unwrap() = Some(notify.clone());
        notify
    }

    fn unreachable() -> StoreError {
        StoreError::Status {
            status: 503,
            message: "unavailable".to_string(),
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list_tracks(&self) -> Result<Vec<TrackRecord>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Self::unreachable());
        }
        Ok(self
            .tracks
            .lock()
            .unwrap()
            .iter()
            .map(|(_, r)| r.clone())
            .collect())
    }

    async fn get_track(&self, key: &str) -> Result<TrackRecord, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Self::unreachable());
        }
        self.document(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn merge_track(&self, key: &str, patch: &TrackPatch) -> Result<(), StoreError> {
        let gate = self.write_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Self::unreachable());
        }

        let mut tracks = self.tracks.lock().unwrap();
        let record = TrackRecord {
            id: key.to_string(),
            title: patch.title.clone(),
            artist: patch.artist.clone(),
            album: patch.album.clone(),
            year: patch.year.clone(),
            duration: patch.duration.clone(),
            image_url: patch.image_url.clone(),
            liked: patch.liked,
        };
        match tracks.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = record,
            None => tracks.push((key.to_string(), record)),
        }
        Ok(())
    }

    async fn get_user_liked(&self, user: &str) -> Result<Vec<String>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Self::unreachable());
        }
        self.users
            .lock()
            .unwrap()
            .get(user)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(user.to_string()))
    }
}
