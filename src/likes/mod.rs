//! Liked-flag synchronization against the document store
//!
//! The flag is flipped locally first and written to the store afterwards;
//! a failed write puts the old value back. The store document is never
//! locked, so this optimistic update with rollback is the only consistency
//! mechanism (last writer wins).

pub mod key;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::library::{Catalog, Track};
use crate::store::{DocumentStore, StoreError, TrackPatch};

pub use key::remote_key_for;

/// Liked state of the current track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LikeState {
    pub remote_key: String,
    pub liked: bool,
    /// A write is in flight; further toggles are refused until it resolves
    pub pending: bool,
}

/// A toggle that has been applied locally and still needs to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingToggle {
    pub remote_key: String,
    pub previous: bool,
    pub liked: bool,
}

/// Result of a finished toggle round-trip
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// Another toggle was still in flight
    Ignored,
    Committed { liked: bool },
    /// The write failed and the flag went back to its previous value
    RolledBack { liked: bool, notice: String },
}

impl LikeState {
    pub fn new(remote_key: String, liked: bool) -> Self {
        Self {
            remote_key,
            liked,
            pending: false,
        }
    }

    /// Flip the flag optimistically; `None` while a previous toggle is pending
    pub fn begin_toggle(&mut self) -> Option<PendingToggle> {
        if self.pending {
            debug!("Like toggle for {} refused: write in flight", self.remote_key);
            return None;
        }
        let previous = self.liked;
        self.liked = !previous;
        self.pending = true;

        Some(PendingToggle {
            remote_key: self.remote_key.clone(),
            previous,
            liked: self.liked,
        })
    }

    /// Settle a toggle with the write result, rolling back on failure
    pub fn finish_toggle(
        &mut self,
        toggle: &PendingToggle,
        result: Result<(), StoreError>,
    ) -> ToggleOutcome {
        self.pending = false;
        match result {
            Ok(()) => ToggleOutcome::Committed { liked: self.liked },
            Err(e) => {
                warn!("Failed to save like for {}: {}", toggle.remote_key, e);
                self.liked = toggle.previous;
                ToggleOutcome::RolledBack {
                    liked: self.liked,
                    notice: if toggle.liked {
                        "Couldn't save like, try again".to_string()
                    } else {
                        "Couldn't remove like, try again".to_string()
                    },
                }
            }
        }
    }
}

const LIKE_READS_IN_FLIGHT: usize = 8;

/// Reads and writes liked flags for tracks
#[derive(Clone)]
pub struct LikeSynchronizer {
    store: Arc<dyn DocumentStore>,
    user: Option<String>,
}

impl LikeSynchronizer {
    /// `user` enables the legacy per-user liked-ids fallback
    pub fn new(store: Arc<dyn DocumentStore>, user: Option<String>) -> Self {
        Self { store, user }
    }

    /// Current liked flag of a track.
    ///
    /// The track document is authoritative. Only when it is missing or
    /// unreadable is the legacy per-user list consulted; every failure maps
    /// to `false`.
    pub async fn load_liked_state(&self, track: &Track) -> bool {
        let key = remote_key_for(track);

        match self.store.get_track(&key).await {
            Ok(record) => return record.liked,
            Err(e) if e.is_not_found() => debug!("No like document for {}", key),
            Err(e) => warn!("Failed to read like state for {}: {}", key, e),
        }

        let Some(user) = &self.user else {
            return false;
        };
        match self.store.get_user_liked(user).await {
            Ok(ids) => ids.iter().any(|id| id == &key),
            Err(e) if e.is_not_found() => false,
            Err(e) => {
                warn!("Failed to read liked list of {}: {}", user, e);
                false
            }
        }
    }

    /// Liked tracks of the catalog with their indices, in catalog order
    pub async fn liked_tracks<'a>(&self, catalog: &'a Catalog) -> Vec<(usize, &'a Track)> {
        let flags: Vec<bool> = stream::iter(catalog.iter())
            .map(|track| self.load_liked_state(track))
            .buffered(LIKE_READS_IN_FLIGHT)
            .collect()
            .await;

        catalog
            .iter()
            .enumerate()
            .zip(flags)
            .filter_map(|(entry, liked)| liked.then_some(entry))
            .collect()
    }

    /// Load a fresh like state for a track that just became current
    pub async fn load(&self, track: &Track) -> LikeState {
        let liked = self.load_liked_state(track).await;
        LikeState::new(remote_key_for(track), liked)
    }

    /// Merge-write the flag together with the track's display fields, so the
    /// first like creates the document
    pub async fn write_liked(&self, track: &Track, toggle: &PendingToggle) -> Result<(), StoreError> {
        let patch = TrackPatch {
            liked: toggle.liked,
            title: track.title.clone(),
            artist: track.artist.clone(),
            album: track.album.clone(),
            year: track.year.clone(),
            duration: track.duration_label.clone(),
            image_url: track.artwork_ref.clone(),
            updated_at: Utc::now(),
        };
        self.store.merge_track(&toggle.remote_key, &patch).await?;
        info!("Saved like={} for {}", toggle.liked, toggle.remote_key);
        Ok(())
    }

    /// Full toggle round-trip: optimistic flip, write, rollback on failure
    pub async fn toggle_liked(&self, state: &mut LikeState, track: &Track) -> ToggleOutcome {
        let Some(toggle) = state.begin_toggle() else {
            return ToggleOutcome::Ignored;
        };
        let result = self.write_liked(track, &toggle).await;
        state.finish_toggle(&toggle, result)
    }
}
