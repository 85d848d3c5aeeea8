//! Catalog building: local assets matched against remote track metadata

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, info, warn};

use super::assets::AssetStore;
use crate::store::{DocumentStore, TrackRecord};

/// A playable track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Stable remote id; may be empty
    pub id: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub year: String,
    /// Preformatted "m:ss"
    pub duration_label: String,
    pub artwork_ref: String,
    /// Last-known remote flag, advisory only
    pub liked: bool,
    /// Local asset file name
    pub asset: String,
}

impl Track {
    fn from_record(record: TrackRecord, asset: String) -> Self {
        Self {
            id: record.id,
            title: record.title,
            artist: record.artist,
            album: record.album,
            year: record.year,
            duration_label: record.duration,
            artwork_ref: record.image_url,
            liked: record.liked,
            asset,
        }
    }
}

/// Ordered, index-addressable list of playable tracks
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    tracks: Vec<Track>,
}

impl Catalog {
    pub fn new(tracks: Vec<Track>) -> Self {
        Self { tracks }
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter()
    }

    /// Tracks whose title, artist or album contain `query`, ignoring case,
    /// with their catalog indices. A blank query matches everything.
    pub fn search(&self, query: &str) -> Vec<(usize, &Track)> {
        let query = query.trim().to_lowercase();
        self.tracks
            .iter()
            .enumerate()
            .filter(|(_, track)| {
                query.is_empty()
                    || [&track.title, &track.artist, &track.album]
                        .iter()
                        .any(|field| field.to_lowercase().contains(&query))
            })
            .collect()
    }
}

/// Candidate identifier of an asset: its file name without extension
pub fn asset_stem(name: &str) -> &str {
    Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name)
}

/// Keep the records whose title exactly matches an asset stem, in record order.
///
/// The first record for a given title wins; when several assets share a stem
/// the first in `assets` order is used.
pub fn match_assets(assets: &[String], records: Vec<TrackRecord>) -> Catalog {
    let mut by_stem: HashMap<&str, &String> = HashMap::new();
    for asset in assets {
        by_stem.entry(asset_stem(asset)).or_insert(asset);
    }

    let mut seen: HashSet<String> = HashSet::new();
    let mut tracks = Vec::new();

    for record in records {
        let Some(asset) = by_stem.get(record.title.as_str()) else {
            debug!("No local asset for remote track: {}", record.title);
            continue;
        };
        if !seen.insert(record.title.clone()) {
            debug!("Skipping duplicate remote track: {}", record.title);
            continue;
        }
        let asset = (*asset).clone();
        tracks.push(Track::from_record(record, asset));
    }

    Catalog::new(tracks)
}

/// Build the playable catalog.
///
/// Never fails: listing or fetch errors degrade to an empty catalog.
pub async fn build_catalog(assets: &dyn AssetStore, store: &dyn DocumentStore) -> Catalog {
    let names = match assets.list().await {
        Ok(names) => names,
        Err(e) => {
            warn!("Failed to list local assets: {}", e);
            return Catalog::default();
        }
    };

    let records = match store.list_tracks().await {
        Ok(records) => records,
        Err(e) => {
            warn!("Failed to fetch track metadata: {}", e);
            return Catalog::default();
        }
    };

    let catalog = match_assets(&names, records);
    info!(
        "Catalog ready: {} playable tracks ({} local assets)",
        catalog.len(),
        names.len()
    );
    catalog
}
