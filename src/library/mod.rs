//! Local assets and the playable catalog

pub mod assets;
pub mod catalog;

pub use assets::{AssetStore, AssetStream, DirAssetStore};
pub use catalog::{build_catalog, Catalog, Track};
