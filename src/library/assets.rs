//! Local audio asset storage

use async_trait::async_trait;
use std::io;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// An opened local asset, ready to be handed to a decoder
#[derive(Debug)]
pub struct AssetStream {
    pub name: String,
    pub file: std::fs::File,
}

/// Read-only store of local audio files addressed by file name
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// List asset file names (with extension)
    async fn list(&self) -> io::Result<Vec<String>>;

    /// Open an asset by file name
    async fn open(&self, name: &str) -> io::Result<AssetStream>;
}

/// Asset store backed by a single directory
pub struct DirAssetStore {
    root: PathBuf,
    extensions: Vec<String>,
}

impl DirAssetStore {
    /// Create a store over `root`, accepting files with the given extensions
    pub fn new(root: PathBuf, extensions: &[String]) -> Self {
        let extensions = extensions
            .iter()
            .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();

        Self { root, extensions }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn is_audio_file(&self, name: &str) -> bool {
        Path::new(name)
            .extension()
            .and_then(|s| s.to_str())
            .map(|ext| {
                let ext = ext.to_ascii_lowercase();
                self.extensions.iter().any(|e| e == &ext)
            })
            .unwrap_or(false)
    }

    /// Resolve a name to a path inside the root, rejecting anything but a plain file name
    fn resolve(&self, name: &str) -> io::Result<PathBuf> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.root.join(name)),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid asset name: {:?}", name),
            )),
        }
    }
}

#[async_trait]
impl AssetStore for DirAssetStore {
    async fn list(&self) -> io::Result<Vec<String>> {
        let mut entries = fs::read_dir(&self.root).await?;
        let mut names = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if name.starts_with('.') || !self.is_audio_file(&name) {
                continue;
            }
            names.push(name);
        }

        // read_dir order is platform-defined
        names.sort();
        debug!("Found {} audio assets in {}", names.len(), self.root.display());
        Ok(names)
    }

    async fn open(&self, name: &str) -> io::Result<AssetStream> {
        let path = self.resolve(name)?;
        let file = fs::File::open(&path).await?;
        let len = file.metadata().await?.len();
        debug!("Opened asset {} ({} bytes)", path.display(), len);

        Ok(AssetStream {
            name: name.to_string(),
            file: file.into_std().await,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exts() -> Vec<String> {
        vec!["mp3".to_string(), ".FLAC".to_string()]
    }

    #[tokio::test]
    async fn test_list_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.mp3", "a.flac", "notes.txt", ".hidden.mp3", "C.MP3"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("folder.mp3")).unwrap();

        let store = DirAssetStore::new(dir.path().to_path_buf(), &exts());
        let names = store.list().await.unwrap();

        assert_eq!(names, vec!["C.MP3", "a.flac", "b.mp3"]);
    }

    #[tokio::test]
    async fn test_list_missing_dir_is_error() {
        let store = DirAssetStore::new(PathBuf::from("/nonexistent/tunedeck-assets"), &exts());
        assert!(store.list().await.is_err());
    }

    #[tokio::test]
    async fn test_open_returns_readable_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Shape of You.mp3"), b"12345").unwrap();

        let store = DirAssetStore::new(dir.path().to_path_buf(), &exts());
        let mut stream = store.open("Shape of You.mp3").await.unwrap();

        assert_eq!(stream.name, "Shape of You.mp3");
        let mut contents = String::new();
        std::io::Read::read_to_string(&mut stream.file, &mut contents).unwrap();
        assert_eq!(contents, "12345");
    }

    #[tokio::test]
    async fn test_open_missing_asset() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirAssetStore::new(dir.path().to_path_buf(), &exts());

        let err = store.open("missing.mp3").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_open_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirAssetStore::new(dir.path().to_path_buf(), &exts());

        let err = store.open("../etc/passwd").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
