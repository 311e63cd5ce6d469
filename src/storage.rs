//! # Photo Storage
//!
//! Every fitted photo is written twice: to a timestamped slot
//! (`YYYYMMDD_HHMMSS.<ext>`, local time) that forms the gallery, and to the
//! `latest.<ext>` slot that viewers and the uploader read.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{CamError, CamResult};

const LATEST_STEM: &str = "latest";
const IMAGE_EXTENSIONS: [&str; 3] = ["webp", "jpg", "jpeg"];

/// Where a persisted photo landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPhoto {
    pub path: PathBuf,
    pub latest: PathBuf,
    pub size: usize,
}

impl StoredPhoto {
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Destination for fitted bytes.
pub trait PersistenceSink: Send + Sync {
    fn persist(&self, bytes: &[u8], extension: &str) -> CamResult<StoredPhoto>;
}

/// One gallery entry, in the shape the web gallery consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryItem {
    pub name: String,
    pub url: String,
    pub size: u64,
    pub mtime_ms: u64,
}

/// Directory-backed photo store.
#[derive(Debug, Clone)]
pub struct PhotoStore {
    dir: PathBuf,
}

impl PhotoStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn latest_path(&self, extension: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", LATEST_STEM, extension))
    }

    /// Gallery photos oldest first, excluding the `latest` slot.
    pub fn gallery(&self) -> CamResult<Vec<GalleryItem>> {
        let mut items = Vec::new();
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(items),
            Err(e) => return Err(CamError::io_at("list gallery", &self.dir, e)),
        };
        for entry in entries {
            let entry = entry.map_err(|e| CamError::io_at("list gallery", &self.dir, e))?;
            let path = entry.path();
            if !is_gallery_photo(&path) {
                continue;
            }
            let meta = entry
                .metadata()
                .map_err(|e| CamError::io_at("stat photo", &path, e))?;
            if !meta.is_file() {
                continue;
            }
            let mtime_ms = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map_or(0, |d| d.as_millis() as u64);
            let name = entry.file_name().to_string_lossy().into_owned();
            items.push(GalleryItem {
                url: format!("/img/{}", name),
                name,
                size: meta.len(),
                mtime_ms,
            });
        }
        items.sort_by(|a, b| a.mtime_ms.cmp(&b.mtime_ms).then_with(|| a.name.cmp(&b.name)));
        Ok(items)
    }

    /// The `latest` slot for `extension`, or the newest gallery photo with
    /// that extension when the slot is missing.
    pub fn latest(&self, extension: &str) -> CamResult<Option<PathBuf>> {
        let slot = self.latest_path(extension);
        if slot.is_file() {
            return Ok(Some(slot));
        }
        let suffix = format!(".{}", extension);
        Ok(self
            .gallery()?
            .into_iter()
            .rev()
            .find(|item| item.name.ends_with(&suffix))
            .map(|item| self.dir.join(item.name)))
    }

    fn timestamp_slot(&self, extension: &str) -> PathBuf {
        let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let mut path = self.dir.join(format!("{}.{}", stamp, extension));
        let mut n = 1;
        while path.exists() {
            path = self.dir.join(format!("{}_{}.{}", stamp, n, extension));
            n += 1;
        }
        path
    }
}

impl PersistenceSink for PhotoStore {
    fn persist(&self, bytes: &[u8], extension: &str) -> CamResult<StoredPhoto> {
        fs::create_dir_all(&self.dir).map_err(|e| CamError::io_at("create photos dir", &self.dir, e))?;

        let path = self.timestamp_slot(extension);
        fs::write(&path, bytes).map_err(|e| CamError::io_at("write photo", &path, e))?;
        let latest = self.latest_path(extension);
        fs::write(&latest, bytes).map_err(|e| CamError::io_at("write latest", &latest, e))?;

        debug!(latest = %latest.display(), "updated latest slot");
        info!(path = %path.display(), bytes = bytes.len(), "photo stored");
        Ok(StoredPhoto {
            path,
            latest,
            size: bytes.len(),
        })
    }
}

fn is_gallery_photo(path: &Path) -> bool {
    let ext_ok = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e));
    let stem_ok = path
        .file_stem()
        .and_then(|s| s.to_str())
        .is_some_and(|s| s != LATEST_STEM);
    ext_ok && stem_ok
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persist_writes_both_slots() {
        let dir = tempfile::tempdir().unwrap();
        let store = PhotoStore::new(dir.path().join("photos"));
        let stored = store.persist(b"abc", "webp").unwrap();

        assert_eq!(fs::read(&stored.path).unwrap(), b"abc");
        assert_eq!(fs::read(&stored.latest).unwrap(), b"abc");
        assert_eq!(stored.latest, store.latest_path("webp"));
        assert_eq!(stored.size, 3);
        // YYYYMMDD_HHMMSS.webp
        assert_eq!(stored.name().len(), 20);
    }

    #[test]
    fn same_second_does_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let store = PhotoStore::new(dir.path());
        let a = store.persist(b"one", "jpg").unwrap();
        let b = store.persist(b"two", "jpg").unwrap();
        assert_ne!(a.path, b.path);
        assert_eq!(fs::read(&a.path).unwrap(), b"one");
        assert_eq!(fs::read(store.latest_path("jpg")).unwrap(), b"two");
    }

    #[test]
    fn gallery_excludes_latest_and_other_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = PhotoStore::new(dir.path());
        store.persist(b"abc", "webp").unwrap();
        fs::write(dir.path().join("ledger.json"), b"[]").unwrap();
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();

        let items = store.gallery().unwrap();
        assert_eq!(items.len(), 1);
        assert!(items[0].url.starts_with("/img/"));
        assert_eq!(items[0].size, 3);
        assert!(items[0].mtime_ms > 0);
    }

    #[test]
    fn gallery_of_missing_dir_is_empty() {
        let store = PhotoStore::new("/nonexistent/fitcam/photos");
        assert!(store.gallery().unwrap().is_empty());
    }

    #[test]
    fn gallery_item_uses_camel_case() {
        let item = GalleryItem {
            name: "a.webp".into(),
            url: "/img/a.webp".into(),
            size: 1,
            mtime_ms: 2,
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["mtimeMs"], 2);
    }

    #[test]
    fn latest_falls_back_to_newest_photo() {
        let dir = tempfile::tempdir().unwrap();
        let store = PhotoStore::new(dir.path());
        assert_eq!(store.latest("webp").unwrap(), None);

        fs::write(dir.path().join("20240101_000000.webp"), b"a").unwrap();
        assert_eq!(
            store.latest("webp").unwrap(),
            Some(dir.path().join("20240101_000000.webp"))
        );

        store.persist(b"b", "webp").unwrap();
        assert_eq!(store.latest("webp").unwrap(), Some(store.latest_path("webp")));
    }
}
