use chrono::{DateTime, Datelike, Utc};
use log::{debug, warn};
use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Where a newly uploaded file is going to live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredLocation {
    /// Generated leaf name, `<uuid>.<ext>`
    pub filename: String,
    pub path: PathBuf,
}

/// Content directory laid out as `root/YYYY/MM/DD/<uuid>.<ext>`.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn day_dir(&self, at: DateTime<Utc>) -> PathBuf {
        self.root
            .join(format!("{:04}", at.year()))
            .join(format!("{:02}", at.month()))
            .join(format!("{:02}", at.day()))
    }

    /// Creates the day directory if needed and picks a fresh file name in it.
    /// `extension` must already be validated; the client's file name never
    /// takes part in the path.
    pub async fn allocate(&self, at: DateTime<Utc>, extension: &str) -> io::Result<StoredLocation> {
        let dir = self.day_dir(at);
        tokio::fs::create_dir_all(&dir).await?;

        let filename = format!("{}.{}", Uuid::new_v4(), extension);
        let path = dir.join(&filename);
        debug!("Allocated storage path {}", path.display());

        Ok(StoredLocation { filename, path })
    }

    /// Removes a stored file, logging instead of failing. A file that is
    /// already gone counts as removed.
    pub async fn discard(&self, path: &Path) -> bool {
        match tokio::fs::remove_file(path).await {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => true,
            Err(e) => {
                warn!("Failed to remove stored file {}: {}", path.display(), e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashSet;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_allocate_uses_date_hierarchy() {
        let temp = TempDir::new().unwrap();
        let layout = StorageLayout::new(temp.path());
        let at = Utc.with_ymd_and_hms(2024, 3, 7, 23, 59, 0).unwrap();

        let location = layout.allocate(at, "jpg").await.unwrap();

        let expected_dir = temp.path().join("2024").join("03").join("07");
        assert!(expected_dir.is_dir());
        assert_eq!(location.path.parent().unwrap(), expected_dir.as_path());
        assert!(location.filename.ends_with(".jpg"));
        assert_eq!(location.path.file_name().unwrap(), location.filename.as_str());
        // uuid + "." + ext
        assert_eq!(location.filename.len(), 36 + 4);
    }

    #[tokio::test]
    async fn test_allocate_is_idempotent_and_unique() {
        let temp = TempDir::new().unwrap();
        let layout = StorageLayout::new(temp.path());
        let at = Utc.with_ymd_and_hms(2024, 12, 1, 8, 0, 0).unwrap();

        let mut paths = HashSet::new();
        for _ in 0..50 {
            let location = layout.allocate(at, "png").await.unwrap();
            assert!(paths.insert(location.path));
        }
    }

    #[tokio::test]
    async fn test_discard_missing_file_is_ok() {
        let temp = TempDir::new().unwrap();
        let layout = StorageLayout::new(temp.path());
        assert!(layout.discard(&temp.path().join("nope.jpg")).await);
    }

    #[tokio::test]
    async fn test_discard_removes_file() {
        let temp = TempDir::new().unwrap();
        let layout = StorageLayout::new(temp.path());
        let path = temp.path().join("x.gif");
        tokio::fs::write(&path, b"GIF89a").await.unwrap();

        assert!(layout.discard(&path).await);
        assert!(!path.exists());
    }
}
