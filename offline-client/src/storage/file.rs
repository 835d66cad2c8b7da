//! File-backed storage: one file per key under a directory.

use super::Storage;
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use offline_first_types::StorageError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

const EXTENSION: &str = "item";

/// Longest key, in bytes, whose encoded file name fits in 255 bytes.
pub const MAX_KEY_LEN: usize = 180;

/// Storage that keeps each key in its own file.
///
/// File names are the URL-safe base64 of the key, so any key up to
/// [`MAX_KEY_LEN`] bytes is a valid file name. Longer keys are rejected.
/// Writes go through a temporary file and a rename.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Use `dir`, creating it if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    /// The backing directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        if key.len() > MAX_KEY_LEN {
            return Err(StorageError::Backend(format!(
                "key is {} bytes, file storage allows at most {}",
                key.len(),
                MAX_KEY_LEN
            )));
        }
        Ok(self
            .dir
            .join(format!("{}.{EXTENSION}", URL_SAFE_NO_PAD.encode(key))))
    }

    fn key_for(path: &Path) -> Option<String> {
        if path.extension()? != EXTENSION {
            return None;
        }
        let stem = path.file_stem()?.to_str()?;
        let bytes = URL_SAFE_NO_PAD.decode(stem).ok()?;
        String::from_utf8(bytes).ok()
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)?).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, value).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)?).await {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    async fn get_all_keys(&self) -> Result<Vec<String>, StorageError> {
        let mut entries = fs::read_dir(&self.dir).await?;
        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if let Some(key) = Self::key_for(&entry.path()) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn values_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::open(dir.path()).await.unwrap();
        storage.set_item("offline:outbox", "{\"a\":1}").await.unwrap();

        let reopened = FileStorage::open(dir.path()).await.unwrap();
        assert_eq!(
            reopened.get_item("offline:outbox").await.unwrap(),
            Some("{\"a\":1}".to_string())
        );
    }

    #[tokio::test]
    async fn keys_with_separators_round_trip() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::open(dir.path().join("nested")).await.unwrap();
        storage.set_item("a/b:c", "1").await.unwrap();
        storage.set_item("z", "2").await.unwrap();

        assert_eq!(
            storage.get_all_keys().await.unwrap(),
            vec!["a/b:c".to_string(), "z".to_string()]
        );
    }

    #[tokio::test]
    async fn missing_key_reads_none_and_removes_cleanly() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::open(dir.path()).await.unwrap();

        assert_eq!(storage.get_item("nope").await.unwrap(), None);
        storage.remove_item("nope").await.unwrap();
    }

    #[tokio::test]
    async fn longest_key_fits_and_longer_is_rejected() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::open(dir.path()).await.unwrap();
        let longest = "k".repeat(MAX_KEY_LEN);

        storage.set_item(&longest, "1").await.unwrap();
        assert_eq!(storage.get_item(&longest).await.unwrap(), Some("1".into()));

        let too_long = "k".repeat(MAX_KEY_LEN + 1);
        let err = storage.set_item(&too_long, "1").await.unwrap_err();
        assert!(matches!(err, StorageError::Backend(_)));
        assert_eq!(storage.get_all_keys().await.unwrap(), vec![longest]);
    }
}
