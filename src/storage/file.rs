//! Directory-backed key-value store.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::KeyValueStore;
use crate::error::StorageError;

/// [`KeyValueStore`] keeping each key in `<dir>/<key>.json`.
///
/// Keys are restricted to ASCII letters, digits, `_` and `-` so they can
/// never escape the directory. Writes go to a temporary file first and are
/// renamed into place.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open a store in `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Unavailable`] if the directory cannot be created.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| StorageError::Unavailable {
            message: format!("cannot create {}: {e}", dir.display()),
        })?;
        Ok(Self { dir })
    }

    /// Directory holding the files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StorageError::InvalidKey {
                key: key.to_string(),
            });
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io {
                key: key.to_string(),
                message: e.to_string(),
            }),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("json.tmp");
        let io_err = |e: std::io::Error| StorageError::Io {
            key: key.to_string(),
            message: e.to_string(),
        };
        fs::write(&tmp, value).map_err(io_err)?;
        fs::rename(&tmp, &path).map_err(io_err)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io {
                key: key.to_string(),
                message: e.to_string(),
            }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_store() -> (FileStore, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = FileStore::open(temp_dir.path().join("monitoring")).unwrap();
        (store, temp_dir)
    }

    #[test]
    fn test_open_creates_directory() {
        let (store, _temp_dir) = create_store();
        assert!(store.dir().is_dir());
    }

    #[test]
    fn test_round_trip() {
        let (store, _temp_dir) = create_store();
        store.set("api_metrics", r#"{"metrics":[]}"#).unwrap();
        assert_eq!(
            store.get("api_metrics").unwrap().as_deref(),
            Some(r#"{"metrics":[]}"#)
        );
        assert!(store.dir().join("api_metrics.json").is_file());
        assert!(!store.dir().join("api_metrics.json.tmp").exists());
    }

    #[test]
    fn test_missing_key() {
        let (store, _temp_dir) = create_store();
        assert!(store.get("nothing").unwrap().is_none());
        store.remove("nothing").unwrap();
    }

    #[test]
    fn test_overwrite_and_remove() {
        let (store, _temp_dir) = create_store();
        store.set("error_logs", "1").unwrap();
        store.set("error_logs", "2").unwrap();
        assert_eq!(store.get("error_logs").unwrap().as_deref(), Some("2"));
        store.remove("error_logs").unwrap();
        assert!(store.get("error_logs").unwrap().is_none());
    }

    #[test]
    fn test_rejects_path_like_keys() {
        let (store, _temp_dir) = create_store();
        for key in ["../escape", "a/b", "", "dot.key"] {
            let err = store.set(key, "x").unwrap_err();
            assert!(matches!(err, StorageError::InvalidKey { .. }), "{key}");
        }
    }

    #[test]
    fn test_persists_across_instances() {
        let temp_dir = TempDir::new().unwrap();
        FileStore::open(temp_dir.path())
            .unwrap()
            .set("user", r#"{"id":7}"#)
            .unwrap();

        let reopened = FileStore::open(temp_dir.path()).unwrap();
        assert_eq!(reopened.get("user").unwrap().as_deref(), Some(r#"{"id":7}"#));
    }
}
