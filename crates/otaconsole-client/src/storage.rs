//! Persistent key/value storage for credentials.
//!
//! [`Session`](crate::Session) reads and writes credentials only through
//! [`CredentialStorage`], so the backing store can be swapped: memory for
//! tests and embedding, a JSON file for the command-line console.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};

use crate::error::{ClientError, Result};

/// Default credentials filename.
const CREDENTIALS_FILE: &str = "credentials.json";

/// Key/value storage backing a session.
pub trait CredentialStorage: Send + Sync + fmt::Debug {
    /// Returns the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removes `key`. Removing an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn remove(&self, key: &str) -> Result<()>;
}

/// In-process storage. Never fails.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryStorage {
    /// Creates an empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }
}

/// Storage in a JSON object file, written with 0600 permissions on unix.
///
/// Every operation goes to disk, so several console processes sharing one
/// file observe each other's logins and logouts.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStorage {
    /// Opens storage at `path`. The file is created on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Returns the default credentials path
    /// (`<config dir>/otaconsole/credentials.json`).
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("otaconsole")
            .join(CREDENTIALS_FILE)
    }

    /// Returns the storage file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let contents =
            fs::read_to_string(&self.path).map_err(|e| ClientError::storage(&self.path, e))?;
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        serde_json::from_str(&contents).map_err(|e| {
            ClientError::storage(
                &self.path,
                std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            )
        })
    }

    fn save(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| ClientError::storage(parent, e))?;
            }
        }

        let contents = serde_json::to_string_pretty(entries)?;

        // Readers in other processes see either the old file or the new one.
        let temp_path = self.temp_path();
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut temp = options
            .open(&temp_path)
            .map_err(|e| ClientError::storage(&temp_path, e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            temp.set_permissions(fs::Permissions::from_mode(0o600))
                .map_err(|e| ClientError::storage(&temp_path, e))?;
        }
        temp.write_all(contents.as_bytes())
            .and_then(|()| temp.sync_all())
            .map_err(|e| ClientError::storage(&temp_path, e))?;
        drop(temp);

        fs::rename(&temp_path, &self.path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            ClientError::storage(&self.path, e)
        })
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map_or_else(|| CREDENTIALS_FILE.into(), |name| name.to_string_lossy());
        self.path
            .with_file_name(format!(".{name}.{}.tmp", std::process::id()))
    }

    fn update(&self, apply: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<()> {
        let _guard = self.write_lock.lock();
        let mut entries = self.load()?;
        apply(&mut entries);
        self.save(&entries)
    }
}

impl CredentialStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        self.update(|entries| {
            entries.remove(key);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_storage() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get("token").unwrap(), None);

        storage.set("token", "abc123").unwrap();
        assert_eq!(storage.get("token").unwrap().as_deref(), Some("abc123"));

        storage.remove("token").unwrap();
        storage.remove("token").unwrap();
        assert_eq!(storage.get("token").unwrap(), None);
    }

    #[test]
    fn test_file_storage_persists_across_instances() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(CREDENTIALS_FILE);

        FileStorage::new(&path).set("oauth_token", "tok").unwrap();

        let reopened = FileStorage::new(&path);
        assert_eq!(reopened.get("oauth_token").unwrap().as_deref(), Some("tok"));
        assert_eq!(reopened.get("token").unwrap(), None);
    }

    #[test]
    fn test_file_storage_remove_missing_file() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path().join(CREDENTIALS_FILE));
        storage.remove("token").unwrap();
        assert!(!storage.path().exists());
    }

    #[test]
    fn test_file_storage_rejects_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CREDENTIALS_FILE);
        fs::write(&path, "not json").unwrap();

        let err = FileStorage::new(&path).get("token").unwrap_err();
        assert!(matches!(err, ClientError::Storage { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_file_storage_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CREDENTIALS_FILE);
        FileStorage::new(&path).set("token", "abc123").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn test_file_storage_tightens_existing_file() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CREDENTIALS_FILE);
        fs::write(&path, "{}").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        FileStorage::new(&path).set("token", "abc123").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_file_storage_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CREDENTIALS_FILE);
        let storage = FileStorage::new(&path);
        storage.set("token", "abc123").unwrap();
        storage.remove("token").unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from(CREDENTIALS_FILE)]);
        assert_eq!(storage.get("token").unwrap(), None);
    }
}
