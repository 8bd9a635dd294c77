//! Atomic TOML file writes: temp file, fsync, rename, under an exclusive
//! advisory lock.

use std::fs::{self, File, OpenOptions};
use std::io::Write as _;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AtomicTomlError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parse error in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("TOML serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("failed to lock {path}: {message}")]
    Lock { path: PathBuf, message: String },
}

impl AtomicTomlError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        AtomicTomlError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A typed TOML document on disk.
///
/// A reader sees either the previous or the new contents, never a partial
/// file. Writers hold `<name>.lock` for the duration of a save.
pub struct AtomicTomlFile<T> {
    path: PathBuf,
    _phantom: PhantomData<T>,
}

impl<T> AtomicTomlFile<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _phantom: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads and deserializes the file.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(T))`: Successfully loaded and deserialized
    /// - `Ok(None)`: File doesn't exist or is empty
    /// - `Err`: Failed to read or parse the file
    pub fn load(&self) -> Result<Option<T>, AtomicTomlError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AtomicTomlError::io(&self.path, e)),
        };
        if content.trim().is_empty() {
            return Ok(None);
        }
        toml::from_str(&content)
            .map(Some)
            .map_err(|source| AtomicTomlError::Parse {
                path: self.path.clone(),
                source,
            })
    }

    /// Serializes `data` and replaces the file atomically.
    pub fn save(&self, data: &T) -> Result<(), AtomicTomlError> {
        let serialized = toml::to_string_pretty(data)?;
        let _lock = FileLock::acquire(&self.path)?;

        let tmp_path = self.temp_path()?;
        let mut tmp_file =
            File::create(&tmp_path).map_err(|e| AtomicTomlError::io(&tmp_path, e))?;
        tmp_file
            .write_all(serialized.as_bytes())
            .and_then(|_| tmp_file.sync_all())
            .map_err(|e| AtomicTomlError::io(&tmp_path, e))?;
        drop(tmp_file);

        fs::rename(&tmp_path, &self.path).map_err(|e| AtomicTomlError::io(&self.path, e))
    }

    /// Removes the file. A missing file is not an error.
    pub fn remove(&self) -> Result<(), AtomicTomlError> {
        let _lock = FileLock::acquire(&self.path)?;
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AtomicTomlError::io(&self.path, e)),
        }
    }

    fn temp_path(&self) -> Result<PathBuf, AtomicTomlError> {
        let invalid = |message: &str| {
            AtomicTomlError::io(
                &self.path,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, message.to_string()),
            )
        };
        let parent = self
            .path
            .parent()
            .ok_or_else(|| invalid("path has no parent directory"))?;
        let file_name = self
            .path
            .file_name()
            .ok_or_else(|| invalid("path has no file name"))?;
        Ok(parent.join(format!(".{}.tmp", file_name.to_string_lossy())))
    }
}

/// Exclusive advisory lock, released on drop.
struct FileLock {
    file: File,
    lock_path: PathBuf,
}

impl FileLock {
    fn acquire(path: &Path) -> Result<Self, AtomicTomlError> {
        let lock_path = path.with_extension("lock");
        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent).map_err(|e| AtomicTomlError::io(parent, e))?;
        }
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| AtomicTomlError::io(&lock_path, e))?;
        file.lock_exclusive().map_err(|e| AtomicTomlError::Lock {
            path: lock_path.clone(),
            message: e.to_string(),
        })?;
        Ok(FileLock { file, lock_path })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        let _ = fs::remove_file(&self.lock_path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Doc {
        name: String,
        count: u32,
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let file = AtomicTomlFile::<Doc>::new(temp_dir.path().join("doc.toml"));
        let doc = Doc {
            name: "test".into(),
            count: 42,
        };
        file.save(&doc).unwrap();
        assert_eq!(file.load().unwrap(), Some(doc));
    }

    #[test]
    fn test_load_nonexistent_file() {
        let temp_dir = TempDir::new().unwrap();
        let file = AtomicTomlFile::<Doc>::new(temp_dir.path().join("missing.toml"));
        assert!(file.load().unwrap().is_none());
    }

    #[test]
    fn test_no_temp_or_lock_left_behind() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("doc.toml");
        let file = AtomicTomlFile::<Doc>::new(path.clone());
        file.save(&Doc {
            name: "a".into(),
            count: 1,
        })
        .unwrap();
        assert!(path.exists());
        assert!(!temp_dir.path().join(".doc.toml.tmp").exists());
        assert!(!temp_dir.path().join("doc.lock").exists());
    }

    #[test]
    fn test_parse_error_names_the_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.toml");
        fs::write(&path, "name = ").unwrap();
        let err = AtomicTomlFile::<Doc>::new(path).load().unwrap_err();
        assert!(matches!(err, AtomicTomlError::Parse { .. }));
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("doc.toml");
        let file = AtomicTomlFile::<Doc>::new(path.clone());
        file.save(&Doc {
            name: "a".into(),
            count: 1,
        })
        .unwrap();
        file.remove().unwrap();
        file.remove().unwrap();
        assert!(!path.exists());
    }
}
