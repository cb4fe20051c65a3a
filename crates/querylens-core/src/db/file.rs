//! File-backed key-value store: one JSON file per key

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::debug;

use super::{KeyValueStore, UpdateFn};
use crate::error::{Error, Result};

/// Key-value store persisting each key as a file in a directory.
///
/// Writes go to a temporary file that is renamed over the target, so a crash
/// never leaves a half-written value. The lock only serializes writers inside
/// this process.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `dir`
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        debug!(dir = %dir.display(), "Opened file store");
        Ok(Self {
            dir,
            lock: Mutex::new(()),
        })
    }

    /// Root directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() {
            return Err(Error::storage("empty key"));
        }
        let name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        Ok(self.dir.join(format!("{name}.json")))
    }

    fn read(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)?) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock();
        self.read(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.lock.lock();
        self.write(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.lock.lock();
        self.delete(key)
    }

    fn update(&self, key: &str, f: &mut UpdateFn<'_>) -> Result<()> {
        let _guard = self.lock.lock();
        match f(self.read(key)?)? {
            Some(value) => self.write(key, &value),
            None => self.delete(key),
        }
    }
}
