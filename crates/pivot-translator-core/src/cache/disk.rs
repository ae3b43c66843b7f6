use sled::{Db, Tree};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::CacheKey;
use crate::error::{Error, Result};

/// Translations live in their own tree so the database can hold other data later
const UNITS_TREE: &str = "units";

/// Persistent layer: finished unit translations in a sled database
pub struct DiskCache {
    path: PathBuf,
    // Keeps the database open for as long as the tree is in use
    _db: Db,
    units: Tree,
}

impl DiskCache {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let db = sled::open(&path).map_err(|e| open_error(&path, &e))?;
        let units = db.open_tree(UNITS_TREE).map_err(|e| open_error(&path, &e))?;

        debug!(
            "Opened disk cache at {} ({} entries)",
            path.display(),
            units.len()
        );

        Ok(Self {
            path,
            _db: db,
            units,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &CacheKey) -> Option<String> {
        let bytes = self
            .units
            .get(key.as_str())
            .inspect_err(|e| warn!("Disk cache read failed: {}", e))
            .ok()
            .flatten()?;

        String::from_utf8(bytes.to_vec()).ok()
    }

    pub fn insert(&self, key: &CacheKey, text: &str) -> Result<()> {
        self.units
            .insert(key.as_str(), text.as_bytes())
            .map(drop)
            .map_err(|e| Error::CacheWrite(e.to_string()))
    }

    /// Persist pending writes
    pub fn flush(&self) -> Result<()> {
        self.units
            .flush()
            .map(drop)
            .map_err(|e| Error::CacheWrite(format!("flush failed: {e}")))
    }

    /// Remove every entry; returns how many there were
    pub fn clear(&self) -> Result<usize> {
        let count = self.units.len();
        self.units
            .clear()
            .map_err(|e| Error::CacheWrite(e.to_string()))?;
        self.flush()?;
        Ok(count)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

fn open_error(path: &Path, error: &sled::Error) -> Error {
    let locked = matches!(error, sled::Error::Io(io) if io.kind() == std::io::ErrorKind::WouldBlock);

    if locked {
        Error::CacheInit(format!(
            "cache at {} is locked by another process; rerun with --no-cache or wait for it to exit",
            path.display()
        ))
    } else {
        Error::CacheInit(format!("cannot open cache at {}: {}", path.display(), error))
    }
}
