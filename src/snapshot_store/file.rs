//! One JSON file per aggregate: `<dir>/<name>.json`

use super::SnapshotStore;
use crate::error::{Error, Result};
use serde_json::Value;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    /// Create store, making the directory if needed
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\', '.']) {
            return Err(Error::Snapshot(format!("invalid snapshot name: {}", name)));
        }
        Ok(self.dir.join(format!("{}.json", name)))
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn save(&self, name: &str, value: &Value) -> Result<()> {
        let path = self.path(name)?;
        fs::write(&path, serde_json::to_vec(value)?)
            .map_err(|e| Error::Snapshot(format!("{}: {}", path.display(), e)))
    }

    fn load(&self, name: &str) -> Result<Option<Value>> {
        let path = self.path(name)?;
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Snapshot(format!("{}: {}", path.display(), e))),
        };

        // A torn write reads as missing; the next save replaces the file
        match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable snapshot file");
                Ok(None)
            }
        }
    }
}
