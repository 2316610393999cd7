//! Audit Logs
//!
//! JSON array files with the newest entry first: the client event log and
//! the deployment history.
//!
//! Read-modify-write. Writers in this process are serialized; other processes
//! writing the same file are not coordinated (last write wins).

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs;
use tokio::sync::Mutex;

/// Default deployment note
pub const DEFAULT_DEPLOY_MESSAGE: &str = "Manual deployment";

/// One deployment history entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentEntry {
    pub date: DateTime<Utc>,
    pub message: String,
}

impl DeploymentEntry {
    pub fn new(message: Option<String>, date: DateTime<Utc>) -> Self {
        Self {
            date,
            message: message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_DEPLOY_MESSAGE.to_string()),
        }
    }
}

pub struct JsonArrayLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonArrayLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// All entries, newest first. Missing or unreadable files read as empty.
    pub async fn entries(&self) -> Result<Vec<Value>> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice::<Vec<Value>>(&bytes) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Unreadable log file, treating as empty");
                Ok(Vec::new())
            }
        }
    }

    /// Insert `entry` at the front
    pub async fn prepend(&self, entry: Value) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut entries = self.entries().await?;
        entries.insert(0, entry);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&self.path, serde_json::to_vec_pretty(&entries)?).await?;

        tracing::debug!(path = %self.path.display(), entries = entries.len(), "Log entry added");
        Ok(())
    }
}
