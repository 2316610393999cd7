use super::SnapshotStore;
use crate::error::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

/// Process-local snapshots (tests, and the degraded fallback)
#[derive(Default)]
pub struct MemorySnapshotStore {
    values: Mutex<HashMap<String, Value>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn save(&self, name: &str, value: &Value) -> Result<()> {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.insert(name.to_string(), value.clone());
        Ok(())
    }

    fn load(&self, name: &str) -> Result<Option<Value>> {
        let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        Ok(values.get(name).cloned())
    }
}
