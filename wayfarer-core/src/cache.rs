//! JSON file cache for route and search responses

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// String-keyed JSON values persisted as one pretty-printed file.
///
/// A corrupted or unreadable file starts the cache empty. Write failures are
/// logged and otherwise ignored; the in-memory copy stays authoritative for
/// the rest of the run.
pub struct JsonCache {
    path: Option<PathBuf>,
    entries: Mutex<Map<String, Value>>,
}

impl JsonCache {
    /// Open the cache file at `path`, or an in-memory-only cache for `None`.
    pub fn open(path: Option<PathBuf>) -> Self {
        let entries = path.as_deref().map(load).unwrap_or_default();
        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    /// A cache that remembers nothing between runs
    pub fn in_memory() -> Self {
        Self::open(None)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        self.entries.lock().await.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Store `value` and rewrite the backing file.
    pub async fn insert(&self, key: impl Into<String>, value: Value) {
        let snapshot = {
            let mut entries = self.entries.lock().await;
            entries.insert(key.into(), value);
            Value::Object(entries.clone())
        };

        let Some(path) = &self.path else {
            return;
        };

        let body = match serde_json::to_string_pretty(&snapshot) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize cache");
                return;
            }
        };

        if let Some(parent) = path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                tracing::error!(path = %parent.display(), error = %e, "Failed to create cache directory");
                return;
            }
        }
        if let Err(e) = tokio::fs::write(path, body).await {
            tracing::error!(path = %path.display(), error = %e, "Failed to save cache");
        }
    }

    /// Stable digest for composite keys
    pub fn digest_key(parts: &[&str]) -> String {
        let mut hasher = Sha256::new();
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                hasher.update(b"|");
            }
            hasher.update(part.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }
}

fn load(path: &Path) -> Map<String, Value> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Map::new(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Cache file unreadable. Starting with empty cache.");
            return Map::new();
        }
    };

    match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Object(map)) => map,
        _ => {
            tracing::warn!(path = %path.display(), "Cache file is corrupted. Starting with empty cache.");
            Map::new()
        }
    }
}
