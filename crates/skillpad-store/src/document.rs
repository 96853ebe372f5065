//! Single-file JSON key-value store.
//!
//! The whole store is one JSON object on disk.  Values live in memory after
//! [`DocumentStore::open`]; [`DocumentStore::set`] changes memory only and
//! [`DocumentStore::save`] writes the document back atomically (temp file +
//! rename).  There is no optimistic concurrency: SkillPad is a single-user,
//! single-instance application, so read-modify-write is last-writer-wins.
//!
//! The handle is cheap to clone and is constructed once by the application's
//! composition root, then passed to every component that persists state.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};

/// Logical key holding the [`crate::Preferences`] record.
pub const PREFERENCES_KEY: &str = "preferences";
/// Logical key holding the ordered [`crate::Project`] list.
pub const PROJECTS_KEY: &str = "projects";
/// Logical key holding the last update check, in epoch milliseconds.
pub const LAST_UPDATE_CHECK_KEY: &str = "lastUpdateCheck";

/// Thread-safe handle to the persisted JSON document.
#[derive(Clone)]
pub struct DocumentStore {
    inner: Arc<Inner>,
}

struct Inner {
    /// `None` for in-memory stores.
    path: Option<PathBuf>,
    values: RwLock<Map<String, Value>>,
    /// Serializes writers of the backing file.
    save_lock: Mutex<()>,
}

impl DocumentStore {
    /// Load the document at `path`; a missing file is an empty document.
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let values = match tokio::fs::read_to_string(&path).await {
            Ok(raw) if raw.trim().is_empty() => Map::new(),
            Ok(raw) => match serde_json::from_str::<Value>(&raw)? {
                Value::Object(map) => map,
                other => {
                    return Err(StoreError::Corrupt {
                        path,
                        reason: format!("expected an object, found {}", json_kind(&other)),
                    });
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "store file absent, starting empty");
                Map::new()
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        info!(path = %path.display(), keys = values.len(), "document store opened");
        Ok(Self {
            inner: Arc::new(Inner {
                path: Some(path),
                values: RwLock::new(values),
                save_lock: Mutex::new(()),
            }),
        })
    }

    /// A store that never touches disk -- useful for tests.
    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(Inner {
                path: None,
                values: RwLock::new(Map::new()),
                save_lock: Mutex::new(()),
            }),
        }
    }

    /// Read and decode `key`.  A value that no longer matches `T` is treated
    /// as absent.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let values = self.inner.values.read().await;
        let raw = values.get(key)?.clone();
        drop(values);

        match serde_json::from_value(raw) {
            Ok(v) => Some(v),
            Err(err) => {
                warn!(key, %err, "stored value has unexpected shape, ignoring");
                None
            }
        }
    }

    /// Set `key` in memory.  Call [`DocumentStore::save`] to persist.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StoreResult<()> {
        let json = serde_json::to_value(value)?;
        self.inner.values.write().await.insert(key.to_owned(), json);
        debug!(key, "store value set");
        Ok(())
    }

    /// Set `key` and persist immediately.
    pub async fn put<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StoreResult<()> {
        self.set(key, value).await?;
        self.save().await
    }

    /// Write the document to disk (no-op for in-memory stores).
    pub async fn save(&self) -> StoreResult<()> {
        let Some(path) = &self.inner.path else {
            return Ok(());
        };

        // Held through the rename so concurrent saves never share the temp
        // file, and the snapshot taken last is the one that lands.
        let _guard = self.inner.save_lock.lock().await;
        let serialized = {
            let values = self.inner.values.read().await;
            serde_json::to_string_pretty(&*values)?
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StoreError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serialized)
            .await
            .map_err(|source| StoreError::Io {
                path: tmp.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;

        debug!(path = %path.display(), "document store saved");
        Ok(())
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
