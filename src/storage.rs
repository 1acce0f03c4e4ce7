use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension};

use crate::api::models::Message;
use crate::error::CacheError;

pub const DEFAULT_CACHE_KEY: &str = "chat_messages";

/// Durable on-device key-value storage. Failures are independent of the network.
#[async_trait]
pub trait KeyValueStore: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError>;
}

pub fn default_db_path() -> Option<PathBuf> {
    let proj = ProjectDirs::from("com", "example", "ChatMirror")?;
    Some(proj.data_dir().join("cache.sqlite"))
}

fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn open_conn(path: &Path) -> rusqlite::Result<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(std::time::Duration::from_secs(2))?;
    Ok(conn)
}

/// SQLite-backed store. Each call opens its own connection on the blocking pool.
pub struct SqliteStore {
    path: PathBuf,
}

impl SqliteStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let path = path.into();
        let init_err = |reason: String| CacheError::Write {
            key: "<schema>".into(),
            reason,
        };
        ensure_dir(&path).map_err(|e| init_err(e.to_string()))?;
        let conn = open_conn(&path).map_err(|e| init_err(e.to_string()))?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )
        .map_err(|e| init_err(e.to_string()))?;
        log::debug!("cache database ready at {}", path.display());
        Ok(Self { path })
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let path = self.path.clone();
        let owned = key.to_string();
        let read = tokio::task::spawn_blocking(move || {
            let conn = open_conn(&path)?;
            conn.query_row(
                "SELECT value FROM kv WHERE key = ?1",
                params![owned],
                |row| row.get::<_, String>(0),
            )
            .optional()
        })
        .await;

        match read {
            Ok(res) => res.map_err(|e| CacheError::Read {
                key: key.to_string(),
                reason: e.to_string(),
            }),
            Err(join) => Err(CacheError::Read {
                key: key.to_string(),
                reason: join.to_string(),
            }),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let path = self.path.clone();
        let owned_key = key.to_string();
        let owned_value = value.to_string();
        let write = tokio::task::spawn_blocking(move || {
            let conn = open_conn(&path)?;
            conn.execute(
                r#"
                INSERT INTO kv (key, value)
                VALUES (?1, ?2)
                ON CONFLICT(key) DO UPDATE SET value=excluded.value
                "#,
                params![owned_key, owned_value],
            )
            .map(|_| ())
        })
        .await;

        match write {
            Ok(res) => res.map_err(|e| CacheError::Write {
                key: key.to_string(),
                reason: e.to_string(),
            }),
            Err(join) => Err(CacheError::Write {
                key: key.to_string(),
                reason: join.to_string(),
            }),
        }
    }
}

/// Volatile store for runs that should leave nothing on disk.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(key: &str, value: &str) -> Self {
        let store = Self::new();
        if let Ok(mut entries) = store.entries.lock() {
            entries.insert(key.to_string(), value.to_string());
        }
        store
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let entries = self.entries.lock().map_err(|e| CacheError::Read {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().map_err(|e| CacheError::Write {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// The message list mirrored under one fixed key, stored as a JSON array.
///
/// `load`/`save` log and swallow failures; a broken cache only means the
/// view waits for the network.
pub struct MessageCache<S> {
    store: Arc<S>,
    key: String,
}

impl<S> Clone for MessageCache<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            key: self.key.clone(),
        }
    }
}

impl<S: KeyValueStore> MessageCache<S> {
    pub fn new(store: Arc<S>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub async fn try_load(&self) -> Result<Option<Vec<Message>>, CacheError> {
        let Some(raw) = self.store.get(&self.key).await? else {
            return Ok(None);
        };
        if raw.is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| CacheError::Corrupt {
                key: self.key.clone(),
                source,
            })
    }

    pub async fn try_save(&self, messages: &[Message]) -> Result<(), CacheError> {
        let raw = serde_json::to_string(messages).map_err(|e| CacheError::Write {
            key: self.key.clone(),
            reason: e.to_string(),
        })?;
        self.store.set(&self.key, &raw).await
    }

    pub async fn load(&self) -> Option<Vec<Message>> {
        match self.try_load().await {
            Ok(found) => found,
            Err(err) => {
                log::error!("Failed to load local messages: {err}");
                None
            }
        }
    }

    pub async fn save(&self, messages: &[Message]) {
        if let Err(err) = self.try_save(messages).await {
            log::error!("Failed to save local messages: {err}");
        }
    }
}

#[cfg(test)]
#[path = "storage_test.rs"]
mod storage_test;
