#![allow(async_fn_in_trait)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use sqlx::SqlitePool;
use tracing::{debug, warn};

use crate::error::{StorageError, StorageResult};

/// Key/value settings collaborator.
///
/// Values are plain text; callers parse them. A missing key is `Ok(None)`,
/// never an error.
pub trait SettingsStore: Send + Sync {
    /// Read a single value.
    async fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Insert or replace a value.
    async fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Delete a value. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> StorageResult<()>;

    /// Insert each pair whose key is absent, leaving existing values alone.
    async fn ensure_defaults(&self, defaults: &[(&str, &str)]) -> StorageResult<()>;
}

/// SQLite implementation of [`SettingsStore`].
#[derive(Debug, Clone)]
pub struct SqliteSettingsStore {
    pool: SqlitePool,
}

impl SqliteSettingsStore {
    /// Create a settings store on an already-migrated pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl SettingsStore for SqliteSettingsStore {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let value: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(value.map(|(value,)| value))
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        sqlx::query("INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;

        debug!(key, value, "Setting stored");
        Ok(())
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        let result = sqlx::query("DELETE FROM settings WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() > 0 {
            debug!(key, "Setting removed");
        }
        Ok(())
    }

    async fn ensure_defaults(&self, defaults: &[(&str, &str)]) -> StorageResult<()> {
        let mut tx = self.pool.begin().await?;
        for &(key, value) in defaults {
            let result = sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
                .bind(key)
                .bind(value)
                .execute(&mut *tx)
                .await?;

            if result.rows_affected() > 0 {
                debug!(key, value, "Default setting seeded");
            }
        }
        tx.commit().await?;
        Ok(())
    }
}

/// In-process [`SettingsStore`] for tests and simulation.
#[derive(Debug, Clone, Default)]
pub struct MemorySettingsStore {
    values: Arc<Mutex<HashMap<String, String>>>,
}

impl MemorySettingsStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-filled with `pairs`.
    pub fn with_values<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let values = pairs
            .into_iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Self {
            values: Arc::new(Mutex::new(values)),
        }
    }

    fn values(&self) -> StorageResult<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.values.lock().map_err(|_| {
            warn!("Memory settings lock poisoned");
            StorageError::Internal("settings lock poisoned".to_string())
        })
    }
}

impl SettingsStore for MemorySettingsStore {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.values()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.values()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        self.values()?.remove(key);
        Ok(())
    }

    async fn ensure_defaults(&self, defaults: &[(&str, &str)]) -> StorageResult<()> {
        let mut values = self.values()?;
        for &(key, value) in defaults {
            values
                .entry(key.to_string())
                .or_insert_with(|| value.to_string());
        }
        Ok(())
    }
}

/// Enum wrapper for settings store dispatch.
///
/// Native async trait methods are not object-safe, so the station holds this
/// concrete type instead of a `Box<dyn SettingsStore>`.
///
/// # Examples
///
/// ```
/// use conveyor_storage::settings::{AnySettingsStore, MemorySettingsStore, SettingsStore};
///
/// #[tokio::main]
/// async fn main() -> conveyor_storage::StorageResult<()> {
///     let store = AnySettingsStore::Memory(MemorySettingsStore::new());
///     store.set("batch_target", "12").await?;
///     assert_eq!(store.get("batch_target").await?.as_deref(), Some("12"));
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum AnySettingsStore {
    /// SQLite-backed store.
    Sqlite(SqliteSettingsStore),

    /// In-process store.
    Memory(MemorySettingsStore),
}

impl SettingsStore for AnySettingsStore {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        match self {
            Self::Sqlite(store) => store.get(key).await,
            Self::Memory(store) => store.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        match self {
            Self::Sqlite(store) => store.set(key, value).await,
            Self::Memory(store) => store.set(key, value).await,
        }
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        match self {
            Self::Sqlite(store) => store.remove(key).await,
            Self::Memory(store) => store.remove(key).await,
        }
    }

    async fn ensure_defaults(&self, defaults: &[(&str, &str)]) -> StorageResult<()> {
        match self {
            Self::Sqlite(store) => store.ensure_defaults(defaults).await,
            Self::Memory(store) => store.ensure_defaults(defaults).await,
        }
    }
}

impl From<SqliteSettingsStore> for AnySettingsStore {
    fn from(store: SqliteSettingsStore) -> Self {
        Self::Sqlite(store)
    }
}

impl From<MemorySettingsStore> for AnySettingsStore {
    fn from(store: MemorySettingsStore) -> Self {
        Self::Memory(store)
    }
}
