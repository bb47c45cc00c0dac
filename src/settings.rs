//! Typed key-value settings store (§4.3).
//!
//! Reads are served from an in-memory cache; writes go through the database first and then
//! invalidate (repopulate) the cache entry, so concurrent readers never see a write half-applied.

use std::collections::HashMap;

use anyhow::Result;
use parking_lot::RwLock;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value as JsonValue;
use sqlx::SqlitePool;

/// Settings whose change requires a process restart to take effect (e.g. bind address).
const RESTART_REQUIRED_KEYS: &[&str] = &["server.host", "server.port", "database.url"];

#[derive(Debug, Clone, sqlx::FromRow)]
struct SettingRow {
    key: String,
    value: String,
}

pub struct Settings {
    pool: SqlitePool,
    cache: RwLock<HashMap<String, JsonValue>>,
}

impl Settings {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Load all persisted settings into the in-memory cache. Call once at startup.
    pub async fn warm(&self) -> Result<()> {
        let rows = sqlx::query_as::<_, SettingRow>("SELECT key, value FROM app_settings")
            .fetch_all(&self.pool)
            .await?;
        let mut cache = self.cache.write();
        for row in rows {
            if let Ok(value) = serde_json::from_str(&row.value) {
                cache.insert(row.key, value);
            }
        }
        Ok(())
    }

    /// Typed read with a default, served from cache.
    pub fn get<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        let cache = self.cache.read();
        match cache.get(key) {
            Some(value) => serde_json::from_value(value.clone()).unwrap_or(default),
            None => default,
        }
    }

    /// Typed write: persists as JSON, then refreshes the cache entry. Returns whether the
    /// server needs a restart for the new value to take effect.
    pub async fn set<T: Serialize>(&self, key: &str, value: T) -> Result<bool> {
        let json = serde_json::to_value(value)?;
        let text = serde_json::to_string(&json)?;

        sqlx::query(
            r#"
            INSERT INTO app_settings (key, value)
            VALUES ($1, $2)
            ON CONFLICT (key) DO UPDATE SET value = $2
            "#,
        )
        .bind(key)
        .bind(&text)
        .execute(&self.pool)
        .await?;

        self.cache.write().insert(key.to_string(), json);
        Ok(RESTART_REQUIRED_KEYS.contains(&key))
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM app_settings WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        self.cache.write().remove(key);
        Ok(())
    }

    /// Snapshot of every cached setting, for admin display.
    pub fn get_all(&self) -> HashMap<String, JsonValue> {
        self.cache.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_pool() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::query(
            "CREATE TABLE app_settings (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
        )
        .execute(&pool)
        .await
        .unwrap();
        pool
    }

    #[tokio::test]
    async fn set_then_get_round_trips_through_cache() {
        let settings = Settings::new(memory_pool().await);
        let restart = settings.set("watcher.coalesce_window_ms", 750u64).await.unwrap();
        assert!(!restart);
        assert_eq!(settings.get::<u64>("watcher.coalesce_window_ms", 0), 750);
    }

    #[tokio::test]
    async fn unset_key_returns_default() {
        let settings = Settings::new(memory_pool().await);
        assert_eq!(settings.get::<u64>("missing", 42), 42);
    }

    #[tokio::test]
    async fn known_restart_keys_flag_restart_required() {
        let settings = Settings::new(memory_pool().await);
        let restart = settings.set("server.port", 9000u16).await.unwrap();
        assert!(restart);
    }

    #[tokio::test]
    async fn warm_populates_cache_from_db() {
        let pool = memory_pool().await;
        sqlx::query("INSERT INTO app_settings (key, value) VALUES ('a', '1')")
            .execute(&pool)
            .await
            .unwrap();
        let settings = Settings::new(pool);
        settings.warm().await.unwrap();
        assert_eq!(settings.get::<u64>("a", 0), 1);
    }
}
