//! Cache provider
//!
//! One SQLite store per source, at `<cache dir>/<source id>.db`, created on
//! first use. Each source owns its store, so concurrent mirror updates never
//! contend on the same file; WAL mode plus a busy timeout serialize any
//! conflicting physical writes within one store.
//!
//! The provider only promises get-or-create by identifier. What a source keeps
//! in its store is up to that source.

use crate::{Error, Result};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Get-or-create access to per-source stores
#[derive(Debug, Clone)]
pub struct CacheProvider {
    directory: PathBuf,
    pools: Arc<Mutex<HashMap<String, SqlitePool>>>,
}

impl CacheProvider {
    /// Provider rooted at `directory` (normally `<root>/cache`)
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            pools: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Open (creating if needed) the store for `source_id`.
    ///
    /// Repeated calls with the same id return the same pool.
    pub async fn open(&self, source_id: &str) -> Result<SqlitePool> {
        validate_source_id(source_id)?;

        // Held across the connect so two callers never create the same store
        let mut pools = self.pools.lock().await;
        if let Some(pool) = pools.get(source_id) {
            return Ok(pool.clone());
        }

        std::fs::create_dir_all(&self.directory)?;
        let db_path = self.directory.join(format!("{}.db", source_id));
        let newly_created = !db_path.exists();

        let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await?;

        // WAL allows concurrent readers with one writer
        sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
        sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;
        create_source_metadata_table(&pool).await?;

        if newly_created {
            info!("Created cache store for {}: {}", source_id, db_path.display());
        } else {
            debug!("Opened cache store for {}: {}", source_id, db_path.display());
        }

        pools.insert(source_id.to_string(), pool.clone());
        Ok(pool)
    }

    /// Close every open store
    pub async fn close(&self) {
        let mut pools = self.pools.lock().await;
        for (_, pool) in pools.drain() {
            pool.close().await;
        }
    }
}

fn validate_source_id(source_id: &str) -> Result<()> {
    let valid = !source_id.is_empty()
        && source_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        && !source_id.starts_with('.');
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!("invalid cache id: {:?}", source_id)))
    }
}

async fn create_source_metadata_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS source_metadata (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Read a metadata value from a source store
pub async fn get_metadata(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM source_metadata WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|(value,)| value))
}

/// Write a metadata value to a source store
pub async fn set_metadata(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        "INSERT INTO source_metadata (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_source_id() {
        assert!(validate_source_id("github").is_ok());
        assert!(validate_source_id("discourse_forum.example-1").is_ok());
        assert!(validate_source_id("").is_err());
        assert!(validate_source_id("../escape").is_err());
        assert!(validate_source_id(".hidden").is_err());
        assert!(validate_source_id("a/b").is_err());
    }

    #[tokio::test]
    async fn test_open_creates_store_and_reuses_pool() {
        let dir = tempfile::tempdir().unwrap();
        let provider = CacheProvider::new(dir.path().join("cache"));

        let pool = provider.open("github").await.unwrap();
        assert!(dir.path().join("cache").join("github.db").exists());

        set_metadata(&pool, "last_update", "2024-01-01").await.unwrap();

        let again = provider.open("github").await.unwrap();
        assert_eq!(
            get_metadata(&again, "last_update").await.unwrap(),
            Some("2024-01-01".to_string())
        );
        provider.close().await;
    }

    #[tokio::test]
    async fn test_metadata_upsert() {
        let dir = tempfile::tempdir().unwrap();
        let provider = CacheProvider::new(dir.path());
        let pool = provider.open("discourse").await.unwrap();

        assert_eq!(get_metadata(&pool, "cursor").await.unwrap(), None);
        set_metadata(&pool, "cursor", "1").await.unwrap();
        set_metadata(&pool, "cursor", "2").await.unwrap();
        assert_eq!(get_metadata(&pool, "cursor").await.unwrap(), Some("2".to_string()));
        provider.close().await;
    }
}
