use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use tracing::{debug, instrument};

use crate::errors::Result;

pub mod repository;

pub type DBPool = Pool<Sqlite>;

const MAX_CONNECTIONS: u32 = 4;

/// Handle to the embedded document store, created once and passed to every component.
#[derive(Debug, Clone)]
pub struct Store {
    pool: DBPool,
}

impl Store {
    /// Open (or create) the store at `path` and bring its schema up to date.
    pub async fn open(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await?;
        sqlx::migrate!().run(&pool).await?;
        debug!(path = %path.display(), "opened store");
        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &DBPool {
        &self.pool
    }

    /// Flush the write-ahead log into the database file.
    #[instrument(skip(self))]
    pub async fn persist(&self) -> Result<()> {
        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::temp_store;
    use super::*;

    #[tokio::test]
    async fn test_open_runs_migrations() {
        let (store, _dir) = temp_store().await;
        let tables: Vec<String> =
            sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
                .fetch_all(store.pool())
                .await
                .unwrap();
        assert!(tables.contains(&"episode".to_string()));
        assert!(tables.contains(&"fetch_watermark".to_string()));
        assert!(tables.contains(&"settings".to_string()));
    }

    #[tokio::test]
    async fn test_data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");

        let store = Store::open(&path).await.unwrap();
        let now = chrono::Utc::now();
        repository::watermark::set(store.pool(), "X", now).await.unwrap();
        store.persist().await.unwrap();
        store.close().await;

        let store = Store::open(&path).await.unwrap();
        let watermark = repository::watermark::get(store.pool(), "X").await.unwrap();
        assert_eq!(watermark, Some(now));
    }

    #[tokio::test]
    async fn test_persist_fails_on_closed_store() {
        let (store, _dir) = temp_store().await;
        store.pool().close().await;
        assert!(matches!(
            store.persist().await,
            Err(crate::errors::Error::Store(_))
        ));
    }
}
