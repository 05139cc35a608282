use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::{debug, info};

use super::AnswerStore;
use crate::config::DatabaseConfig;
use crate::error::{StorageError, StorageResult};

/// Static migrator that embeds migrations at compile time
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Path value selecting a private in-memory database.
const IN_MEMORY_PATH: &str = ":memory:";

/// SQLite-backed answer store scoped to one namespace
#[derive(Clone)]
pub struct SqliteAnswerStore {
    pool: SqlitePool,
    namespace: String,
}

impl SqliteAnswerStore {
    /// Open (or create) the database at `config.path`
    pub async fn new(config: &DatabaseConfig) -> StorageResult<Self> {
        if config.path.as_os_str() == IN_MEMORY_PATH {
            return Self::new_in_memory_with_namespace(&config.namespace).await;
        }

        // Ensure parent directory exists
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Connection {
                message: format!("Failed to create database directory: {}", e),
            })?;
        }

        let database_url = format!("sqlite://{}?mode=rwc", config.path.display());

        let options = SqliteConnectOptions::from_str(&database_url)
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let store = Self {
            pool,
            namespace: config.namespace.clone(),
        };
        store.run_migrations().await?;

        Ok(store)
    }

    /// In-memory store with the default namespace, for tests and throwaway sessions
    pub async fn new_in_memory() -> StorageResult<Self> {
        Self::new_in_memory_with_namespace(&DatabaseConfig::default().namespace).await
    }

    async fn new_in_memory_with_namespace(namespace: &str) -> StorageResult<Self> {
        let options =
            SqliteConnectOptions::from_str("sqlite::memory:").map_err(|e| {
                StorageError::Connection {
                    message: format!("Invalid database URL: {}", e),
                }
            })?;

        // Every connection to :memory: is its own database, so pin the pool
        // to a single connection that never expires.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to open in-memory database: {}", e),
            })?;

        let store = Self {
            pool,
            namespace: namespace.to_string(),
        };
        store.run_migrations().await?;

        Ok(store)
    }

    /// Run database migrations using embedded sqlx migrations
    async fn run_migrations(&self) -> StorageResult<()> {
        info!("Running database migrations...");

        MIGRATOR.run(&self.pool).await.map_err(|e| StorageError::Migration {
            message: format!("Failed to run migrations: {}", e),
        })?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Namespace this store reads and writes
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Get the underlying pool for advanced queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl AnswerStore for SqliteAnswerStore {
    async fn put(&self, key: &str, value: &Value) -> StorageResult<()> {
        let encoded = serde_json::to_string(value).map_err(|e| StorageError::Serialization {
            key: key.to_string(),
            message: e.to_string(),
        })?;

        sqlx::query(
            r#"
            INSERT INTO answer_entries (namespace, key, value, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(namespace, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&self.namespace)
        .bind(key)
        .bind(&encoded)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!(namespace = %self.namespace, key = %key, "Entry written");
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Option<Value>> {
        let row: Option<EntryRow> = sqlx::query_as(
            r#"
            SELECT key, value
            FROM answer_entries
            WHERE namespace = ? AND key = ?
            "#,
        )
        .bind(&self.namespace)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(EntryRow::decode).transpose()
    }

    async fn keys(&self) -> StorageResult<Vec<String>> {
        let keys: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT key
            FROM answer_entries
            WHERE namespace = ?
            ORDER BY key ASC
            "#,
        )
        .bind(&self.namespace)
        .fetch_all(&self.pool)
        .await?;

        Ok(keys.into_iter().map(|(k,)| k).collect())
    }

    async fn clear(&self) -> StorageResult<()> {
        let result = sqlx::query("DELETE FROM answer_entries WHERE namespace = ?")
            .bind(&self.namespace)
            .execute(&self.pool)
            .await?;

        debug!(
            namespace = %self.namespace,
            removed = result.rows_affected(),
            "Answer store cleared"
        );
        Ok(())
    }
}

// Internal row type for SQLx mapping
#[derive(sqlx::FromRow)]
struct EntryRow {
    key: String,
    value: String,
}

impl EntryRow {
    fn decode(self) -> StorageResult<Value> {
        serde_json::from_str(&self.value).map_err(|e| StorageError::Serialization {
            key: self.key,
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_put_get_overwrite() {
        let store = SqliteAnswerStore::new_in_memory().await.unwrap();
        store.put("problem6Answer", &json!(3)).await.unwrap();
        store.put("problem6Answer", &json!(7)).await.unwrap();
        assert_eq!(store.get("problem6Answer").await.unwrap(), Some(json!(7)));
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_clear_removes_only_own_namespace() {
        let store = SqliteAnswerStore::new_in_memory().await.unwrap();
        let other = SqliteAnswerStore {
            pool: store.pool().clone(),
            namespace: "other".to_string(),
        };

        store.put("userName", &json!("a")).await.unwrap();
        other.put("userName", &json!("b")).await.unwrap();
        store.clear().await.unwrap();

        assert!(store.keys().await.unwrap().is_empty());
        assert_eq!(other.get("userName").await.unwrap(), Some(json!("b")));
    }

    #[tokio::test]
    async fn test_corrupt_value_reports_key() {
        let store = SqliteAnswerStore::new_in_memory().await.unwrap();
        sqlx::query(
            "INSERT INTO answer_entries (namespace, key, value, updated_at) VALUES (?, ?, ?, ?)",
        )
        .bind(store.namespace())
        .bind("problem1Answers")
        .bind("{not json")
        .bind("2024-01-01T00:00:00Z")
        .execute(store.pool())
        .await
        .unwrap();

        match store.get("problem1Answers").await {
            Err(StorageError::Serialization { key, .. }) => assert_eq!(key, "problem1Answers"),
            other => panic!("expected serialization error, got {:?}", other.map(|_| ())),
        }
    }
}
