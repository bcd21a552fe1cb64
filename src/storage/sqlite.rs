//! SQLite document store
//!
//! Documents are stored as JSON text in a single `documents` table, keyed by
//! the logical database and collection names. The schema is created by sqlx
//! migrations on connect.
//!
//! ## Connection targets
//!
//! - `sqlite://path/to/energy.db` or `sqlite:energy.db` URLs
//! - `sqlite::memory:` for a private in-memory database
//! - plain file paths
//!
//! Missing database files are created. A target that cannot be opened (for
//! example a file inside a directory that does not exist) fails to connect.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Pool, Row, Sqlite};
use tracing::{debug, info, instrument, warn};

use super::backend::{DocumentStore, HealthStatus};
use super::error::{StorageError, StorageResult};
use super::schema::{DocumentId, Namespace, StoredDocument};

/// SQLite document store bound to one namespace
pub struct SqliteStore {
    pool: Pool<Sqlite>,
    namespace: Namespace,
    target: String,
}

impl SqliteStore {
    /// Connect to `target`, creating the database and schema when missing
    ///
    /// Fails with [`StorageError::Timeout`] if the pool cannot be
    /// established within `connect_timeout`.
    #[instrument(skip(namespace, connect_timeout))]
    pub async fn connect(
        target: &str,
        namespace: Namespace,
        connect_timeout: Duration,
    ) -> StorageResult<Self> {
        info!("connecting to SQLite document store");

        let in_memory = target.contains(":memory:");
        let options = Self::connect_options(target, in_memory)?;

        // an in-memory database only lives as long as its single connection
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = tokio::time::timeout(
            connect_timeout,
            pool_options
                .acquire_timeout(connect_timeout)
                .connect_with(options),
        )
        .await
        .map_err(|_| StorageError::Timeout(connect_timeout))?
        .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        debug!("running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;

        info!("SQLite document store ready for {namespace}");

        Ok(Self {
            pool,
            namespace,
            target: target.to_string(),
        })
    }

    fn connect_options(target: &str, in_memory: bool) -> StorageResult<SqliteConnectOptions> {
        let options = if target.starts_with("sqlite:") {
            SqliteConnectOptions::from_str(target)
                .map_err(|e| StorageError::InvalidConfig(e.to_string()))?
        } else {
            SqliteConnectOptions::new().filename(target)
        };

        let options = options
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));

        if in_memory {
            return Ok(options);
        }

        Ok(options
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal))
    }

    fn millis_to_timestamp(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
    }

    fn row_to_document(row: SqliteRow) -> StorageResult<StoredDocument> {
        let body: String = row.get("body");

        Ok(StoredDocument {
            id: DocumentId(row.get("id")),
            inserted_at: Self::millis_to_timestamp(row.get("inserted_at")),
            body: serde_json::from_str(&body)?,
        })
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    #[instrument(skip_all, fields(namespace = %self.namespace))]
    async fn insert_one(&self, document: serde_json::Value) -> StorageResult<DocumentId> {
        let body = serde_json::to_string(&document)?;

        let result = sqlx::query(
            r#"
            INSERT INTO documents (database_name, collection, inserted_at, body)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&self.namespace.database)
        .bind(&self.namespace.collection)
        .bind(Utc::now().timestamp_millis())
        .bind(body)
        .execute(&self.pool)
        .await?;

        Ok(DocumentId(result.last_insert_rowid()))
    }

    #[instrument(skip_all, fields(namespace = %self.namespace))]
    async fn count_documents(&self) -> StorageResult<u64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM documents WHERE database_name = ? AND collection = ?",
        )
        .bind(&self.namespace.database)
        .bind(&self.namespace.collection)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.max(0) as u64)
    }

    #[instrument(skip_all, fields(namespace = %self.namespace))]
    async fn find_latest(&self, limit: usize) -> StorageResult<Vec<StoredDocument>> {
        let rows = sqlx::query(
            r#"
            SELECT id, inserted_at, body
            FROM documents
            WHERE database_name = ? AND collection = ?
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(&self.namespace.database)
        .bind(&self.namespace.collection)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        let mut documents = rows
            .into_iter()
            .map(Self::row_to_document)
            .collect::<StorageResult<Vec<_>>>()?;

        // oldest first
        documents.reverse();
        Ok(documents)
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> StorageResult<HealthStatus> {
        let mut metadata = HashMap::new();
        metadata.insert("backend".to_string(), "sqlite".to_string());
        metadata.insert("target".to_string(), self.target.clone());
        metadata.insert("namespace".to_string(), self.namespace.to_string());

        match sqlx::query("SELECT 1").fetch_one(&self.pool).await {
            Ok(_) => Ok(HealthStatus {
                healthy: true,
                message: "SQLite document store operational".to_string(),
                metadata,
            }),
            Err(e) => {
                warn!("health check failed: {}", e);
                Ok(HealthStatus {
                    healthy: false,
                    message: format!("health check failed: {}", e),
                    metadata,
                })
            }
        }
    }

    async fn close(&self) -> StorageResult<()> {
        info!("closing SQLite document store");
        self.pool.close().await;
        Ok(())
    }
}
