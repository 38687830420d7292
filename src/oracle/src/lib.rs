//! Queries against the system of record for object-key references.
//!
//! The oracle answers two questions: which keys are referenced by any living
//! entity (a point-in-time snapshot, eventual consistency accepted), and,
//! for a bounded set of keys, exactly where those references live.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use common::config::ReferenceSource;
use common::error::AdminError;
use common::model::{ReferenceDetail, ReferenceRecord};
use sqlx::{PgPool, Row, SqlitePool, sqlite::SqlitePoolOptions};

pub mod testing;

/// Seam between the reconciliation engine and the system of record.
#[async_trait]
pub trait ReferenceOracle: Send + Sync {
    /// The set of all keys currently pointed to by any persisted entity.
    async fn referenced_key_set(&self) -> Result<HashSet<String>, AdminError>;

    /// Per-key reference detail for a batched set of keys. Every requested
    /// key gets an entry; unreferenced keys carry an empty record list.
    async fn check_references(
        &self,
        keys: &[String],
    ) -> Result<HashMap<String, ReferenceDetail>, AdminError>;
}

#[derive(Clone, Debug)]
enum Pool {
    Postgres(PgPool),
    Sqlite(SqlitePool),
}

/// Reference oracle backed by the marketplace database (PostgreSQL or SQLite).
#[derive(Clone, Debug)]
pub struct SqlReferenceOracle {
    pool: Pool,
    sources: Vec<ReferenceSource>,
    timeout: Duration,
}

impl SqlReferenceOracle {
    /// Connect to the system of record and initialize missing tables.
    pub async fn new(
        dsn: &str,
        sources: Vec<ReferenceSource>,
        timeout: Duration,
    ) -> Result<Self, AdminError> {
        for source in &sources {
            if !source.is_valid() {
                return Err(AdminError::InvalidIdentifier(format!(
                    "{}.{}",
                    source.collection, source.field
                )));
            }
        }

        log::info!("Connecting to reference database with DSN: {dsn}");

        let pool = if dsn.starts_with("sqlite:") {
            // Add mode=rwc to create database file if it doesn't exist
            let dsn_with_create = if dsn.contains(":memory:") || dsn.contains("mode=") {
                dsn.to_string()
            } else if dsn.contains('?') {
                format!("{dsn}&mode=rwc")
            } else {
                format!("{dsn}?mode=rwc")
            };

            // A pooled :memory: database must keep a single live connection,
            // otherwise each checkout sees a fresh empty database
            let options = if dsn.contains(":memory:") {
                SqlitePoolOptions::new()
                    .max_connections(1)
                    .idle_timeout(None)
                    .max_lifetime(None)
            } else {
                SqlitePoolOptions::new()
            };

            let pool = options.connect(&dsn_with_create).await.map_err(|e| {
                log::error!("Failed to connect to SQLite database with DSN '{dsn_with_create}': {e}");
                AdminError::Database(e)
            })?;
            Pool::Sqlite(pool)
        } else {
            let pool = PgPool::connect(dsn).await.map_err(|e| {
                log::error!("Failed to connect to PostgreSQL database with DSN '{dsn}': {e}");
                AdminError::Database(e)
            })?;
            Pool::Postgres(pool)
        };

        let oracle = Self {
            pool,
            sources,
            timeout,
        };
        oracle.init().await?;
        log::info!("Reference database ready");
        Ok(oracle)
    }

    /// Create the reference source tables if they do not exist.
    async fn init(&self) -> Result<(), AdminError> {
        for source in &self.sources {
            match &self.pool {
                Pool::Sqlite(pool) => {
                    let ddl = format!(
                        "CREATE TABLE IF NOT EXISTS {} (id INTEGER PRIMARY KEY AUTOINCREMENT, {} TEXT)",
                        source.collection, source.field
                    );
                    sqlx::query(&ddl).execute(pool).await?;
                }
                Pool::Postgres(pool) => {
                    let ddl = format!(
                        "CREATE TABLE IF NOT EXISTS {} (id BIGSERIAL PRIMARY KEY, {} TEXT)",
                        source.collection, source.field
                    );
                    sqlx::query(&ddl).execute(pool).await?;
                }
            }
        }
        Ok(())
    }

    pub fn sources(&self) -> &[ReferenceSource] {
        &self.sources
    }

    async fn distinct_keys(&self, source: &ReferenceSource) -> Result<Vec<String>, AdminError> {
        let sql = format!(
            "SELECT DISTINCT {field} FROM {collection} WHERE {field} IS NOT NULL AND {field} <> ''",
            collection = source.collection,
            field = source.field
        );

        let keys = match &self.pool {
            Pool::Sqlite(pool) => sqlx::query(&sql)
                .fetch_all(pool)
                .await?
                .iter()
                .map(|row| row.get::<String, _>(0))
                .collect(),
            Pool::Postgres(pool) => sqlx::query(&sql)
                .fetch_all(pool)
                .await?
                .iter()
                .map(|row| row.get::<String, _>(0))
                .collect(),
        };

        Ok(keys)
    }

    async fn source_counts(
        &self,
        source: &ReferenceSource,
        keys: &[String],
    ) -> Result<Vec<(String, i64)>, AdminError> {
        let head = format!(
            "SELECT {field} AS key, COUNT(*) AS cnt FROM {collection} WHERE {field} IN (",
            collection = source.collection,
            field = source.field
        );
        let tail = format!(") GROUP BY {}", source.field);

        let rows = match &self.pool {
            Pool::Sqlite(pool) => {
                let mut builder = sqlx::QueryBuilder::<sqlx::Sqlite>::new(&head);
                let mut separated = builder.separated(", ");
                for key in keys {
                    separated.push_bind(key);
                }
                builder.push(&tail);
                builder
                    .build()
                    .fetch_all(pool)
                    .await?
                    .iter()
                    .map(|row| (row.get::<String, _>("key"), row.get::<i64, _>("cnt")))
                    .collect()
            }
            Pool::Postgres(pool) => {
                let mut builder = sqlx::QueryBuilder::<sqlx::Postgres>::new(&head);
                let mut separated = builder.separated(", ");
                for key in keys {
                    separated.push_bind(key);
                }
                builder.push(&tail);
                builder
                    .build()
                    .fetch_all(pool)
                    .await?
                    .iter()
                    .map(|row| (row.get::<String, _>("key"), row.get::<i64, _>("cnt")))
                    .collect()
            }
        };

        Ok(rows)
    }

    async fn with_deadline<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<T, AdminError>> + Send,
    ) -> Result<T, AdminError> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| AdminError::Timeout {
                operation,
                timeout: self.timeout,
            })?
    }
}

#[async_trait]
impl ReferenceOracle for SqlReferenceOracle {
    async fn referenced_key_set(&self) -> Result<HashSet<String>, AdminError> {
        let set = self
            .with_deadline("referenced key set query", async {
                let mut set = HashSet::new();
                for source in &self.sources {
                    let keys = self.distinct_keys(source).await?;
                    tracing::debug!(
                        collection = %source.collection,
                        field = %source.field,
                        keys = keys.len(),
                        "Collected referenced keys from source"
                    );
                    set.extend(keys);
                }
                Ok(set)
            })
            .await?;

        tracing::info!(referenced_keys = set.len(), "Built referenced key set");
        Ok(set)
    }

    async fn check_references(
        &self,
        keys: &[String],
    ) -> Result<HashMap<String, ReferenceDetail>, AdminError> {
        let mut details: HashMap<String, ReferenceDetail> = keys
            .iter()
            .map(|key| (key.clone(), ReferenceDetail::default()))
            .collect();

        if keys.is_empty() {
            return Ok(details);
        }

        self.with_deadline("reference detail query", async {
            for source in &self.sources {
                for (key, count) in self.source_counts(source, keys).await? {
                    let detail = details.entry(key).or_default();
                    detail.is_referenced = true;
                    detail.references.push(ReferenceRecord {
                        collection: source.collection.clone(),
                        field: source.field.clone(),
                        count,
                    });
                }
            }
            Ok(())
        })
        .await?;

        tracing::debug!(
            keys = keys.len(),
            referenced = details.values().filter(|d| d.is_referenced).count(),
            "Checked reference detail"
        );

        Ok(details)
    }
}
