// Database connection management
use crate::error::{DatabaseError, DatabaseResult};
use crate::models::{document_id, Document};
use crate::store::{DocumentStore, Filter};
use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS intake_documents (
    collection TEXT NOT NULL,
    id TEXT NOT NULL,
    body JSONB NOT NULL,
    PRIMARY KEY (collection, id)
)";

const CREATE_INDEX: &str = "CREATE INDEX IF NOT EXISTS intake_documents_body_idx
    ON intake_documents USING GIN (body jsonb_path_ops)";

/// Pool sizing for [`DatabasePool::connect`]
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 20,
            min_connections: 2,
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

/// Database connection pool wrapper
#[derive(Clone)]
pub struct DatabasePool {
    pool: Arc<PgPool>,
}

impl DatabasePool {
    /// Create a new database pool from connection string
    pub async fn new(connection_string: &str) -> DatabaseResult<Self> {
        Self::connect(connection_string, &PoolSettings::default()).await
    }

    pub async fn connect(connection_string: &str, settings: &PoolSettings) -> DatabaseResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .min_connections(settings.min_connections)
            .acquire_timeout(settings.acquire_timeout)
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800))
            .connect(connection_string)
            .await
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        info!("Database connection pool created successfully");

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Get the underlying PgPool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the document table if it does not exist yet
    pub async fn ensure_schema(&self) -> DatabaseResult<()> {
        for statement in [CREATE_TABLE, CREATE_INDEX] {
            sqlx::query(statement)
                .execute(self.pool.as_ref())
                .await
                .map_err(|e| DatabaseError::QueryFailed(format!("Failed to create schema: {e}")))?;
        }
        Ok(())
    }

    /// Check if the pool is healthy
    pub async fn is_healthy(&self) -> bool {
        match sqlx::query("SELECT 1").fetch_one(self.pool.as_ref()).await {
            Ok(_) => true,
            Err(e) => {
                warn!("Database health check failed: {}", e);
                false
            }
        }
    }

    /// Close the pool
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database connection pool closed");
    }
}

/// Document store backed by one PostgreSQL JSONB table
///
/// Filters compile to `body @> $filter`, so only plaintext structural fields
/// and deterministic ciphertexts can be matched in the query layer.
#[derive(Clone)]
pub struct PostgresStore {
    pool: DatabasePool,
}

impl PostgresStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    fn pg(&self) -> &PgPool {
        self.pool.pool()
    }
}

fn query_failed(e: sqlx::Error) -> DatabaseError {
    DatabaseError::QueryFailed(e.to_string())
}

#[async_trait]
impl DocumentStore for PostgresStore {
    async fn insert(&self, collection: &str, doc: Document) -> DatabaseResult<()> {
        let id = document_id(&doc)
            .map(str::to_string)
            .ok_or_else(|| DatabaseError::InvalidDocument(format!("document for {collection} has no _id")))?;

        let result = sqlx::query(
            "INSERT INTO intake_documents (collection, id, body) VALUES ($1, $2, $3)
             ON CONFLICT (collection, id) DO NOTHING",
        )
        .bind(collection)
        .bind(&id)
        .bind(Json(&doc))
        .execute(self.pg())
        .await
        .map_err(query_failed)?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::DuplicateId {
                collection: collection.to_string(),
                id,
            });
        }
        Ok(())
    }

    async fn find_by_id(&self, collection: &str, id: &str) -> DatabaseResult<Option<Document>> {
        let row: Option<(Json<Document>,)> =
            sqlx::query_as("SELECT body FROM intake_documents WHERE collection = $1 AND id = $2")
                .bind(collection)
                .bind(id)
                .fetch_optional(self.pg())
                .await
                .map_err(query_failed)?;

        Ok(row.map(|(Json(body),)| body))
    }

    async fn find(&self, collection: &str, filter: &Filter) -> DatabaseResult<Vec<Document>> {
        let rows: Vec<(Json<Document>,)> = sqlx::query_as(
            "SELECT body FROM intake_documents WHERE collection = $1 AND body @> $2 ORDER BY id",
        )
        .bind(collection)
        .bind(Json(filter.to_json()))
        .fetch_all(self.pg())
        .await
        .map_err(query_failed)?;

        Ok(rows.into_iter().map(|(Json(body),)| body).collect())
    }

    async fn update(&self, collection: &str, id: &str, patch: Document) -> DatabaseResult<Document> {
        let row: Option<(Json<Document>,)> = sqlx::query_as(
            "UPDATE intake_documents SET body = body || $3
             WHERE collection = $1 AND id = $2 RETURNING body",
        )
        .bind(collection)
        .bind(id)
        .bind(Json(&patch))
        .fetch_optional(self.pg())
        .await
        .map_err(query_failed)?;

        row.map(|(Json(body),)| body).ok_or_else(|| DatabaseError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        })
    }

    async fn collection_ids(&self, collection: &str, filter: &Filter) -> DatabaseResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT id FROM intake_documents WHERE collection = $1 AND body @> $2 ORDER BY id",
        )
        .bind(collection)
        .bind(Json(filter.to_json()))
        .fetch_all(self.pg())
        .await
        .map_err(query_failed)?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
