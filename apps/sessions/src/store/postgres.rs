//! PostgreSQL JSONB document store

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, types::Json, PgPool};
use uuid::Uuid;

use super::{Body, Document, DocumentStore, Filter};
use crate::error::StoreError;

/// Document collections stored as rows of one `documents` table.
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    /// Connect to PostgreSQL and create connection pool
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(map_error)?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Get the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Equality filters as a single JSONB containment document.
fn containment(filters: &[Filter]) -> Value {
    Value::Object(
        filters
            .iter()
            .map(|filter| (filter.field.clone(), filter.value.clone()))
            .collect(),
    )
}

fn into_document(id: Uuid, body: Value) -> Document {
    let body = match body {
        Value::Object(map) => map,
        _ => Body::new(),
    };
    Document {
        id: id.to_string(),
        body,
    }
}

fn map_error(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(db.message().to_string())
        }
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(err.to_string())
        }
        other => StoreError::Database(other),
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn insert(&self, collection: &str, body: Body) -> Result<String, StoreError> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO documents (id, collection, body)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(id)
        .bind(collection)
        .bind(Json(Value::Object(body)))
        .execute(&self.pool)
        .await
        .map_err(map_error)?;

        tracing::debug!("Inserted document {}/{}", collection, id);
        Ok(id.to_string())
    }

    async fn query(
        &self,
        collection: &str,
        filters: &[Filter],
        limit: Option<usize>,
    ) -> Result<Vec<Document>, StoreError> {
        let limit = limit.map(|n| i64::try_from(n).unwrap_or(i64::MAX));
        let rows = sqlx::query_as::<_, (Uuid, Json<Value>)>(
            r#"
            SELECT id, body
            FROM documents
            WHERE collection = $1 AND body @> $2
            ORDER BY seq
            LIMIT $3
            "#,
        )
        .bind(collection)
        .bind(Json(containment(filters)))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(map_error)?;

        Ok(rows
            .into_iter()
            .map(|(id, Json(body))| into_document(id, body))
            .collect())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let Ok(id) = Uuid::parse_str(id) else {
            return Ok(None);
        };

        let row = sqlx::query_as::<_, (Uuid, Json<Value>)>(
            r#"
            SELECT id, body
            FROM documents
            WHERE collection = $1 AND id = $2
            "#,
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_error)?;

        Ok(row.map(|(id, Json(body))| into_document(id, body)))
    }

    async fn update(&self, collection: &str, id: &str, fields: Body) -> Result<(), StoreError> {
        let not_found = || StoreError::NotFound(format!("{}/{}", collection, id));
        let uuid = Uuid::parse_str(id).map_err(|_| not_found())?;

        let result = sqlx::query(
            r#"
            UPDATE documents
            SET body = body || $3, updated_at = NOW()
            WHERE collection = $1 AND id = $2
            "#,
        )
        .bind(collection)
        .bind(uuid)
        .bind(Json(Value::Object(fields)))
        .execute(&self.pool)
        .await
        .map_err(map_error)?;

        if result.rows_affected() == 0 {
            return Err(not_found());
        }
        Ok(())
    }
}
