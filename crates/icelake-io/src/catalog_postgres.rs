//! Postgres-backed catalog over the `files`/`columns` tables. Uses sqlx's
//! runtime query API rather than the `query_as!` compile-time macro, since
//! that macro needs a live `DATABASE_URL` or a checked-in `.sqlx` offline
//! cache at build time.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use icelake_core::{Catalog, CatalogTxn, ColumnEntry, FileDescriptor, IcelakeError, NewFileDescriptor};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};

/// Maximum pooled connections: each transactional operation holds one for
/// its duration, and this process issues at most a handful of concurrent
/// ingest/merge requests.
const MAX_POOL_CONNECTIONS: u32 = 10;

pub struct PostgresCatalog {
    pool: PgPool,
}

impl PostgresCatalog {
    pub async fn connect(dsn: &str) -> Result<Self, IcelakeError> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_POOL_CONNECTIONS)
            .connect(dsn)
            .await
            .map_err(classify)?;
        Ok(Self { pool })
    }

    /// Creates the `files` and `columns` tables if they don't exist yet.
    /// Intended for local/dev bootstrapping; production deployments are
    /// expected to migrate the schema out-of-band.
    pub async fn ensure_schema(&self) -> Result<(), IcelakeError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS files (
                namespace TEXT NOT NULL,
                partition TEXT NOT NULL,
                name TEXT NOT NULL,
                enabled BOOLEAN NOT NULL DEFAULT TRUE,
                bytes BIGINT NOT NULL,
                rows BIGINT NOT NULL,
                columns TEXT[] NOT NULL,
                column_types TEXT[] NOT NULL,
                schema_json TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                PRIMARY KEY (namespace, partition, name)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(classify)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS columns (
                namespace TEXT NOT NULL,
                name TEXT NOT NULL,
                type TEXT NOT NULL,
                PRIMARY KEY (namespace, name)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(classify)?;
        Ok(())
    }
}

#[async_trait]
impl Catalog for PostgresCatalog {
    async fn list_namespaces(&self) -> Result<Vec<String>, IcelakeError> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT DISTINCT namespace FROM files ORDER BY namespace")
            .fetch_all(&self.pool)
            .await
            .map_err(classify)?;
        Ok(rows.into_iter().map(|(namespace,)| namespace).collect())
    }

    async fn list_columns(&self, namespace: &str) -> Result<Vec<ColumnEntry>, IcelakeError> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT name, type FROM columns WHERE namespace = $1 ORDER BY name")
                .bind(namespace)
                .fetch_all(&self.pool)
                .await
                .map_err(classify)?;
        Ok(rows
            .into_iter()
            .map(|(name, column_type)| ColumnEntry { name, column_type })
            .collect())
    }

    async fn select_files_for_merging(
        &self,
        namespace: &str,
        partition: Option<&str>,
        max_bytes: i64,
        max_files: i32,
    ) -> Result<Vec<FileDescriptor>, IcelakeError> {
        let rows: Vec<FileRow> = match partition {
            Some(partition) => sqlx::query_as(
                "SELECT namespace, partition, name, enabled, bytes, rows, columns, column_types, schema_json, created_at \
                 FROM files WHERE namespace = $1 AND partition = $2 AND enabled = true AND bytes < $3 \
                 ORDER BY created_at ASC LIMIT $4",
            )
            .bind(namespace)
            .bind(partition)
            .bind(max_bytes)
            .bind(max_files as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(classify)?,
            None => sqlx::query_as(
                "SELECT namespace, partition, name, enabled, bytes, rows, columns, column_types, schema_json, created_at \
                 FROM files WHERE namespace = $1 AND enabled = true AND bytes < $2 \
                 ORDER BY created_at ASC LIMIT $3",
            )
            .bind(namespace)
            .bind(max_bytes)
            .bind(max_files as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(classify)?,
        };
        Ok(rows.into_iter().map(FileDescriptor::from).collect())
    }

    async fn begin(&self) -> Result<Box<dyn CatalogTxn>, IcelakeError> {
        let tx = self.pool.begin().await.map_err(classify)?;
        Ok(Box::new(PostgresCatalogTxn { tx }))
    }
}

struct PostgresCatalogTxn {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl CatalogTxn for PostgresCatalogTxn {
    async fn insert_file(&mut self, desc: &NewFileDescriptor) -> Result<(), IcelakeError> {
        sqlx::query(
            "INSERT INTO files (namespace, partition, name, enabled, bytes, rows, columns, column_types, schema_json, created_at) \
             VALUES ($1, $2, $3, true, $4, $5, $6, $7, $8, now())",
        )
        .bind(&desc.namespace)
        .bind(&desc.partition)
        .bind(&desc.name)
        .bind(desc.bytes)
        .bind(desc.rows)
        .bind(&desc.column_names)
        .bind(&desc.column_types)
        .bind(&desc.schema_json)
        .execute(&mut *self.tx)
        .await
        .map_err(classify)?;
        Ok(())
    }

    async fn insert_columns(&mut self, namespace: &str, names: &[String], types: &[String]) -> Result<(), IcelakeError> {
        for (name, column_type) in names.iter().zip(types) {
            sqlx::query(
                "INSERT INTO columns (namespace, name, type) VALUES ($1, $2, $3) \
                 ON CONFLICT (namespace, name) DO NOTHING",
            )
            .bind(namespace)
            .bind(name)
            .bind(column_type)
            .execute(&mut *self.tx)
            .await
            .map_err(classify)?;
        }
        Ok(())
    }

    async fn set_file_states(
        &mut self,
        namespace: &str,
        partition: &str,
        names: &[String],
        enabled: bool,
    ) -> Result<(), IcelakeError> {
        sqlx::query("UPDATE files SET enabled = $1 WHERE namespace = $2 AND partition = $3 AND name = ANY($4)")
            .bind(enabled)
            .bind(namespace)
            .bind(partition)
            .bind(names)
            .execute(&mut *self.tx)
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), IcelakeError> {
        self.tx.commit().await.map_err(classify)
    }
}

struct FileRow {
    namespace: String,
    partition: String,
    name: String,
    enabled: bool,
    bytes: i64,
    rows: i64,
    columns: Vec<String>,
    column_types: Vec<String>,
    schema_json: String,
    created_at: DateTime<Utc>,
}

impl FromRow<'_, PgRow> for FileRow {
    fn from_row(row: &PgRow) -> sqlx::Result<Self> {
        Ok(FileRow {
            namespace: row.try_get("namespace")?,
            partition: row.try_get("partition")?,
            name: row.try_get("name")?,
            enabled: row.try_get("enabled")?,
            bytes: row.try_get("bytes")?,
            rows: row.try_get("rows")?,
            columns: row.try_get("columns")?,
            column_types: row.try_get("column_types")?,
            schema_json: row.try_get("schema_json")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl From<FileRow> for FileDescriptor {
    fn from(row: FileRow) -> Self {
        FileDescriptor {
            namespace: row.namespace,
            partition: row.partition,
            name: row.name,
            enabled: row.enabled,
            bytes: row.bytes,
            rows: row.rows,
            column_names: row.columns,
            column_types: row.column_types,
            schema_json: row.schema_json,
            created_at: row.created_at,
        }
    }
}

/// Maps a driver error to the icelake taxonomy using the Postgres SQLSTATE
/// code, per the error-handling design: unique-violation and
/// undefined-column are bugs that retrying won't fix; serialization
/// failures and deadlocks are transient; anything else (pool exhaustion,
/// connection loss) is transient too, since it isn't a logic error.
fn classify(err: sqlx::Error) -> IcelakeError {
    if let sqlx::Error::Database(ref db_err) = err {
        match db_err.code().as_deref() {
            Some("23505") => return IcelakeError::permanent(format!("unique violation: {err}")),
            Some("42703") => return IcelakeError::permanent(format!("undefined column: {err}")),
            Some("40001") | Some("40P01") => return IcelakeError::transient(format!("transaction conflict: {err}")),
            _ => return IcelakeError::permanent(format!("database error: {err}")),
        }
    }
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => IcelakeError::transient(format!("catalog connectivity: {err}")),
        other => IcelakeError::permanent(format!("catalog error: {other}")),
    }
}
