//! The catalog contract: the minimal set of transactional operations the
//! ingest pipeline and merge executor require from a relational metadata
//! store.
//!
//! The core doesn't know or care which engine backs this — only that
//! `(namespace, partition, name)` is unique per file and that the set of
//! `enabled = true` files in a partition becomes visible atomically. See
//! `icelake-io::catalog_postgres` for the Postgres implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::IcelakeError;

/// A file descriptor as read back from the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct FileDescriptor {
    pub namespace: String,
    pub partition: String,
    pub name: String,
    pub enabled: bool,
    pub bytes: i64,
    pub rows: i64,
    pub column_names: Vec<String>,
    pub column_types: Vec<String>,
    /// Opaque blob: the schema accumulator's serialized state at write time.
    pub schema_json: String,
    pub created_at: DateTime<Utc>,
}

/// The fields needed to insert a new file descriptor. `created_at` is left
/// to the catalog to stamp, since it's the source of truth for ordering —
/// `select_files_for_merging` orders by it.
#[derive(Debug, Clone, PartialEq)]
pub struct NewFileDescriptor {
    pub namespace: String,
    pub partition: String,
    pub name: String,
    pub bytes: i64,
    pub rows: i64,
    pub column_names: Vec<String>,
    pub column_types: Vec<String>,
    pub schema_json: String,
}

/// A discovered `(name, type)` pair in a namespace's column registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnEntry {
    pub name: String,
    pub column_type: String,
}

/// Read operations and transaction initiation. Implementors must guarantee
/// that a reader taking a point-in-time snapshot of `enabled = true` files
/// for one partition never observes a mixed pre/post-merge state.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn list_namespaces(&self) -> Result<Vec<String>, IcelakeError>;

    async fn list_columns(&self, namespace: &str) -> Result<Vec<ColumnEntry>, IcelakeError>;

    /// Returns up to `max_files` enabled files in `namespace` (optionally
    /// restricted to `partition`) whose `bytes < max_bytes`, ordered by
    /// `created_at` ascending.
    async fn select_files_for_merging(
        &self,
        namespace: &str,
        partition: Option<&str>,
        max_bytes: i64,
        max_files: i32,
    ) -> Result<Vec<FileDescriptor>, IcelakeError>;

    /// Starts a transaction. Mutating operations are only exposed through
    /// the returned handle, so callers can't accidentally commit
    /// insert_file and set_file_states as separate, non-atomic statements.
    async fn begin(&self) -> Result<Box<dyn CatalogTxn>, IcelakeError>;
}

/// A transaction handle for the mutating catalog operations. Must be
/// explicitly committed; dropping it without committing leaves it to the
/// underlying store's own rollback-on-drop behavior.
#[async_trait]
pub trait CatalogTxn: Send {
    async fn insert_file(&mut self, desc: &NewFileDescriptor) -> Result<(), IcelakeError>;

    /// Idempotent upsert: columns already present are left unchanged.
    async fn insert_columns(
        &mut self,
        namespace: &str,
        names: &[String],
        types: &[String],
    ) -> Result<(), IcelakeError>;

    /// Bulk flip of `enabled` for a set of files in one `(namespace,
    /// partition)`.
    async fn set_file_states(
        &mut self,
        namespace: &str,
        partition: &str,
        names: &[String],
        enabled: bool,
    ) -> Result<(), IcelakeError>;

    async fn commit(self: Box<Self>) -> Result<(), IcelakeError>;
}
