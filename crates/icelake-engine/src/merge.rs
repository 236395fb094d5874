//! Merge executor: compacts small files within one partition into one
//! larger file, preserving the union of their schemas and the full row
//! multiset, under a single insert-new/disable-old catalog transaction.

use std::sync::Arc;
use std::time::{Duration, Instant};

use icelake_core::{Catalog, FlatRecord, IcelakeError, NewFileDescriptor};
use icelake_io::{get_object, new_file_object_key, new_parquet_file_name, put_object, read_parquet, with_retry};
use icelake_tx::SchemaAccumulator;
use object_store::ObjectStore;
use serde::Serialize;
use tracing::{info, instrument};

pub struct MergeRequest {
    pub namespace: String,
    pub partition: Option<String>,
    pub max_pre_merge_file_bytes: i64,
    pub max_post_merge_file_bytes: i64,
    pub max_merge_files: i32,
    pub max_runtime_sec: u64,
}

impl Default for MergeRequest {
    fn default() -> Self {
        Self {
            namespace: String::new(),
            partition: None,
            max_pre_merge_file_bytes: 1_000_000_000,
            max_post_merge_file_bytes: 5_000_000_000,
            max_merge_files: 4,
            max_runtime_sec: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MergeStats {
    pub files_merged: u32,
    pub rows_merged: u64,
    pub post_merge_bytes: u64,
    pub elapsed_ms: u64,
}

/// `None` signals the "nothing to do" terminal state: fewer than two
/// eligible candidates were found, reported as an empty success rather
/// than an error.
pub type MergeOutcome = Option<MergeStats>;

#[instrument(skip(catalog, store, req), fields(namespace = %req.namespace))]
pub async fn merge(catalog: &dyn Catalog, store: Arc<dyn ObjectStore>, req: MergeRequest) -> Result<MergeOutcome, IcelakeError> {
    let deadline = Duration::from_secs(req.max_runtime_sec);
    tokio::time::timeout(deadline, run_merge(catalog, store, req))
        .await
        .map_err(|_| IcelakeError::transient("merge deadline exceeded"))?
}

async fn run_merge(catalog: &dyn Catalog, store: Arc<dyn ObjectStore>, req: MergeRequest) -> Result<MergeOutcome, IcelakeError> {
    let start = Instant::now();

    let candidates = catalog
        .select_files_for_merging(
            &req.namespace,
            req.partition.as_deref(),
            req.max_pre_merge_file_bytes,
            req.max_merge_files,
        )
        .await?;

    if candidates.len() < 2 {
        info!(candidates = candidates.len(), "nothing to merge");
        return Ok(None);
    }

    // When no partition was requested, candidates can span the whole
    // namespace. Merging must stay within one partition, so pin to the
    // earliest candidate's partition and drop the rest.
    let partition = candidates[0].partition.clone();
    let candidates: Vec<_> = candidates.into_iter().filter(|f| f.partition == partition).collect();

    if candidates.len() < 2 {
        info!(candidates = candidates.len(), partition = %partition, "nothing to merge in the selected partition");
        return Ok(None);
    }

    let mut accumulator = SchemaAccumulator::new();
    let mut rows: Vec<FlatRecord> = Vec::new();
    for file in &candidates {
        let key = new_file_object_key(&req.namespace, &file.partition, &file.name);
        let bytes = get_object(store.as_ref(), &key).await?;
        let file_rows = read_parquet(bytes)?;
        accumulator.merge_schema_string(&file.schema_json)?;
        rows.extend(file_rows);
    }

    let columns = accumulator.columns();
    let merged_bytes = icelake_io::write_parquet(&rows, &columns)?;
    if merged_bytes.len() as i64 > req.max_post_merge_file_bytes {
        tracing::warn!(
            bytes = merged_bytes.len(),
            cap = req.max_post_merge_file_bytes,
            "merged file exceeds the advisory post-merge size cap"
        );
    }

    let file_name = new_parquet_file_name();
    let object_key = new_file_object_key(&req.namespace, &partition, &file_name);
    put_object(store.as_ref(), &object_key, merged_bytes.clone()).await?;

    let desc = NewFileDescriptor {
        namespace: req.namespace.clone(),
        partition: partition.clone(),
        name: file_name,
        bytes: merged_bytes.len() as i64,
        rows: rows.len() as i64,
        column_names: accumulator.column_names(),
        column_types: accumulator.column_types(),
        schema_json: accumulator.schema_string(),
    };
    let retired: Vec<String> = candidates.iter().map(|f| f.name.clone()).collect();

    with_retry("merge commit", || async {
        let mut txn = catalog.begin().await?;
        txn.insert_file(&desc).await?;
        txn.insert_columns(&req.namespace, &desc.column_names, &desc.column_types).await?;
        txn.set_file_states(&req.namespace, &partition, &retired, false).await?;
        txn.commit().await
    })
    .await?;

    info!(
        files_merged = candidates.len(),
        rows_merged = rows.len(),
        post_merge_bytes = merged_bytes.len(),
        "merge committed"
    );

    Ok(Some(MergeStats {
        files_merged: candidates.len() as u32,
        rows_merged: rows.len() as u64,
        post_merge_bytes: merged_bytes.len() as u64,
        elapsed_ms: start.elapsed().as_millis() as u64,
    }))
}
