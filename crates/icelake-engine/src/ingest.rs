//! Ingest pipeline: decode a batch of records, route each to a partition,
//! write one columnar file per partition, and commit it to the catalog.

use std::sync::Arc;
use std::time::{Duration, Instant};

use icelake_core::{flatten, Catalog, FlatRecord, IcelakeError, NewFileDescriptor};
use icelake_io::{new_file_object_key, new_parquet_file_name, put_object, with_retry};
use icelake_tx::{partition_of, PartitionPlan, SchemaAccumulator};
use indexmap::IndexMap;
use object_store::ObjectStore;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, instrument};

/// Requests carry either newline-delimited JSON or an already-parsed array
/// — whichever the caller had on hand.
pub enum RowsInput {
    NewlineDelimited(String),
    Records(Vec<Value>),
}

pub struct IngestRequest {
    pub namespace: String,
    pub rows: RowsInput,
    pub partition_plan: PartitionPlan,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestStats {
    pub num_rows: u64,
    pub num_files: u32,
    pub bytes_written: u64,
    pub elapsed_ms: u64,
}

const INGEST_DEADLINE: Duration = Duration::from_secs(60);

struct Bucket {
    rows: Vec<FlatRecord>,
    accumulator: SchemaAccumulator,
}

/// Runs the full ingest algorithm against one batch. A deadline of
/// `INGEST_DEADLINE` bounds the whole call; on expiry nothing further is
/// committed, but partitions already flushed stay live (see module docs on
/// partial-failure semantics).
#[instrument(skip(catalog, store, req), fields(namespace = %req.namespace))]
pub async fn ingest(
    catalog: &dyn Catalog,
    store: Arc<dyn ObjectStore>,
    req: IngestRequest,
) -> Result<IngestStats, IcelakeError> {
    tokio::time::timeout(INGEST_DEADLINE, run_ingest(catalog, store, req))
        .await
        .map_err(|_| IcelakeError::transient("ingest deadline exceeded"))?
}

async fn run_ingest(
    catalog: &dyn Catalog,
    store: Arc<dyn ObjectStore>,
    req: IngestRequest,
) -> Result<IngestStats, IcelakeError> {
    let start = Instant::now();
    let records = decode_rows(req.rows)?;

    let mut buckets: IndexMap<String, Bucket> = IndexMap::new();
    let mut num_rows = 0u64;
    for value in &records {
        let flat = flatten(value)?;
        let partition = partition_of(&flat, &req.partition_plan)?;
        let bucket = buckets.entry(partition).or_insert_with(|| Bucket {
            rows: Vec::new(),
            accumulator: SchemaAccumulator::new(),
        });
        bucket.accumulator.observe(&flat);
        bucket.rows.push(flat);
        num_rows += 1;
    }

    if buckets.is_empty() {
        return Err(IcelakeError::user_input("batch produced no partitions to write"));
    }

    let mut num_files = 0u32;
    let mut bytes_written = 0u64;
    for (partition, bucket) in buckets {
        bytes_written += write_bucket(catalog, store.as_ref(), &req.namespace, &partition, bucket).await?;
        num_files += 1;
    }

    info!(num_rows, num_files, bytes_written, "ingest batch committed");
    Ok(IngestStats {
        num_rows,
        num_files,
        bytes_written,
        elapsed_ms: start.elapsed().as_millis() as u64,
    })
}

async fn write_bucket(
    catalog: &dyn Catalog,
    store: &dyn ObjectStore,
    namespace: &str,
    partition: &str,
    bucket: Bucket,
) -> Result<u64, IcelakeError> {
    let columns = bucket.accumulator.columns();
    let file_bytes = icelake_io::write_parquet(&bucket.rows, &columns)?;
    let file_name = new_parquet_file_name();
    let object_key = new_file_object_key(namespace, partition, &file_name);

    put_object(store, &object_key, file_bytes.clone()).await?;

    let desc = NewFileDescriptor {
        namespace: namespace.to_string(),
        partition: partition.to_string(),
        name: file_name,
        bytes: file_bytes.len() as i64,
        rows: bucket.rows.len() as i64,
        column_names: bucket.accumulator.column_names(),
        column_types: bucket.accumulator.column_types(),
        schema_json: bucket.accumulator.schema_string(),
    };

    with_retry("ingest commit", || async {
        let mut txn = catalog.begin().await?;
        txn.insert_file(&desc).await?;
        txn.insert_columns(namespace, &desc.column_names, &desc.column_types).await?;
        txn.commit().await
    })
    .await?;

    Ok(file_bytes.len() as u64)
}

fn decode_rows(rows: RowsInput) -> Result<Vec<Value>, IcelakeError> {
    match rows {
        RowsInput::Records(records) => {
            if records.is_empty() {
                return Err(IcelakeError::user_input("batch is empty"));
            }
            Ok(records)
        }
        RowsInput::NewlineDelimited(text) => {
            let mut records = Vec::new();
            for line in text.lines() {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let value: Value = serde_json::from_str(line)
                    .map_err(|e| IcelakeError::user_input(format!("invalid JSON record: {e}")))?;
                records.push(value);
            }
            if records.is_empty() {
                return Err(IcelakeError::user_input("batch is empty"));
            }
            Ok(records)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::FakeCatalog;
    use icelake_tx::{partition, PartitionStep};
    use object_store::memory::InMemory;
    use serde_json::json;

    fn day_plan() -> PartitionPlan {
        partition::init();
        vec![PartitionStep {
            func: "toDay".to_string(),
            args: vec!["ts".to_string()],
            alias: "d".to_string(),
        }]
    }

    #[tokio::test]
    async fn ingests_records_into_one_partition() {
        let catalog = FakeCatalog::default();
        let store: Arc<dyn ObjectStore> = Arc::new(InMemory::new());

        let req = IngestRequest {
            namespace: "orders".to_string(),
            rows: RowsInput::Records(vec![
                json!({"ts": "2022-01-24T00:00:00.000Z", "amount": 10.0}),
                json!({"ts": "2022-01-24T05:00:00.000Z", "amount": 20.0}),
            ]),
            partition_plan: day_plan(),
        };

        let stats = ingest(&catalog, store, req).await.unwrap();
        assert_eq!(stats.num_rows, 2);
        assert_eq!(stats.num_files, 1);
        assert!(stats.bytes_written > 0);
        assert_eq!(catalog.enabled_file_count("orders", "d=24"), 1);
    }

    #[tokio::test]
    async fn records_routing_to_different_days_produce_separate_files() {
        let catalog = FakeCatalog::default();
        let store: Arc<dyn ObjectStore> = Arc::new(InMemory::new());

        let req = IngestRequest {
            namespace: "orders".to_string(),
            rows: RowsInput::Records(vec![
                json!({"ts": "2022-01-24T00:00:00.000Z", "amount": 10.0}),
                json!({"ts": "2022-01-25T00:00:00.000Z", "amount": 20.0}),
            ]),
            partition_plan: day_plan(),
        };

        let stats = ingest(&catalog, store, req).await.unwrap();
        assert_eq!(stats.num_files, 2);
        assert_eq!(catalog.enabled_file_count("orders", "d=24"), 1);
        assert_eq!(catalog.enabled_file_count("orders", "d=25"), 1);
    }

    #[tokio::test]
    async fn empty_batch_is_a_user_error() {
        let catalog = FakeCatalog::default();
        let store: Arc<dyn ObjectStore> = Arc::new(InMemory::new());
        let req = IngestRequest {
            namespace: "orders".to_string(),
            rows: RowsInput::Records(vec![]),
            partition_plan: day_plan(),
        };
        let err = ingest(&catalog, store, req).await.unwrap_err();
        assert!(matches!(err, IcelakeError::UserInput(_)));
    }

    #[tokio::test]
    async fn a_record_missing_the_partition_column_fails_the_whole_batch() {
        let catalog = FakeCatalog::default();
        let store: Arc<dyn ObjectStore> = Arc::new(InMemory::new());
        let req = IngestRequest {
            namespace: "orders".to_string(),
            rows: RowsInput::Records(vec![
                json!({"ts": "2022-01-24T00:00:00.000Z", "amount": 10.0}),
                json!({"amount": 20.0}),
            ]),
            partition_plan: day_plan(),
        };
        let err = ingest(&catalog, store, req).await.unwrap_err();
        assert!(matches!(err, IcelakeError::UserInput(_)));
        assert_eq!(catalog.enabled_file_count("orders", "d=24"), 0);
    }

    #[tokio::test]
    async fn newline_delimited_input_decodes_each_line() {
        let catalog = FakeCatalog::default();
        let store: Arc<dyn ObjectStore> = Arc::new(InMemory::new());
        let body = "{\"ts\": \"2022-01-24T00:00:00.000Z\"}\n{\"ts\": \"2022-01-24T01:00:00.000Z\"}\n";
        let req = IngestRequest {
            namespace: "orders".to_string(),
            rows: RowsInput::NewlineDelimited(body.to_string()),
            partition_plan: day_plan(),
        };
        let stats = ingest(&catalog, store, req).await.unwrap();
        assert_eq!(stats.num_rows, 2);
    }
}
