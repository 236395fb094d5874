//! # icelake-tx
//!
//! Pure, in-memory transformation logic that sits between the wire format
//! and the storage layer: the schema accumulator and the partition router.
//! Nothing here touches disk, object storage, or the catalog — both
//! `ingest` and `merge` in `icelake-engine` compose these with `icelake-io`.

pub mod partition;
pub mod schema;

pub use partition::{partition_of, PartitionPlan, PartitionStep};
pub use schema::{original_key, SchemaAccumulator};
