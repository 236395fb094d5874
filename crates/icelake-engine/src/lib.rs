//! # icelake-engine
//!
//! The two request-driven algorithms that make up the service: the ingest
//! pipeline (`ingest`) and the merge executor (`merge`). Both compose
//! `icelake-tx` (schema accumulation, partitioning) with `icelake-io`
//! (object storage, the Parquet codec, the catalog) against the contracts
//! `icelake-core` defines.

pub mod ingest;
pub mod merge;

#[cfg(test)]
mod testutil;

pub use ingest::{ingest, IngestRequest, IngestStats, RowsInput};
pub use merge::{merge, MergeOutcome, MergeRequest, MergeStats};
