//! # icelake-core
//!
//! Foundational types shared by every other crate in the workspace: the
//! record representation records flow through as they're ingested, the
//! columnar type vocabulary the schema accumulator infers, the file/column
//! catalog entities, and the error taxonomy used to decide retry and HTTP
//! status mapping.
//!
//! Nothing in this crate talks to Postgres, object storage, or Arrow — those
//! live in `icelake-io`. This crate only defines the contracts.

pub mod catalog;
pub mod error;
pub mod record;
pub mod schema_types;

pub use catalog::{Catalog, CatalogTxn, ColumnEntry, FileDescriptor, NewFileDescriptor};
pub use error::IcelakeError;
pub use record::{flatten, FlatRecord};
pub use schema_types::ColumnType;
