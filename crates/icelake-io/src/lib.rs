//! # icelake-io
//!
//! Everything that talks to the outside world: the Parquet codec, object
//! storage, the Postgres catalog adapter, the transactional retry wrapper,
//! and k-sortable id generation. `icelake-core` defines the contracts;
//! this crate fulfills them.

pub mod catalog_postgres;
pub mod codec;
pub mod ids;
pub mod retry;
pub mod store;

pub use catalog_postgres::PostgresCatalog;
pub use codec::{read_parquet, write_parquet};
pub use ids::{gen_ksorted_id, new_file_object_key, new_parquet_file_name};
pub use retry::with_retry;
pub use store::{build_object_store, get_object, put_object, StoreConfig};
