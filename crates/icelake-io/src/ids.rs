//! K-sortable unique ids for file names and request ids.

use svix_ksuid::{Ksuid, KsuidLike};

/// A prefixed, k-sortable unique id. File names use an empty prefix
/// (`"<ksuid>.parquet"`); request ids use a short prefix for readability
/// in logs.
pub fn gen_ksorted_id(prefix: &str) -> String {
    format!("{prefix}{}", Ksuid::new(None, None))
}

/// The object key a newly written file occupies within a partition.
pub fn new_file_object_key(namespace: &str, partition: &str, file_name: &str) -> String {
    if partition.is_empty() {
        format!("ns={namespace}/{file_name}")
    } else {
        format!("ns={namespace}/{partition}/{file_name}")
    }
}

/// Generates a fresh `<ksuid>.parquet` file name.
pub fn new_parquet_file_name() -> String {
    format!("{}.parquet", gen_ksorted_id(""))
}
