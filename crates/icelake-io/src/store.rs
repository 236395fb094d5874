//! Object storage: local filesystem for development, S3-compatible for
//! production, behind `object_store::ObjectStore`. Blob bytes are
//! effectively content-addressable since every key embeds a k-sortable
//! unique id, so uploads are never retried here — a retried upload after a
//! network blip would just write a second, equally valid object under a
//! different key, and the catalog transaction is the actual commit point.

use std::sync::Arc;

use bytes::Bytes;
use icelake_core::IcelakeError;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;

/// Where blobs live. `Local` is for development and tests; `S3` targets
/// any S3-compatible endpoint (AWS, MinIO, R2, …).
#[derive(Debug, Clone)]
pub enum StoreConfig {
    Local { root: std::path::PathBuf },
    S3 {
        bucket: String,
        region: String,
        endpoint: Option<String>,
        access_key_id: String,
        secret_access_key: String,
    },
}

pub fn build_object_store(config: &StoreConfig) -> Result<Arc<dyn ObjectStore>, IcelakeError> {
    match config {
        StoreConfig::Local { root } => {
            std::fs::create_dir_all(root)
                .map_err(|e| IcelakeError::permanent(format!("creating local object store root: {e}")))?;
            let fs = LocalFileSystem::new_with_prefix(root)
                .map_err(|e| IcelakeError::permanent(format!("opening local object store: {e}")))?;
            Ok(Arc::new(fs))
        }
        StoreConfig::S3 {
            bucket,
            region,
            endpoint,
            access_key_id,
            secret_access_key,
        } => {
            let mut builder = AmazonS3Builder::new()
                .with_bucket_name(bucket)
                .with_region(region)
                .with_access_key_id(access_key_id)
                .with_secret_access_key(secret_access_key);
            if let Some(endpoint) = endpoint {
                builder = builder.with_endpoint(endpoint).with_allow_http(true);
            }
            let s3 = builder
                .build()
                .map_err(|e| IcelakeError::permanent(format!("configuring S3 object store: {e}")))?;
            Ok(Arc::new(s3))
        }
    }
}

pub async fn put_object(store: &dyn ObjectStore, key: &str, bytes: Vec<u8>) -> Result<(), IcelakeError> {
    let path = ObjectPath::from(key);
    store
        .put(&path, Bytes::from(bytes))
        .await
        .map_err(|e| IcelakeError::transient(format!("uploading {key}: {e}")))?;
    Ok(())
}

pub async fn get_object(store: &dyn ObjectStore, key: &str) -> Result<Bytes, IcelakeError> {
    let path = ObjectPath::from(key);
    let result = store
        .get(&path)
        .await
        .map_err(|e| IcelakeError::transient(format!("downloading {key}: {e}")))?;
    result
        .bytes()
        .await
        .map_err(|e| IcelakeError::transient(format!("reading {key} body: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_bytes_through_local_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = build_object_store(&StoreConfig::Local { root: dir.path().to_path_buf() }).unwrap();

        put_object(store.as_ref(), "ns=orders/d=1/abc.parquet", vec![1, 2, 3])
            .await
            .unwrap();
        let bytes = get_object(store.as_ref(), "ns=orders/d=1/abc.parquet").await.unwrap();
        assert_eq!(bytes.as_ref(), &[1, 2, 3]);
    }

    #[tokio::test]
    async fn missing_key_is_a_transient_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = build_object_store(&StoreConfig::Local { root: dir.path().to_path_buf() }).unwrap();
        let err = get_object(store.as_ref(), "does/not/exist.parquet").await.unwrap_err();
        assert!(matches!(err, IcelakeError::Transient(_)));
    }
}
