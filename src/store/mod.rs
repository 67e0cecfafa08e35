pub mod s3;

pub use s3::S3Gateway;

use bytes::Bytes;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(#[from] object_store::Error),
    #[error("invalid store configuration: {0}")]
    Config(String),
}

/// Blob operations the service depends on, scoped to one configured bucket.
///
/// Backends must behave identically; nothing past construction may branch on
/// which one is active. Failures are not retried at this layer.
#[async_trait::async_trait]
pub trait BlobStore: Send + Sync {
    async fn list_blobs(&self) -> Result<Vec<String>, StoreError>;
    async fn get_blob(&self, name: &str) -> Result<Bytes, StoreError>;
    async fn put_blob(&self, name: &str, bytes: Bytes) -> Result<(), StoreError>;
}
