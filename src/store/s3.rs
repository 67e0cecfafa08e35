use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use futures::StreamExt;
use object_store::{
    aws::AmazonS3Builder, memory::InMemory, path::Path, ClientOptions, ObjectStore, PutPayload,
};

use crate::{
    config::StoreSettings,
    store::{BlobStore, StoreError},
};

const STORE_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Gateway over an S3-compatible blob store.
///
/// Construction branches once on the configured endpoint: an AWS endpoint
/// uses the cloud-native resolution, everything else is treated as a
/// self-hosted MinIO-style endpoint with path-style addressing. Callers see
/// the same behavior either way.
pub struct S3Gateway {
    inner: Arc<dyn ObjectStore>,
}

impl S3Gateway {
    pub fn from_config(cfg: &StoreSettings) -> Result<Self, StoreError> {
        if cfg.bucket_name.is_empty() {
            return Err(StoreError::Config("bucket_name must not be empty".to_string()));
        }

        let client_options = ClientOptions::new().with_timeout(STORE_CALL_TIMEOUT);

        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(&cfg.bucket_name)
            .with_region(&cfg.region)
            .with_access_key_id(&cfg.access_key)
            .with_secret_access_key(&cfg.secret_key)
            .with_client_options(client_options);

        if cfg.endpoint.contains("amazonaws.com") {
            tracing::info!(bucket = %cfg.bucket_name, region = %cfg.region, "using AWS S3 backend");
        } else {
            // Self-hosted endpoints may be given without a scheme.
            let endpoint = if cfg.endpoint.contains("://") {
                cfg.endpoint.clone()
            } else if cfg.use_tls {
                format!("https://{}", cfg.endpoint)
            } else {
                format!("http://{}", cfg.endpoint)
            };
            tracing::info!(bucket = %cfg.bucket_name, endpoint = %endpoint, "using S3-compatible backend");
            builder = builder
                .with_endpoint(endpoint)
                .with_allow_http(!cfg.use_tls)
                .with_virtual_hosted_style_request(false);
        }

        let store = builder.build()?;
        Ok(Self { inner: Arc::new(store) })
    }

    /// Gateway over an in-memory store; used by tests.
    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(InMemory::new()),
        }
    }
}

#[async_trait::async_trait]
impl BlobStore for S3Gateway {
    async fn list_blobs(&self) -> Result<Vec<String>, StoreError> {
        let mut entries = self.inner.list(None);
        let mut names = Vec::new();
        while let Some(meta) = entries.next().await {
            names.push(meta?.location.to_string());
        }
        Ok(names)
    }

    async fn get_blob(&self, name: &str) -> Result<Bytes, StoreError> {
        let result = self.inner.get(&Path::from(name)).await?;
        Ok(result.bytes().await?)
    }

    async fn put_blob(&self, name: &str, bytes: Bytes) -> Result<(), StoreError> {
        self.inner
            .put(&Path::from(name), PutPayload::from(bytes))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_round_trip() {
        let store = S3Gateway::in_memory();

        store
            .put_blob("cleaned_gen23.csv", Bytes::from_static(b"GENID\n1\n"))
            .await
            .unwrap();

        let names = store.list_blobs().await.unwrap();
        assert_eq!(names, vec!["cleaned_gen23.csv".to_string()]);

        let bytes = store.get_blob("cleaned_gen23.csv").await.unwrap();
        assert_eq!(&bytes[..], b"GENID\n1\n");
    }

    #[tokio::test]
    async fn get_missing_blob_is_an_error() {
        let store = S3Gateway::in_memory();
        let res = store.get_blob("nope.csv").await;
        assert!(matches!(res, Err(StoreError::Backend(_))));
    }
}
