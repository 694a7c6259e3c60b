//! S3-compatible object storage for book covers.
//!
//! Objects live at `{bucket}/{key}` behind a path-style endpoint, so R2 and
//! MinIO work the same as AWS.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use object_store::{
    aws::AmazonS3Builder, path::Path as ObjectPath, Attribute, Attributes,
    ObjectStore as RemoteStore, PutOptions, PutPayload,
};
use reqwest::Url;

use crate::{
    config::StorageConfig,
    error::{AppError, AppResult},
};

/// Object store seam used by the catalog
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    fn is_configured(&self) -> bool;

    /// Build the key for a new cover of a book
    fn cover_key(&self, book_id: i64, extension: &str) -> String;

    /// Store an object and return its public URL
    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> AppResult<String>;

    /// Delete by public URL or bare key
    async fn delete(&self, url_or_key: &str) -> AppResult<()>;
}

pub struct S3Storage {
    store: Option<Arc<dyn RemoteStore>>,
    config: StorageConfig,
}

impl S3Storage {
    /// Connects lazily; an unconfigured section yields a store that rejects writes
    pub fn new(config: StorageConfig) -> AppResult<Self> {
        if !config.is_configured() {
            return Ok(Self { store: None, config });
        }

        let store = AmazonS3Builder::new()
            .with_endpoint(config.endpoint.trim_end_matches('/'))
            .with_bucket_name(&config.bucket)
            .with_region(&config.region)
            .with_access_key_id(&config.access_key_id)
            .with_secret_access_key(&config.secret_access_key)
            .with_virtual_hosted_style_request(false)
            .with_allow_http(config.endpoint.starts_with("http://"))
            .build()
            .map_err(|e| AppError::Storage(format!("Failed to create S3 store: {}", e)))?;

        Ok(Self::with_store(Arc::new(store), config))
    }

    pub fn with_store(store: Arc<dyn RemoteStore>, config: StorageConfig) -> Self {
        Self {
            store: Some(store),
            config,
        }
    }

    fn remote(&self) -> AppResult<&Arc<dyn RemoteStore>> {
        self.store
            .as_ref()
            .ok_or_else(|| AppError::Storage("Object storage is not configured".to_string()))
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.config.public_url.trim_end_matches('/'), key)
    }

    /// Recover the object key from a stored URL
    pub fn key_from(&self, url_or_key: &str) -> String {
        let public = format!("{}/", self.config.public_url.trim_end_matches('/'));
        if !self.config.public_url.is_empty() {
            if let Some(key) = url_or_key.strip_prefix(&public) {
                return key.to_string();
            }
        }

        match Url::parse(url_or_key) {
            Ok(url) => {
                let path = url.path().trim_start_matches('/');
                let bucket_prefix = format!("{}/", self.config.bucket);
                path.strip_prefix(&bucket_prefix).unwrap_or(path).to_string()
            }
            Err(_) => url_or_key.trim_start_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Storage {
    fn is_configured(&self) -> bool {
        self.store.is_some()
    }

    fn cover_key(&self, book_id: i64, extension: &str) -> String {
        format!(
            "{}/{}_{}.{}",
            self.config.key_prefix.trim_matches('/'),
            book_id,
            uuid::Uuid::new_v4(),
            extension
        )
    }

    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> AppResult<String> {
        let store = self.remote()?;
        let path = ObjectPath::from(key);

        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());
        let options = PutOptions {
            attributes,
            ..Default::default()
        };

        store
            .put_opts(&path, PutPayload::from(Bytes::from(body)), options)
            .await
            .map_err(|e| AppError::Storage(format!("Upload of {} failed: {}", key, e)))?;

        tracing::info!("Stored object {}", key);
        Ok(self.public_url(key))
    }

    async fn delete(&self, url_or_key: &str) -> AppResult<()> {
        let store = self.remote()?;
        let key = self.key_from(url_or_key);

        store
            .delete(&ObjectPath::from(key.as_str()))
            .await
            .map_err(|e| AppError::Storage(format!("Delete of {} failed: {}", key, e)))?;

        tracing::info!("Deleted object {}", key);
        Ok(())
    }
}

/// MIME type for an accepted cover extension
pub fn content_type_for(extension: &str) -> &'static str {
    match extension {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}
