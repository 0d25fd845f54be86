//! Backend selection.

use crate::backend::localfs::LocalFsStorage;
use crate::backend::s3::{S3Config, S3Storage};
use crate::error::Result;
use crate::public_url::{PublicUrl, PublicUrlConfig};
use crate::storage::Storage;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    Filesystem {
        root: PathBuf,
        #[serde(default)]
        public_url: Option<PublicUrlConfig>,
    },
    S3 {
        bucket: String,
        #[serde(default)]
        endpoint_url: Option<String>,
        #[serde(default)]
        public_url: Option<PublicUrlConfig>,
    },
}

/// Builds the backend described by `config`. S3 credentials and region come
/// from the process environment; a missing variable or a malformed base URL
/// fails here, before any request is made.
pub async fn connect(config: &StorageConfig) -> Result<Arc<dyn Storage>> {
    match config {
        StorageConfig::Filesystem { root, public_url } => {
            tracing::debug!("using filesystem storage at {}", root.display());
            let mut storage = LocalFsStorage::new(root);
            if let Some(public_url) = public_url {
                storage = storage.with_public_url(PublicUrl::from_config(public_url)?);
            }
            Ok(Arc::new(storage))
        }
        StorageConfig::S3 {
            bucket,
            endpoint_url,
            public_url,
        } => {
            let public_url = public_url.as_ref().map(PublicUrl::from_config).transpose()?;
            let s3_config = S3Config::from_env(bucket.clone(), endpoint_url.clone())?;
            tracing::debug!(
                "using s3 storage bucket={bucket} endpoint={:?}",
                s3_config.endpoint_url
            );
            let mut storage = S3Storage::new(s3_config).await;
            if let Some(public_url) = public_url {
                storage = storage.with_public_url(public_url);
            }
            Ok(Arc::new(storage))
        }
    }
}
