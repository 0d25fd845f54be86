//! S3 backend: logical paths are object keys in one bucket.
//!
//! Rewindable content is streamed straight into `PutObject`. One-shot
//! readers are buffered first so the upload has a known length, then sent
//! with an unsigned payload and a `Content-MD5` check.

mod config;
mod content_type;
mod errors;

pub use config::{
    ENV_ACCESS_KEY_ID, ENV_REGION, ENV_SECRET_ACCESS_KEY, ENV_SESSION_TOKEN, S3Config,
    S3Credentials,
};

use crate::content::{BlobReader, Content, Source};
use crate::context::Context;
use crate::error::{Result, StorageError};
use crate::public_url::PublicUrl;
use crate::storage::{Stat, Storage};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_config::Region;
use aws_config::retry::RetryConfig;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{Credentials, RequestChecksumCalculation};
use aws_sdk_s3::primitives::ByteStream;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use errors::{Operation, from_sdk};
use std::time::SystemTime;
use tokio::io::{AsyncRead, AsyncReadExt};

const CREDENTIALS_PROVIDER: &str = "libstorage";

pub struct S3Storage {
    client: Client,
    bucket: String,
    public_url: Option<PublicUrl>,
}

/// Client settings shared by every `S3Storage`. Payload checksums are only
/// sent where an operation requires them; the buffered upload brings its
/// own `Content-MD5`.
fn client_settings(
    builder: aws_sdk_s3::config::Builder,
    path_style: bool,
) -> aws_sdk_s3::config::Builder {
    builder
        .force_path_style(path_style)
        .request_checksum_calculation(RequestChecksumCalculation::WhenRequired)
}

impl S3Storage {
    /// Builds a client from `config`. No request is sent until the first
    /// operation. The SDK's own retries are disabled.
    pub async fn new(config: S3Config) -> Self {
        let S3Config {
            bucket,
            endpoint_url,
            region,
            credentials,
        } = config;
        let credentials = Credentials::new(
            credentials.access_key_id,
            credentials.secret_access_key,
            credentials.session_token,
            None,
            CREDENTIALS_PROVIDER,
        );
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region))
            .credentials_provider(credentials)
            .retry_config(RetryConfig::disabled());
        if let Some(url) = &endpoint_url {
            loader = loader.endpoint_url(url);
        }
        let sdk_config = loader.load().await;

        // custom endpoints are usually S3-compatible services without
        // virtual-host bucket addressing
        let s3_config = client_settings(
            aws_sdk_s3::config::Builder::from(&sdk_config),
            endpoint_url.is_some(),
        )
        .build();
        Self::from_client(Client::from_conf(s3_config), bucket)
    }

    pub fn from_client(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            public_url: None,
        }
    }

    pub fn with_public_url(mut self, public_url: PublicUrl) -> Self {
        self.public_url = Some(public_url);
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put_streaming(
        &self,
        ctx: &Context,
        body: ByteStream,
        len: Option<u64>,
        key: &str,
    ) -> Result<()> {
        let content_type = content_type::guess(key).map(|m| m.to_string());
        let req = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .set_content_length(len.and_then(|l| i64::try_from(l).ok()))
            .set_content_type(content_type)
            .body(body);
        ctx.run(async {
            req.send()
                .await
                .map_err(|e| from_sdk(Operation::PutObject, e))
        })
        .await?;
        Ok(())
    }

    async fn put_buffered(
        &self,
        ctx: &Context,
        mut reader: Box<dyn AsyncRead + Send + Unpin>,
        key: &str,
    ) -> Result<()> {
        let data = ctx
            .run(async move {
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf).await?;
                Ok(buf)
            })
            .await?;
        let len = data.len();
        let checksum = B64.encode(md5::compute(&data).0);
        tracing::debug!("s3 buffered {len} bytes for {}/{key}", self.bucket);

        let req = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_length(len as i64)
            .content_md5(checksum)
            .body(ByteStream::from(data));
        ctx.run(async {
            req.customize()
                .disable_payload_signing()
                .send()
                .await
                .map_err(|e| from_sdk(Operation::PutObject, e))
        })
        .await?;
        Ok(())
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn save(&self, ctx: &Context, content: Content, path: &str) -> Result<()> {
        ctx.check()?;
        tracing::debug!(
            "s3 save {}/{path} rewindable={} size={:?}",
            self.bucket,
            content.is_rewindable(),
            content.size_hint()
        );
        match content.into_source() {
            Source::Bytes(bytes) => {
                let len = bytes.len() as u64;
                self.put_streaming(ctx, ByteStream::from(bytes), Some(len), path)
                    .await
            }
            Source::File { file, len } => {
                let body = ByteStream::read_from()
                    .file(file)
                    .build()
                    .await
                    .map_err(|e| StorageError::Body(Box::new(e)))?;
                self.put_streaming(ctx, body, Some(len), path).await
            }
            Source::Reader(reader) => self.put_buffered(ctx, reader, path).await,
        }
    }

    /// A `HEAD` response has no body to name the error, so any 404 is
    /// reported as `NotExist`, including one caused by a missing bucket.
    async fn stat(&self, ctx: &Context, path: &str) -> Result<Stat> {
        let out = ctx
            .run(async {
                self.client
                    .head_object()
                    .bucket(&self.bucket)
                    .key(path)
                    .send()
                    .await
                    .map_err(|e| from_sdk(Operation::HeadObject, e))
            })
            .await?;

        let size = out
            .content_length()
            .and_then(|l| u64::try_from(l).ok())
            .ok_or_else(|| {
                StorageError::MalformedResponse(format!("HeadObject {path}: no content length"))
            })?;
        let modified = out.last_modified().ok_or_else(|| {
            StorageError::MalformedResponse(format!("HeadObject {path}: no last-modified"))
        })?;
        let modified_time = SystemTime::try_from(*modified)
            .map_err(|e| StorageError::MalformedResponse(format!("HeadObject {path}: {e}")))?;
        Ok(Stat {
            modified_time,
            size,
        })
    }

    async fn open(&self, ctx: &Context, path: &str) -> Result<BlobReader> {
        let out = ctx
            .run(async {
                self.client
                    .get_object()
                    .bucket(&self.bucket)
                    .key(path)
                    .send()
                    .await
                    .map_err(|e| from_sdk(Operation::GetObject, e))
            })
            .await?;
        Ok(Box::pin(out.body.into_async_read()))
    }

    fn url(&self, path: &str) -> Option<String> {
        self.public_url.as_ref().map(|u| u.url_for(path))
    }

    /// Deleting a missing key succeeds.
    async fn delete(&self, ctx: &Context, path: &str) -> Result<()> {
        tracing::debug!("s3 delete {}/{path}", self.bucket);
        ctx.run(async {
            self.client
                .delete_object()
                .bucket(&self.bucket)
                .key(path)
                .send()
                .await
                .map_err(|e| from_sdk(Operation::DeleteObject, e))
        })
        .await?;
        Ok(())
    }
}
