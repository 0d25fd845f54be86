use crate::content::{BlobReader, Content};
use crate::context::Context;
use crate::error::{Result, StorageError};
use async_trait::async_trait;
use std::time::SystemTime;
use tokio::io::AsyncReadExt;

/// Metadata about content stored at a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    pub modified_time: SystemTime,
    pub size: u64,
}

/// Uniform blob storage over interchangeable backends.
///
/// `stat` and `open` report a missing blob as [`StorageError::NotExist`] on
/// every backend. Any other failure is the backend's own error, passed
/// through unchanged.
///
/// `delete` of a missing path is backend specific: the local filesystem
/// returns its native not-found I/O error, the object store succeeds.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Writes `content` to `path`, replacing anything already stored there.
    async fn save(&self, ctx: &Context, content: Content, path: &str) -> Result<()>;

    async fn stat(&self, ctx: &Context, path: &str) -> Result<Stat>;

    /// Opens `path` for reading. The caller owns the returned reader.
    async fn open(&self, ctx: &Context, path: &str) -> Result<BlobReader>;

    async fn delete(&self, ctx: &Context, path: &str) -> Result<()>;

    /// Public URL of `path`, when the backend was given a base URL.
    fn url(&self, _path: &str) -> Option<String> {
        None
    }

    async fn exists(&self, ctx: &Context, path: &str) -> Result<bool> {
        match self.stat(ctx, path).await {
            Ok(_) => Ok(true),
            Err(StorageError::NotExist) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn size(&self, ctx: &Context, path: &str) -> Result<u64> {
        Ok(self.stat(ctx, path).await?.size)
    }

    async fn modified_time(&self, ctx: &Context, path: &str) -> Result<SystemTime> {
        Ok(self.stat(ctx, path).await?.modified_time)
    }

    /// Reads the whole blob at `path` into memory.
    async fn read(&self, ctx: &Context, path: &str) -> Result<Vec<u8>> {
        let mut reader = self.open(ctx, path).await?;
        ctx.run(async move {
            let mut buf = Vec::new();
            reader.read_to_end(&mut buf).await?;
            Ok(buf)
        })
        .await
    }
}
