//! Blob content flowing into and out of a [`Storage`](crate::Storage).
//!
//! `Content` records whether its source can be re-read from the start. The
//! object-store adapter streams rewindable content directly and buffers
//! one-shot readers in memory first.

use bytes::Bytes;
use std::fmt;
use std::path::Path;
use std::pin::Pin;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Readable stream returned by `open`. Dropping it closes the underlying
/// file descriptor or connection.
pub type BlobReader = Pin<Box<dyn AsyncRead + Send>>;

pub struct Content {
    source: Source,
}

pub(crate) enum Source {
    Bytes(Bytes),
    File { file: File, len: u64 },
    Reader(Box<dyn AsyncRead + Send + Unpin>),
}

impl Content {
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self {
            source: Source::Bytes(data.into()),
        }
    }

    /// Wraps an open file positioned at its start. The length is taken from
    /// its metadata.
    pub async fn from_file(file: File) -> std::io::Result<Self> {
        let len = file.metadata().await?.len();
        Ok(Self {
            source: Source::File { file, len },
        })
    }

    pub async fn open<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        Self::from_file(File::open(path).await?).await
    }

    /// Wraps a one-shot reader that cannot be rewound.
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self {
            source: Source::Reader(Box::new(reader)),
        }
    }

    /// Whether the content can be replayed from the start.
    pub fn is_rewindable(&self) -> bool {
        !matches!(self.source, Source::Reader(_))
    }

    pub fn size_hint(&self) -> Option<u64> {
        match &self.source {
            Source::Bytes(b) => Some(b.len() as u64),
            Source::File { len, .. } => Some(*len),
            Source::Reader(_) => None,
        }
    }

    pub(crate) fn into_source(self) -> Source {
        self.source
    }

    pub fn into_reader(self) -> Box<dyn AsyncRead + Send + Unpin> {
        match self.source {
            Source::Bytes(b) => Box::new(std::io::Cursor::new(b)),
            Source::File { file, .. } => Box::new(file),
            Source::Reader(r) => r,
        }
    }

    /// Reads everything into memory.
    pub async fn into_bytes(self) -> std::io::Result<Bytes> {
        match self.source {
            Source::Bytes(b) => Ok(b),
            other => {
                let mut reader = Content { source: other }.into_reader();
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf).await?;
                Ok(Bytes::from(buf))
            }
        }
    }
}

impl From<Bytes> for Content {
    fn from(value: Bytes) -> Self {
        Self::from_bytes(value)
    }
}

impl From<Vec<u8>> for Content {
    fn from(value: Vec<u8>) -> Self {
        Self::from_bytes(value)
    }
}

impl From<&'static str> for Content {
    fn from(value: &'static str) -> Self {
        Self::from_bytes(value)
    }
}

impl From<String> for Content {
    fn from(value: String) -> Self {
        Self::from_bytes(value)
    }
}

impl fmt::Debug for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.source {
            Source::Bytes(_) => "bytes",
            Source::File { .. } => "file",
            Source::Reader(_) => "reader",
        };
        f.debug_struct("Content")
            .field("kind", &kind)
            .field("size_hint", &self.size_hint())
            .finish()
    }
}
