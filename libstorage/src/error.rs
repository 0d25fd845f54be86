use std::io;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    /// Nothing is stored at the requested path. Returned by `stat` and `open`
    /// regardless of the active backend.
    #[error("does not exist")]
    NotExist,

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("object store {operation} failed: {source}")]
    ObjectStore {
        operation: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("body stream error: {0}")]
    Body(#[source] BoxError),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl StorageError {
    pub fn is_not_exist(&self) -> bool {
        matches!(self, Self::NotExist)
    }

    pub(crate) fn object_store<E>(operation: &'static str, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::ObjectStore {
            operation,
            source: Box::new(source),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("env variable {0} does not exist")]
    MissingEnv(&'static str),

    #[error("invalid base url {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}
