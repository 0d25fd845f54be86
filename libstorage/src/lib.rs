//! Uniform blob storage over a local directory or an S3-compatible bucket.
//!
//! Callers pick a backend (see [`config::connect`]) and use the four
//! [`Storage`] operations without caring which one is active. A missing blob
//! is always reported as [`StorageError::NotExist`].

pub mod backend;
pub mod config;
pub mod content;
pub mod context;
pub mod error;
pub mod public_url;
pub mod storage;

pub use backend::localfs::LocalFsStorage;
pub use backend::s3::{S3Config, S3Credentials, S3Storage};
pub use config::{StorageConfig, connect};
pub use content::{BlobReader, Content};
pub use context::Context;
pub use error::{ConfigError, Result, StorageError};
pub use public_url::{PublicUrl, PublicUrlConfig};
pub use storage::{Stat, Storage};
