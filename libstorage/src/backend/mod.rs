//! Storage backends.
//!
//! Submodules:
//! - `localfs`: blobs as files under a root directory
//! - `s3`: blobs as objects in an S3-compatible bucket
//!
pub mod localfs;
pub mod s3;
