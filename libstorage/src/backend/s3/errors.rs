//! Translation of S3 API failures into [`StorageError`].

use crate::error::StorageError;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Operation {
    HeadObject,
    GetObject,
    PutObject,
    DeleteObject,
}

impl Operation {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Operation::HeadObject => "HeadObject",
            Operation::GetObject => "GetObject",
            Operation::PutObject => "PutObject",
            Operation::DeleteObject => "DeleteObject",
        }
    }
}

/// Whether a failed `op` means nothing is stored under the key.
///
/// HEAD responses carry no body, so a bare 404 counts as well.
pub(crate) fn is_not_exist(op: Operation, code: Option<&str>, status: Option<u16>) -> bool {
    match op {
        Operation::HeadObject => code == Some("NotFound") || status == Some(404),
        Operation::GetObject => code == Some("NoSuchKey"),
        Operation::PutObject | Operation::DeleteObject => false,
    }
}

pub(crate) fn from_sdk<E>(op: Operation, err: SdkError<E, HttpResponse>) -> StorageError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let status = err.raw_response().map(|resp| resp.status().as_u16());
    if is_not_exist(op, err.code(), status) {
        return StorageError::NotExist;
    }
    tracing::debug!(
        "s3 {} failed: code={:?} status={:?}",
        op.as_str(),
        err.code(),
        status
    );
    StorageError::object_store(op.as_str(), err)
}
