use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::codec::CodecError;
use crate::remote::StoreError;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Remote store error: {0}")]
    Store(#[from] StoreError),
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Remote call timed out after {0:?}")]
    Timeout(Duration),
    #[error("Invalid file name (expected title.extension): {0}")]
    InvalidFileName(String),
    #[error("Notebook not found: {0}")]
    UnknownNotebook(String),
    #[error("Refusing to overwrite existing file: {0}")]
    LocalFileExists(PathBuf),
}

/// Run a remote call with an upper bound on its duration.
pub(crate) async fn with_timeout<T, F>(limit: Duration, call: F) -> Result<T, SyncError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(SyncError::Timeout(limit)),
    }
}
