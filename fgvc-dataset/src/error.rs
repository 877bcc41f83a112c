//! Error kinds surfaced by dataset building and access.

use std::path::PathBuf;

/// The root cause of a failed dataset operation.
///
/// Operations return [anyhow::Result] with context attached. The kind can be
/// recovered with `err.downcast_ref::<DatasetError>()`.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("input '{path}' does not exist")]
    MissingInput { path: PathBuf },
    #[error("failed to decode image '{path}'")]
    DecodeFailure {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("index {index} is out of range for a dataset of {len} samples")]
    OutOfRange { index: usize, len: usize },
    #[error("cache file '{path}' is corrupted: {reason}")]
    CorruptCache { path: PathBuf, reason: String },
}

impl DatasetError {
    pub(crate) fn missing(path: impl Into<PathBuf>) -> Self {
        Self::MissingInput { path: path.into() }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::CorruptCache {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
