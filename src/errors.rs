use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("Archive file not found at {0:?}")]
    ArchiveNotFound(PathBuf),
    #[error("Archive file {path:?} could not be read: {source}")]
    ArchiveUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Archive file {path:?} is not a valid mbox container: {reason}")]
    ArchiveUnparsable { path: PathBuf, reason: String },
    #[error(transparent)]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("Failed to write output: {0}")]
    Output(String),
}

impl AppError {
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::InvalidArguments(_) => 1,
            AppError::ArchiveNotFound(_) | AppError::ArchiveUnreadable { .. } => 2,
            AppError::ArchiveUnparsable { .. } => 3,
            AppError::ThreadPool(_) | AppError::Output(_) => 4,
        }
    }
}

/// A single archive entry that could not be turned into a `MessageRecord`.
#[derive(Debug, Error, PartialEq)]
pub enum SourceError {
    #[error("entry {index} has no content after its separator line")]
    EmptyEntry { index: usize },
    #[error("entry {index} carries no usable date")]
    MissingDate { index: usize },
}
