//! Storage Layer
//!
//! Keeps the session video and rendered plots on disk, and a bounded
//! in-memory history of analysis results.

mod repository;
mod session;

pub use repository::{AnalysisRecord, Repository};
pub use session::{SessionStore, StorageConfig, VideoUpload};

use std::path::PathBuf;

use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Lock error: {0}")]
    Lock(String),
    #[error("Record not found")]
    NotFound,
    #[error("Invalid file name: {0}")]
    InvalidName(String),
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
