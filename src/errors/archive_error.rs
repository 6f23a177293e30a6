use thiserror::Error;

use super::{CoreError, CoreErrorKind};
use crate::store::StoreError;

/// Failure modes of archive export and import.
///
/// The first three variants are validation failures that abort before any
/// write; the rest surface mid-pipeline faults. A missing asset binary is
/// deliberately not represented here: it is logged and skipped, never raised.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// Export requested for a project id that does not exist.
    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    /// The archive is not a readable zip or has no `project.json` entry.
    #[error("Invalid archive: {0}")]
    InvalidArchive(String),

    /// `manifestVersion` is missing, non-numeric, or not a supported value.
    #[error("Unsupported manifest version: {0}")]
    UnsupportedManifestVersion(String),

    /// A store read or write failed; on import this leaves a partially
    /// populated project behind (no rollback).
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Archive container could not be written.
    #[error("Archive error: {0}")]
    Zip(String),
}

impl ArchiveError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ArchiveError::ProjectNotFound(_) => "PROJECT_NOT_FOUND",
            ArchiveError::InvalidArchive(_) => "INVALID_ARCHIVE",
            ArchiveError::UnsupportedManifestVersion(_) => "UNSUPPORTED_MANIFEST_VERSION",
            ArchiveError::Store(_) => "STORE_ERROR",
            ArchiveError::Serialization(_) => "SERIALIZATION_ERROR",
            ArchiveError::Io(_) => "IO_ERROR",
            ArchiveError::Zip(_) => "ARCHIVE_ERROR",
        }
    }

    /// Validation failures produce zero side effects and map to 400-series
    /// responses in the HTTP layer.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ArchiveError::InvalidArchive(_) | ArchiveError::UnsupportedManifestVersion(_)
        )
    }
}

impl From<ArchiveError> for CoreError {
    fn from(err: ArchiveError) -> Self {
        let kind = match &err {
            ArchiveError::ProjectNotFound(_) => CoreErrorKind::NotFound,
            ArchiveError::InvalidArchive(_) | ArchiveError::UnsupportedManifestVersion(_) => {
                CoreErrorKind::Validation
            }
            _ => CoreErrorKind::Internal,
        };
        CoreError::new(kind, err.to_string()).with_source(err)
    }
}
