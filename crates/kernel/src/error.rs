//! Field processing error types.

use std::path::PathBuf;

use thiserror::Error;

/// Error resolving the submitted value of a field.
///
/// Validation failures are recoverable and collected by the form processor
/// alongside errors from other fields. Storage failures abort the whole
/// submission: an incomplete upload must never be recorded as a stored value.
#[derive(Debug, Error)]
pub enum FieldError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl FieldError {
    /// Whether this error must abort form processing rather than being
    /// aggregated with other per-field validation messages.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FieldError::Storage(_))
    }
}

/// User-facing validation failure for a single field.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The uploaded file's extension is not in the field's whitelist.
    #[error("{label} is not of the proper filetype.")]
    DisallowedFiletype { label: String },
}

/// Fatal failure writing an upload to the managed directory.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("upload directory {path} cannot be created or written")]
    DirectoryUnwritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write uploaded file")]
    WriteFailed(#[source] std::io::Error),
}

/// Result type alias for value resolution.
pub type FieldResult<T> = Result<T, FieldError>;
