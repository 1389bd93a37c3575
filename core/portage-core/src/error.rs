//! Error types for portage-core operations.
//!
//! Only a handful of failures are surfaced at all: most lookups degrade to
//! sentinel values instead of returning an error.

use std::path::PathBuf;

/// All errors that can occur in portage-core operations.
#[derive(Debug, thiserror::Error)]
pub enum PortageError {
    // ─────────────────────────────────────────────────────────────────────
    // Fatal
    // ─────────────────────────────────────────────────────────────────────
    #[error("Socket listing unavailable: {details}")]
    ListingUnavailable { details: String },

    // ─────────────────────────────────────────────────────────────────────
    // Environment
    // ─────────────────────────────────────────────────────────────────────
    #[error("Home directory not found")]
    HomeDirNotFound,

    // ─────────────────────────────────────────────────────────────────────
    // I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON parsing error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Editor state database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Convenience type alias for Results using PortageError.
pub type Result<T> = std::result::Result<T, PortageError>;

impl PortageError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        PortageError::Io {
            context: context.into(),
            source,
        }
    }
}
