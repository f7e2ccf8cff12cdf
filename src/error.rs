//! Error handling types and utilities.

use std::path::PathBuf;

/// A specialized Result type for docsearch application code.
///
/// This is an alias for `anyhow::Result` with context added via `.context()` and
/// `.with_context()` at the CLI and configuration boundaries.
pub type Result<T> = anyhow::Result<T>;

/// Error returned when building records from documentation pages fails.
///
/// Any of these aborts the whole build: no partial index is ever written.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// A page has no resolvable location, or two pages resolve to the same one.
    #[error("Malformed page '{page}': {reason}")]
    MalformedPage { page: String, reason: String },
    /// Reading a page or writing the index failed.
    #[error("I/O error on {}: {error}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },
    /// The record sequence could not be serialized.
    #[error("Failed to serialize search index: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl BuildError {
    pub(crate) fn malformed(page: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedPage {
            page: page.into(),
            reason: reason.into(),
        }
    }
}

/// Error returned when loading a serialized search index fails.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// Index file could not be read.
    #[error("Failed to read search index at {}: {error}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },
    /// Index file is not a valid `{"docs": [...]}` document.
    #[error("Failed to parse search index: {0}")]
    Parse(#[from] serde_json::Error),
    /// A record violates the index invariants.
    #[error("Invalid record at position {position}: {reason}")]
    InvalidRecord { position: usize, reason: String },
}

/// Error returned by a [`SearchSession`](crate::session::SearchSession).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// A query was submitted before an index finished loading.
    #[error("Search index is not loaded yet")]
    IndexNotLoaded,
    /// The search task panicked or was aborted by the runtime.
    #[error("Search task failed")]
    SearchFailed,
}
