//! Error types for the configuration store.
//!
//! [`StoreError`] is returned by every read and write operation. A rejected
//! upload is *not* an error: it comes back as
//! [`UploadOutcome::Conflict`](crate::UploadOutcome::Conflict) so callers can
//! handle the normal retry path without matching on failures.

use std::path::PathBuf;

use confvault_git::GitError;
use thiserror::Error;

use crate::codec::CodecError;

/// Errors returned by [`ConfigStore`](crate::ConfigStore) operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The document does not exist at the addressed point in history.
    #[error("document `{path}` not found at {revision}")]
    NotFound {
        /// Document file name.
        path: String,
        /// The branch or version that was read.
        revision: String,
    },

    /// The stored bytes could not be decoded as the requested document type.
    #[error("failed to decode document: {0}")]
    Decode(#[source] CodecError),

    /// The candidate document could not be encoded.
    #[error("failed to encode document: {0}")]
    Encode(#[source] CodecError),

    /// The version token does not name a point in the main line's history.
    #[error("invalid version token `{token}`: {reason}")]
    InvalidVersionToken {
        /// The token as supplied by the caller.
        token: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The underlying object store failed for reasons unrelated to conflicts.
    #[error("store fault: {0}")]
    Fault(#[from] GitError),

    /// Working-state file access failed.
    #[error("working state I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A configuration file could not be loaded or is invalid.
    #[error("invalid configuration {}: {detail}", path.display())]
    Config {
        /// Path to the configuration file (empty for in-memory config).
        path: PathBuf,
        /// Human-readable description of the problem.
        detail: String,
    },
}

impl StoreError {
    /// Returns `true` if this error means the store itself failed, as opposed
    /// to a problem with the caller's input or the addressed document.
    #[must_use]
    pub const fn is_fault(&self) -> bool {
        matches!(self, Self::Fault(_) | Self::Io(_))
    }

    pub(crate) fn invalid_token(token: impl ToString, reason: impl Into<String>) -> Self {
        Self::InvalidVersionToken {
            token: token.to_string(),
            reason: reason.into(),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = StoreError> = std::result::Result<T, E>;
