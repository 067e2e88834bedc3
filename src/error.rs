//! Typed errors shared across modules.
//!
//! [`CapabilityError`] classifies failures of external services (embedding
//! and language model backends) so the HTTP layer can pick a status code.
//! [`IndexError`] covers a persisted index that cannot be used; it is always
//! fatal.

use std::path::PathBuf;

/// Failure of a remote capability (embedding or generation backend).
#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    /// Network failure, rate limiting or a server-side error (after retries).
    #[error("{service} unavailable: {message}")]
    Unavailable { service: String, message: String },

    /// The service answered but refused the request or sent a malformed reply.
    #[error("{service} rejected the request: {message}")]
    Rejected { service: String, message: String },
}

impl CapabilityError {
    pub fn unavailable(service: &str, message: impl Into<String>) -> Self {
        CapabilityError::Unavailable {
            service: service.to_string(),
            message: message.into(),
        }
    }

    pub fn rejected(service: &str, message: impl Into<String>) -> Self {
        CapabilityError::Rejected {
            service: service.to_string(),
            message: message.into(),
        }
    }

    /// Maps a non-success HTTP status: 429 and 5xx are transient.
    pub fn from_status(service: &str, status: reqwest::StatusCode, body: &str) -> Self {
        let message = format!("HTTP {}: {}", status, body.trim());
        if status.as_u16() == 429 || status.is_server_error() {
            Self::unavailable(service, message)
        } else {
            Self::rejected(service, message)
        }
    }

    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, CapabilityError::Unavailable { .. })
    }
}

/// A persisted vector index that cannot be opened or used.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("failed to open index at {}: {message}", .path.display())]
    Open { path: PathBuf, message: String },

    #[error("index at {} is corrupt: {message}", .path.display())]
    Corrupt { path: PathBuf, message: String },

    #[error(
        "index at {} was built with {found_model} ({found_dims} dims), \
         but the configured embedder is {expected_model} ({expected_dims} dims)",
        .path.display()
    )]
    Incompatible {
        path: PathBuf,
        found_model: String,
        found_dims: usize,
        expected_model: String,
        expected_dims: usize,
    },
}
