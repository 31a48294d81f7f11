//! Error types for the MLX model store.
//!
//! Every operation returns [`StoreError`] to its immediate caller. The store
//! never retries internally; [`StoreError::is_retryable`] tells callers which
//! failures are worth another attempt.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the MLX model store.
#[derive(Debug, Error)]
pub enum StoreError {
    // Cache lookup errors
    #[error("Model not found: {reference}")]
    NotFound { reference: String },

    #[error("Local directory for {reference} is already owned by {existing}")]
    ReferenceCollision { reference: String, existing: String },

    #[error("Reference {reference:?} does not map to a bundle directory")]
    InvalidReference { reference: String },

    // Network errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        /// Optional cause description
        cause: Option<String>,
    },

    #[error("Request to {url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    // Fetch errors
    #[error("Failed to download required file {filename}: {source}")]
    RequiredFile {
        filename: String,
        #[source]
        source: Box<StoreError>,
    },

    #[error("Download cancelled")]
    Cancelled,

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return StoreError::HttpStatus {
                url: err.url().map(|u| u.to_string()).unwrap_or_default(),
                status: status.as_u16(),
            };
        }
        StoreError::Network {
            message: err.to_string(),
            cause: std::error::Error::source(&err).map(|s| s.to_string()),
        }
    }
}

impl StoreError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        StoreError::Io {
            message: format!("{}: {}", path.display(), err),
            path: Some(path),
            source: Some(err),
        }
    }

    /// True when the reference has no usable local bundle.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    /// Check if this error is worth retrying by the caller.
    ///
    /// Server errors (5xx) and rate limiting are transient; other statuses are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Network { .. } => true,
            StoreError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            StoreError::RequiredFile { source, .. } => source.is_retryable(),
            _ => false,
        }
    }
}
