//! Error types for client operations.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use otaconsole_core::ValidationErrors;
use thiserror::Error;

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Kind of record a lookup was looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// A release record.
    Release,
    /// A bundle record.
    Bundle,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Release => f.write_str("Release"),
            Self::Bundle => f.write_str("Bundle"),
        }
    }
}

/// Errors that can occur while talking to the update server.
///
/// Sources are held behind `Arc` so one result of a shared in-flight request
/// can be handed to every waiter.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// The request never produced an HTTP response.
    #[error("Request to {url} failed: {source}")]
    Transport {
        /// Target URL.
        url: String,
        /// Underlying error.
        #[source]
        source: Arc<reqwest::Error>,
    },

    /// The server answered with a non-success status.
    #[error("API Error {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Message from the `error` or `message` field of the body.
        message: String,
    },

    /// A record lookup found no record with the given id.
    #[error("{kind} {id} not found")]
    NotFound {
        /// Record kind.
        kind: RecordKind,
        /// Requested id.
        id: String,
    },

    /// The interactive OAuth2 sign-in was closed or denied.
    #[error("Authorization cancelled")]
    AuthorizationCancelled,

    /// Any other OAuth2 protocol failure.
    #[error("OAuth error: {message}")]
    OAuth {
        /// Error message.
        message: String,
    },

    /// A response body did not match the expected shape.
    #[error("Failed to decode response: {source}")]
    Decode {
        /// Underlying error.
        #[source]
        source: Arc<serde_json::Error>,
    },

    /// Credential storage could not be read or written.
    #[error("Credential storage error at {path}: {source}")]
    Storage {
        /// Storage file path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: Arc<std::io::Error>,
    },

    /// A URL could not be built or parsed.
    #[error("Invalid URL: {url}")]
    InvalidUrl {
        /// URL string.
        url: String,
    },

    /// A request failed client-side validation and was not sent.
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    /// The HTTP client could not be configured.
    #[error("Failed to build HTTP client: {message}")]
    HttpClient {
        /// Error message.
        message: String,
    },
}

impl ClientError {
    /// Returns true for a 401 response from the server.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Api { status: 401, .. })
    }

    /// Returns true when a record lookup came back empty.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns the HTTP status for API errors.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub(crate) fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source: Arc::new(source),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport {
            url: err
                .url()
                .map_or_else(|| "unknown".to_string(), ToString::to_string),
            source: Arc::new(err),
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode {
            source: Arc::new(err),
        }
    }
}
