//! Error types for otaconsole core operations.

use thiserror::Error;

/// Result type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when handling core domain values.
#[derive(Error, Debug)]
pub enum Error {
    /// A platform string was neither `ios` nor `android`.
    #[error("Unknown platform '{value}': expected 'ios' or 'android'")]
    UnknownPlatform {
        /// The rejected value.
        value: String,
    },

    /// A release date could not be parsed.
    #[error("Invalid release date '{value}': {reason}")]
    InvalidDate {
        /// The rejected value.
        value: String,
        /// Reason for the parse failure.
        reason: String,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}
