//! Client-side validation of management requests.
//!
//! Requests are checked before they reach the network so an operator gets
//! a field-level message instead of the server's generic
//! `invalid request body`.

use std::fmt;

use crate::model::{
    CreateReleaseRequest, DeleteReleaseRequest, SetActiveBundleRequest, UpdateReleaseRequest,
    UploadBundleRequest,
};

/// Leading bytes of a zip local file header.
const ZIP_SIGNATURE: [u8; 4] = [b'P', b'K', 0x03, 0x04];

/// Length of a hex-encoded object id.
const OBJECT_ID_LEN: usize = 24;

/// A single field that failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The field that failed validation.
    pub field: String,
    /// A human-readable description of the failure.
    pub message: String,
    /// The kind of validation that failed.
    pub kind: ValidationErrorKind,
}

impl ValidationError {
    /// Creates a validation error for a required field that is missing.
    pub fn required(field: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            message: format!("'{field}' is required"),
            field,
            kind: ValidationErrorKind::Required,
        }
    }

    /// Creates a validation error for an invalid format.
    pub fn format(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            kind: ValidationErrorKind::Format,
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation error for '{}': {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// The category of validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationErrorKind {
    /// A required field was blank.
    Required,
    /// The value format is invalid.
    Format,
}

/// All validation failures of one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a validation error to the collection.
    pub fn add(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Returns true if there are no validation errors.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of validation errors.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.errors.len()
    }

    /// Returns an iterator over the validation errors.
    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.errors.iter()
    }

    /// Returns true if any error concerns `field`.
    #[must_use]
    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    /// Converts to `Ok(())` when empty, `Err(self)` otherwise.
    ///
    /// # Errors
    ///
    /// Returns the collection itself when it holds at least one error.
    pub fn into_result(self) -> Result<(), Self> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    fn require(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.add(ValidationError::required(field));
        }
    }

    fn require_object_id(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.add(ValidationError::required(field));
        } else if !is_object_id(value) {
            self.add(ValidationError::format(
                field,
                format!("'{value}' is not a {OBJECT_ID_LEN}-character hex id"),
            ));
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.as_slice() {
            [] => write!(f, "no validation errors"),
            [single] => write!(f, "{single}"),
            errors => {
                writeln!(f, "{} validation errors:", errors.len())?;
                for error in errors {
                    writeln!(f, "  - {error}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ValidationErrors {}

/// Trait for requests that can be validated before sending.
pub trait Validate {
    /// Validates this instance and returns every failure found.
    ///
    /// # Errors
    ///
    /// Returns `ValidationErrors` containing all validation failures found.
    fn validate(&self) -> Result<(), ValidationErrors>;

    /// Returns true if this instance is valid.
    fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

/// Returns true for a 24-character hex object id.
///
/// ```
/// use otaconsole_core::validation::is_object_id;
///
/// assert!(is_object_id("65a1f0c2e4b0a1b2c3d4e5f6"));
/// assert!(!is_object_id("r1"));
/// ```
#[must_use]
pub fn is_object_id(value: &str) -> bool {
    value.len() == OBJECT_ID_LEN && value.bytes().all(|b| b.is_ascii_hexdigit())
}

impl Validate for CreateReleaseRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.require("app_id", &self.app_id);
        errors.require("version_name", &self.version_name);
        errors.require("version_code", &self.version_code);
        errors.require_object_id("builtin_bundle_id", &self.builtin_bundle_id);
        errors.into_result()
    }
}

impl Validate for UpdateReleaseRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.require_object_id("release_id", &self.release_id);
        errors.into_result()
    }
}

impl Validate for DeleteReleaseRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.require_object_id("release_id", &self.release_id);
        errors.into_result()
    }
}

impl Validate for SetActiveBundleRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.require_object_id("release_id", &self.release_id);
        errors.require_object_id("bundle_id", &self.bundle_id);
        errors.into_result()
    }
}

impl Validate for UploadBundleRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.require("app_id", &self.app_id);
        errors.require("version_name", &self.version_name);

        if !self.file_name.to_ascii_lowercase().ends_with(".zip") {
            errors.add(ValidationError::format(
                "bundle",
                format!("'{}' is not a .zip file", self.file_name),
            ));
        }

        if self.content.is_empty() {
            errors.add(ValidationError::required("bundle"));
        } else if !self.content.starts_with(&ZIP_SIGNATURE) {
            errors.add(ValidationError::format(
                "bundle",
                "content is not a zip archive",
            ));
        }

        errors.into_result()
    }
}
