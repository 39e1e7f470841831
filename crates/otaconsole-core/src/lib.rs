//! # otaconsole Core
//!
//! Domain types shared by the otaconsole client library and command-line
//! console for an over-the-air update server.
//!
//! This crate provides:
//!
//! - [`Release`] - A platform/version record pointing at a built-in bundle
//!   and optionally an active bundle override
//! - [`Bundle`] - An uploaded, versioned zip payload for OTA delivery
//! - Request and response envelopes for the management API
//! - [`validation`] - Client-side checks run before any request is sent
//!
//! ## Example
//!
//! ```rust
//! use otaconsole_core::{CreateReleaseRequest, Platform, Validate};
//!
//! let request = CreateReleaseRequest {
//!     platform: Platform::Android,
//!     app_id: "com.example.app".to_string(),
//!     version_name: "1.4.0".to_string(),
//!     version_code: "140".to_string(),
//!     builtin_bundle_id: "65a1f0c2e4b0a1b2c3d4e5f6".to_string(),
//! };
//! assert!(request.is_valid());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod model;
pub mod validation;

#[cfg(test)]
mod proptest_tests;

pub use error::{Error, Result};
pub use model::{
    parse_release_date, Bundle, BundleModifiedResponse, CreateReleaseRequest, DeleteReleaseRequest,
    GenericResponse, ListResponse, OAuthConfig, Platform, Release, ReleaseModifiedResponse,
    SetActiveBundleRequest, UpdateReleaseRequest, UploadBundleRequest,
};
pub use validation::{Validate, ValidationError, ValidationErrors};
