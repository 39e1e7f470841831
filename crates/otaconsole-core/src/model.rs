//! Release and bundle records plus the management API envelopes.
//!
//! Records are owned by the update server; the client only ever holds
//! read-through copies decoded from these types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Mobile platform a release targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Apple iOS.
    Ios,
    /// Google Android.
    Android,
}

impl Platform {
    /// Returns the wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ios => "ios",
            Self::Android => "android",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ios" => Ok(Self::Ios),
            "android" => Ok(Self::Android),
            _ => Err(Error::UnknownPlatform {
                value: s.to_string(),
            }),
        }
    }
}

/// A release record as returned by `releases.list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    /// Release identifier (24-character hex object id).
    pub id: String,

    /// Target platform.
    pub platform: Platform,

    /// Application identifier (e.g. `com.example.app`).
    #[serde(default)]
    pub app_id: String,

    /// Human-facing version name.
    pub version_name: String,

    /// Store version code.
    pub version_code: String,

    /// Scheduled or actual release date.
    #[serde(default)]
    pub release_date: Option<DateTime<Utc>>,

    /// Bundle shipped inside the store binary.
    pub builtin_bundle_id: String,

    /// Bundle currently served over the air, overriding the built-in one.
    #[serde(default)]
    pub active_bundle_id: Option<String>,

    /// Last modification time.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,

    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Release {
    /// Returns the bundle devices on this release should run: the active
    /// override when set, the built-in bundle otherwise.
    #[must_use]
    pub fn effective_bundle_id(&self) -> &str {
        self.active_bundle_id
            .as_deref()
            .unwrap_or(&self.builtin_bundle_id)
    }
}

/// A bundle record as returned by `bundles.list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bundle {
    /// Bundle identifier (24-character hex object id).
    pub id: String,

    /// Application identifier.
    #[serde(default)]
    pub app_id: String,

    /// Version name of the web assets inside the bundle.
    pub version_name: String,

    /// Free-form operator description.
    #[serde(default)]
    pub description: String,

    /// CRC32 checksum computed by the server on upload.
    pub crc_checksum: String,

    /// Public URL devices download the bundle from.
    pub public_download_url: String,

    /// Upload time.
    pub created_at: DateTime<Utc>,
}

impl Bundle {
    /// Returns the label used when offering this bundle in a picker.
    ///
    /// ```
    /// # use otaconsole_core::Bundle;
    /// # let created_at = chrono::Utc::now();
    /// let bundle = Bundle {
    ///     id: "65a1f0c2e4b0a1b2c3d4e5f6".to_string(),
    ///     app_id: "com.example.app".to_string(),
    ///     version_name: "1.4.0".to_string(),
    ///     description: "hotfix".to_string(),
    ///     crc_checksum: "1a2b3c4d".to_string(),
    ///     public_download_url: "https://cdn.example.com/1.4.0.zip".to_string(),
    ///     created_at,
    /// };
    /// assert_eq!(bundle.option_label(), "com.example.app - 1.4.0 [hotfix]");
    /// ```
    #[must_use]
    pub fn option_label(&self) -> String {
        if self.description.is_empty() {
            format!("{} - {}", self.app_id, self.version_name)
        } else {
            format!(
                "{} - {} [{}]",
                self.app_id, self.version_name, self.description
            )
        }
    }
}

/// Server-advertised OAuth2 settings from `oauth2.config`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthConfig {
    /// Issuer URL of the identity provider.
    pub issuer: String,

    /// Public client id registered for the console.
    pub client_id: String,
}

/// Collection envelope used by the list endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListResponse<T> {
    /// Records, newest first.
    pub data: Vec<T>,
}

impl<T> ListResponse<T> {
    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true when the collection is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Response of release mutations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseModifiedResponse {
    /// Server message.
    pub message: String,

    /// The release after the change.
    pub release: Release,
}

/// Response of `bundles.upload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleModifiedResponse {
    /// Server message.
    pub message: String,

    /// The stored bundle.
    pub bundle: Bundle,
}

/// Response carrying only a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericResponse {
    /// Server message.
    #[serde(default)]
    pub message: String,
}

/// Body of `releases.create`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateReleaseRequest {
    /// Target platform.
    pub platform: Platform,
    /// Application identifier.
    pub app_id: String,
    /// Version name.
    pub version_name: String,
    /// Version code.
    pub version_code: String,
    /// Bundle shipped in the store binary.
    pub builtin_bundle_id: String,
}

/// Body of `releases.update`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateReleaseRequest {
    /// Release to update.
    pub release_id: String,
    /// New release date; `null` leaves the stored date untouched.
    pub release_date: Option<DateTime<Utc>>,
}

/// Body of `releases.delete`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteReleaseRequest {
    /// Release to delete.
    pub release_id: String,
}

/// Body of `releases.set-active`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetActiveBundleRequest {
    /// Release to change.
    pub release_id: String,
    /// Bundle to serve over the air.
    pub bundle_id: String,
}

/// Multipart payload of `bundles.upload`.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadBundleRequest {
    /// File name sent with the `bundle` part.
    pub file_name: String,
    /// Zip archive bytes.
    pub content: Vec<u8>,
    /// Application identifier.
    pub app_id: String,
    /// Version name.
    pub version_name: String,
    /// Operator description, may be empty.
    pub description: String,
}

impl fmt::Debug for UploadBundleRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadBundleRequest")
            .field("file_name", &self.file_name)
            .field("content_len", &self.content.len())
            .field("app_id", &self.app_id)
            .field("version_name", &self.version_name)
            .field("description", &self.description)
            .finish()
    }
}

/// Parses a release date given either as RFC 3339 or as a plain
/// `YYYY-MM-DD` date (midnight UTC).
///
/// # Errors
///
/// Returns [`Error::InvalidDate`] when neither form matches.
///
/// # Examples
///
/// ```
/// use otaconsole_core::model::parse_release_date;
///
/// let date = parse_release_date("2024-03-01").unwrap();
/// assert_eq!(date.to_rfc3339(), "2024-03-01T00:00:00+00:00");
/// ```
pub fn parse_release_date(value: &str) -> Result<DateTime<Utc>> {
    let trimmed = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").map_err(|e| Error::InvalidDate {
        value: value.to_string(),
        reason: e.to_string(),
    })?;
    date.and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .ok_or_else(|| Error::InvalidDate {
            value: value.to_string(),
            reason: "date has no midnight".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const RELEASE_JSON: &str = r#"{
        "id": "65a1f0c2e4b0a1b2c3d4e5f6",
        "app_id": "com.example.app",
        "platform": "ios",
        "version_name": "1.4.0",
        "version_code": "140",
        "release_date": null,
        "builtin_bundle_id": "65a1f0c2e4b0a1b2c3d4e500",
        "active_bundle_id": null,
        "updated_at": "2024-03-01T10:00:00.123456789Z",
        "created_at": "2024-03-01T10:00:00Z"
    }"#;

    #[test]
    fn test_platform_parse() {
        assert_eq!("ios".parse::<Platform>().unwrap(), Platform::Ios);
        assert_eq!("Android".parse::<Platform>().unwrap(), Platform::Android);
        assert!("windows".parse::<Platform>().is_err());
    }

    #[test]
    fn test_platform_serializes_lowercase() {
        let json = serde_json::to_string(&Platform::Android).unwrap();
        assert_eq!(json, r#""android""#);
    }

    #[test]
    fn test_release_deserialize() {
        let release: Release = serde_json::from_str(RELEASE_JSON).unwrap();
        assert_eq!(release.platform, Platform::Ios);
        assert!(release.release_date.is_none());
        assert!(release.active_bundle_id.is_none());
        assert!(release.updated_at.is_some());
        assert_eq!(release.effective_bundle_id(), "65a1f0c2e4b0a1b2c3d4e500");
    }

    #[test]
    fn test_release_missing_optional_fields() {
        let json = r#"{
            "id": "r1",
            "platform": "android",
            "version_name": "1.0.0",
            "version_code": "100",
            "builtin_bundle_id": "b1",
            "active_bundle_id": "b2",
            "created_at": "2024-03-01T10:00:00+07:00"
        }"#;
        let release: Release = serde_json::from_str(json).unwrap();
        assert!(release.app_id.is_empty());
        assert_eq!(release.effective_bundle_id(), "b2");
        assert_eq!(release.created_at.to_rfc3339(), "2024-03-01T03:00:00+00:00");
    }

    #[test]
    fn test_bundle_option_label_without_description() {
        let bundle = Bundle {
            id: "b1".to_string(),
            app_id: "com.example.app".to_string(),
            version_name: "1.0.0".to_string(),
            description: String::new(),
            crc_checksum: "abcd".to_string(),
            public_download_url: "https://cdn.example.com/b1.zip".to_string(),
            created_at: Utc::now(),
        };
        assert_eq!(bundle.option_label(), "com.example.app - 1.0.0");
    }

    #[test]
    fn test_update_request_serializes_null_date() {
        let req = UpdateReleaseRequest {
            release_id: "r1".to_string(),
            release_date: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json["release_date"].is_null());
    }

    #[test]
    fn test_upload_request_debug_hides_content() {
        let req = UploadBundleRequest {
            file_name: "bundle.zip".to_string(),
            content: vec![0; 2048],
            app_id: "com.example.app".to_string(),
            version_name: "1.0.0".to_string(),
            description: String::new(),
        };
        let debug = format!("{req:?}");
        assert!(debug.contains("content_len: 2048"));
    }

    #[test]
    fn test_parse_release_date_rfc3339() {
        let date = parse_release_date("2024-03-01T12:30:00+02:00").unwrap();
        assert_eq!(date.to_rfc3339(), "2024-03-01T10:30:00+00:00");
    }

    #[test]
    fn test_parse_release_date_invalid() {
        assert!(matches!(
            parse_release_date("next tuesday"),
            Err(Error::InvalidDate { .. })
        ));
    }
}
