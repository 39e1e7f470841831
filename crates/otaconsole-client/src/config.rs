//! Configuration types for the console client.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ClientError, Result};

/// Default base path of the authenticated management API.
pub const DEFAULT_API_PATH: &str = "/api/v1";

/// Default base path of the unauthenticated public API.
pub const DEFAULT_PUBLIC_PATH: &str = "/apipublic/v1";

/// Default path the console UI is mounted under.
pub const DEFAULT_BASE_PATH: &str = "/ui";

/// Configuration for the console client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server URL (e.g., "<https://updates.example.com>").
    pub server_url: String,

    /// Base path of the authenticated API.
    pub api_path: String,

    /// Base path of the public API.
    pub public_path: String,

    /// Path the console routes are mounted under.
    pub base_path: String,

    /// Request timeout.
    pub timeout: Duration,

    /// TLS configuration.
    pub tls: Option<TlsConfig>,

    /// User agent string.
    pub user_agent: String,
}

impl ClientConfig {
    /// Creates a new configuration for the given server.
    ///
    /// A trailing slash on the URL is dropped.
    ///
    /// # Examples
    ///
    /// ```
    /// use otaconsole_client::ClientConfig;
    ///
    /// let config = ClientConfig::new("https://updates.example.com/");
    /// assert_eq!(config.server_url, "https://updates.example.com");
    /// assert_eq!(config.api_path, "/api/v1");
    /// ```
    #[must_use]
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into().trim_end_matches('/').to_string(),
            api_path: DEFAULT_API_PATH.to_string(),
            public_path: DEFAULT_PUBLIC_PATH.to_string(),
            base_path: DEFAULT_BASE_PATH.to_string(),
            timeout: Duration::from_secs(30),
            tls: None,
            user_agent: format!("otaconsole/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Sets the path the console routes are mounted under.
    ///
    /// # Examples
    ///
    /// ```
    /// use otaconsole_client::ClientConfig;
    ///
    /// let config = ClientConfig::new("https://updates.example.com").with_base_path("console/");
    /// assert_eq!(config.base_path, "/console");
    /// ```
    #[must_use]
    pub fn with_base_path(mut self, base_path: impl AsRef<str>) -> Self {
        self.base_path = normalize_path(base_path.as_ref());
        self
    }

    /// Overrides the authenticated and public API base paths.
    #[must_use]
    pub fn with_api_paths(mut self, api_path: impl AsRef<str>, public_path: impl AsRef<str>) -> Self {
        self.api_path = normalize_path(api_path.as_ref());
        self.public_path = normalize_path(public_path.as_ref());
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the TLS configuration.
    #[must_use]
    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }

    /// Returns the URL of an authenticated API action.
    ///
    /// ```
    /// use otaconsole_client::ClientConfig;
    ///
    /// let config = ClientConfig::new("https://updates.example.com");
    /// assert_eq!(
    ///     config.api_url("releases.list"),
    ///     "https://updates.example.com/api/v1/releases.list"
    /// );
    /// ```
    #[must_use]
    pub fn api_url(&self, action: &str) -> String {
        format!("{}{}/{action}", self.server_url, self.api_path)
    }

    /// Returns the URL of a public API action.
    #[must_use]
    pub fn public_url(&self, action: &str) -> String {
        format!("{}{}/{action}", self.server_url, self.public_path)
    }

    /// Returns the absolute URL the identity provider redirects back to.
    ///
    /// ```
    /// use otaconsole_client::ClientConfig;
    ///
    /// let config = ClientConfig::new("https://updates.example.com");
    /// assert_eq!(
    ///     config.redirect_uri(),
    ///     "https://updates.example.com/ui/login/oauth-callback"
    /// );
    /// ```
    #[must_use]
    pub fn redirect_uri(&self) -> String {
        format!("{}{}/login/oauth-callback", self.server_url, self.base_path)
    }

    /// Checks that the server URL is an absolute http(s) URL.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidUrl`] otherwise.
    pub fn validate(&self) -> Result<()> {
        let parsed = url::Url::parse(&self.server_url).map_err(|_| ClientError::InvalidUrl {
            url: self.server_url.clone(),
        })?;
        if matches!(parsed.scheme(), "http" | "https") {
            Ok(())
        } else {
            Err(ClientError::InvalidUrl {
                url: self.server_url.clone(),
            })
        }
    }
}

/// TLS settings for servers behind a private CA.
#[derive(Debug, Clone, Default)]
pub struct TlsConfig {
    /// Path to an extra CA certificate (PEM).
    pub ca_cert: Option<PathBuf>,

    /// Whether to skip certificate verification (NOT recommended for production).
    pub insecure_skip_verify: bool,
}

impl TlsConfig {
    /// Creates a new TLS configuration with default settings.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ca_cert: None,
            insecure_skip_verify: false,
        }
    }

    /// Sets the CA certificate path.
    #[must_use]
    pub fn with_ca_cert(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_cert = Some(path.into());
        self
    }

    /// Enables insecure mode (skips certificate verification).
    #[must_use]
    pub const fn insecure(mut self) -> Self {
        self.insecure_skip_verify = true;
        self
    }
}

/// Normalizes a mount path to a leading slash and no trailing slash.
fn normalize_path(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_new() {
        let config = ClientConfig::new("https://example.com");
        assert_eq!(config.server_url, "https://example.com");
        assert_eq!(config.public_path, "/apipublic/v1");
        assert_eq!(config.base_path, "/ui");
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_public_url() {
        let config = ClientConfig::new("https://example.com");
        assert_eq!(
            config.public_url("oauth2.config"),
            "https://example.com/apipublic/v1/oauth2.config"
        );
    }

    #[test]
    fn test_root_base_path() {
        let config = ClientConfig::new("https://example.com").with_base_path("/");
        assert_eq!(config.base_path, "");
        assert_eq!(
            config.redirect_uri(),
            "https://example.com/login/oauth-callback"
        );
    }

    #[test]
    fn test_custom_api_paths() {
        let config = ClientConfig::new("http://localhost:8080").with_api_paths("api/v2/", "/pub");
        assert_eq!(config.api_url("bundles.list"), "http://localhost:8080/api/v2/bundles.list");
        assert_eq!(config.public_url("x"), "http://localhost:8080/pub/x");
    }

    #[test]
    fn test_validate_rejects_relative_url() {
        assert!(ClientConfig::new("updates.example.com").validate().is_err());
        assert!(ClientConfig::new("ftp://example.com").validate().is_err());
        assert!(ClientConfig::new("http://127.0.0.1:8080").validate().is_ok());
    }

    #[test]
    fn test_tls_config() {
        let tls = TlsConfig::new().with_ca_cert("/path/to/ca.crt");
        assert_eq!(tls.ca_cert, Some(PathBuf::from("/path/to/ca.crt")));
        assert!(!tls.insecure_skip_verify);
        assert!(tls.insecure().insecure_skip_verify);
    }
}
