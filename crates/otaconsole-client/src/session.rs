//! Client-held credential state.
//!
//! A [`Session`] is built once per process and shared by `Arc` with the API
//! client and the route guard. Nothing else reads the credential storage.

use std::fmt;
use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};

use crate::error::Result;
use crate::storage::{CredentialStorage, MemoryStorage};

/// Storage key of the management API key.
pub const API_KEY_STORAGE_KEY: &str = "token";

/// Storage key of the OAuth2 bearer token.
pub const OAUTH_TOKEN_STORAGE_KEY: &str = "oauth_token";

/// Header carrying the management API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Which credential kinds a session currently holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Credentials {
    /// An API key is stored.
    pub api_key: bool,
    /// An OAuth2 token is stored.
    pub oauth_token: bool,
}

impl Credentials {
    /// Returns true if any credential is stored.
    #[must_use]
    pub const fn any(&self) -> bool {
        self.api_key || self.oauth_token
    }
}

impl fmt::Display for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.api_key, self.oauth_token) {
            (true, true) => f.write_str("API key and OAuth token"),
            (true, false) => f.write_str("API key"),
            (false, true) => f.write_str("OAuth token"),
            (false, false) => f.write_str("none"),
        }
    }
}

/// Credential state over an injectable storage backend.
///
/// API key and OAuth token are independent: both may be stored at once, and
/// then both headers are sent.
#[derive(Debug, Clone)]
pub struct Session {
    storage: Arc<dyn CredentialStorage>,
}

impl Default for Session {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl Session {
    /// Creates a session over the given storage.
    #[must_use]
    pub fn new(storage: Arc<dyn CredentialStorage>) -> Self {
        Self { storage }
    }

    /// Creates a session over fresh in-memory storage.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    /// Returns true if either credential kind is stored.
    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.credentials().any()
    }

    /// Returns which credential kinds are stored.
    #[must_use]
    pub fn credentials(&self) -> Credentials {
        Credentials {
            api_key: self.read(API_KEY_STORAGE_KEY).is_some(),
            oauth_token: self.read(OAUTH_TOKEN_STORAGE_KEY).is_some(),
        }
    }

    /// Stores a management API key.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage cannot be written.
    pub fn login_with_api_key(&self, key: &str) -> Result<()> {
        self.storage.set(API_KEY_STORAGE_KEY, key)?;
        tracing::info!("Logged in with API key");
        Ok(())
    }

    /// Stores an OAuth2 bearer token.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage cannot be written.
    pub fn login_with_oauth_token(&self, token: &str) -> Result<()> {
        self.storage.set(OAUTH_TOKEN_STORAGE_KEY, token)?;
        tracing::info!("Logged in with OAuth token");
        Ok(())
    }

    /// Removes both credential kinds.
    ///
    /// Both removals are attempted even if the first one fails.
    ///
    /// # Errors
    ///
    /// Returns the first storage error encountered.
    pub fn logout(&self) -> Result<()> {
        let api_key = self.storage.remove(API_KEY_STORAGE_KEY);
        let oauth = self.storage.remove(OAUTH_TOKEN_STORAGE_KEY);
        tracing::info!("Logged out");
        api_key.and(oauth)
    }

    /// Builds the credential headers for an authenticated request.
    ///
    /// `x-api-key` is present iff an API key is stored and
    /// `Authorization: Bearer <token>` iff an OAuth token is stored.
    #[must_use]
    pub fn auth_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        if let Some(key) = self.read(API_KEY_STORAGE_KEY) {
            insert_header(&mut headers, HeaderName::from_static(API_KEY_HEADER), &key);
        }

        if let Some(token) = self.read(OAUTH_TOKEN_STORAGE_KEY) {
            insert_header(&mut headers, AUTHORIZATION, &format!("Bearer {token}"));
        }

        headers
    }

    /// Reads a key, treating a storage failure or an empty value as absent.
    fn read(&self, key: &str) -> Option<String> {
        match self.storage.get(key) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to read credential, treating as absent");
                None
            }
        }
    }
}

fn insert_header(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(mut value) => {
            value.set_sensitive(true);
            headers.insert(name, value);
        }
        Err(_) => {
            tracing::warn!(header = %name, "Stored credential is not a valid header value, skipping");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_new_session_is_logged_out() {
        let session = Session::in_memory();
        assert!(!session.is_logged_in());
        assert!(session.auth_headers().is_empty());
        assert_eq!(session.credentials().to_string(), "none");
    }

    #[test]
    fn test_api_key_login() {
        let session = Session::in_memory();
        session.login_with_api_key("abc123").unwrap();

        let headers = session.auth_headers();
        assert!(session.is_logged_in());
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get(API_KEY_HEADER).unwrap(), "abc123");
    }

    #[test]
    fn test_oauth_login() {
        let session = Session::in_memory();
        session.login_with_oauth_token("tok").unwrap();

        let headers = session.auth_headers();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer tok");
    }

    #[test]
    fn test_both_credentials_send_both_headers() {
        let session = Session::in_memory();
        session.login_with_api_key("abc123").unwrap();
        session.login_with_oauth_token("tok").unwrap();

        let headers = session.auth_headers();
        assert_eq!(headers.len(), 2);
        assert_eq!(session.credentials().to_string(), "API key and OAuth token");
    }

    #[test]
    fn test_logout_clears_both() {
        let session = Session::in_memory();
        session.login_with_api_key("abc123").unwrap();
        session.login_with_oauth_token("tok").unwrap();

        session.logout().unwrap();
        assert!(!session.is_logged_in());
        assert!(session.auth_headers().is_empty());
    }

    #[test]
    fn test_invalid_header_value_is_skipped() {
        let session = Session::in_memory();
        session.login_with_api_key("bad\nkey").unwrap();
        assert!(session.is_logged_in());
        assert!(session.auth_headers().is_empty());
    }

    #[test]
    fn test_clones_share_storage() {
        let session = Session::in_memory();
        let other = session.clone();
        session.login_with_api_key("abc123").unwrap();
        assert!(other.is_logged_in());
    }

    fn credential_strategy() -> impl Strategy<Value = Option<String>> {
        proptest::option::of("[A-Za-z0-9._-]{1,40}")
    }

    proptest! {
        #[test]
        fn logged_in_iff_a_key_is_stored(
            api_key in credential_strategy(),
            oauth in credential_strategy(),
        ) {
            let session = Session::in_memory();
            if let Some(ref key) = api_key {
                session.login_with_api_key(key).unwrap();
            }
            if let Some(ref token) = oauth {
                session.login_with_oauth_token(token).unwrap();
            }

            prop_assert_eq!(session.is_logged_in(), api_key.is_some() || oauth.is_some());

            let headers = session.auth_headers();
            prop_assert_eq!(
                headers.get(API_KEY_HEADER).map(|v| v.to_str().unwrap().to_string()),
                api_key
            );
            prop_assert_eq!(
                headers.get(AUTHORIZATION).map(|v| v.to_str().unwrap().to_string()),
                oauth.map(|t| format!("Bearer {t}"))
            );

            session.logout().unwrap();
            prop_assert!(!session.is_logged_in());
        }
    }
}
