//! OAuth2 authorization-code sign-in against the server's identity provider.
//!
//! The provider settings come from the public `oauth2.config` endpoint.
//! [`OAuthClientFactory`] fetches them once per process and every caller
//! shares the resulting [`OAuthClient`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use parking_lot::Mutex;
use rand::RngCore;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::sync::OnceCell;
use url::Url;

use crate::api::{extract_error_message, ApiClient};
use crate::error::{ClientError, Result};

/// OAuth2 response type requested from the provider.
pub const RESPONSE_TYPE: &str = "code";

/// OAuth2 scope requested from the provider.
pub const SCOPE: &str = "openid";

/// Provider error code for a sign-in the user declined.
const ACCESS_DENIED: &str = "access_denied";

/// Lazily builds the process-wide [`OAuthClient`].
pub struct OAuthClientFactory {
    api: Arc<ApiClient>,
    client: OnceCell<Result<Arc<OAuthClient>>>,
}

impl fmt::Debug for OAuthClientFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthClientFactory")
            .field("initialized", &self.client.initialized())
            .finish()
    }
}

impl OAuthClientFactory {
    /// Creates a factory that reads provider settings through `api`.
    #[must_use]
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self {
            api,
            client: OnceCell::new(),
        }
    }

    /// Returns the OAuth client, fetching the provider settings on first use.
    ///
    /// Concurrent callers share one settings request. The outcome, success or
    /// failure, is kept for every later call.
    ///
    /// # Errors
    ///
    /// Returns the settings request's error.
    pub async fn get(&self) -> Result<Arc<OAuthClient>> {
        self.client
            .get_or_init(|| async {
                let config = self.api.get_oauth2_config().await?;
                tracing::debug!(issuer = %config.issuer, "Fetched OAuth2 settings");

                let settings = OAuthSettings {
                    authority: config.issuer,
                    client_id: config.client_id,
                    redirect_uri: self.api.config().redirect_uri(),
                };
                Ok(Arc::new(OAuthClient::new(self.api.http().clone(), settings)))
            })
            .await
            .clone()
    }
}

/// Provider settings of an [`OAuthClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthSettings {
    /// Issuer URL of the identity provider.
    pub authority: String,
    /// Client id registered with the provider.
    pub client_id: String,
    /// Absolute callback URL of the console.
    pub redirect_uri: String,
}

/// Authorization request awaiting its callback.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    /// URL to open in a browser.
    pub url: String,
    /// Opaque state value echoed back by the provider.
    pub state: String,
}

/// Tokens of a completed sign-in.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct OAuthUser {
    /// Access token, sent as the bearer credential.
    pub access_token: String,
    /// Token type, normally `Bearer`.
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// OpenID Connect identity token.
    #[serde(default)]
    pub id_token: Option<String>,
    /// Granted scopes.
    #[serde(default)]
    pub scope: Option<String>,
    /// Access token lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,
}

impl fmt::Debug for OAuthUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthUser")
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .field("expires_in", &self.expires_in)
            .finish_non_exhaustive()
    }
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Drives the interactive step of a sign-in.
#[async_trait]
pub trait AuthorizationPopup: Send + Sync {
    /// Shows `authorize_url` to the user and returns the URL the browser
    /// landed on afterwards, or `None` if the user closed the window.
    ///
    /// # Errors
    ///
    /// Returns an error if the popup could not be shown.
    async fn open(&self, authorize_url: &str) -> Result<Option<String>>;
}

#[derive(Debug, Clone, Deserialize)]
struct ProviderMetadata {
    authorization_endpoint: String,
    token_endpoint: String,
}

struct Pkce {
    verifier: String,
    challenge: String,
}

impl Pkce {
    fn generate() -> Self {
        let verifier = random_token();
        let challenge = challenge_for(&verifier);
        Self {
            verifier,
            challenge,
        }
    }
}

fn challenge_for(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

fn random_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// OAuth2 client for one identity provider.
pub struct OAuthClient {
    http: reqwest::Client,
    settings: OAuthSettings,
    metadata: OnceCell<ProviderMetadata>,
    pending: Mutex<HashMap<String, String>>,
}

impl fmt::Debug for OAuthClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthClient")
            .field("settings", &self.settings)
            .field("pending", &self.pending.lock().len())
            .finish()
    }
}

impl OAuthClient {
    /// Creates a client for the given provider settings.
    #[must_use]
    pub fn new(http: reqwest::Client, settings: OAuthSettings) -> Self {
        Self {
            http,
            settings,
            metadata: OnceCell::new(),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the provider settings.
    #[must_use]
    pub const fn settings(&self) -> &OAuthSettings {
        &self.settings
    }

    /// Starts a sign-in: creates a PKCE pair and state and returns the
    /// provider's authorize URL.
    ///
    /// # Errors
    ///
    /// Returns an error if provider discovery fails.
    pub async fn authorization_request(&self) -> Result<AuthorizationRequest> {
        let metadata = self.metadata().await?;
        let pkce = Pkce::generate();
        let state = random_token();

        let mut url = Url::parse(&metadata.authorization_endpoint).map_err(|_| {
            ClientError::InvalidUrl {
                url: metadata.authorization_endpoint.clone(),
            }
        })?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.settings.client_id)
            .append_pair("redirect_uri", &self.settings.redirect_uri)
            .append_pair("response_type", RESPONSE_TYPE)
            .append_pair("scope", SCOPE)
            .append_pair("state", &state)
            .append_pair("code_challenge", &pkce.challenge)
            .append_pair("code_challenge_method", "S256");

        self.pending.lock().insert(state.clone(), pkce.verifier);

        Ok(AuthorizationRequest {
            url: url.into(),
            state,
        })
    }

    /// Runs a full sign-in through `popup`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::AuthorizationCancelled`] if the popup was
    /// closed or access was denied, or any discovery, callback or token
    /// exchange error.
    pub async fn sign_in_with_popup(&self, popup: &dyn AuthorizationPopup) -> Result<OAuthUser> {
        let request = self.authorization_request().await?;

        match popup.open(&request.url).await {
            Ok(Some(landing_url)) => self.handle_callback(&landing_url).await,
            Ok(None) => {
                self.pending.lock().remove(&request.state);
                tracing::info!("OAuth sign-in cancelled");
                Err(ClientError::AuthorizationCancelled)
            }
            Err(e) => {
                self.pending.lock().remove(&request.state);
                Err(e)
            }
        }
    }

    /// Completes a sign-in from the URL the provider redirected to.
    ///
    /// Each authorization request can be completed once.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::AuthorizationCancelled`] for `access_denied`,
    /// [`ClientError::OAuth`] for any other provider error, unknown state or
    /// failed token exchange.
    pub async fn handle_callback(&self, current_url: &str) -> Result<OAuthUser> {
        let url = Url::parse(current_url.trim()).map_err(|_| ClientError::InvalidUrl {
            url: current_url.to_string(),
        })?;
        let params: HashMap<String, String> = url.query_pairs().into_owned().collect();
        let state = params.get("state");

        if let Some(error) = params.get("error") {
            if let Some(state) = state {
                self.pending.lock().remove(state);
            }
            if error == ACCESS_DENIED {
                return Err(ClientError::AuthorizationCancelled);
            }
            let message = params
                .get("error_description")
                .map_or_else(|| error.clone(), |desc| format!("{error}: {desc}"));
            return Err(ClientError::OAuth { message });
        }

        let state = state.ok_or_else(|| oauth_error("Callback is missing the state parameter"))?;
        let verifier = self
            .pending
            .lock()
            .remove(state)
            .ok_or_else(|| oauth_error("No pending sign-in matches the callback state"))?;
        let code = params
            .get("code")
            .ok_or_else(|| oauth_error("Callback is missing the code parameter"))?;

        let user = self.exchange_code(code, &verifier).await?;
        tracing::info!("OAuth sign-in completed");
        Ok(user)
    }

    async fn exchange_code(&self, code: &str, verifier: &str) -> Result<OAuthUser> {
        let metadata = self.metadata().await?;
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", "authorization_code")
            .append_pair("code", code)
            .append_pair("redirect_uri", &self.settings.redirect_uri)
            .append_pair("client_id", &self.settings.client_id)
            .append_pair("code_verifier", verifier)
            .finish();

        let response = self
            .http
            .post(&metadata.token_endpoint)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;
        if !status.is_success() {
            return Err(oauth_error(format!(
                "Token exchange failed (HTTP {}): {}",
                status.as_u16(),
                extract_error_message(&bytes)
            )));
        }

        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn metadata(&self) -> Result<&ProviderMetadata> {
        self.metadata
            .get_or_try_init(|| async {
                let url = format!(
                    "{}/.well-known/openid-configuration",
                    self.settings.authority.trim_end_matches('/')
                );
                tracing::debug!(%url, "Discovering OAuth2 provider");

                let response = self.http.get(&url).send().await?;
                let status = response.status();
                if !status.is_success() {
                    return Err(oauth_error(format!(
                        "Provider discovery at {url} failed (HTTP {})",
                        status.as_u16()
                    )));
                }
                let bytes = response.bytes().await?;
                Ok::<_, ClientError>(serde_json::from_slice(&bytes)?)
            })
            .await
    }
}

fn oauth_error(message: impl Into<String>) -> ClientError {
    ClientError::OAuth {
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> OAuthClient {
        OAuthClient::new(
            reqwest::Client::new(),
            OAuthSettings {
                authority: "https://id.example.com".to_string(),
                client_id: "console".to_string(),
                redirect_uri: "https://updates.example.com/ui/login/oauth-callback".to_string(),
            },
        )
    }

    #[test]
    fn test_pkce_challenge_matches_rfc7636_vector() {
        assert_eq!(
            challenge_for("dBjftJeZ4CVP-mJ92ZoiCt4Nl8IPp2BoJfCLwLRyQ"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn test_random_tokens_differ() {
        let a = Pkce::generate();
        let b = Pkce::generate();
        assert_ne!(a.verifier, b.verifier);
        assert_eq!(a.verifier.len(), 43);
        assert_eq!(a.challenge, challenge_for(&a.verifier));
    }

    #[tokio::test]
    async fn test_access_denied_is_cancellation() {
        let err = client()
            .handle_callback("https://updates.example.com/ui/login/oauth-callback?error=access_denied&state=x")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::AuthorizationCancelled));
    }

    #[tokio::test]
    async fn test_provider_error_is_reported() {
        let err = client()
            .handle_callback(
                "https://updates.example.com/ui/login/oauth-callback?error=invalid_scope&error_description=nope",
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "OAuth error: invalid_scope: nope");
    }

    #[tokio::test]
    async fn test_unknown_state_is_rejected() {
        let err = client()
            .handle_callback("https://updates.example.com/ui/login/oauth-callback?code=c&state=unknown")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::OAuth { .. }));
    }

    #[tokio::test]
    async fn test_callback_requires_url() {
        let err = client().handle_callback("not a url").await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidUrl { .. }));
    }

    #[test]
    fn test_user_debug_hides_tokens() {
        let user: OAuthUser =
            serde_json::from_str(r#"{"access_token": "secret", "id_token": "also-secret"}"#)
                .unwrap();
        assert_eq!(user.token_type, "Bearer");
        let debug = format!("{user:?}");
        assert!(!debug.contains("secret"));
    }
}
