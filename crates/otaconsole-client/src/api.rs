//! Management API client.
//!
//! Every outbound call goes through [`ApiClient::call_api`], which attaches
//! the session's credential headers and turns non-success responses into
//! [`ClientError::Api`].

use std::fmt;
use std::sync::Arc;

use otaconsole_core::{
    Bundle, BundleModifiedResponse, CreateReleaseRequest, DeleteReleaseRequest, GenericResponse,
    ListResponse, OAuthConfig, Release, ReleaseModifiedResponse, SetActiveBundleRequest,
    UpdateReleaseRequest, UploadBundleRequest, Validate,
};
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::session::Session;

/// Content type the server accepts for bundle uploads.
const BUNDLE_CONTENT_TYPE: &str = "application/zip";

/// Which API base a call targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApiBase {
    /// `/api/v1`, sent with credential headers.
    #[default]
    Authenticated,
    /// `/apipublic/v1`, sent without credentials.
    Public,
}

/// Body of an outbound call.
pub enum RequestBody {
    /// No body.
    Empty,
    /// Raw JSON text.
    Json(String),
    /// Multipart form data (file uploads).
    Multipart(Form),
}

impl RequestBody {
    /// Serializes `value` into a JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Decode`] if serialization fails.
    pub fn json<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Self::Json(serde_json::to_string(value)?))
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Json(text) => f.debug_tuple("Json").field(&text.len()).finish(),
            Self::Multipart(_) => f.write_str("Multipart"),
        }
    }
}

/// Client for the update server's management API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    config: ClientConfig,
    http: reqwest::Client,
    session: Arc<Session>,
}

impl ApiClient {
    /// Creates a new API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the server URL is invalid or the HTTP client
    /// cannot be created.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::sync::Arc;
    /// use otaconsole_client::{ApiClient, ClientConfig, Session};
    ///
    /// let session = Arc::new(Session::in_memory());
    /// let client = ApiClient::new(ClientConfig::new("https://updates.example.com"), session)?;
    /// # Ok::<(), otaconsole_client::ClientError>(())
    /// ```
    pub fn new(config: ClientConfig, session: Arc<Session>) -> Result<Self> {
        config.validate()?;
        let http = Self::build_http_client(&config)?;

        Ok(Self {
            config,
            http,
            session,
        })
    }

    /// Returns the client configuration.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the session whose credentials this client sends.
    #[must_use]
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub(crate) const fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Issues one call against the server.
    ///
    /// On a 401 response the session is logged out before the error is
    /// returned, so the next guarded route sends the operator to login.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Api`] for non-success statuses and
    /// [`ClientError::Transport`] when no response arrives.
    pub async fn call_api(
        &self,
        method: Method,
        action: &str,
        body: RequestBody,
        base: ApiBase,
    ) -> Result<Response> {
        let url = match base {
            ApiBase::Authenticated => self.config.api_url(action),
            ApiBase::Public => self.config.public_url(action),
        };

        tracing::debug!(%method, %url, body = ?body, "Calling API");

        let mut request = self.http.request(method, &url);
        if base == ApiBase::Authenticated {
            request = request.headers(self.session.auth_headers());
        }
        request = match body {
            RequestBody::Empty => request,
            RequestBody::Json(text) => request.header(CONTENT_TYPE, "application/json").body(text),
            RequestBody::Multipart(form) => request.multipart(form),
        };

        let response = request.send().await?;
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        if status == 401 {
            tracing::warn!(action, "Server rejected credentials, logging out");
            if let Err(e) = self.session.logout() {
                tracing::warn!(error = %e, "Failed to clear credentials after 401");
            }
        }

        let body = response.bytes().await.unwrap_or_default();
        Err(ClientError::Api {
            status,
            message: extract_error_message(&body),
        })
    }

    async fn call_json<T: DeserializeOwned>(
        &self,
        method: Method,
        action: &str,
        body: RequestBody,
        base: ApiBase,
    ) -> Result<T> {
        let response = self.call_api(method, action, body, base).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Lists all bundles, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or the response is malformed.
    pub async fn list_bundles(&self) -> Result<ListResponse<Bundle>> {
        self.call_json(Method::GET, "bundles.list", RequestBody::Empty, ApiBase::Authenticated)
            .await
    }

    /// Uploads a zip bundle.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Validation`] without sending anything when the
    /// request is incomplete, otherwise any call error.
    pub async fn upload_bundle(&self, req: &UploadBundleRequest) -> Result<BundleModifiedResponse> {
        req.validate()?;

        let part = Part::bytes(req.content.clone())
            .file_name(req.file_name.clone())
            .mime_str(BUNDLE_CONTENT_TYPE)?;
        let form = Form::new()
            .part("bundle", part)
            .text("app_id", req.app_id.clone())
            .text("version_name", req.version_name.clone())
            .text("description", req.description.clone());

        let response: BundleModifiedResponse = self
            .call_json(
                Method::POST,
                "bundles.upload",
                RequestBody::Multipart(form),
                ApiBase::Authenticated,
            )
            .await?;
        tracing::info!(
            bundle_id = %response.bundle.id,
            version_name = %req.version_name,
            size = req.content.len(),
            "Uploaded bundle"
        );
        Ok(response)
    }

    /// Lists all releases, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or the response is malformed.
    pub async fn list_releases(&self) -> Result<ListResponse<Release>> {
        self.call_json(Method::GET, "releases.list", RequestBody::Empty, ApiBase::Authenticated)
            .await
    }

    /// Creates a release.
    ///
    /// # Errors
    ///
    /// Returns a validation error or any call error.
    pub async fn create_release(&self, req: &CreateReleaseRequest) -> Result<ReleaseModifiedResponse> {
        req.validate()?;
        let response: ReleaseModifiedResponse = self
            .call_json(
                Method::POST,
                "releases.create",
                RequestBody::json(req)?,
                ApiBase::Authenticated,
            )
            .await?;
        tracing::info!(release_id = %response.release.id, platform = %req.platform, "Created release");
        Ok(response)
    }

    /// Updates a release's date.
    ///
    /// # Errors
    ///
    /// Returns a validation error or any call error.
    pub async fn update_release(&self, req: &UpdateReleaseRequest) -> Result<ReleaseModifiedResponse> {
        req.validate()?;
        let response = self
            .call_json(
                Method::POST,
                "releases.update",
                RequestBody::json(req)?,
                ApiBase::Authenticated,
            )
            .await?;
        tracing::info!(release_id = %req.release_id, "Updated release");
        Ok(response)
    }

    /// Deletes a release.
    ///
    /// # Errors
    ///
    /// Returns a validation error or any call error.
    pub async fn delete_release(&self, req: &DeleteReleaseRequest) -> Result<GenericResponse> {
        req.validate()?;
        let response = self
            .call_json(
                Method::POST,
                "releases.delete",
                RequestBody::json(req)?,
                ApiBase::Authenticated,
            )
            .await?;
        tracing::info!(release_id = %req.release_id, "Deleted release");
        Ok(response)
    }

    /// Points a release at the bundle to serve over the air.
    ///
    /// # Errors
    ///
    /// Returns a validation error or any call error.
    pub async fn set_release_active_bundle(
        &self,
        req: &SetActiveBundleRequest,
    ) -> Result<ReleaseModifiedResponse> {
        req.validate()?;
        let response = self
            .call_json(
                Method::POST,
                "releases.set-active",
                RequestBody::json(req)?,
                ApiBase::Authenticated,
            )
            .await?;
        tracing::info!(release_id = %req.release_id, bundle_id = %req.bundle_id, "Set active bundle");
        Ok(response)
    }

    /// Fetches the server's OAuth2 settings from the public API.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails or the response is malformed.
    pub async fn get_oauth2_config(&self) -> Result<OAuthConfig> {
        self.call_json(Method::GET, "oauth2.config", RequestBody::Empty, ApiBase::Public)
            .await
    }

    /// Builds the HTTP client with proper configuration.
    fn build_http_client(config: &ClientConfig) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent);

        if let Some(ref tls) = config.tls {
            if tls.insecure_skip_verify {
                builder = builder.danger_accept_invalid_certs(true);
            }

            if let Some(ref ca_cert) = tls.ca_cert {
                let cert_pem =
                    std::fs::read(ca_cert).map_err(|e| ClientError::storage(ca_cert, e))?;
                let cert = reqwest::Certificate::from_pem(&cert_pem).map_err(|e| {
                    ClientError::HttpClient {
                        message: format!("Invalid CA certificate: {e}"),
                    }
                })?;
                builder = builder.add_root_certificate(cert);
            }
        }

        builder.build().map_err(|e| ClientError::HttpClient {
            message: e.to_string(),
        })
    }
}

/// Extracts the human-readable message of an error body: the `error` field,
/// else the `message` field, else an empty string.
pub(crate) fn extract_error_message(body: &[u8]) -> String {
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) else {
        return String::new();
    };

    ["error", "message"]
        .iter()
        .find_map(|field| value.get(field).filter(|v| !v.is_null()))
        .map(|v| v.as_str().map_or_else(|| v.to_string(), ToString::to_string))
        .unwrap_or_default()
}
