//! # otaconsole Client
//!
//! Client library for the management API of an over-the-air update server.
//!
//! This crate provides:
//!
//! - **Session**: API key and OAuth2 token held in pluggable storage, sent as
//!   `x-api-key` / `Authorization: Bearer` headers
//! - **API client**: typed calls for releases, bundles and the public OAuth2
//!   settings, with forced logout on 401
//! - **Query cache**: single-flight, stale-while-revalidate reads invalidated
//!   by successful mutations
//! - **OAuth2**: authorization-code sign-in with PKCE against the provider the
//!   server advertises
//! - **Routes**: the console's route surface and its login guard
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use otaconsole_client::{ApiClient, ClientConfig, Hooks, Session};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = Arc::new(Session::in_memory());
//!     session.login_with_api_key("abc123")?;
//!
//!     let api = ApiClient::new(ClientConfig::new("https://updates.example.com"), session)?;
//!     let hooks = Hooks::new(Arc::new(api));
//!
//!     let releases = hooks.releases().await?;
//!     println!("{} releases", releases.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                          Hooks                           │
//! │  ┌──────────────────┐   ┌──────────────────────────────┐ │
//! │  │   QueryCache     │   │  mutations → invalidate      │ │
//! │  └──────────────────┘   └──────────────────────────────┘ │
//! └──────────────────────────────────────────────────────────┘
//!            │                              │
//!            ▼                              ▼
//! ┌──────────────────────┐      ┌──────────────────────────┐
//! │      ApiClient       │◄─────│   OAuthClientFactory     │
//! │  (reqwest, headers)  │      │   (oauth2.config, PKCE)  │
//! └──────────────────────┘      └──────────────────────────┘
//!            │
//!            ▼
//! ┌──────────────────────┐      ┌──────────────────────────┐
//! │       Session        │◄─────│     guard(&Route)        │
//! │ (CredentialStorage)  │      └──────────────────────────┘
//! └──────────────────────┘
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod api;
mod cache;
mod config;
mod error;
mod hooks;
mod oauth;
mod routes;
mod session;
mod storage;

pub use api::{ApiBase, ApiClient, RequestBody};
pub use cache::{fetcher, Fetcher, Query, QueryCache, QueryState};
pub use config::{
    ClientConfig, TlsConfig, DEFAULT_API_PATH, DEFAULT_BASE_PATH, DEFAULT_PUBLIC_PATH,
};
pub use error::{ClientError, RecordKind, Result};
pub use hooks::{Hooks, BUNDLES_KEY, RELEASES_KEY};
pub use oauth::{
    AuthorizationPopup, AuthorizationRequest, OAuthClient, OAuthClientFactory, OAuthSettings,
    OAuthUser, RESPONSE_TYPE, SCOPE,
};
pub use routes::{guard, Route};
pub use session::{
    Credentials, Session, API_KEY_HEADER, API_KEY_STORAGE_KEY, OAUTH_TOKEN_STORAGE_KEY,
};
pub use storage::{CredentialStorage, FileStorage, MemoryStorage};
