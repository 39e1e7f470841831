//! CLI commands and argument parsing.

pub mod bundles;
pub mod login;
pub mod logout;
pub mod releases;
pub mod status;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use otaconsole_client::{
    guard, ApiClient, ClientConfig, FileStorage, Hooks, Route, Session, TlsConfig,
    DEFAULT_BASE_PATH,
};

/// otaconsole - Management console for an OTA update server
#[derive(Parser)]
#[command(name = "otaconsole")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Update server URL (e.g., `<https://updates.example.com>`)
    #[arg(long, global = true, env = "OTACONSOLE_SERVER_URL")]
    pub server: Option<String>,

    /// Credentials file
    #[arg(long, global = true, env = "OTACONSOLE_CREDENTIALS")]
    pub credentials: Option<PathBuf>,

    /// Path the console is mounted under on the server
    #[arg(long, global = true, env = "OTACONSOLE_BASE_PATH", default_value = DEFAULT_BASE_PATH)]
    pub base_path: String,

    /// Request timeout in seconds
    #[arg(long, global = true, default_value = "30")]
    pub timeout: u64,

    /// Extra CA certificate (PEM) for the server
    #[arg(long, global = true, env = "OTACONSOLE_CA_CERT")]
    pub ca_cert: Option<PathBuf>,

    /// Skip TLS certificate verification
    #[arg(long, global = true)]
    pub insecure: bool,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

/// Output format of command results.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Store an API key or sign in with OAuth2
    Login(login::LoginArgs),

    /// Remove stored credentials
    Logout,

    /// Show server and credential status
    Status,

    /// List and upload bundles
    #[command(subcommand)]
    Bundles(bundles::BundlesCommand),

    /// List and manage releases
    #[command(subcommand)]
    Releases(releases::ReleasesCommand),

    /// Print version information
    Version,
}

/// State shared by command implementations.
pub struct Context {
    pub global: GlobalArgs,
    pub session: Arc<Session>,
    credentials_path: PathBuf,
}

impl Context {
    /// Opens the session over the configured credentials file.
    #[must_use]
    pub fn new(global: GlobalArgs) -> Self {
        let credentials_path = global
            .credentials
            .clone()
            .unwrap_or_else(FileStorage::default_path);
        let session = Arc::new(Session::new(Arc::new(FileStorage::new(&credentials_path))));

        Self {
            global,
            session,
            credentials_path,
        }
    }

    /// Returns the credentials file path.
    pub fn credentials_path(&self) -> &std::path::Path {
        &self.credentials_path
    }

    /// Builds the client configuration from the global options.
    pub fn client_config(&self) -> Result<ClientConfig> {
        let server = self.global.server.as_deref().context(
            "No server URL configured; pass --server or set OTACONSOLE_SERVER_URL",
        )?;

        let mut config = ClientConfig::new(server)
            .with_base_path(&self.global.base_path)
            .with_timeout(Duration::from_secs(self.global.timeout));

        if self.global.insecure || self.global.ca_cert.is_some() {
            let mut tls = TlsConfig::new();
            if let Some(ref ca_cert) = self.global.ca_cert {
                tls = tls.with_ca_cert(ca_cert);
            }
            if self.global.insecure {
                tls = tls.insecure();
            }
            config = config.with_tls(tls);
        }

        Ok(config)
    }

    /// Builds an API client over this session.
    pub fn api(&self) -> Result<Arc<ApiClient>> {
        let api = ApiClient::new(self.client_config()?, Arc::clone(&self.session))
            .context("Failed to create API client")?;
        Ok(Arc::new(api))
    }

    /// Checks the route guard for `route` and builds hooks for it.
    pub fn hooks_for(&self, route: &Route) -> Result<Hooks> {
        self.require(route)?;
        Ok(Hooks::new(self.api()?))
    }

    /// Fails when the guard would redirect `route` to the login page.
    pub fn require(&self, route: &Route) -> Result<()> {
        match guard(&self.session, route) {
            Some(Route::Login) => {
                anyhow::bail!("Not logged in; run `otaconsole login` first")
            }
            _ => Ok(()),
        }
    }

    /// Prints `value` as pretty JSON.
    pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}
