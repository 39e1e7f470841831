//! Login command implementation.
//!
//! Stores a management API key, or signs in with OAuth2. The OAuth flow
//! prints the provider's authorize URL and reads back the URL the browser
//! landed on.

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use clap::Args;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use url::Url;

use otaconsole_client::{AuthorizationPopup, ClientError, OAuthClientFactory, Route};

use super::Context;

/// Arguments for the login command.
#[derive(Args)]
#[group(required = true, multiple = false)]
pub struct LoginArgs {
    /// Management API key to store
    #[arg(long, env = "OTACONSOLE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Sign in through the server's OAuth2 provider
    #[arg(long)]
    pub oauth: bool,
}

/// Runs the login command.
///
/// # Errors
///
/// Returns an error if the credential cannot be stored or the OAuth sign-in
/// fails or is cancelled.
pub async fn execute(ctx: &Context, args: &LoginArgs) -> Result<()> {
    if ctx.session.is_logged_in() {
        info!(credentials = %ctx.session.credentials(), "Already logged in, adding credential");
    }

    if let Some(ref key) = args.api_key {
        let key = key.trim();
        anyhow::ensure!(!key.is_empty(), "API key must not be empty");
        ctx.session
            .login_with_api_key(key)
            .context("Failed to store API key")?;
        println!("Logged in with API key");
        return Ok(());
    }

    let api = ctx.api()?;
    let factory = OAuthClientFactory::new(api);
    let client = factory
        .get()
        .await
        .context("Failed to load the server's OAuth2 settings")?;

    let popup = TerminalPopup {
        base_path: ctx.global.base_path.clone(),
    };
    let user = match client.sign_in_with_popup(&popup).await {
        Ok(user) => user,
        Err(ClientError::AuthorizationCancelled) => anyhow::bail!("Sign-in cancelled"),
        Err(e) => return Err(e).context("OAuth2 sign-in failed"),
    };

    ctx.session
        .login_with_oauth_token(&user.access_token)
        .context("Failed to store OAuth token")?;
    println!("Logged in with OAuth2");
    Ok(())
}

/// Interactive step on a terminal: the user opens the URL in a browser and
/// pastes back the address the browser ended up on.
struct TerminalPopup {
    base_path: String,
}

#[async_trait]
impl AuthorizationPopup for TerminalPopup {
    async fn open(&self, authorize_url: &str) -> otaconsole_client::Result<Option<String>> {
        eprintln!("Open this URL in your browser and sign in:");
        eprintln!();
        eprintln!("  {authorize_url}");
        eprintln!();
        eprintln!("Then paste the URL of the page you land on (empty to cancel):");

        let mut line = String::new();
        let mut stdin = BufReader::new(tokio::io::stdin());
        if let Err(e) = stdin.read_line(&mut line).await {
            tracing::warn!(error = %e, "Failed to read from stdin");
            return Ok(None);
        }

        Ok(landing_url(&line, &self.base_path))
    }
}

/// Returns the pasted landing URL, or `None` for empty input.
fn landing_url(input: &str, base_path: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if let Ok(url) = Url::parse(input) {
        if Route::parse_under(base_path, url.path()) != Some(Route::OAuthCallback) {
            tracing::warn!(path = url.path(), "Pasted URL is not the console's OAuth callback");
        }
    }
    Some(input.to_string())
}
