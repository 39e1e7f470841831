//! Status command implementation.

use anyhow::Result;
use serde::Serialize;

use otaconsole_client::{guard, Route};

use super::{Context, OutputFormat};

/// Credential and server status.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub server: Option<String>,
    pub credentials_file: String,
    pub logged_in: bool,
    pub api_key: bool,
    pub oauth_token: bool,
    pub landing_route: String,
}

impl StatusReport {
    /// Collects the status of `ctx`. Credential values are never included.
    #[must_use]
    pub fn collect(ctx: &Context) -> Self {
        let credentials = ctx.session.credentials();
        let landing = guard(&ctx.session, &Route::Root).unwrap_or(Route::Root);

        Self {
            server: ctx.global.server.clone(),
            credentials_file: ctx.credentials_path().display().to_string(),
            logged_in: credentials.any(),
            api_key: credentials.api_key,
            oauth_token: credentials.oauth_token,
            landing_route: landing.path_under(&ctx.global.base_path),
        }
    }
}

/// Runs the status command.
///
/// # Errors
///
/// Returns an error if JSON output cannot be written.
pub fn run(ctx: &Context) -> Result<()> {
    let report = StatusReport::collect(ctx);

    match ctx.global.format {
        OutputFormat::Json => Context::print_json(&report)?,
        OutputFormat::Text => print_text(&report, ctx),
    }
    Ok(())
}

fn print_text(report: &StatusReport, ctx: &Context) {
    println!("otaconsole Status");
    println!("=================");
    println!();
    println!(
        "Server:      {}",
        report.server.as_deref().unwrap_or("(not configured)")
    );
    println!("Credentials: {}", report.credentials_file);
    println!("Logged in:   {}", if report.logged_in { "yes" } else { "no" });
    println!("Using:       {}", ctx.session.credentials());
    println!("Start page:  {}", report.landing_route);
}
