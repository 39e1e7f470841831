//! Release commands.

use std::io::Write;

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use otaconsole_client::{Hooks, Route};
use otaconsole_core::{
    parse_release_date, CreateReleaseRequest, DeleteReleaseRequest, Platform, Release,
    ReleaseModifiedResponse, SetActiveBundleRequest, UpdateReleaseRequest,
};

use super::{Context, OutputFormat};

/// Release subcommands.
#[derive(Subcommand)]
pub enum ReleasesCommand {
    /// List releases
    List,

    /// Show one release with its bundles
    Show {
        /// Release ID
        id: String,
    },

    /// Create a release
    Create(CreateArgs),

    /// Set the release date of a release
    Update {
        /// Release ID
        id: String,

        /// Release date (RFC 3339 or YYYY-MM-DD)
        #[arg(long)]
        release_date: String,
    },

    /// Delete a release
    Delete {
        /// Release ID
        id: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Set the bundle served over the air for a release
    SetActive {
        /// Release ID
        id: String,

        /// Bundle ID
        #[arg(long)]
        bundle_id: String,
    },
}

/// Arguments for `releases create`.
#[derive(Args)]
pub struct CreateArgs {
    /// Target platform (ios, android)
    #[arg(long)]
    pub platform: Platform,

    /// Application identifier
    #[arg(long)]
    pub app_id: String,

    /// Version name
    #[arg(long)]
    pub version_name: String,

    /// Store version code
    #[arg(long)]
    pub version_code: String,

    /// Bundle shipped inside the store binary
    #[arg(long)]
    pub builtin_bundle_id: String,
}

/// Runs a release subcommand.
///
/// # Errors
///
/// Returns an error if not logged in, the input is invalid or the server
/// call fails.
pub async fn execute(ctx: &Context, command: &ReleasesCommand) -> Result<()> {
    match command {
        ReleasesCommand::List => list(ctx).await,
        ReleasesCommand::Show { id } => show(ctx, id).await,
        ReleasesCommand::Create(args) => create(ctx, args).await,
        ReleasesCommand::Update { id, release_date } => update(ctx, id, release_date).await,
        ReleasesCommand::Delete { id, yes } => delete(ctx, id, *yes).await,
        ReleasesCommand::SetActive { id, bundle_id } => set_active(ctx, id, bundle_id).await,
    }
}

async fn list(ctx: &Context) -> Result<()> {
    let hooks = ctx.hooks_for(&Route::App)?;
    let releases = hooks.releases().await.context("Failed to list releases")?;

    match ctx.global.format {
        OutputFormat::Json => Context::print_json(&releases.data)?,
        OutputFormat::Text => print_table(&releases.data),
    }
    Ok(())
}

async fn show(ctx: &Context, id: &str) -> Result<()> {
    let hooks = ctx.hooks_for(&update_route(id))?;
    let release = hooks
        .release(id)
        .await
        .with_context(|| format!("Failed to load release {id}"))?;

    match ctx.global.format {
        OutputFormat::Json => Context::print_json(release.as_ref())?,
        OutputFormat::Text => {
            let builtin = bundle_label(&hooks, &release.builtin_bundle_id).await;
            let active = match release.active_bundle_id {
                Some(ref bundle_id) => bundle_label(&hooks, bundle_id).await,
                None => String::new(),
            };

            println!("Platform:       {}", release.platform);
            println!("App ID:         {}", release.app_id);
            println!("Version Name:   {}", release.version_name);
            println!("Version Code:   {}", release.version_code);
            println!("Release Date:   {}", format_release_date(&release));
            println!("Builtin Bundle: {builtin}");
            println!("Active Bundle:  {active}");
            println!("Created At:     {}", release.created_at.to_rfc3339());
        }
    }
    Ok(())
}

async fn create(ctx: &Context, args: &CreateArgs) -> Result<()> {
    let hooks = ctx.hooks_for(&Route::CreateRelease)?;
    let request = CreateReleaseRequest {
        platform: args.platform,
        app_id: args.app_id.clone(),
        version_name: args.version_name.clone(),
        version_code: args.version_code.clone(),
        builtin_bundle_id: args.builtin_bundle_id.clone(),
    };

    let response = hooks
        .create_release(&request)
        .await
        .context("Failed to create release")?;
    print_modified(ctx, &response)
}

async fn update(ctx: &Context, id: &str, release_date: &str) -> Result<()> {
    let hooks = ctx.hooks_for(&update_route(id))?;
    let request = UpdateReleaseRequest {
        release_id: id.to_string(),
        release_date: Some(parse_release_date(release_date)?),
    };

    let response = hooks
        .update_release(&request)
        .await
        .context("Failed to update release")?;
    print_modified(ctx, &response)
}

async fn delete(ctx: &Context, id: &str, yes: bool) -> Result<()> {
    let hooks = ctx.hooks_for(&update_route(id))?;

    if !yes {
        let mut stdin = BufReader::new(tokio::io::stdin());
        if !confirm(&format!("Confirm delete of release {id}?"), &mut stdin).await? {
            println!("Aborted");
            return Ok(());
        }
    }

    let response = hooks
        .delete_release(&DeleteReleaseRequest {
            release_id: id.to_string(),
        })
        .await
        .context("Failed to delete release")?;

    match ctx.global.format {
        OutputFormat::Json => Context::print_json(&response)?,
        OutputFormat::Text => println!("{}", response.message),
    }
    Ok(())
}

async fn set_active(ctx: &Context, id: &str, bundle_id: &str) -> Result<()> {
    let hooks = ctx.hooks_for(&update_route(id))?;
    let response = hooks
        .set_release_active_bundle(&SetActiveBundleRequest {
            release_id: id.to_string(),
            bundle_id: bundle_id.to_string(),
        })
        .await
        .context("Failed to set active bundle")?;
    print_modified(ctx, &response)
}

fn update_route(id: &str) -> Route {
    Route::UpdateRelease { id: id.to_string() }
}

fn print_modified(ctx: &Context, response: &ReleaseModifiedResponse) -> Result<()> {
    match ctx.global.format {
        OutputFormat::Json => Context::print_json(response)?,
        OutputFormat::Text => {
            println!("{}", response.message);
            println!("  ID:            {}", response.release.id);
            println!("  Active bundle: {}", response.release.effective_bundle_id());
        }
    }
    Ok(())
}

/// Label of a bundle for display, falling back to the bare id.
async fn bundle_label(hooks: &Hooks, bundle_id: &str) -> String {
    match hooks.bundle(bundle_id).await {
        Ok(bundle) => format!("{bundle_id} ({})", bundle.option_label()),
        Err(e) => {
            tracing::debug!(bundle_id, error = %e, "Bundle lookup failed");
            bundle_id.to_string()
        }
    }
}

fn format_release_date(release: &Release) -> String {
    release
        .release_date
        .map(|date| date.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}

async fn confirm<R>(prompt: &str, input: &mut R) -> Result<bool>
where
    R: AsyncBufRead + Unpin,
{
    print!("{prompt} [y/N] ");
    std::io::stdout().flush()?;

    let mut answer = String::new();
    input
        .read_line(&mut answer)
        .await
        .context("Failed to read confirmation")?;
    Ok(is_yes(&answer))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn print_table(releases: &[Release]) {
    if releases.is_empty() {
        println!("No releases");
        return;
    }

    println!(
        "{:<24}  {:<8}  {:<24}  {:<12}  {:<8}  {:<19}  ACTIVE BUNDLE",
        "ID", "PLATFORM", "APP", "VERSION", "CODE", "RELEASE DATE"
    );
    for release in releases {
        println!(
            "{:<24}  {:<8}  {:<24}  {:<12}  {:<8}  {:<19}  {}",
            release.id,
            release.platform,
            release.app_id,
            release.version_name,
            release.version_code,
            format_release_date(release),
            release.effective_bundle_id()
        );
    }
}
