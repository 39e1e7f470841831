//! Bundle commands.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};

use otaconsole_client::Route;
use otaconsole_core::{Bundle, UploadBundleRequest};

use super::{Context, OutputFormat};

/// Bundle subcommands.
#[derive(Subcommand)]
pub enum BundlesCommand {
    /// List uploaded bundles
    List,

    /// Upload a zip bundle
    Upload(UploadArgs),
}

/// Arguments for `bundles upload`.
#[derive(Args)]
pub struct UploadArgs {
    /// Zip archive to upload
    #[arg(short, long)]
    pub file: PathBuf,

    /// Application identifier
    #[arg(long)]
    pub app_id: String,

    /// Version name of the bundled web assets
    #[arg(long)]
    pub version_name: String,

    /// Free-form description
    #[arg(long, default_value = "")]
    pub description: String,
}

/// Runs a bundle subcommand.
///
/// # Errors
///
/// Returns an error if not logged in or the server call fails.
pub async fn execute(ctx: &Context, command: &BundlesCommand) -> Result<()> {
    match command {
        BundlesCommand::List => list(ctx).await,
        BundlesCommand::Upload(args) => upload(ctx, args).await,
    }
}

async fn list(ctx: &Context) -> Result<()> {
    let hooks = ctx.hooks_for(&Route::App)?;
    let bundles = hooks.bundles().await.context("Failed to list bundles")?;

    match ctx.global.format {
        OutputFormat::Json => Context::print_json(&bundles.data)?,
        OutputFormat::Text => print_table(&bundles.data),
    }
    Ok(())
}

async fn upload(ctx: &Context, args: &UploadArgs) -> Result<()> {
    let hooks = ctx.hooks_for(&Route::UploadBundle)?;
    let request = upload_request(args)?;

    tracing::info!(file = %args.file.display(), size = request.content.len(), "Uploading bundle");
    let response = hooks
        .upload_bundle(&request)
        .await
        .context("Failed to upload bundle")?;

    match ctx.global.format {
        OutputFormat::Json => Context::print_json(&response)?,
        OutputFormat::Text => {
            println!("{}", response.message);
            println!("  ID:       {}", response.bundle.id);
            println!("  CRC:      {}", response.bundle.crc_checksum);
            println!("  Download: {}", response.bundle.public_download_url);
        }
    }
    Ok(())
}

fn upload_request(args: &UploadArgs) -> Result<UploadBundleRequest> {
    let content = std::fs::read(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;

    Ok(UploadBundleRequest {
        file_name: file_name(&args.file),
        content,
        app_id: args.app_id.clone(),
        version_name: args.version_name.clone(),
        description: args.description.clone(),
    })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn print_table(bundles: &[Bundle]) {
    if bundles.is_empty() {
        println!("No bundles");
        return;
    }

    println!(
        "{:<24}  {:<24}  {:<12}  {:<10}  {:<20}  DESCRIPTION",
        "ID", "APP", "VERSION", "CRC", "CREATED"
    );
    for bundle in bundles {
        println!(
            "{:<24}  {:<24}  {:<12}  {:<10}  {:<20}  {}",
            bundle.id,
            bundle.app_id,
            bundle.version_name,
            bundle.crc_checksum,
            bundle.created_at.format("%Y-%m-%d %H:%M:%S"),
            bundle.description
        );
    }
}
