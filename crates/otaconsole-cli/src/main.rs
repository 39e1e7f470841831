//! otaconsole CLI - Command-line management console for an OTA update server.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::{Cli, Commands, Context};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing on stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "otaconsole=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let ctx = Context::new(cli.global);

    match cli.command {
        Commands::Login(args) => commands::login::execute(&ctx, &args).await,
        Commands::Logout => commands::logout::run(&ctx),
        Commands::Status => commands::status::run(&ctx),
        Commands::Bundles(command) => commands::bundles::execute(&ctx, &command).await,
        Commands::Releases(command) => commands::releases::execute(&ctx, &command).await,
        Commands::Version => {
            println!("otaconsole {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
