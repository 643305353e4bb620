mod cli;
mod handlers;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use mediabot::ConfigManager;
use std::process;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    // Validate CLI arguments first
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    // RUST_LOG wins; otherwise log at info, or debug with --verbose
    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let mut config_manager = match &args.config {
        Some(path) => ConfigManager::from_path(path)?,
        None => ConfigManager::new()?,
    };

    if let Some(output_dir) = args.output_dir_override() {
        config_manager.config_mut().storage.output_dir = output_dir.to_string();
    }

    if !args.skips_config_validation() {
        if let Err(e) = config_manager.validate(args.requires_token()) {
            eprintln!("Configuration validation failed: {}", e);
            eprintln!("Run 'mediabot config validate' for details");
            process::exit(1);
        }
    }

    // Handle commands
    match args.command {
        Commands::Run { .. } => {
            handlers::handle_run(config_manager.config()).await?;
        }
        Commands::Fetch {
            category,
            magnet,
            torrent_url,
            url,
            name,
            ..
        } => {
            handlers::handle_fetch(
                config_manager.config(),
                category,
                magnet,
                torrent_url,
                url,
                name,
            )
            .await?;
        }
        Commands::Config { action } => {
            handlers::handle_config(&config_manager, action).await?;
        }
    }

    Ok(())
}
