//! tunedeck - Now-playing screen for local music with remote likes

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod library;
mod likes;
mod playback;
mod screen;
mod settings;
mod store;
mod utils;

use cli::{Cli, Commands};
use settings::Overrides;
use utils::ConditionalStderrLayer;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "tunedeck=debug,reqwest=debug"
    } else {
        "tunedeck=info"
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(ConditionalStderrLayer::new(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        ))
        .init();

    let overrides = Overrides {
        store_url: cli.store_url,
        assets_dir: cli.assets,
        user_id: cli.user,
    };

    match cli.command.unwrap_or(Commands::Play { index: 1 }) {
        Commands::Catalog { json } => {
            cli::commands::catalog(overrides, json).await?;
        }
        Commands::Search { query } => {
            cli::commands::search(overrides, &query).await?;
        }
        Commands::Liked => {
            cli::commands::liked(overrides).await?;
        }
        Commands::Play { index } => {
            cli::commands::play(overrides, index).await?;
        }
        Commands::Like { index, show } => {
            cli::commands::like(overrides, index, show).await?;
        }
        Commands::Config {
            store_url,
            token,
            user,
            assets,
        } => {
            cli::commands::config(store_url, token, user, assets)?;
        }
        Commands::Completion { shell } => {
            cli::commands::completion(shell);
        }
    }

    Ok(())
}
