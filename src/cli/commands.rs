//! CLI command handlers

use anyhow::{Context, Result};
use clap_complete::generate;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::library::{build_catalog, Catalog, DirAssetStore, Track};
use crate::likes::{remote_key_for, LikeSynchronizer, ToggleOutcome};
use crate::playback::RodioBackend;
use crate::screen::{run_player, PlayerScreen};
use crate::settings::{Overrides, Settings};
use crate::store::RestDocumentStore;

/// Everything a command needs to reach the store and the local files
struct Library {
    settings: Settings,
    store: Arc<RestDocumentStore>,
    assets: Arc<DirAssetStore>,
}

impl Library {
    fn open(overrides: Overrides) -> Result<Self> {
        let settings = Settings::load()?.with_overrides(overrides);
        let store = RestDocumentStore::new(
            settings.require_store_url()?,
            settings.api_token.clone(),
            settings.request_timeout(),
        )
        .context("Failed to create store client")?;
        let assets = DirAssetStore::new(settings.assets_dir(), &settings.extensions);

        Ok(Self {
            settings,
            store: Arc::new(store),
            assets: Arc::new(assets),
        })
    }

    fn likes(&self) -> LikeSynchronizer {
        LikeSynchronizer::new(self.store.clone(), self.settings.user_id.clone())
    }

    async fn catalog(&self) -> Catalog {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message("Loading catalog...");
        spinner.enable_steady_tick(Duration::from_millis(100));

        let catalog = build_catalog(self.assets.as_ref(), self.store.as_ref()).await;

        spinner.finish_and_clear();
        catalog
    }

    fn print_empty_hint(&self) {
        println!("{}", "No playable tracks found.".yellow());
        println!(
            "Looked in {} for files named after store track titles.",
            self.assets.root().display().to_string().cyan()
        );
    }
}

/// Handle the `catalog` command
pub async fn catalog(overrides: Overrides, json: bool) -> Result<()> {
    let library = Library::open(overrides)?;
    let catalog = library.catalog().await;

    if json {
        let tracks: Vec<_> = catalog.iter().collect();
        println!("{}", serde_json::to_string_pretty(&tracks)?);
        return Ok(());
    }

    if catalog.is_empty() {
        library.print_empty_hint();
        return Ok(());
    }

    println!("{}", format!("{} playable tracks:", catalog.len()).green().bold());
    for (i, track) in catalog.iter().enumerate() {
        print_track(i, track);
    }

    Ok(())
}

/// Handle the `search` command
pub async fn search(overrides: Overrides, query: &str) -> Result<()> {
    let library = Library::open(overrides)?;
    let catalog = library.catalog().await;

    if catalog.is_empty() {
        library.print_empty_hint();
        return Ok(());
    }

    let matches = catalog.search(query);
    if matches.is_empty() {
        println!("{} \"{}\"", "No tracks match".yellow(), query);
        return Ok(());
    }

    println!("{}", format!("{} matching tracks:", matches.len()).green().bold());
    for (i, track) in matches {
        print_track(i, track);
    }

    Ok(())
}

/// Handle the `liked` command
pub async fn liked(overrides: Overrides) -> Result<()> {
    let library = Library::open(overrides)?;
    let catalog = library.catalog().await;

    let liked = library.likes().liked_tracks(&catalog).await;

    println!("{}", "My Liked Songs".cyan().bold());
    if liked.is_empty() {
        println!("  {}", "No liked songs yet!".dimmed());
        return Ok(());
    }

    for (i, track) in liked {
        print_track(i, track);
    }

    Ok(())
}

/// One catalog line, numbered the way `play` and `like` take it
fn print_track(index: usize, track: &Track) {
    let liked = if track.liked { "♥".red().to_string() } else { " ".to_string() };
    println!(
        "  {:>3}. {} {} - {} [{}]",
        index + 1,
        liked,
        track.title.cyan(),
        track.artist,
        track.duration_label
    );
}

/// Handle the `play` command
pub async fn play(overrides: Overrides, index: usize) -> Result<()> {
    let library = Library::open(overrides)?;
    let catalog = library.catalog().await;

    if catalog.is_empty() {
        library.print_empty_hint();
        return Ok(());
    }

    let start = track_index(index, catalog.len())?;
    let backend = RodioBackend::open_default().context("Failed to open audio output")?;

    let mut screen = PlayerScreen::new(
        Arc::new(catalog),
        library.assets.clone(),
        Arc::new(backend),
        library.likes(),
        library.settings.timing(),
    );
    screen.activate(start).await;

    run_player(&mut screen).await
}

/// Handle the `like` command
pub async fn like(overrides: Overrides, index: usize, show: bool) -> Result<()> {
    let library = Library::open(overrides)?;
    let catalog = library.catalog().await;

    let index = track_index(index, catalog.len())?;
    let Some(track) = catalog.get(index) else {
        anyhow::bail!("No track at position {}", index + 1);
    };
    let likes = library.likes();

    if show {
        let liked = likes.load_liked_state(track).await;
        println!(
            "{} ({}): {}",
            track.title.cyan(),
            remote_key_for(track),
            if liked { "liked".green().bold() } else { "not liked".normal() }
        );
        return Ok(());
    }

    let mut state = likes.load(track).await;
    match likes.toggle_liked(&mut state, track).await {
        ToggleOutcome::Committed { liked: true } => {
            println!("{} {}", "Liked".green().bold(), track.title.cyan());
        }
        ToggleOutcome::Committed { liked: false } => {
            println!("{} {}", "Unliked".yellow().bold(), track.title.cyan());
        }
        ToggleOutcome::RolledBack { notice, .. } => anyhow::bail!(notice),
        ToggleOutcome::Ignored => {}
    }

    Ok(())
}

/// Handle the `config` command
pub fn config(
    store_url: Option<String>,
    token: Option<String>,
    user: Option<String>,
    assets: Option<PathBuf>,
) -> Result<()> {
    let mut settings = Settings::load()?;
    let changed = store_url.is_some() || token.is_some() || user.is_some() || assets.is_some();

    if let Some(url) = store_url {
        settings.store_url = Some(url);
    }
    if let Some(token) = token {
        settings.api_token = Some(token).filter(|t| !t.is_empty());
    }
    if let Some(user) = user {
        settings.user_id = Some(user).filter(|u| !u.is_empty());
    }
    if let Some(dir) = assets {
        settings.assets_dir = Some(dir);
    }

    if changed {
        settings.save()?;
        println!("{}", "Settings saved.".green().bold());
        println!();
    }

    println!("{}", "Current settings:".cyan());
    println!("  File:      {}", Settings::settings_path()?.display());
    println!("  Store URL: {}", settings.store_url.as_deref().unwrap_or("(not set)"));
    println!(
        "  Token:     {}",
        if settings.api_token.is_some() { "(set)" } else { "(not set)" }
    );
    println!("  User:      {}", settings.user_id.as_deref().unwrap_or("(not set)"));
    println!("  Assets:    {}", settings.assets_dir().display());
    println!("  Formats:   {}", settings.extensions.join(", "));

    Ok(())
}

/// Generate shell completions
pub fn completion(shell: clap_complete::Shell) {
    let mut cmd = super::Cli::command();
    generate(shell, &mut cmd, "tunedeck", &mut io::stdout());
}

// Extension trait for Cli to get clap Command
impl super::Cli {
    fn command() -> clap::Command {
        <Self as clap::CommandFactory>::command()
    }
}

/// Convert a 1-based track number into a catalog index
fn track_index(number: usize, len: usize) -> Result<usize> {
    number
        .checked_sub(1)
        .filter(|&i| i < len)
        .ok_or_else(|| anyhow::anyhow!("Track number must be between 1 and {}", len))
}
