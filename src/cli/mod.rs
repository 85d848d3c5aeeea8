//! CLI module for tunedeck

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

#[derive(Parser, Debug)]
#[command(name = "tunedeck", about = "Play local music with likes synced to a document store")]
#[command(version, author)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Document store base URL
    #[arg(long, global = true, env = "TUNEDECK_STORE_URL")]
    pub store_url: Option<String>,

    /// Directory holding the audio files
    #[arg(long, global = true, env = "TUNEDECK_ASSETS")]
    pub assets: Option<PathBuf>,

    /// User id for the legacy liked-songs list
    #[arg(long, global = true, env = "TUNEDECK_USER")]
    pub user: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List playable tracks (local files matched with store records)
    Catalog {
        /// Print the catalog as JSON
        #[arg(long)]
        json: bool,
    },

    /// Find tracks by title, artist or album
    Search {
        /// Text to look for, ignoring case; empty lists everything
        #[arg(value_name = "QUERY", default_value = "")]
        query: String,
    },

    /// List the tracks you have liked
    Liked,

    /// Open the now-playing screen
    Play {
        /// Track number from `catalog` to start with
        #[arg(value_name = "INDEX", default_value = "1")]
        index: usize,
    },

    /// Toggle or show the liked flag of a track
    Like {
        /// Track number from `catalog`
        #[arg(value_name = "INDEX")]
        index: usize,

        /// Only show the current flag
        #[arg(long)]
        show: bool,
    },

    /// Show or change stored settings
    Config {
        /// Document store base URL
        #[arg(long = "set-store-url", value_name = "URL")]
        store_url: Option<String>,

        /// Bearer token for the store (empty string clears it)
        #[arg(long, value_name = "TOKEN")]
        token: Option<String>,

        /// User id for the legacy liked-songs list
        #[arg(long = "set-user", value_name = "USER")]
        user: Option<String>,

        /// Directory holding the audio files
        #[arg(long = "set-assets", value_name = "DIR")]
        assets: Option<PathBuf>,
    },

    /// Generate shell completions
    Completion {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        <Cli as CommandFactory>::command().debug_assert();
    }

    #[test]
    fn test_parse_like() {
        let cli = Cli::try_parse_from(["tunedeck", "like", "2", "--show", "-v"]).unwrap();
        assert!(cli.verbose);
        match cli.command {
            Some(Commands::Like { index, show }) => {
                assert_eq!(index, 2);
                assert!(show);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_play_defaults_to_first_track() {
        let cli = Cli::try_parse_from(["tunedeck", "play"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Play { index: 1 })));
    }

    #[test]
    fn test_global_store_url() {
        let cli = Cli::try_parse_from(["tunedeck", "catalog", "--store-url", "http://localhost:8080"])
            .unwrap();
        assert_eq!(cli.store_url.as_deref(), Some("http://localhost:8080"));
    }

    #[test]
    fn test_parse_search() {
        let cli = Cli::try_parse_from(["tunedeck", "search", "ed sheeran"]).unwrap();
        match cli.command {
            Some(Commands::Search { query }) => assert_eq!(query, "ed sheeran"),
            other => panic!("unexpected command {:?}", other),
        }

        let cli = Cli::try_parse_from(["tunedeck", "search"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Search { query }) if query.is_empty()));
    }

    #[test]
    fn test_parse_liked() {
        let cli = Cli::try_parse_from(["tunedeck", "liked", "--user", "u1"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Liked)));
        assert_eq!(cli.user.as_deref(), Some("u1"));
    }
}
