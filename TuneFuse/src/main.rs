//! TuneFuse command-line front-end
//!
//! Loads the configuration, starts a [`MusicService`] and runs one command
//! against it. Results go to stdout, logs to stderr.

mod commands;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tfconfig::{Config, get_config};
use tfresolver::MusicService;
use tfsource::{Page, Platform};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    version = env!("CARGO_PKG_VERSION"),
    name = env!("CARGO_PKG_NAME"),
    about = env!("CARGO_PKG_DESCRIPTION"),
)]
struct Cli {
    /// Configuration directory (defaults to $TUNEFUSE_CONFIG, then .tunefuse)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search every provider at once
    Search {
        keywords: Vec<String>,

        /// Number of results printed
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Resolve a playable URL for one track
    Resolve {
        track_id: String,

        #[arg(long, default_value = "netease")]
        platform: Platform,
    },

    /// Search, then play one of the results
    Play {
        keywords: Vec<String>,

        /// Position of the result to play
        #[arg(long, default_value_t = 0)]
        index: usize,
    },

    /// Browse the playlists of a platform
    Playlists {
        #[arg(long, default_value = "netease")]
        platform: Platform,

        /// Category name, all categories when omitted
        #[arg(long)]
        category: Option<String>,

        /// Newest first instead of most played
        #[arg(long)]
        new: bool,

        /// Zero-based page number
        #[arg(long, default_value_t = 0)]
        page: usize,

        #[arg(long, default_value_t = Page::DEFAULT_LIMIT)]
        limit: usize,
    },

    /// Show one playlist and its tracks
    Playlist {
        playlist_id: String,

        #[arg(long, default_value = "netease")]
        platform: Platform,
    },

    /// List the playlist categories of a platform
    Categories {
        #[arg(long, default_value = "netease")]
        platform: Platform,
    },

    /// Recommended tracks
    Hot {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(dir) => Arc::new(Config::load_config(dir)?),
        None => get_config(),
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.get_log_level()));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();

    let settings = config.get_engine_settings()?;
    info!(
        config_dir = config.directory(),
        endpoints = settings.provider_endpoints.len(),
        "starting TuneFuse"
    );
    let service = MusicService::from_settings(settings)?;

    let outcome = commands::run(&service, cli.command).await;

    debug!(stats = ?service.stats(), "engine state");
    service.shutdown().await;
    outcome
}
