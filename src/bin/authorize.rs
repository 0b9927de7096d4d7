//! Run the Spotify authorization flow and rewrite the token cache.
//!
//! Usage: station-authorize [--config config.toml] [--no-browser]

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use station_listener::auth::SpotifyOAuth;
use station_listener::config::{ListenerConfig, Overrides};

#[derive(Parser)]
#[command(name = "station-authorize")]
#[command(about = "Authorize the listener against Spotify and cache the token")]
struct Args {
    #[arg(short = 'C', long, default_value = "config.toml")]
    config: PathBuf,

    /// Only print the authorization link
    #[arg(long)]
    no_browser: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let settings = ListenerConfig::load(&args.config)
        .with_context(|| format!("Failed to load config {}", args.config.display()))?
        .into_settings(Overrides::default())
        .context("Invalid configuration")?;

    let mut oauth = SpotifyOAuth::from_cache(settings.spotify.clone(), settings.token_cache.clone())
        .context("Failed to read token cache")?
        .with_timeout(settings.http_timeout);
    if args.no_browser {
        oauth = oauth.without_browser();
    }

    let mut input = io::stdin().lock();
    oauth
        .authorize_interactive(&mut input, &mut io::stdout())
        .with_context(|| format!("Could not get token for {}", settings.spotify.username))?;

    println!("Token cached at {}", settings.token_cache.display());
    Ok(())
}
