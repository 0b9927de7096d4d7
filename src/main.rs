use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use station_listener::auth::SpotifyOAuth;
use station_listener::catalog::SpotifyCatalog;
use station_listener::config::{ListenerConfig, Overrides, DEFAULT_PLAYLIST_LIMIT};
use station_listener::listener::{request_shutdown, Listener};
use station_listener::logging::{self, LogLevel};
use station_listener::matcher::MatchPolicy;
use station_listener::station::{EndpointResolver, IHeartClient};
use station_listener::sync::Synchronizer;

#[derive(Parser)]
#[command(name = "station-listener")]
#[command(about = "Add songs played on an iHeartRadio station to a Spotify playlist")]
struct Args {
    /// Station page URL (overrides station_url from the config file)
    #[arg(short = 'U', long)]
    url: Option<String>,

    /// Log at INFO level to listener-info.log
    #[arg(short = 'I', long)]
    info: bool,

    /// Log at DEBUG level to listener-debug.log
    #[arg(short = 'D', long)]
    debug: bool,

    /// Clear the playlist at startup when it holds more songs than this (<= 0 disables)
    #[arg(short = 'L', long, default_value_t = DEFAULT_PLAYLIST_LIMIT, allow_negative_numbers = true)]
    limit: i64,

    #[arg(short = 'C', long, default_value = "config.toml")]
    config: PathBuf,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = LogLevel::from_flags(args.debug, args.info);
    if let Err(e) = logging::init(level, Path::new(".")) {
        eprintln!("Error: could not open {}: {}", level.file_name(), e);
        return ExitCode::FAILURE;
    }

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let config = ListenerConfig::load(&args.config)
        .with_context(|| format!("Failed to load config {}", args.config.display()))?;
    let settings = config
        .into_settings(Overrides {
            station_url: args.url,
            playlist_limit: args.limit,
        })
        .context("Invalid configuration")?;

    let mut oauth = SpotifyOAuth::from_cache(settings.spotify.clone(), settings.token_cache.clone())
        .context("Failed to read token cache")?
        .with_timeout(settings.http_timeout);
    if !oauth.has_token() {
        let mut input = io::stdin().lock();
        oauth
            .authorize_interactive(&mut input, &mut io::stdout())
            .with_context(|| format!("Could not get token for {}", settings.spotify.username))?;
    }

    let station = IHeartClient::new(settings.metadata_url_template.clone())
        .with_timeout(settings.http_timeout);
    let endpoint = station
        .resolve(&settings.station_url)
        .with_context(|| format!("Failed to fetch station page {}", settings.station_url))?
        .ok_or_else(|| anyhow!("No stream id found on {}", settings.station_url))?;
    info!(stream = endpoint.stream_id(), url = %settings.station_url, "resolved station");

    let catalog = SpotifyCatalog::new(oauth, settings.playlist_id.clone())
        .with_timeout(settings.http_timeout);
    let mut sync = Synchronizer::load(catalog, MatchPolicy::new(settings.min_popularity))
        .with_context(|| format!("Failed to load playlist {}", settings.playlist_id))?;
    sync.enforce_size_limit(settings.playlist_limit)
        .context("Failed to clear oversized playlist")?;

    let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);
    let handler_tx = shutdown_tx.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        if !request_shutdown(&handler_tx) {
            warn!("second interrupt while a poll is in flight, exiting");
            std::process::exit(130);
        }
    }) {
        warn!(error = %e, "could not install Ctrl-C handler");
    }

    let mut listener = Listener::new(station, endpoint, sync, settings.poll_interval);
    listener.run(&shutdown_rx).context("Listener stopped")?;

    // Held until here so the poll wait never sees a disconnected channel.
    drop(shutdown_tx);
    Ok(())
}
