//! Resolve single songs to catalog tracks, showing which lookup step matched.
//!
//! Usage:
//!     resolve_track --artist Yes Roundabout "Heart of the Sunrise"
//!     resolve_track --artist Opeth --fuzzy "Ghost of Perdition"

use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use setlist_playlist::cache::{create_cache, Cache, NullCache};
use setlist_playlist::config::Config;
use setlist_playlist::rate_limiter::RateLimiter;
use setlist_playlist::resolve::TrackResolver;
use setlist_playlist::spotify::SpotifyClient;

#[derive(Parser, Debug)]
#[command(name = "resolve_track")]
#[command(about = "Look up songs of one artist in the catalog")]
struct Args {
    #[arg(short, long)]
    artist: String,

    /// Song titles
    #[arg(required = true)]
    songs: Vec<String>,

    #[arg(long)]
    fuzzy: bool,

    /// Bypass the track cache
    #[arg(long)]
    no_cache: bool,

    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();

    let config = match Config::load_with_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            process::exit(2);
        }
    };

    let client = match SpotifyClient::from_config(&config.spotify) {
        Ok(c) => c.with_rate_limiter(RateLimiter::from_secs_f64("Spotify", config.rate_limit_secs())),
        Err(e) => {
            eprintln!("{}", e);
            process::exit(2);
        }
    };

    let cache: Box<dyn Cache> = if args.no_cache {
        Box::new(NullCache)
    } else {
        match create_cache(Some(config.track_cache())) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Cannot open track cache: {}", e);
                process::exit(2);
            }
        }
    };

    let mut resolver = TrackResolver::new(client, cache);
    let matches = resolver.map_tracks(&args.artist, &args.songs, args.fuzzy);

    let mut missing = 0;
    for m in &matches {
        match &m.track_url {
            Some(url) => println!("  ✓ {:<40} {:<20} {}", m.name, format!("{:?}", m.strategy), url),
            None => {
                println!("  ✗ {:<40} {:?}", m.name, m.strategy);
                missing += 1;
            }
        }
    }
    println!("=== {} of {} resolved ===", matches.len() - missing, matches.len());

    if let Err(e) = resolver.persist_cache() {
        eprintln!("Could not save track cache: {}", e);
    }

    if missing > 0 {
        process::exit(1);
    }
}
