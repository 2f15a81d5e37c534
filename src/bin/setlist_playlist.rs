//! Build a playlist from the songs bands are likely to play.
//!
//! Usage:
//!     setlist-playlist -b Opeth -b Gojira --playlist-name "Summer Shows"
//!     setlist-playlist -b Hellfest --preview --fuzzy
//!
//! The build result is printed as JSON on stdout.

use std::process;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use setlist_playlist::config::Config;
use setlist_playlist::job::{payload_json, run_playlist_job, JobOptions};
use setlist_playlist::playlist_builder::BuildRequest;

/// Create a playlist from the recent setlists of a lineup
#[derive(Parser, Debug)]
#[command(name = "setlist-playlist")]
#[command(about = "Create a playlist from the recent setlists of a lineup")]
struct Args {
    /// Band or festival name (repeatable, playlist order)
    #[arg(short = 'b', long = "band-name")]
    band_names: Vec<String>,

    /// Playlist to create or overwrite
    #[arg(long)]
    playlist_name: Option<String>,

    /// Max age of the last setlist to reuse as-is (days) [default: 15]
    #[arg(long)]
    copy_last_setlist_threshold: Option<i64>,

    /// Max number of songs in an estimated setlist [default: 12]
    #[arg(long)]
    max_setlist_length: Option<usize>,

    /// Disable the setlist and track caches
    #[arg(long)]
    no_cache: bool,

    /// Seconds between requests to each API, zero for no limit [default: 1.0]
    #[arg(long, allow_negative_numbers = true)]
    rate_limit: Option<f64>,

    /// Accept tracks whose title contains the song name and search discographies
    #[arg(long)]
    fuzzy: bool,

    /// Always estimate setlists
    #[arg(long, conflicts_with = "force_last")]
    force_smart: bool,

    /// Always reuse the last setlist
    #[arg(long)]
    force_last: bool,

    /// Resolve tracks without writing a playlist
    #[arg(long)]
    preview: bool,

    /// Print the effective configuration and exit
    #[arg(long)]
    show_config: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = match Config::load_with_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load config: {}", e);
            process::exit(2);
        }
    };

    if args.show_config {
        config.print("Configuration");
        return;
    }

    if args.band_names.is_empty() {
        eprintln!("Please provide at least one band name (-b).");
        process::exit(2);
    }

    let force_smart = match (args.force_smart, args.force_last) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    };

    let request = BuildRequest {
        band_names: args.band_names,
        playlist_name: args.playlist_name,
        threshold_days: args.copy_last_setlist_threshold.unwrap_or_else(|| config.threshold_days()),
        max_setlist_length: args.max_setlist_length.unwrap_or_else(|| config.max_setlist_length()),
        force_smart,
        fuzzy: args.fuzzy || config.fuzzy(),
        create_playlist: !args.preview,
    };

    let mut options = JobOptions::from_config(&config);
    options.no_cache = args.no_cache;
    if let Some(rate_limit) = args.rate_limit {
        options.rate_limit_secs = rate_limit;
    }

    let result = match run_playlist_job(&config, request, &options) {
        Ok(r) => r,
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    };

    match payload_json(&result) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            error!("Failed to serialize result: {}", e);
            process::exit(1);
        }
    }
}
