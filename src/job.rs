//! Wiring of configured clients into a [`PlaylistBuilder`] run.

use tracing::{info, warn};

use crate::cache::{create_cache, Cache, NullCache};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::lineup::FestivalRegistry;
use crate::models::PlaylistBuildResult;
use crate::playlist_builder::{BuildRequest, PlaylistBuilder};
use crate::rate_limiter::RateLimiter;
use crate::resolve::TrackResolver;
use crate::setlist_fm::SetlistFmClient;
use crate::spotify::SpotifyClient;

/// Knobs that affect the clients rather than the build itself.
#[derive(Debug, Clone, PartialEq)]
pub struct JobOptions {
    pub no_cache: bool,
    /// Seconds between setlist.fm requests; zero or less disables limiting.
    pub rate_limit_secs: f64,
}

impl JobOptions {
    pub fn from_config(config: &Config) -> Self {
        JobOptions {
            no_cache: false,
            rate_limit_secs: config.rate_limit_secs(),
        }
    }
}

/// Whether the playlist can actually be written.  Without user credentials a
/// creation request becomes a preview.
pub fn effective_create_playlist(config: &Config, requested: bool) -> bool {
    if requested && !config.spotify.has_user_credentials() {
        info!("Spotify user credentials missing, running in preview mode");
        return false;
    }
    requested
}

fn open_cache(no_cache: bool, target: &str) -> Result<Box<dyn Cache>> {
    if no_cache {
        Ok(Box::new(NullCache))
    } else {
        create_cache(Some(target))
    }
}

/// Build and run one playlist job.
pub fn run_playlist_job(config: &Config, request: BuildRequest, options: &JobOptions) -> Result<PlaylistBuildResult> {
    if request.band_names.is_empty() {
        return Err(Error::InvalidInput("band names cannot be empty".to_string()));
    }

    let mut request = request;
    request.create_playlist = effective_create_playlist(config, request.create_playlist);
    config.validate(request.create_playlist)?;

    let setlist_cache = open_cache(options.no_cache, config.setlist_cache())?;
    let track_cache = open_cache(options.no_cache, config.track_cache())?;
    let setlists = SetlistFmClient::new(
        config.setlist_fm.api_key.as_deref().unwrap_or_default(),
        setlist_cache,
        RateLimiter::from_secs_f64("setlist.fm", options.rate_limit_secs),
    );
    let spotify = SpotifyClient::from_config(&config.spotify)?
        .with_rate_limiter(RateLimiter::from_secs_f64("Spotify", options.rate_limit_secs));

    let mut builder = PlaylistBuilder::new(setlists, TrackResolver::new(spotify, track_cache))
        .with_festivals(FestivalRegistry::with_defaults());

    let result = builder.build_playlist(&request);

    if let Err(e) = builder.setlists_mut().persist_cache() {
        warn!("Could not save setlist cache: {}", e);
    }
    if let Err(e) = builder.resolver_mut().persist_cache() {
        warn!("Could not save track cache: {}", e);
    }

    let result = result?;
    info!("Playlist build complete (created={})", result.created_playlist);
    Ok(result)
}

/// The JSON document printed for a finished build.
pub fn payload_json(result: &PlaylistBuildResult) -> Result<String> {
    Ok(serde_json::to_string_pretty(result)?)
}
