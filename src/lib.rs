pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod estimator;
pub mod features;
pub mod freshness;
pub mod job;
pub mod lineup;
pub mod models;
pub mod playlist_builder;
pub mod rate_limiter;
pub mod resolve;
pub mod setlist;
pub mod setlist_fm;
pub mod spotify;

pub use cache::{create_cache, Cache, FileCache, MemoryCache, NullCache};
pub use catalog::{ArtistCandidate, CatalogSearchSource, CatalogTrack, PlaylistSink, SetlistSource};
pub use config::Config;
pub use error::{Error, Result};
pub use estimator::{estimate_setlist, extract_smart_setlist};
pub use features::{derive_song_features, PositionBin, SongFeature};
pub use job::{run_playlist_job, JobOptions};
pub use lineup::{FestivalRegistry, FestivalResolver, HellfestResolver};
pub use models::{
    BandSetlistPlan, MatchStatus, MatchStrategy, PlayedSong, Playlist, PlaylistBuildResult, SetlistResult,
    SetlistType, SongMatch,
};
pub use playlist_builder::{BuildRequest, PlaylistBuilder};
pub use rate_limiter::RateLimiter;
pub use resolve::{normalize, TrackResolver};
pub use setlist::{extract_last_setlist, extract_played_songs};
pub use setlist_fm::SetlistFmClient;
pub use spotify::SpotifyClient;
