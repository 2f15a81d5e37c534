//! Interfaces to the streaming catalog and the setlist source.
//!
//! The playlist builder only talks to upstream services through these traits.
//! [`crate::spotify::SpotifyClient`] and [`crate::setlist_fm::SetlistFmClient`]
//! are the production implementations; tests use in-memory fakes.

use serde::Deserialize;
use serde_json::Value;

use crate::error::Result;
use crate::models::Playlist;

/// A track as returned by catalog search or album listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogTrack {
    pub id: String,
    pub name: String,
    pub artists: Vec<String>,
}

impl CatalogTrack {
    pub fn new(id: &str, name: &str, artists: &[&str]) -> Self {
        CatalogTrack {
            id: id.to_string(),
            name: name.to_string(),
            artists: artists.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// Top artist hit for a name search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtistCandidate {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct ApiTrack {
    id: Option<String>,
    name: String,
    #[serde(default)]
    artists: Vec<ApiArtist>,
}

#[derive(Debug, Deserialize)]
struct ApiArtist {
    name: String,
}

/// Parse track objects (`{id, name, artists: [{name}]}`).  Entries that are
/// null, malformed or without an ID are dropped.
pub fn parse_tracks(items: &[Value]) -> Vec<CatalogTrack> {
    items
        .iter()
        .filter_map(|item| serde_json::from_value::<ApiTrack>(item.clone()).ok())
        .filter_map(|t| {
            Some(CatalogTrack {
                id: t.id?,
                name: t.name,
                artists: t.artists.into_iter().map(|a| a.name).collect(),
            })
        })
        .collect()
}

/// Candidates of a raw track-search response (`{"tracks": {"items": [...]}}`).
pub fn search_candidates(results: &Value) -> Vec<CatalogTrack> {
    results
        .get("tracks")
        .and_then(|t| t.get("items"))
        .and_then(|i| i.as_array())
        .map(|items| parse_tracks(items))
        .unwrap_or_default()
}

/// Text search and discography browsing on a streaming catalog.
pub trait CatalogSearchSource {
    /// Raw JSON of a track search for `query`, at most `limit` hits.  The
    /// response is cached verbatim by the resolver.
    fn search_tracks(&mut self, query: &str, limit: usize) -> Result<Value>;

    /// Best artist match for `name`, if any.
    fn search_artist(&mut self, name: &str) -> Result<Option<ArtistCandidate>>;

    /// Album and single IDs of an artist.
    fn list_albums(&mut self, artist_id: &str, limit: usize) -> Result<Vec<String>>;

    /// Tracks of one album.
    fn list_tracks(&mut self, album_id: &str) -> Result<Vec<CatalogTrack>>;
}

/// A place playlists can be written to.
pub trait PlaylistSink {
    /// Find the user's playlist called `name`, creating it when missing.
    fn find_or_create(&mut self, name: &str) -> Result<Playlist>;

    /// Replace the playlist content with `track_ids` (empty clears it).
    fn replace_items(&mut self, playlist_id: &str, track_ids: &[String]) -> Result<()>;

    /// Append `track_ids`.  Callers batch to the service limit.
    fn add_items(&mut self, playlist_id: &str, track_ids: &[String]) -> Result<()>;
}

/// Source of historical setlists for a band.
pub trait SetlistSource {
    /// Raw setlist search result for `artist`.  `Ok(None)` when the upstream
    /// has nothing (including exhausted rate-limit retries).
    fn fetch(&mut self, artist: &str) -> Result<Option<Value>>;
}
