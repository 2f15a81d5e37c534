//! Result types shared by the setlist selection engine, the track resolver
//! and the playlist builder.  All of them serialize to the JSON payload
//! printed by the CLI.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One historical occurrence of a song at a concert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayedSong {
    pub name: String,
    pub date: NaiveDate,
}

impl PlayedSong {
    pub fn new(name: &str, date: NaiveDate) -> Self {
        PlayedSong {
            name: name.to_string(),
            date,
        }
    }
}

/// Whether a band's song list is its literal last setlist or an estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetlistType {
    Fresh,
    Estimated,
}

/// Songs chosen for one band, before track resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct BandSetlistPlan {
    pub band: String,
    /// Ordered, duplicates removed.
    pub songs: Vec<String>,
    pub setlist_type: SetlistType,
    pub setlist_date: Option<NaiveDate>,
    /// Age of the last setlist, clamped to 0.
    pub age_days: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Found,
    NotFound,
}

/// Which step of the resolution cascade produced a [`SongMatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    Exact,
    Fuzzy,
    Discography,
    /// Strict quick search missed; fallback not attempted.
    SearchExactMiss,
    ArtistLookupFailed,
    NotFound,
}

/// Resolution outcome for one requested song.
///
/// `status == Found` exactly when `track_id` is present; use the
/// constructors to keep it that way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongMatch {
    pub name: String,
    pub track_id: Option<String>,
    pub track_url: Option<String>,
    pub status: MatchStatus,
    pub strategy: MatchStrategy,
}

impl SongMatch {
    pub fn found(name: &str, track_id: &str, strategy: MatchStrategy) -> Self {
        SongMatch {
            name: name.to_string(),
            track_id: Some(track_id.to_string()),
            track_url: Some(track_url(track_id)),
            status: MatchStatus::Found,
            strategy,
        }
    }

    pub fn not_found(name: &str, strategy: MatchStrategy) -> Self {
        SongMatch {
            name: name.to_string(),
            track_id: None,
            track_url: None,
            status: MatchStatus::NotFound,
            strategy,
        }
    }

    pub fn is_found(&self) -> bool {
        self.status == MatchStatus::Found
    }
}

/// Public web URL of a catalog track.
pub fn track_url(track_id: &str) -> String {
    format!("https://open.spotify.com/track/{}", track_id)
}

/// Per-band output of a build.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SetlistResult {
    pub band: String,
    pub setlist_type: SetlistType,
    pub setlist_date: Option<NaiveDate>,
    #[serde(rename = "last_setlist_age_days")]
    pub age_days: i64,
    pub songs: Vec<SongMatch>,
    pub missing_songs: Vec<String>,
}

impl SetlistResult {
    pub fn new(plan: &BandSetlistPlan, songs: Vec<SongMatch>) -> Self {
        let missing_songs = songs
            .iter()
            .filter(|s| !s.is_found())
            .map(|s| s.name.clone())
            .collect();
        SetlistResult {
            band: plan.band.clone(),
            setlist_type: plan.setlist_type,
            setlist_date: plan.setlist_date,
            age_days: plan.age_days,
            songs,
            missing_songs,
        }
    }
}

/// A playlist on the streaming service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    pub name: String,
    pub id: String,
    pub url: String,
}

/// Top-level output of [`crate::playlist_builder::PlaylistBuilder::build_playlist`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaylistBuildResult {
    pub setlists: Vec<SetlistResult>,
    pub playlist: Option<Playlist>,
    pub created_playlist: bool,
}

impl PlaylistBuildResult {
    pub fn new(setlists: Vec<SetlistResult>, playlist: Option<Playlist>) -> Self {
        let created_playlist = playlist.is_some();
        PlaylistBuildResult {
            setlists,
            playlist,
            created_playlist,
        }
    }
}
