//! Flattening of setlist.fm search results into a song-occurrence history.
//!
//! A setlist.fm response looks like:
//!
//! ```json
//! {
//!   "setlist": [
//!     {
//!       "eventDate": "25-03-2024",
//!       "url": "https://www.setlist.fm/setlist/...",
//!       "sets": { "set": [ { "song": [ { "name": "Intro", "tape": true }, { "name": "Dawn" } ] } ] }
//!     }
//!   ]
//! }
//! ```
//!
//! Only the absence of the top-level `setlist` list is an error; bad entries
//! are skipped with a diagnostic.

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::models::PlayedSong;

/// Day-first date format used by setlist.fm (`dd-mm-yyyy`).
const EVENT_DATE_FORMAT: &str = "%d-%m-%Y";

#[derive(Debug, Deserialize)]
struct ApiEvent {
    #[serde(rename = "eventDate")]
    event_date: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    sets: ApiSets,
}

#[derive(Debug, Default, Deserialize)]
struct ApiSets {
    #[serde(default)]
    set: Vec<ApiSet>,
}

#[derive(Debug, Deserialize)]
struct ApiSet {
    #[serde(default)]
    song: Vec<ApiSong>,
}

#[derive(Debug, Deserialize)]
struct ApiSong {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    tape: bool,
}

/// Parse a setlist.fm event date.
pub fn parse_event_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), EVENT_DATE_FORMAT).ok()
}

/// Flatten every performed song of every event, in event order and
/// within-event order.
pub fn extract_played_songs(setlists: &Value) -> Result<Vec<PlayedSong>> {
    let events = setlists
        .get("setlist")
        .and_then(|v| v.as_array())
        .ok_or_else(|| Error::MalformedSetlists("missing top-level \"setlist\" list".to_string()))?;

    let mut played = Vec::new();

    for (event_i, raw_event) in events.iter().enumerate() {
        let event: ApiEvent = match serde_json::from_value(raw_event.clone()) {
            Ok(e) => e,
            Err(e) => {
                warn!("Skipping malformed event {}: {}", event_i, e);
                continue;
            }
        };
        let url = event.url.as_deref().unwrap_or("?");

        let date = match parse_event_date(&event.event_date) {
            Some(d) => d,
            None => {
                warn!("Unparseable event date {:?} on {}", event.event_date, url);
                continue;
            }
        };

        for (set_i, set) in event.sets.set.iter().enumerate() {
            if set.song.is_empty() {
                warn!("No songs in set {} on {} {}", set_i, event.event_date, url);
                continue;
            }

            for song in &set.song {
                let name = match song.name.as_deref().map(str::trim) {
                    Some(n) if !n.is_empty() => n,
                    _ => {
                        warn!("No song name in set {} on {} {}", set_i, event.event_date, url);
                        continue;
                    }
                };

                if song.tape {
                    info!("{} is a tape, ignoring", name);
                    continue;
                }

                played.push(PlayedSong::new(name, date));
            }
        }
    }

    Ok(played)
}

/// The songs played on the most recent date in `history`, in played order.
pub fn extract_last_setlist(history: &[PlayedSong]) -> Option<(Vec<String>, NaiveDate)> {
    let last_date = history.iter().map(|s| s.date).max()?;
    let songs: Vec<String> = history
        .iter()
        .filter(|s| s.date == last_date)
        .map(|s| s.name.clone())
        .collect();

    if songs.len() < 5 {
        info!("Less than 5 songs played on {}", last_date);
    }

    Some((songs, last_date))
}
