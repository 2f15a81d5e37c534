//! Recency-weighted per-occurrence features.
//!
//! Each played song gets an exponential-decay weight (`decay ^ (days / 30)`)
//! plus its position within that date's performance, which the estimator
//! uses to pick openers, closers and the songs in between.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::models::PlayedSong;

/// Decay applied per 30 days of age.
pub const DEFAULT_DECAY_RATE: f64 = 0.9;

/// Coarse position of a song within its set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PositionBin {
    Start,
    Middle,
    End,
}

impl PositionBin {
    /// Slot labels in set order.
    pub const LABELS: [PositionBin; 3] = [PositionBin::Start, PositionBin::Middle, PositionBin::End];

    /// Bucket a normalized position: `[0, 0.2]` → Start, `(0.2, 0.8]` → Middle,
    /// `(0.8, 1]` → End.
    pub fn from_normalized(p: f64) -> Self {
        if p <= 0.2 {
            PositionBin::Start
        } else if p <= 0.8 {
            PositionBin::Middle
        } else {
            PositionBin::End
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SongFeature {
    pub name: String,
    pub date: NaiveDate,
    pub weight: f64,
    /// 1-based rank within the date's performance.
    pub position: usize,
    pub set_size: usize,
    pub is_first: bool,
    pub is_last: bool,
    pub normalized_position: f64,
    pub position_bin: PositionBin,
}

/// Recency weight of a play `days_since` days ago.
pub fn recency_weight(decay_rate: f64, days_since: i64) -> f64 {
    decay_rate.powf(days_since as f64 / 30.0)
}

/// Derive features for every occurrence, relative to `today`.
///
/// Songs are grouped by date; their order within a date is the order in
/// `history`.
pub fn derive_song_features(history: &[PlayedSong], decay_rate: f64, today: NaiveDate) -> Vec<SongFeature> {
    let mut set_sizes: HashMap<NaiveDate, usize> = HashMap::new();
    for song in history {
        *set_sizes.entry(song.date).or_default() += 1;
    }

    let mut seen: HashMap<NaiveDate, usize> = HashMap::new();
    history
        .iter()
        .map(|song| {
            let counter = seen.entry(song.date).or_default();
            *counter += 1;
            let position = *counter;
            let set_size = set_sizes[&song.date];
            let normalized_position = position as f64 / set_size as f64;
            let days_since = (today - song.date).num_days();

            SongFeature {
                name: song.name.clone(),
                date: song.date,
                weight: recency_weight(decay_rate, days_since),
                position,
                set_size,
                is_first: position == 1,
                is_last: position == set_size,
                normalized_position,
                position_bin: PositionBin::from_normalized(normalized_position),
            }
        })
        .collect()
}
