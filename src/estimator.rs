//! Smart setlist estimation from recency-weighted play history.
//!
//! The estimate starts with the most likely opener, fills the middle slots
//! from per-position-bin weighted frequencies and ends with the most likely
//! closer.  Every weighted-max selection breaks ties on the lexicographically
//! smallest song name so that the output is deterministic.
//!
//! The bin for middle slot `i` is `LABELS[i / length]`.  Since `i < length`
//! that is always `Start`; this mirrors the historical behaviour and is kept
//! on purpose.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::features::{derive_song_features, PositionBin, SongFeature};
use crate::models::PlayedSong;

/// Sum weights per song name.
fn sum_weights<'a, I>(features: I) -> HashMap<&'a str, f64>
where
    I: IntoIterator<Item = &'a SongFeature>,
{
    let mut totals: HashMap<&str, f64> = HashMap::new();
    for f in features {
        *totals.entry(f.name.as_str()).or_default() += f.weight;
    }
    totals
}

/// Heavier first; equal weights ordered by name.
fn by_weight_then_name(a: (&str, f64), b: (&str, f64)) -> Ordering {
    b.1.partial_cmp(&a.1)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.0.cmp(b.0))
}

/// Names sorted by descending total weight.
fn rank(totals: &HashMap<&str, f64>) -> Vec<String> {
    let mut entries: Vec<(&str, f64)> = totals.iter().map(|(n, w)| (*n, *w)).collect();
    entries.sort_by(|a, b| by_weight_then_name(*a, *b));
    entries.into_iter().map(|(n, _)| n.to_string()).collect()
}

/// Heaviest name not in `exclude`.
fn pick_max(totals: &HashMap<&str, f64>, exclude: &HashSet<String>) -> Option<String> {
    totals
        .iter()
        .filter(|(name, _)| !exclude.contains(**name))
        .map(|(n, w)| (*n, *w))
        .min_by(|a, b| by_weight_then_name(*a, *b))
        .map(|(n, _)| n.to_string())
}

fn first_unused(ranking: &[String], used: &HashSet<String>) -> Option<String> {
    ranking.iter().find(|n| !used.contains(*n)).cloned()
}

/// Estimate a setlist of at most `length` distinct songs from `features`.
pub fn estimate_setlist(features: &[SongFeature], length: usize) -> Vec<String> {
    if features.is_empty() || length == 0 {
        if features.is_empty() {
            warn!("No song data available to build smart setlist");
        }
        return Vec::new();
    }

    let overall = rank(&sum_weights(features));

    let no_exclusions = HashSet::new();
    let first_weights = sum_weights(features.iter().filter(|f| f.is_first));
    let opener = match pick_max(&first_weights, &no_exclusions) {
        Some(name) => name,
        None => overall[0].clone(),
    };

    let mut used: HashSet<String> = HashSet::new();
    used.insert(opener.clone());

    let last_weights = sum_weights(features.iter().filter(|f| f.is_last));
    let closer = pick_max(&last_weights, &used).or_else(|| first_unused(&overall, &used));
    if let Some(ref c) = closer {
        used.insert(c.clone());
    }

    let mut bin_weights: HashMap<PositionBin, HashMap<&str, f64>> = HashMap::new();
    for f in features {
        *bin_weights
            .entry(f.position_bin)
            .or_default()
            .entry(f.name.as_str())
            .or_default() += f.weight;
    }

    let mut setlist = vec![opener];

    for i in 2..length {
        let bin = PositionBin::LABELS[(i / length).min(PositionBin::LABELS.len() - 1)];

        let from_bin = bin_weights.get(&bin).and_then(|w| pick_max(w, &used));
        let song = match from_bin {
            Some(s) => s,
            None => {
                debug!("Position bin {:?} has no candidates, falling back to overall weights", bin);
                match first_unused(&overall, &used) {
                    Some(s) => s,
                    None => break,
                }
            }
        };

        used.insert(song.clone());
        setlist.push(song);
    }

    if let Some(closer) = closer {
        if !setlist.contains(&closer) && setlist.len() < length {
            setlist.push(closer);
        }
    }

    setlist
}

/// Derive features from `history` and estimate a setlist of at most `length` songs.
pub fn extract_smart_setlist(
    history: &[PlayedSong],
    length: usize,
    decay_rate: f64,
    today: NaiveDate,
) -> Vec<String> {
    let features = derive_song_features(history, decay_rate, today);
    estimate_setlist(&features, length)
}
