//! End-to-end playlist build.
//!
//! For each band of the (festival-expanded) lineup:
//!
//! 1. fetch its recent setlists and flatten them into a play history,
//! 2. take the last setlist as-is when it is fresh, otherwise estimate one,
//! 3. resolve every song to a catalog track.
//!
//! Bands without usable data are logged and skipped.  Optionally the resolved
//! tracks are written, in lineup order, to a named playlist.

use std::collections::HashSet;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::catalog::{CatalogSearchSource, PlaylistSink, SetlistSource};
use crate::error::{Error, Result};
use crate::estimator::extract_smart_setlist;
use crate::features::DEFAULT_DECAY_RATE;
use crate::freshness::{self, DEFAULT_THRESHOLD_DAYS};
use crate::lineup::FestivalRegistry;
use crate::models::{BandSetlistPlan, Playlist, PlaylistBuildResult, SetlistResult, SetlistType};
use crate::resolve::TrackResolver;
use crate::setlist::{extract_last_setlist, extract_played_songs};

/// Maximum tracks per playlist append call.
pub const PLAYLIST_BATCH_SIZE: usize = 100;

/// Parameters of one build.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildRequest {
    /// Bands or festival names, in playlist order.
    pub band_names: Vec<String>,
    pub playlist_name: Option<String>,
    pub threshold_days: i64,
    pub max_setlist_length: usize,
    /// `Some(true)` always estimates, `Some(false)` always uses the last setlist.
    pub force_smart: Option<bool>,
    pub fuzzy: bool,
    pub create_playlist: bool,
}

impl BuildRequest {
    pub fn new(band_names: Vec<String>) -> Self {
        BuildRequest {
            band_names,
            playlist_name: None,
            threshold_days: DEFAULT_THRESHOLD_DAYS,
            max_setlist_length: crate::config::DEFAULT_MAX_SETLIST_LENGTH,
            force_smart: None,
            fuzzy: false,
            create_playlist: false,
        }
    }
}

/// Keep the first occurrence of every name.
fn dedupe(songs: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    songs.into_iter().filter(|s| seen.insert(s.clone())).collect()
}

pub struct PlaylistBuilder<S, C> {
    setlists: S,
    resolver: TrackResolver<C>,
    festivals: FestivalRegistry,
    today: NaiveDate,
    decay_rate: f64,
}

impl<S, C> PlaylistBuilder<S, C>
where
    S: SetlistSource,
    C: CatalogSearchSource + PlaylistSink,
{
    pub fn new(setlists: S, resolver: TrackResolver<C>) -> Self {
        PlaylistBuilder {
            setlists,
            resolver,
            festivals: FestivalRegistry::new(),
            today: chrono::Local::now().date_naive(),
            decay_rate: DEFAULT_DECAY_RATE,
        }
    }

    pub fn with_festivals(mut self, festivals: FestivalRegistry) -> Self {
        self.festivals = festivals;
        self
    }

    /// Reference date for setlist ages and recency weights.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn with_decay_rate(mut self, decay_rate: f64) -> Self {
        self.decay_rate = decay_rate;
        self
    }

    pub fn setlists_mut(&mut self) -> &mut S {
        &mut self.setlists
    }

    pub fn resolver(&self) -> &TrackResolver<C> {
        &self.resolver
    }

    pub fn resolver_mut(&mut self) -> &mut TrackResolver<C> {
        &mut self.resolver
    }

    /// Pick the songs for one band, or `None` when it has no usable data.
    pub fn collect_band_songs(
        &mut self,
        band: &str,
        threshold_days: i64,
        max_setlist_length: usize,
        force_smart: Option<bool>,
    ) -> Option<BandSetlistPlan> {
        let setlists = match self.setlists.fetch(band) {
            Ok(Some(s)) => s,
            Ok(None) => {
                warn!("No setlists found for {}", band);
                return None;
            }
            Err(e) => {
                warn!("Fetching setlists for {} failed: {}", band, e);
                return None;
            }
        };

        let history = match extract_played_songs(&setlists) {
            Ok(h) => h,
            Err(e) => {
                warn!("Skipping {}: {}", band, e);
                return None;
            }
        };

        let (last_songs, last_date) = match extract_last_setlist(&history) {
            Some(last) => last,
            None => {
                warn!("No songs found in setlists for {}", band);
                return None;
            }
        };

        let age_days = freshness::setlist_age_days(last_date, self.today);
        let setlist_type = freshness::decide(age_days, threshold_days, force_smart);

        let songs = match setlist_type {
            SetlistType::Estimated => {
                info!(
                    "{}: Last setlist {} is {} days old. Smart setlist will be used.",
                    band, last_date, age_days
                );
                extract_smart_setlist(&history, max_setlist_length, self.decay_rate, self.today)
            }
            SetlistType::Fresh => {
                info!("{}: Last setlist {} is fresh. Using last setlist.", band, last_date);
                last_songs
            }
        };
        let songs = dedupe(songs);

        if songs.is_empty() {
            warn!("{}: no songs selected", band);
            return None;
        }

        info!("{}: {} songs", band, songs.len());
        Some(BandSetlistPlan {
            band: band.to_string(),
            songs,
            setlist_type,
            setlist_date: Some(last_date),
            age_days: freshness::reported_age(age_days),
        })
    }

    /// Run a full build.
    pub fn build_playlist(&mut self, request: &BuildRequest) -> Result<PlaylistBuildResult> {
        let playlist_name = match (&request.playlist_name, request.create_playlist) {
            (Some(name), true) if !name.is_empty() => Some(name.as_str()),
            (_, true) => {
                return Err(Error::InvalidInput(
                    "playlist name is required when creating a playlist".to_string(),
                ))
            }
            (_, false) => None,
        };

        if request.band_names.is_empty() {
            return Err(Error::InvalidInput("no bands given".to_string()));
        }

        let lineup = self.festivals.resolve_lineup(&request.band_names)?;
        info!("Bands in lineup: {}", lineup.join(", "));

        let plans: Vec<BandSetlistPlan> = lineup
            .iter()
            .filter_map(|band| {
                self.collect_band_songs(
                    band,
                    request.threshold_days,
                    request.max_setlist_length,
                    request.force_smart,
                )
            })
            .collect();

        if plans.is_empty() {
            return Err(Error::NoSongs);
        }

        let setlists: Vec<SetlistResult> = plans
            .iter()
            .map(|plan| {
                let matches = self.resolver.map_tracks(&plan.band, &plan.songs, request.fuzzy);
                SetlistResult::new(plan, matches)
            })
            .collect();

        let playlist = match playlist_name {
            Some(name) => {
                let playlist = self.resolver.catalog_mut().find_or_create(name)?;
                self.populate_playlist(&playlist, &setlists)?;
                Some(playlist)
            }
            None => None,
        };

        Ok(PlaylistBuildResult::new(setlists, playlist))
    }

    /// Clear `playlist`, then append every resolved track in order.
    pub fn populate_playlist(&mut self, playlist: &Playlist, setlists: &[SetlistResult]) -> Result<()> {
        let sink = self.resolver.catalog_mut();
        sink.replace_items(&playlist.id, &[])?;

        let track_ids: Vec<String> = setlists
            .iter()
            .flat_map(|s| s.songs.iter())
            .filter_map(|m| m.track_id.clone())
            .collect();

        for batch in track_ids.chunks(PLAYLIST_BATCH_SIZE) {
            sink.add_items(&playlist.id, batch)?;
        }

        info!("Added {} tracks to playlist {}", track_ids.len(), playlist.name);
        Ok(())
    }
}
