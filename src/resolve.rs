//! Song title → catalog track resolution.
//!
//! Resolution is a cascade of increasingly expensive strategies:
//!
//! 1. **Quick search** for `"{song} {artist}"` (cached).  Strict mode needs
//!    the normalized title to be equal, fuzzy mode only needs it to contain
//!    the requested song.
//! 2. In strict mode a miss ends here ([`MatchStrategy::SearchExactMiss`]).
//! 3. **Discography scan** (fuzzy only): look the artist up, walk their albums
//!    and singles and take the first track whose title contains the song.
//!
//! Upstream errors never abort a build; they degrade to the matching
//! not-found outcome.

use std::collections::HashSet;

use tracing::{debug, info, warn};
use unicode_normalization::UnicodeNormalization;

use crate::cache::Cache;
use crate::catalog::{search_candidates, CatalogSearchSource, CatalogTrack};
use crate::error::Result;
use crate::models::{MatchStrategy, SongMatch};

/// Candidates requested from the quick search.
pub const SEARCH_LIMIT: usize = 50;
/// Albums + singles listed during the discography scan.
pub const ALBUM_LIMIT: usize = 50;

/// NFKD-decompose, drop everything non-ASCII and lowercase.
/// `"Motörhead"` → `"motorhead"`.
pub fn normalize(s: &str) -> String {
    s.nfkd().filter(|c| c.is_ascii()).collect::<String>().to_lowercase()
}

/// Title comparison for the given mode: substring when fuzzy, equality otherwise.
fn title_matches(track_norm: &str, song_norm: &str, fuzzy: bool) -> bool {
    if fuzzy {
        track_norm.contains(song_norm)
    } else {
        track_norm == song_norm
    }
}

/// First candidate (in API order) matching `song` by `artist`.
///
/// The artist check is always a substring test, in both modes.
pub fn match_track<'a>(candidates: &'a [CatalogTrack], song: &str, artist: &str, fuzzy: bool) -> Option<&'a CatalogTrack> {
    let song_norm = normalize(song);
    let artist_norm = normalize(artist);

    candidates.iter().find(|track| {
        title_matches(&normalize(&track.name), &song_norm, fuzzy)
            && track.artists.iter().any(|a| normalize(a).contains(&artist_norm))
    })
}

/// Resolves songs against a catalog, caching quick-search responses.
pub struct TrackResolver<C> {
    catalog: C,
    cache: Box<dyn Cache>,
}

impl<C: CatalogSearchSource> TrackResolver<C> {
    pub fn new(catalog: C, cache: Box<dyn Cache>) -> Self {
        TrackResolver { catalog, cache }
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn catalog_mut(&mut self) -> &mut C {
        &mut self.catalog
    }

    /// Flush the quick-search cache.
    pub fn persist_cache(&mut self) -> Result<()> {
        self.cache.persist()
    }

    /// Quick-search candidates for `query`, from cache when possible.
    fn quick_search(&mut self, query: &str) -> Vec<CatalogTrack> {
        if let Some(cached) = self.cache.get(query) {
            info!("Using cache for {}", query);
            return search_candidates(&cached);
        }

        match self.catalog.search_tracks(query, SEARCH_LIMIT) {
            Ok(results) => {
                let candidates = search_candidates(&results);
                self.cache.set(query, results);
                candidates
            }
            Err(e) => {
                warn!("Track search failed for {:?}: {}", query, e);
                Vec::new()
            }
        }
    }

    /// Walk the artist's albums and singles for a track containing `song`.
    fn search_discography(&mut self, artist_id: &str, song: &str) -> Option<String> {
        let song_norm = normalize(song);

        let albums = match self.catalog.list_albums(artist_id, ALBUM_LIMIT) {
            Ok(a) => a,
            Err(e) => {
                warn!("Listing albums of {} failed: {}", artist_id, e);
                return None;
            }
        };

        let mut seen_albums = HashSet::new();
        let mut seen_tracks = HashSet::new();

        for album_id in albums {
            if !seen_albums.insert(album_id.clone()) {
                continue;
            }

            let tracks = match self.catalog.list_tracks(&album_id) {
                Ok(t) => t,
                Err(e) => {
                    warn!("Listing tracks of album {} failed: {}", album_id, e);
                    continue;
                }
            };

            for track in tracks {
                if !seen_tracks.insert(track.id.clone()) {
                    continue;
                }
                if title_matches(&normalize(&track.name), &song_norm, true) {
                    debug!("Discography hit: {} in album {}", track.name, album_id);
                    return Some(track.id);
                }
            }
        }

        None
    }

    /// Resolve one song of `artist`.
    pub fn resolve(&mut self, song: &str, artist: &str, fuzzy: bool) -> SongMatch {
        let query = format!("{} {}", song, artist);
        let candidates = self.quick_search(&query);

        if let Some(track) = match_track(&candidates, song, artist, fuzzy) {
            let strategy = if fuzzy { MatchStrategy::Fuzzy } else { MatchStrategy::Exact };
            return SongMatch::found(song, &track.id, strategy);
        }

        if !fuzzy {
            warn!("No exact match in search results for {} - {} (fuzzy off)", artist, song);
            return SongMatch::not_found(song, MatchStrategy::SearchExactMiss);
        }

        warn!("No match in search results for {} - {}, trying discography", artist, song);

        let artist_id = match self.catalog.search_artist(artist) {
            Ok(Some(a)) => a.id,
            Ok(None) => {
                warn!("Artist not found: {}", artist);
                return SongMatch::not_found(song, MatchStrategy::ArtistLookupFailed);
            }
            Err(e) => {
                warn!("Artist search failed for {}: {}", artist, e);
                return SongMatch::not_found(song, MatchStrategy::ArtistLookupFailed);
            }
        };

        match self.search_discography(&artist_id, song) {
            Some(track_id) => SongMatch::found(song, &track_id, MatchStrategy::Discography),
            None => {
                warn!("No match found anywhere for {} - {}", artist, song);
                SongMatch::not_found(song, MatchStrategy::NotFound)
            }
        }
    }

    /// Resolve every song of one band, in order.
    pub fn map_tracks(&mut self, artist: &str, songs: &[String], fuzzy: bool) -> Vec<SongMatch> {
        let matches = songs.iter().map(|song| self.resolve(song, artist, fuzzy)).collect();
        info!("Finished mapping tracks for {}", artist);
        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::catalog::ArtistCandidate;
    use crate::error::Error;
    use crate::models::MatchStatus;
    use serde_json::{json, Value};
    use std::collections::HashMap;

    /// In-memory catalog that counts calls.
    #[derive(Default)]
    struct FakeCatalog {
        search_results: Vec<CatalogTrack>,
        artist: Option<ArtistCandidate>,
        albums: Vec<String>,
        album_tracks: HashMap<String, Vec<CatalogTrack>>,
        fail_search: bool,
        search_calls: usize,
        artist_calls: usize,
        album_calls: usize,
        track_calls: usize,
    }

    impl CatalogSearchSource for FakeCatalog {
        fn search_tracks(&mut self, _query: &str, _limit: usize) -> Result<Value> {
            self.search_calls += 1;
            if self.fail_search {
                return Err(Error::RateLimited("search".to_string()));
            }
            let items: Vec<Value> = self
                .search_results
                .iter()
                .map(|t| {
                    json!({
                        "id": t.id,
                        "name": t.name,
                        "artists": t.artists.iter().map(|a| json!({"name": a})).collect::<Vec<_>>(),
                    })
                })
                .collect();
            Ok(json!({"tracks": {"items": items}}))
        }

        fn search_artist(&mut self, _name: &str) -> Result<Option<ArtistCandidate>> {
            self.artist_calls += 1;
            Ok(self.artist.clone())
        }

        fn list_albums(&mut self, _artist_id: &str, _limit: usize) -> Result<Vec<String>> {
            self.album_calls += 1;
            Ok(self.albums.clone())
        }

        fn list_tracks(&mut self, album_id: &str) -> Result<Vec<CatalogTrack>> {
            self.track_calls += 1;
            Ok(self.album_tracks.get(album_id).cloned().unwrap_or_default())
        }
    }

    fn resolver(catalog: FakeCatalog) -> TrackResolver<FakeCatalog> {
        TrackResolver::new(catalog, Box::new(MemoryCache::new()))
    }

    fn yes_catalog(track_name: &str) -> FakeCatalog {
        FakeCatalog {
            search_results: vec![CatalogTrack::new("t1", track_name, &["Yes"])],
            ..Default::default()
        }
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("Motörhead"), "motorhead");
        assert_eq!(normalize("Beyoncé"), "beyonce");
        assert_eq!(normalize("ROUNDABOUT"), "roundabout");
        assert_eq!(normalize("日本"), "");
    }

    #[test]
    fn test_exact_match() {
        let mut r = resolver(yes_catalog("Roundabout"));
        let m = r.resolve("Roundabout", "Yes", false);
        assert_eq!(m.status, MatchStatus::Found);
        assert_eq!(m.strategy, MatchStrategy::Exact);
        assert_eq!(m.track_id.as_deref(), Some("t1"));
    }

    #[test]
    fn test_strict_rejects_superstring() {
        let mut r = resolver(yes_catalog("Roundabout (Live)"));
        let m = r.resolve("Roundabout", "Yes", false);
        assert_eq!(m.status, MatchStatus::NotFound);
        assert_eq!(m.strategy, MatchStrategy::SearchExactMiss);
        // Strict mode never reaches the discography
        assert_eq!(r.catalog().artist_calls, 0);
        assert_eq!(r.catalog().album_calls, 0);
    }

    #[test]
    fn test_fuzzy_accepts_superstring() {
        let mut r = resolver(yes_catalog("Roundabout (Live)"));
        let m = r.resolve("Roundabout", "Yes", true);
        assert_eq!(m.status, MatchStatus::Found);
        assert_eq!(m.strategy, MatchStrategy::Fuzzy);
        assert_eq!(r.catalog().artist_calls, 0);
    }

    #[test]
    fn test_artist_is_substring_checked() {
        let tracks = vec![
            CatalogTrack::new("a", "Roundabout", &["Someone Else"]),
            CatalogTrack::new("b", "Roundabout", &["Orchestra", "Yes (Tribute)"]),
            CatalogTrack::new("c", "Roundabout", &["Yes"]),
        ];
        assert_eq!(match_track(&tracks, "Roundabout", "yes", false).map(|t| t.id.as_str()), Some("b"));
        assert_eq!(match_track(&tracks, "Roundabout", "Genesis", true), None);
    }

    #[test]
    fn test_first_candidate_in_api_order_wins() {
        let tracks = vec![
            CatalogTrack::new("1", "Roundabout - Remastered", &["Yes"]),
            CatalogTrack::new("2", "Roundabout", &["Yes"]),
        ];
        assert_eq!(match_track(&tracks, "Roundabout", "Yes", true).map(|t| t.id.as_str()), Some("1"));
        assert_eq!(match_track(&tracks, "Roundabout", "Yes", false).map(|t| t.id.as_str()), Some("2"));
    }

    #[test]
    fn test_fully_non_ascii_song_is_a_fuzzy_substring() {
        // "メギツネ" normalizes to "", which every title contains
        let tracks = vec![CatalogTrack::new("1", "Gimme Chocolate!!", &["BABYMETAL"])];
        assert_eq!(match_track(&tracks, "メギツネ", "BABYMETAL", true).map(|t| t.id.as_str()), Some("1"));
        assert_eq!(match_track(&tracks, "メギツネ", "BABYMETAL", false), None);
    }

    #[test]
    fn test_discography_fallback() {
        let mut album_tracks = HashMap::new();
        album_tracks.insert(
            "al1".to_string(),
            vec![CatalogTrack::new("x1", "Siberian Khatru", &["Yes"])],
        );
        album_tracks.insert(
            "al2".to_string(),
            vec![
                CatalogTrack::new("x1", "Siberian Khatru", &["Yes"]),
                CatalogTrack::new("x2", "Heart of the Sunrise - 2003 Remaster", &["Yes"]),
            ],
        );
        let catalog = FakeCatalog {
            artist: Some(ArtistCandidate { id: "yes".to_string(), name: "Yes".to_string() }),
            albums: vec!["al1".to_string(), "al1".to_string(), "al2".to_string()],
            album_tracks,
            ..Default::default()
        };
        let mut r = resolver(catalog);

        let m = r.resolve("Heart of the Sunrise", "Yes", true);
        assert_eq!(m.strategy, MatchStrategy::Discography);
        assert_eq!(m.track_id.as_deref(), Some("x2"));
        // Duplicate album ID listed once
        assert_eq!(r.catalog().track_calls, 2);
    }

    #[test]
    fn test_discography_exhausted() {
        let catalog = FakeCatalog {
            artist: Some(ArtistCandidate { id: "yes".to_string(), name: "Yes".to_string() }),
            albums: vec!["al1".to_string()],
            ..Default::default()
        };
        let mut r = resolver(catalog);
        let m = r.resolve("Unknown Song", "Yes", true);
        assert_eq!(m.status, MatchStatus::NotFound);
        assert_eq!(m.strategy, MatchStrategy::NotFound);
    }

    #[test]
    fn test_artist_lookup_failed() {
        let mut r = resolver(FakeCatalog::default());
        let m = r.resolve("Roundabout", "Nobody", true);
        assert_eq!(m.strategy, MatchStrategy::ArtistLookupFailed);
        assert_eq!(r.catalog().artist_calls, 1);
        assert_eq!(r.catalog().album_calls, 0);
    }

    #[test]
    fn test_discography_only_after_quick_search_miss() {
        let mut catalog = yes_catalog("Roundabout");
        catalog.artist = Some(ArtistCandidate { id: "yes".to_string(), name: "Yes".to_string() });
        let mut r = resolver(catalog);
        r.resolve("Roundabout", "Yes", true);
        assert_eq!(r.catalog().artist_calls, 0);

        r.resolve("Long Distance Runaround", "Yes", true);
        assert_eq!(r.catalog().artist_calls, 1);
    }

    #[test]
    fn test_second_resolution_hits_cache() {
        let mut r = resolver(yes_catalog("Roundabout"));
        let first = r.resolve("Roundabout", "Yes", false);
        let second = r.resolve("Roundabout", "Yes", false);
        assert_eq!(first, second);
        assert_eq!(r.catalog().search_calls, 1);
    }

    #[test]
    fn test_search_error_degrades_to_miss() {
        let mut catalog = yes_catalog("Roundabout");
        catalog.fail_search = true;
        let mut r = resolver(catalog);
        let m = r.resolve("Roundabout", "Yes", false);
        assert_eq!(m.strategy, MatchStrategy::SearchExactMiss);

        // Failures are not cached
        r.resolve("Roundabout", "Yes", false);
        assert_eq!(r.catalog().search_calls, 2);
    }

    #[test]
    fn test_map_tracks_preserves_order() {
        let catalog = FakeCatalog {
            search_results: vec![
                CatalogTrack::new("t1", "Roundabout", &["Yes"]),
                CatalogTrack::new("t2", "Starship Trooper", &["Yes"]),
            ],
            ..Default::default()
        };
        let mut r = resolver(catalog);
        let songs = vec!["Starship Trooper".to_string(), "Roundabout".to_string(), "Nope".to_string()];
        let matches = r.map_tracks("Yes", &songs, false);
        let ids: Vec<Option<&str>> = matches.iter().map(|m| m.track_id.as_deref()).collect();
        assert_eq!(ids, vec![Some("t2"), Some("t1"), None]);
    }
}
