//! Festival placeholders in the band list.
//!
//! A requested band name that matches a registered festival (case-insensitive)
//! is replaced by that festival's lineup.

use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Duration;

use percent_encoding::percent_decode_str;
use regex::Regex;
use tracing::info;

use crate::error::{Error, Result};

/// Resolves a festival name to the bands playing it.
pub trait FestivalResolver {
    /// `Ok(None)` when the lineup is not available.
    fn lineup(&self) -> Result<Option<Vec<String>>>;
}

/// Festival name → resolver.
#[derive(Default)]
pub struct FestivalRegistry {
    resolvers: HashMap<String, Box<dyn FestivalResolver>>,
}

impl FestivalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in festival.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("hellfest", Box::new(HellfestResolver::new()));
        registry
    }

    pub fn register(&mut self, name: &str, resolver: Box<dyn FestivalResolver>) {
        self.resolvers.insert(name.to_lowercase(), resolver);
    }

    pub fn is_festival(&self, name: &str) -> bool {
        self.resolvers.contains_key(&name.to_lowercase())
    }

    /// Expand festival names in `band_names`, keeping the order.
    ///
    /// A festival whose lineup cannot be fetched, or is empty, fails the
    /// whole expansion.
    pub fn resolve_lineup(&self, band_names: &[String]) -> Result<Vec<String>> {
        let mut lineup = Vec::new();

        for name in band_names {
            let resolver = match self.resolvers.get(&name.to_lowercase()) {
                Some(r) => r,
                None => {
                    lineup.push(name.clone());
                    continue;
                }
            };

            let bands = match resolver.lineup() {
                Ok(Some(bands)) if !bands.is_empty() => bands,
                Ok(_) => return Err(Error::FestivalLineup(name.clone())),
                Err(e) => return Err(Error::FestivalLineup(format!("{} ({})", name, e))),
            };

            info!("Resolved festival {} to {} artists", name, bands.len());
            lineup.extend(bands);
        }

        Ok(lineup)
    }
}

// ── Hellfest ─────────────────────────────────────────────────────────────────

pub const HELLFEST_URL: &str = "https://www.hellfest.fr/line-up";

/// Scrapes the Hellfest line-up page.
pub struct HellfestResolver {
    url: String,
    agent: ureq::Agent,
}

impl HellfestResolver {
    pub fn new() -> Self {
        Self::with_url(HELLFEST_URL)
    }

    pub fn with_url(url: &str) -> Self {
        HellfestResolver {
            url: url.to_string(),
            agent: ureq::AgentBuilder::new().timeout(Duration::from_secs(20)).build(),
        }
    }
}

impl Default for HellfestResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl FestivalResolver for HellfestResolver {
    fn lineup(&self) -> Result<Option<Vec<String>>> {
        let response = match self.agent.get(&self.url).call() {
            Ok(r) => r,
            Err(ureq::Error::Status(code, _)) => {
                info!("Hellfest line-up returned HTTP {}", code);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        let body = response.into_string()?;
        Ok(Some(parse_lineup_html(&body)))
    }
}

struct LineupPatterns {
    anchor: Regex,
    class_attr: Regex,
    href_attr: Regex,
    non_word: Regex,
}

impl LineupPatterns {
    /// Compiled on first use and shared afterwards.
    fn get() -> &'static LineupPatterns {
        static PATTERNS: OnceLock<LineupPatterns> = OnceLock::new();
        PATTERNS.get_or_init(|| LineupPatterns {
            anchor: Regex::new(r#"(?is)<a\b[^>]*>"#).expect("anchor pattern"),
            class_attr: Regex::new(r#"(?i)\bclass\s*=\s*["']([^"']*)["']"#).expect("class pattern"),
            href_attr: Regex::new(r#"(?i)\bhref\s*=\s*["']([^"']*)["']"#).expect("href pattern"),
            non_word: Regex::new(r"\W").expect("non-word pattern"),
        })
    }
}

/// Band names from the `a.artist-block` links of the line-up page.
///
/// The name is the second-to-last path segment of the link
/// (`.../artist/Iron%20Maiden/` → `Iron Maiden`), percent-decoded with
/// non-word characters turned into spaces.
pub fn parse_lineup_html(html: &str) -> Vec<String> {
    let patterns = LineupPatterns::get();

    let mut bands = Vec::new();
    for tag in patterns.anchor.find_iter(html) {
        let tag = tag.as_str();

        let is_artist_block = patterns
            .class_attr
            .captures(tag)
            .map(|c| c[1].split_whitespace().any(|cls| cls == "artist-block"))
            .unwrap_or(false);
        if !is_artist_block {
            continue;
        }

        let href = match patterns.href_attr.captures(tag) {
            Some(c) => c[1].to_string(),
            None => continue,
        };

        let segments: Vec<&str> = href.split('/').collect();
        if segments.len() < 2 {
            continue;
        }
        let encoded = segments[segments.len() - 2];
        let decoded = percent_decode_str(encoded).decode_utf8_lossy();
        let name = patterns.non_word.replace_all(&decoded, " ").trim().to_string();
        if !name.is_empty() {
            bands.push(name);
        }
    }

    bands
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    struct StaticLineup {
        bands: Option<Vec<String>>,
        calls: Rc<Cell<usize>>,
    }

    impl FestivalResolver for StaticLineup {
        fn lineup(&self) -> Result<Option<Vec<String>>> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.bands.clone())
        }
    }

    struct Broken;

    impl FestivalResolver for Broken {
        fn lineup(&self) -> Result<Option<Vec<String>>> {
            Err(Error::InvalidInput("offline".to_string()))
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_resolve_lineup_expands_festival_in_place() {
        let calls = Rc::new(Cell::new(0));
        let mut registry = FestivalRegistry::new();
        registry.register(
            "hellfest",
            Box::new(StaticLineup { bands: Some(names(&["Gojira", "Mastodon"])), calls: calls.clone() }),
        );

        let lineup = registry.resolve_lineup(&names(&["Opeth", "HellFest", "Tool"])).unwrap();
        assert_eq!(lineup, names(&["Opeth", "Gojira", "Mastodon", "Tool"]));
        assert_eq!(calls.get(), 1);
        assert!(registry.is_festival("HELLFEST"));
        assert!(!registry.is_festival("Opeth"));
    }

    #[test]
    fn test_empty_or_missing_lineup_fails() {
        let mut registry = FestivalRegistry::new();
        registry.register("empty", Box::new(StaticLineup { bands: Some(vec![]), calls: Rc::default() }));
        registry.register("gone", Box::new(StaticLineup { bands: None, calls: Rc::default() }));
        registry.register("broken", Box::new(Broken));

        for festival in ["empty", "gone", "broken"] {
            let err = registry.resolve_lineup(&names(&["Opeth", festival])).unwrap_err();
            assert!(matches!(err, Error::FestivalLineup(_)), "{}", festival);
        }
    }

    #[test]
    fn test_no_festivals() {
        let registry = FestivalRegistry::new();
        assert_eq!(registry.resolve_lineup(&names(&["A", "B"])).unwrap(), names(&["A", "B"]));
        assert!(registry.resolve_lineup(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_parse_lineup_html() {
        let html = r#"
            <div class="lineup">
              <a class="artist-block big" href="https://www.hellfest.fr/artist/Iron%20Maiden/">
                <span>Iron Maiden</span></a>
              <a href="/artist/Bl%C3%BCt-Aus-Nord/" class="artist-block">Blut</a>
              <a class="menu" href="/tickets/">Tickets</a>
              <a class="artist-block" href="/artist/Mot%C3%B6rhead/">Motörhead</a>
            </div>"#;
        assert_eq!(parse_lineup_html(html), names(&["Iron Maiden", "Blüt Aus Nord", "Motörhead"]));
    }

    #[test]
    fn test_parse_lineup_html_without_artists() {
        assert!(parse_lineup_html("<html><body>Soon</body></html>").is_empty());
    }

    #[test]
    fn test_lineup_patterns_compiled_once() {
        assert!(std::ptr::eq(LineupPatterns::get(), LineupPatterns::get()));

        let html = r#"<a class="artist-block" href="/artist/Gojira/">Gojira</a>"#;
        for _ in 0..3 {
            assert_eq!(parse_lineup_html(html), names(&["Gojira"]));
        }
    }
}
