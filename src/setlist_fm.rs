//! setlist.fm REST client.
//!
//! Only the artist setlist search is used: the first page of
//! `search/setlists?artistName=…` holds the 20 most recent events, which is
//! plenty for estimating the next show.  Responses are cached verbatim keyed
//! by artist name.

use std::time::Duration;

use serde_json::Value;
use tracing::{error, info, warn};

use crate::cache::Cache;
use crate::catalog::SetlistSource;
use crate::error::{Error, Result};
use crate::rate_limiter::{parse_retry_after, RateLimiter, Throttled};

pub const API_BASE: &str = "https://api.setlist.fm/rest/1.0";

const USER_AGENT: &str = concat!("setlist-playlist/", env!("CARGO_PKG_VERSION"));

/// One search request: the body, `None` for a non-2xx answer, or a 429.
type Attempt = Throttled<Option<Value>>;

pub struct SetlistFmClient {
    api_key: String,
    base_url: String,
    cache: Box<dyn Cache>,
    rate_limiter: RateLimiter,
    agent: ureq::Agent,
}

impl SetlistFmClient {
    pub fn new(api_key: &str, cache: Box<dyn Cache>, rate_limiter: RateLimiter) -> Self {
        SetlistFmClient {
            api_key: api_key.to_string(),
            base_url: API_BASE.to_string(),
            cache,
            rate_limiter,
            agent: ureq::AgentBuilder::new()
                .timeout(Duration::from_secs(20))
                .user_agent(USER_AGENT)
                .build(),
        }
    }

    /// Point the client at another server (mirrors, local proxies).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn persist_cache(&mut self) -> Result<()> {
        self.cache.persist()
    }

    fn search_url(&self) -> String {
        format!("{}/search/setlists", self.base_url)
    }
}

/// One GET of the search endpoint.
fn get_setlists(agent: &ureq::Agent, url: &str, api_key: &str, artist: &str) -> Result<Attempt> {
    let result = agent
        .get(url)
        .query("artistName", artist)
        .query("p", "1")
        .set("x-api-key", api_key)
        .set("Accept", "application/json")
        .call();

    match result {
        Ok(response) => Ok(Throttled::Sent(Some(response.into_json()?))),
        Err(ureq::Error::Status(429, response)) => {
            Ok(Throttled::RateLimited(parse_retry_after(response.header("Retry-After"))))
        }
        Err(ureq::Error::Status(code, response)) => {
            let body = response.into_string().unwrap_or_default();
            error!("Failed to fetch setlists for {}: HTTP {} {}", artist, code, body);
            Ok(Throttled::Sent(None))
        }
        Err(e) => Err(e.into()),
    }
}

/// Rate-limited fetch with a single retry on 429; bodies are cached by artist.
fn fetch_with<F>(cache: &mut dyn Cache, rate_limiter: &mut RateLimiter, artist: &str, attempt: F) -> Result<Option<Value>>
where
    F: FnMut() -> Result<Attempt>,
{
    match rate_limiter.send_with_retry(artist, attempt)? {
        Throttled::Sent(Some(setlists)) => {
            cache.set(artist, setlists.clone());
            Ok(Some(setlists))
        }
        Throttled::Sent(None) => Ok(None),
        Throttled::RateLimited(_) => {
            warn!("Still rate limited fetching setlists for {}, giving up", artist);
            Ok(None)
        }
    }
}

impl SetlistSource for SetlistFmClient {
    fn fetch(&mut self, artist: &str) -> Result<Option<Value>> {
        if let Some(cached) = self.cache.get(artist) {
            info!("Using cached setlist for {}", artist);
            return Ok(Some(cached));
        }

        if self.api_key.is_empty() {
            return Err(Error::Config("SETLIST_FM_API_KEY not configured".to_string()));
        }

        let url = self.search_url();
        let agent = &self.agent;
        let api_key = self.api_key.as_str();
        fetch_with(self.cache.as_mut(), &mut self.rate_limiter, artist, || {
            get_setlists(agent, &url, api_key, artist)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use serde_json::json;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;

    /// Replays canned attempts, counting how many were made.
    fn scripted(outcomes: Vec<Attempt>) -> (RefCell<VecDeque<Attempt>>, Cell<usize>) {
        (RefCell::new(outcomes.into()), Cell::new(0))
    }

    #[test]
    fn test_429_then_success_is_retried_and_cached() {
        let mut cache = MemoryCache::new();
        let mut limiter = RateLimiter::disabled("test");
        let (script, calls) = scripted(vec![
            Throttled::RateLimited(Duration::ZERO),
            Throttled::Sent(Some(json!({"setlist": [{"id": "1"}]}))),
        ]);

        let result = fetch_with(&mut cache, &mut limiter, "Opeth", || {
            calls.set(calls.get() + 1);
            Ok(script.borrow_mut().pop_front().unwrap())
        })
        .unwrap();

        assert_eq!(result, Some(json!({"setlist": [{"id": "1"}]})));
        assert_eq!(calls.get(), 2);
        assert_eq!(cache.get("Opeth"), Some(json!({"setlist": [{"id": "1"}]})));
    }

    #[test]
    fn test_second_429_gives_up_without_caching() {
        let mut cache = MemoryCache::new();
        let mut limiter = RateLimiter::disabled("test");
        let (script, calls) = scripted(vec![
            Throttled::RateLimited(Duration::ZERO),
            Throttled::RateLimited(Duration::ZERO),
            Throttled::Sent(Some(json!({"setlist": []}))),
        ]);

        let result = fetch_with(&mut cache, &mut limiter, "Opeth", || {
            calls.set(calls.get() + 1);
            Ok(script.borrow_mut().pop_front().unwrap())
        })
        .unwrap();

        assert_eq!(result, None);
        assert_eq!(calls.get(), 2);
        assert_eq!(cache.get("Opeth"), None);
    }

    #[test]
    fn test_error_status_is_empty_without_retry() {
        let mut cache = MemoryCache::new();
        let mut limiter = RateLimiter::disabled("test");
        let (script, calls) = scripted(vec![Throttled::Sent(None), Throttled::Sent(Some(json!({})))]);

        let result = fetch_with(&mut cache, &mut limiter, "Opeth", || {
            calls.set(calls.get() + 1);
            Ok(script.borrow_mut().pop_front().unwrap())
        })
        .unwrap();

        assert_eq!(result, None);
        assert_eq!(calls.get(), 1);
        assert_eq!(cache.get("Opeth"), None);
    }

    #[test]
    fn test_cached_artist_skips_network() {
        let mut cache = MemoryCache::new();
        cache.set("Opeth", json!({"setlist": []}));
        // No API key: any network attempt would fail with a config error
        let mut client = SetlistFmClient::new("", Box::new(cache), RateLimiter::disabled("test"));
        assert_eq!(client.fetch("Opeth").unwrap(), Some(json!({"setlist": []})));
    }

    #[test]
    fn test_missing_api_key() {
        let mut client = SetlistFmClient::new("", Box::new(MemoryCache::new()), RateLimiter::disabled("test"));
        assert!(matches!(client.fetch("Opeth"), Err(Error::Config(_))));
    }

    #[test]
    fn test_base_url_override() {
        let client = SetlistFmClient::new("k", Box::new(MemoryCache::new()), RateLimiter::disabled("test"))
            .with_base_url("http://localhost:8080/rest/1.0/");
        assert_eq!(client.search_url(), "http://localhost:8080/rest/1.0/search/setlists");
    }
}
