//! Spotify Web API client.
//!
//! Two tokens are used:
//!
//! * a **client-credentials** token for catalog search and discography
//!   browsing, which needs no user;
//! * a **user** token obtained from a stored refresh token, needed to list,
//!   create and fill the user's playlists.
//!
//! Both are requested from the accounts service with HTTP Basic auth and
//! reused until shortly before they expire.

use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::catalog::{parse_tracks, ArtistCandidate, CatalogSearchSource, CatalogTrack, PlaylistSink};
use crate::config::SpotifyConfig;
use crate::error::{Error, Result};
use crate::models::Playlist;
use crate::rate_limiter::{parse_retry_after, RateLimiter, Throttled};

pub const API_BASE: &str = "https://api.spotify.com/v1";
pub const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
pub const DEFAULT_SCOPES: &str = "playlist-modify-public";

/// Tokens this close to expiry are refreshed.
const EXPIRY_MARGIN: Duration = Duration::from_secs(30);

// ── API response types ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ApiToken {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct ApiPage<T> {
    #[serde(default)]
    items: Vec<Option<T>>,
}

#[derive(Debug, Deserialize)]
struct ApiArtistSearch {
    artists: ApiPage<ApiArtist>,
}

#[derive(Debug, Deserialize)]
struct ApiArtist {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct ApiAlbum {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ApiPlaylist {
    id: String,
    name: String,
    #[serde(default)]
    external_urls: ApiExternalUrls,
}

#[derive(Debug, Default, Deserialize)]
struct ApiExternalUrls {
    spotify: Option<String>,
}

impl From<ApiPlaylist> for Playlist {
    fn from(p: ApiPlaylist) -> Self {
        let url = p
            .external_urls
            .spotify
            .unwrap_or_else(|| format!("https://open.spotify.com/playlist/{}", p.id));
        Playlist { name: p.name, id: p.id, url }
    }
}

// ── Tokens ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: Instant,
}

impl AccessToken {
    fn is_fresh(&self) -> bool {
        Instant::now() + EXPIRY_MARGIN < self.expires_at
    }
}

/// `Authorization` header value for the token endpoint.
fn basic_auth(client_id: &str, client_secret: &str) -> String {
    format!("Basic {}", BASE64.encode(format!("{}:{}", client_id, client_secret)))
}

/// `spotify:track:{id}` URIs for the playlist endpoints.
pub fn track_uris(track_ids: &[String]) -> Vec<String> {
    track_ids.iter().map(|id| format!("spotify:track:{}", id)).collect()
}

/// Credentials needed to act on behalf of a user.
#[derive(Debug, Clone)]
struct UserCredentials {
    username: String,
    refresh_token: String,
    scopes: String,
}

pub struct SpotifyClient {
    client_id: String,
    client_secret: String,
    user: Option<UserCredentials>,
    agent: ureq::Agent,
    rate_limiter: RateLimiter,
    app_token: Option<AccessToken>,
    user_token: Option<AccessToken>,
}

/// Send one API request through the limiter.  A 429 is retried once after
/// the server's `Retry-After`; a second one is an error.
fn dispatch<F>(rate_limiter: &mut RateLimiter, what: &str, mut send: F) -> Result<ureq::Response>
where
    F: FnMut() -> std::result::Result<ureq::Response, ureq::Error>,
{
    let outcome = rate_limiter.send_with_retry(what, || match send() {
        Err(ureq::Error::Status(429, response)) => {
            Ok(Throttled::RateLimited(parse_retry_after(response.header("Retry-After"))))
        }
        other => Ok(Throttled::Sent(other?)),
    })?;

    match outcome {
        Throttled::Sent(response) => Ok(response),
        Throttled::RateLimited(_) => Err(Error::RateLimited(what.to_string())),
    }
}

impl SpotifyClient {
    /// Build a client from configuration.  Client ID and secret are
    /// required; user credentials only for playlist operations.
    pub fn from_config(config: &SpotifyConfig) -> Result<Self> {
        let client_id = config
            .client_id
            .clone()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::Config("SPOTIFY_CLIENT_ID not configured".to_string()))?;
        let client_secret = config
            .client_secret
            .clone()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::Config("SPOTIFY_CLIENT_SECRET not configured".to_string()))?;

        let user = if config.has_user_credentials() {
            Some(UserCredentials {
                username: config.username.clone().unwrap_or_default(),
                refresh_token: config.refresh_token.clone().unwrap_or_default(),
                scopes: config.scopes.clone().unwrap_or_else(|| DEFAULT_SCOPES.to_string()),
            })
        } else {
            None
        };

        Ok(SpotifyClient {
            client_id,
            client_secret,
            user,
            agent: ureq::AgentBuilder::new().timeout(Duration::from_secs(20)).build(),
            rate_limiter: RateLimiter::disabled("Spotify"),
            app_token: None,
            user_token: None,
        })
    }

    pub fn with_rate_limiter(mut self, rate_limiter: RateLimiter) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    /// Whether playlist operations are possible.
    pub fn can_modify_playlists(&self) -> bool {
        self.user.is_some()
    }

    fn request_token(&self, form: &[(&str, &str)]) -> Result<AccessToken> {
        let result = self
            .agent
            .post(TOKEN_URL)
            .set("Authorization", &basic_auth(&self.client_id, &self.client_secret))
            .send_form(form);

        let response = match result {
            Ok(r) => r,
            Err(ureq::Error::Status(code, response)) => {
                let body = response.into_string().unwrap_or_default();
                return Err(Error::Auth(format!("token endpoint returned HTTP {}: {}", code, body)));
            }
            Err(e) => return Err(e.into()),
        };

        let token: ApiToken = response.into_json()?;
        Ok(AccessToken {
            value: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        })
    }

    /// Token for catalog reads.  A valid user token works too.
    fn app_token(&mut self) -> Result<String> {
        if let Some(token) = self.user_token.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.value.clone());
        }
        if let Some(token) = self.app_token.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.value.clone());
        }

        debug!("Requesting client-credentials token");
        let token = self.request_token(&[("grant_type", "client_credentials")])?;
        let value = token.value.clone();
        self.app_token = Some(token);
        Ok(value)
    }

    fn user_token(&mut self) -> Result<String> {
        if let Some(token) = self.user_token.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.value.clone());
        }

        let user = self.user.clone().ok_or_else(|| {
            Error::Config("Spotify refresh token, redirect URI and username are required for playlist creation".to_string())
        })?;

        debug!("Refreshing user token for {}", user.username);
        let token = self.request_token(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", user.refresh_token.as_str()),
            ("scope", user.scopes.as_str()),
        ])?;
        let value = token.value.clone();
        self.user_token = Some(token);
        Ok(value)
    }

    fn get_json(&mut self, path: &str, query: &[(&str, &str)], user: bool) -> Result<Value> {
        let token = if user { self.user_token()? } else { self.app_token()? };
        let url = format!("{}{}", API_BASE, path);
        let auth = format!("Bearer {}", token);

        let agent = &self.agent;
        let response = dispatch(&mut self.rate_limiter, path, || {
            let mut request = agent.get(&url).set("Authorization", &auth);
            for (k, v) in query {
                request = request.query(k, v);
            }
            request.call()
        })?;
        Ok(response.into_json()?)
    }

    fn send_user_json(&mut self, method: &str, path: &str, body: Value) -> Result<Value> {
        let token = self.user_token()?;
        let url = format!("{}{}", API_BASE, path);
        let auth = format!("Bearer {}", token);

        let agent = &self.agent;
        let response = dispatch(&mut self.rate_limiter, path, || {
            agent
                .request(method, &url)
                .set("Authorization", &auth)
                .send_json(body.clone())
        })?;
        Ok(response.into_json()?)
    }
}

impl CatalogSearchSource for SpotifyClient {
    fn search_tracks(&mut self, query: &str, limit: usize) -> Result<Value> {
        let limit = limit.to_string();
        self.get_json("/search", &[("q", query), ("type", "track"), ("limit", limit.as_str())], false)
    }

    fn search_artist(&mut self, name: &str) -> Result<Option<ArtistCandidate>> {
        let raw = self.get_json("/search", &[("q", name), ("type", "artist"), ("limit", "1")], false)?;
        let result: ApiArtistSearch = serde_json::from_value(raw)?;
        Ok(result
            .artists
            .items
            .into_iter()
            .flatten()
            .next()
            .map(|a| ArtistCandidate { id: a.id, name: a.name }))
    }

    fn list_albums(&mut self, artist_id: &str, limit: usize) -> Result<Vec<String>> {
        let limit = limit.to_string();
        let path = format!("/artists/{}/albums", artist_id);
        let raw = self.get_json(&path, &[("include_groups", "album,single"), ("limit", limit.as_str())], false)?;
        let page: ApiPage<ApiAlbum> = serde_json::from_value(raw)?;
        Ok(page.items.into_iter().flatten().map(|a| a.id).collect())
    }

    fn list_tracks(&mut self, album_id: &str) -> Result<Vec<CatalogTrack>> {
        let path = format!("/albums/{}/tracks", album_id);
        let raw = self.get_json(&path, &[("limit", "50")], false)?;
        let items = raw.get("items").and_then(Value::as_array).cloned().unwrap_or_default();
        Ok(parse_tracks(&items))
    }
}

impl PlaylistSink for SpotifyClient {
    fn find_or_create(&mut self, name: &str) -> Result<Playlist> {
        let raw = self.get_json("/me/playlists", &[("limit", "50")], true)?;
        let page: ApiPage<ApiPlaylist> = serde_json::from_value(raw)?;
        if let Some(existing) = page.items.into_iter().flatten().find(|p| p.name == name) {
            return Ok(existing.into());
        }

        info!("Playlist {} not found, will create", name);
        let username = self.user.as_ref().map(|u| u.username.clone()).unwrap_or_default();
        let path = format!("/users/{}/playlists", username);
        let created = self.send_user_json("POST", &path, json!({ "name": name, "public": true }))?;
        let playlist: ApiPlaylist = serde_json::from_value(created)?;
        Ok(playlist.into())
    }

    fn replace_items(&mut self, playlist_id: &str, track_ids: &[String]) -> Result<()> {
        let path = format!("/playlists/{}/tracks", playlist_id);
        self.send_user_json("PUT", &path, json!({ "uris": track_uris(track_ids) }))?;
        Ok(())
    }

    fn add_items(&mut self, playlist_id: &str, track_ids: &[String]) -> Result<()> {
        let path = format!("/playlists/{}/tracks", playlist_id);
        self.send_user_json("POST", &path, json!({ "uris": track_uris(track_ids) }))?;
        Ok(())
    }
}
