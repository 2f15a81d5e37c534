//! Credentials, cache locations and default parameters.
//!
//! Loaded once from `~/.config/setlist-playlist/config.toml` and overlaid with
//! environment variables; command-line flags win over both.
//!
//! ```toml
//! [setlist_fm]
//! api_key = "..."
//!
//! [spotify]
//! client_id = "..."
//! client_secret = "..."
//! redirect_uri = "http://localhost:8888/callback"
//! username = "..."
//! refresh_token = "..."
//!
//! [cache]
//! setlist_cache = "setlist_cache.json"
//! track_cache = "spotify_cache.json"
//!
//! [defaults]
//! threshold_days = 15
//! max_setlist_length = 12
//! rate_limit_secs = 1.0
//! fuzzy = false
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::freshness::DEFAULT_THRESHOLD_DAYS;

pub const DEFAULT_MAX_SETLIST_LENGTH: usize = 12;
pub const DEFAULT_RATE_LIMIT_SECS: f64 = 1.0;
pub const DEFAULT_SETLIST_CACHE: &str = "setlist_cache.json";
pub const DEFAULT_TRACK_CACHE: &str = "spotify_cache.json";

/// Copy each `$field` of `$src` that is set into `$dst`.
macro_rules! merge_fields {
    ($dst:expr, $src:expr, $($field:ident),+) => {
        $(
            if $src.$field.is_some() {
                $dst.$field = $src.$field.clone();
            }
        )+
    };
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SetlistFmConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpotifyConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub scopes: Option<String>,
}

fn is_set(value: &Option<String>) -> bool {
    value.as_deref().map(|v| !v.is_empty()).unwrap_or(false)
}

impl SpotifyConfig {
    /// Everything needed to refresh a user token.
    pub fn has_user_credentials(&self) -> bool {
        is_set(&self.refresh_token) && is_set(&self.redirect_uri) && is_set(&self.username)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setlist_cache: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_cache: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold_days: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_setlist_length: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit_secs: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fuzzy: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub setlist_fm: SetlistFmConfig,

    #[serde(default)]
    pub spotify: SpotifyConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub defaults: DefaultsConfig,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the config file path (~/.config/setlist-playlist/config.toml)
    pub fn get_config_path() -> Result<PathBuf> {
        let home = std::env::var("HOME")
            .map_err(|_| Error::Config("HOME environment variable not set".to_string()))?;
        Ok(Path::new(&home).join(".config").join("setlist-playlist").join("config.toml"))
    }

    /// Load the config file, or an empty config if there is none.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::new());
        }
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// File config overlaid with the process environment.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.merge(&Self::from_env());
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build a config from environment-style variables.  Empty values count
    /// as unset.
    pub fn from_vars<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        Config {
            setlist_fm: SetlistFmConfig {
                api_key: get("SETLIST_FM_API_KEY"),
            },
            spotify: SpotifyConfig {
                client_id: get("SPOTIFY_CLIENT_ID"),
                client_secret: get("SPOTIFY_CLIENT_SECRET"),
                redirect_uri: get("SPOTIFY_REDIRECT_URI"),
                username: get("SPOTIFY_USERNAME"),
                refresh_token: get("SPOTIFY_REFRESH_TOKEN"),
                scopes: get("SPOTIFY_SCOPES"),
            },
            cache: CacheConfig {
                setlist_cache: get("SETLIST_CACHE"),
                track_cache: get("SPOTIFY_TRACK_CACHE"),
            },
            defaults: DefaultsConfig::default(),
        }
    }

    /// Merge this config with another, preferring values from other
    pub fn merge(&mut self, other: &Config) {
        merge_fields!(self.setlist_fm, other.setlist_fm, api_key);
        merge_fields!(
            self.spotify,
            other.spotify,
            client_id,
            client_secret,
            redirect_uri,
            username,
            refresh_token,
            scopes
        );
        merge_fields!(self.cache, other.cache, setlist_cache, track_cache);
        merge_fields!(
            self.defaults,
            other.defaults,
            threshold_days,
            max_setlist_length,
            rate_limit_secs,
            fuzzy
        );
    }

    /// Check that the credentials for a run are present.
    ///
    /// `require_spotify_user` adds the keys needed to write playlists.
    pub fn validate(&self, require_spotify_user: bool) -> Result<()> {
        let mut missing = Vec::new();

        if !is_set(&self.setlist_fm.api_key) {
            missing.push("SETLIST_FM_API_KEY");
        }
        if !is_set(&self.spotify.client_id) {
            missing.push("SPOTIFY_CLIENT_ID");
        }
        if !is_set(&self.spotify.client_secret) {
            missing.push("SPOTIFY_CLIENT_SECRET");
        }
        if require_spotify_user {
            if !is_set(&self.spotify.redirect_uri) {
                missing.push("SPOTIFY_REDIRECT_URI");
            }
            if !is_set(&self.spotify.username) {
                missing.push("SPOTIFY_USERNAME");
            }
            if !is_set(&self.spotify.refresh_token) {
                missing.push("SPOTIFY_REFRESH_TOKEN");
            }
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::Config(format!("missing {}", missing.join(", "))))
        }
    }

    pub fn threshold_days(&self) -> i64 {
        self.defaults.threshold_days.unwrap_or(DEFAULT_THRESHOLD_DAYS)
    }

    pub fn max_setlist_length(&self) -> usize {
        self.defaults.max_setlist_length.unwrap_or(DEFAULT_MAX_SETLIST_LENGTH)
    }

    pub fn rate_limit_secs(&self) -> f64 {
        self.defaults.rate_limit_secs.unwrap_or(DEFAULT_RATE_LIMIT_SECS)
    }

    pub fn fuzzy(&self) -> bool {
        self.defaults.fuzzy.unwrap_or(false)
    }

    pub fn setlist_cache(&self) -> &str {
        self.cache.setlist_cache.as_deref().unwrap_or(DEFAULT_SETLIST_CACHE)
    }

    pub fn track_cache(&self) -> &str {
        self.cache.track_cache.as_deref().unwrap_or(DEFAULT_TRACK_CACHE)
    }

    /// Print the config in a human-readable format, secrets masked
    pub fn print(&self, title: &str) {
        let mask = |v: &Option<String>| if is_set(v) { "(set)" } else { "(not set)" };

        println!("{}:", title);
        println!("  setlist.fm API key:    {}", mask(&self.setlist_fm.api_key));
        println!("  Spotify client ID:     {}", mask(&self.spotify.client_id));
        println!("  Spotify client secret: {}", mask(&self.spotify.client_secret));
        println!("  Spotify refresh token: {}", mask(&self.spotify.refresh_token));
        if let Some(username) = &self.spotify.username {
            println!("  Spotify user:          {}", username);
        }
        println!("  Setlist cache:         {}", self.setlist_cache());
        println!("  Track cache:           {}", self.track_cache());
        println!("  Threshold:             {} days", self.threshold_days());
        println!("  Max setlist length:    {}", self.max_setlist_length());
        println!("  Rate limit:            {} seconds", self.rate_limit_secs());
        println!("  Fuzzy matching:        {}", if self.fuzzy() { "enabled" } else { "disabled" });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::new();
        assert_eq!(config.threshold_days(), 15);
        assert_eq!(config.max_setlist_length(), 12);
        assert_eq!(config.rate_limit_secs(), 1.0);
        assert!(!config.fuzzy());
        assert_eq!(config.setlist_cache(), "setlist_cache.json");
        assert_eq!(config.track_cache(), "spotify_cache.json");
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config, Config::new());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("config.toml");

        let mut config = Config::new();
        config.setlist_fm.api_key = Some("key".to_string());
        config.defaults.max_setlist_length = Some(20);
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.max_setlist_length(), 20);
    }

    #[test]
    fn test_parse_partial_file() {
        let config: Config = toml::from_str(
            r#"
            [spotify]
            client_id = "abc"

            [defaults]
            fuzzy = true
            "#,
        )
        .unwrap();
        assert_eq!(config.spotify.client_id.as_deref(), Some("abc"));
        assert!(config.fuzzy());
        assert_eq!(config.setlist_fm.api_key, None);
    }

    #[test]
    fn test_env_overlay() {
        let mut config = Config::new();
        config.setlist_fm.api_key = Some("from-file".to_string());
        config.spotify.client_id = Some("file-id".to_string());
        config.defaults.threshold_days = Some(30);

        let env = Config::from_vars(vars(&[
            ("SPOTIFY_CLIENT_ID", "env-id"),
            ("SPOTIFY_CLIENT_SECRET", "env-secret"),
            ("SETLIST_CACHE", "memory"),
            ("SPOTIFY_USERNAME", ""),
        ]));
        config.merge(&env);

        assert_eq!(config.setlist_fm.api_key.as_deref(), Some("from-file"));
        assert_eq!(config.spotify.client_id.as_deref(), Some("env-id"));
        assert_eq!(config.spotify.client_secret.as_deref(), Some("env-secret"));
        assert_eq!(config.spotify.username, None);
        assert_eq!(config.setlist_cache(), "memory");
        assert_eq!(config.threshold_days(), 30);
    }

    #[test]
    fn test_validate_names_missing_keys() {
        let config = Config::from_vars(vars(&[("SETLIST_FM_API_KEY", "k"), ("SPOTIFY_CLIENT_ID", "id")]));
        match config.validate(false) {
            Err(Error::Config(msg)) => {
                assert!(msg.contains("SPOTIFY_CLIENT_SECRET"));
                assert!(!msg.contains("SETLIST_FM_API_KEY"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_validate_user_credentials() {
        let config = Config::from_vars(vars(&[
            ("SETLIST_FM_API_KEY", "k"),
            ("SPOTIFY_CLIENT_ID", "id"),
            ("SPOTIFY_CLIENT_SECRET", "secret"),
        ]));
        assert!(config.validate(false).is_ok());

        let err = config.validate(true).unwrap_err().to_string();
        assert!(err.contains("SPOTIFY_REFRESH_TOKEN"));
        assert!(err.contains("SPOTIFY_USERNAME"));
        assert!(!config.spotify.has_user_credentials());
    }
}
