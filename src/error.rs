//! Error types for setlist-playlist.

use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Missing or invalid credentials/settings. Raised before any processing.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid request parameter (empty lineup, missing playlist name, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Transport or non-2xx status from an upstream API
    #[error("HTTP error: {0}")]
    Http(Box<ureq::Error>),

    /// Upstream kept answering 429 after the single retry
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Token endpoint refused the credentials
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// The setlist payload has no top-level event list
    #[error("Malformed setlist data: {0}")]
    MalformedSetlists(String),

    /// A named festival resolved to nothing
    #[error("Failed to get lineup for festival: {0}")]
    FestivalLineup(String),

    /// Not a single band in the lineup produced songs
    #[error("No songs gathered for any bands in lineup")]
    NoSongs,
}

impl From<ureq::Error> for Error {
    fn from(e: ureq::Error) -> Self {
        Error::Http(Box::new(e))
    }
}
