//! Blocking rate limiter shared by the upstream API clients.
//!
//! Enforces a minimum interval between consecutive requests.  A server-side
//! `Retry-After` is honoured through [`RateLimiter::retry_after`], which sleeps
//! the requested delay and then still applies the minimum interval.
//! [`RateLimiter::send_with_retry`] wraps one request in both.

use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::Result;

/// Used when a 429 carries no usable `Retry-After`.
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 2;

/// `Retry-After` in whole seconds, falling back to the default.
pub fn parse_retry_after(header: Option<&str>) -> Duration {
    let secs = header
        .and_then(|h| h.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
    Duration::from_secs(secs)
}

/// Outcome of one dispatch to an endpoint that may answer HTTP 429.
#[derive(Debug, PartialEq)]
pub enum Throttled<T> {
    Sent(T),
    /// Refused; the server asked to wait this long.
    RateLimited(Duration),
}

/// Enforces a minimum interval between requests.
#[derive(Debug)]
pub struct RateLimiter {
    name: String,
    last_request: Option<Instant>,
    min_interval: Duration,
}

impl RateLimiter {
    /// Create a new rate limiter.
    ///
    /// * `name`: label for log messages (e.g. "setlist.fm")
    /// * `min_interval`: minimum time between requests
    pub fn new(name: &str, min_interval: Duration) -> Self {
        RateLimiter {
            name: name.to_string(),
            last_request: None,
            min_interval,
        }
    }

    /// Convenience: create a rate limiter from an interval in (fractional) seconds.
    /// Zero or negative values produce a limiter that never sleeps.
    pub fn from_secs_f64(name: &str, secs: f64) -> Self {
        if secs <= 0.0 {
            return Self::disabled(name);
        }
        Self::new(name, Duration::from_secs_f64(secs))
    }

    /// A limiter that never waits.
    pub fn disabled(name: &str) -> Self {
        Self::new(name, Duration::ZERO)
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Time still to wait before the next request may be dispatched.
    fn remaining(&self) -> Duration {
        match self.last_request {
            Some(last) => self.min_interval.saturating_sub(last.elapsed()),
            None => Duration::ZERO,
        }
    }

    /// Sleep if not enough time has elapsed since the last request.
    /// Must be called *before* making a request.
    pub fn acquire(&mut self) {
        let wait_time = self.remaining();
        if !wait_time.is_zero() {
            debug!("[{}] Rate limiting: waiting {:.1}s", self.name, wait_time.as_secs_f64());
            thread::sleep(wait_time);
        }
        self.last_request = Some(Instant::now());
    }

    /// Sleep for a server-provided `Retry-After` delay, then acquire as usual.
    pub fn retry_after(&mut self, delay: Duration) {
        if !delay.is_zero() {
            debug!("[{}] Retry-After: sleeping {:.1}s", self.name, delay.as_secs_f64());
            thread::sleep(delay);
        }
        self.acquire();
    }

    /// Acquire, then dispatch.  On a 429 wait the server's delay and dispatch
    /// once more; a second 429 is handed back as `RateLimited`.
    pub fn send_with_retry<T, F>(&mut self, what: &str, mut send: F) -> Result<Throttled<T>>
    where
        F: FnMut() -> Result<Throttled<T>>,
    {
        self.acquire();
        match send()? {
            Throttled::RateLimited(delay) => {
                warn!(
                    "[{}] Rate limited ({}), retrying in {} seconds",
                    self.name,
                    what,
                    delay.as_secs()
                );
                self.retry_after(delay);
                send()
            }
            sent => Ok(sent),
        }
    }
}
