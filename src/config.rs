//! Client configuration parsed from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_REFRESH_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_TOKEN_PATH: &str = ".lms/session.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
    pub refresh_secs: u64,
}

impl Timeouts {
    #[must_use]
    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    #[must_use]
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    #[must_use]
    pub fn refresh(&self) -> Duration {
        Duration::from_secs(self.refresh_secs)
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            request_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            refresh_secs: DEFAULT_REFRESH_TIMEOUT_SECS,
        }
    }
}

/// Where the credential pair lives between requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenStoreKind {
    /// Process-lifetime storage; tokens vanish on exit.
    Memory,
    /// JSON file that survives restarts.
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub realtime_url: String,
    pub timeouts: Timeouts,
    pub token_store: TokenStoreKind,
}

impl ClientConfig {
    /// Config pointing at `base_url` with default timeouts and in-memory tokens.
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        let base_url = base_url.trim_end_matches('/').to_owned();
        let realtime_url = default_realtime_url(&base_url);
        Self { base_url, realtime_url, timeouts: Timeouts::default(), token_store: TokenStoreKind::Memory }
    }

    /// Build typed client config from environment variables.
    ///
    /// Optional:
    /// - `LMS_BASE_URL`: default `http://127.0.0.1:8080`
    /// - `LMS_REALTIME_URL`: derived from the base URL when absent
    /// - `LMS_REQUEST_TIMEOUT_SECS`: default 30
    /// - `LMS_CONNECT_TIMEOUT_SECS`: default 10
    /// - `LMS_REFRESH_TIMEOUT_SECS`: default 10
    /// - `LMS_TOKEN_STORE`: `memory` (default) or `file`
    /// - `LMS_TOKEN_PATH`: default `.lms/session.json`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for an unknown `LMS_TOKEN_STORE`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ClientConfig::from_env`] but reads values through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for an unknown `LMS_TOKEN_STORE`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup("LMS_BASE_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned())
            .trim_end_matches('/')
            .to_owned();
        let realtime_url = lookup("LMS_REALTIME_URL")
            .filter(|v| !v.trim().is_empty())
            .map_or_else(|| default_realtime_url(&base_url), |v| v.trim_end_matches('/').to_owned());
        let timeouts = Timeouts {
            request_secs: parse_u64(lookup("LMS_REQUEST_TIMEOUT_SECS"), DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: parse_u64(lookup("LMS_CONNECT_TIMEOUT_SECS"), DEFAULT_CONNECT_TIMEOUT_SECS),
            refresh_secs: parse_u64(lookup("LMS_REFRESH_TIMEOUT_SECS"), DEFAULT_REFRESH_TIMEOUT_SECS),
        };
        let token_store = parse_token_store(lookup("LMS_TOKEN_STORE").as_deref(), lookup("LMS_TOKEN_PATH"))?;

        Ok(Self { base_url, realtime_url, timeouts, token_store })
    }

    /// Point at another server. A realtime URL that was derived from the old
    /// base URL follows it; an explicitly configured one is kept.
    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        let base_url = base_url.trim_end_matches('/').to_owned();
        if self.realtime_url == default_realtime_url(&self.base_url) {
            self.realtime_url = default_realtime_url(&base_url);
        }
        self.base_url = base_url;
        self
    }
}

fn parse_u64(raw: Option<String>, default: u64) -> u64 {
    raw.and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

fn parse_token_store(raw: Option<&str>, path: Option<String>) -> Result<TokenStoreKind, ConfigError> {
    match raw.map(str::trim).unwrap_or("memory") {
        "memory" | "" => Ok(TokenStoreKind::Memory),
        "file" => Ok(TokenStoreKind::File(PathBuf::from(
            path.filter(|p| !p.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_TOKEN_PATH.to_owned()),
        ))),
        other => Err(ConfigError::Invalid { key: "LMS_TOKEN_STORE", value: other.to_owned() }),
    }
}

/// Websocket endpoint for a given HTTP base URL.
#[must_use]
pub fn default_realtime_url(base_url: &str) -> String {
    if let Some(rest) = base_url.strip_prefix("https://") {
        return format!("wss://{rest}/ws");
    }
    if let Some(rest) = base_url.strip_prefix("http://") {
        return format!("ws://{rest}/ws");
    }
    format!("{base_url}/ws")
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
