//! Client configuration parsed from environment variables.

use std::path::PathBuf;
use std::time::Duration;

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const STATE_DIR_NAME: &str = "authdash";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("invalid value for {var}: {value}")]
    InvalidValue { var: &'static str, value: String },
    #[error("no state directory; set AUTHDASH_STATE_DIR")]
    NoStateDir,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Root origin of the auth gateway, without a trailing slash.
    pub base_url: String,
    /// Directory holding the per-origin session documents.
    pub state_dir: PathBuf,
    /// Per-request timeout. `None` leaves requests unbounded.
    pub request_timeout: Option<Duration>,
}

impl Config {
    /// Build typed config from environment variables.
    ///
    /// Optional:
    /// - `AUTHDASH_BASE_URL`: default `http://localhost:8000`
    /// - `AUTHDASH_STATE_DIR`: default `<platform data dir>/authdash`
    /// - `AUTHDASH_REQUEST_TIMEOUT_SECS`: unset or `0` means no timeout
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a value is malformed or no state directory can be found.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Config::from_env`] with an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a value is malformed or no state directory can be found.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = normalize_base_url(lookup("AUTHDASH_BASE_URL").as_deref().unwrap_or(DEFAULT_BASE_URL))?;
        let state_dir = match lookup("AUTHDASH_STATE_DIR").filter(|v| !v.trim().is_empty()) {
            Some(dir) => PathBuf::from(dir),
            None => default_state_dir().ok_or(ConfigError::NoStateDir)?,
        };
        let request_timeout = match lookup("AUTHDASH_REQUEST_TIMEOUT_SECS") {
            Some(raw) => parse_timeout_secs(&raw)?,
            None => None,
        };
        Ok(Self { base_url, state_dir, request_timeout })
    }
}

/// Trim whitespace and trailing slashes; require an http(s) scheme and a host.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidBaseUrl`] for anything that is not an http(s) URL.
pub fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let rest = trimmed
        .strip_prefix("http://")
        .or_else(|| trimmed.strip_prefix("https://"))
        .ok_or_else(|| ConfigError::InvalidBaseUrl(raw.to_owned()))?;
    if rest.is_empty() {
        return Err(ConfigError::InvalidBaseUrl(raw.to_owned()));
    }
    Ok(trimmed.to_owned())
}

/// Request timeout for `secs`; `0` means no timeout.
#[must_use]
pub fn timeout_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

fn parse_timeout_secs(raw: &str) -> Result<Option<Duration>, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .map(timeout_from_secs)
        .map_err(|_| ConfigError::InvalidValue { var: "AUTHDASH_REQUEST_TIMEOUT_SECS", value: raw.to_owned() })
}

fn default_state_dir() -> Option<PathBuf> {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .map(|dir| dir.join(STATE_DIR_NAME))
}
