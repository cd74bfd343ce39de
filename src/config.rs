//! Console configuration parsed from environment variables.
//!
//! SYSTEM CONTEXT
//! ==============
//! The CLI loads `.env` first, then builds these structs; explicit flags
//! override whatever they carry. Library code never reads the environment
//! outside this module.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:5050";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_HYDRATION_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_DEV_ADDR: &str = "0.0.0.0:5173";
pub const DEFAULT_DEV_STATIC_DIR: &str = "dist";
pub const DEFAULT_DEV_PROXY_PREFIX: &str = "/api";

const SESSION_DIR: &str = ".kbconsole";
const SESSION_FILE: &str = "session.json";
const FALLBACK_SESSION_FILE: &str = ".kbconsole-session.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config parse failed: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleConfig {
    pub api_url: String,
    pub timeouts: HttpTimeouts,
    /// `None` waits on the current-user fetch indefinitely.
    pub hydration_timeout: Option<Duration>,
    pub session_file: PathBuf,
}

impl ConsoleConfig {
    /// Build typed console config from environment variables.
    ///
    /// Optional:
    /// - `KB_API_URL`: backend origin, default `http://127.0.0.1:5050`
    /// - `KB_REQUEST_TIMEOUT_SECS`: default 30
    /// - `KB_CONNECT_TIMEOUT_SECS`: default 10
    /// - `KB_HYDRATION_TIMEOUT_SECS`: default 10, `0` disables the timeout
    /// - `KB_SESSION_FILE`: default `$HOME/.kbconsole/session.json`
    #[must_use]
    pub fn from_env() -> Self {
        let timeouts = HttpTimeouts {
            request_secs: env_parse_u64("KB_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: env_parse_u64("KB_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
        };
        let hydration_secs = env_parse_u64("KB_HYDRATION_TIMEOUT_SECS", DEFAULT_HYDRATION_TIMEOUT_SECS);
        let session_file = env_string("KB_SESSION_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| default_session_file(env_string("HOME")));

        Self {
            api_url: api_url_from_env(),
            timeouts,
            hydration_timeout: hydration_timeout(hydration_secs),
            session_file,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevServerConfig {
    pub addr: SocketAddr,
    pub static_dir: PathBuf,
    /// Requests whose path starts with this prefix go upstream.
    pub proxy_prefix: String,
    pub upstream: String,
}

impl DevServerConfig {
    /// Build dev-server config from environment variables.
    ///
    /// Optional:
    /// - `KB_DEV_ADDR`: listen address, default `0.0.0.0:5173`
    /// - `KB_DEV_STATIC_DIR`: built front-end directory, default `dist`
    /// - `KB_DEV_PROXY_PREFIX`: default `/api`
    /// - `KB_API_URL`: proxy upstream
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when `KB_DEV_ADDR` is not a socket address.
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw_addr = env_string("KB_DEV_ADDR").unwrap_or_else(|| DEFAULT_DEV_ADDR.to_owned());
        let addr = parse_addr(&raw_addr)?;
        let static_dir = env_string("KB_DEV_STATIC_DIR").unwrap_or_else(|| DEFAULT_DEV_STATIC_DIR.to_owned());
        let proxy_prefix = normalize_prefix(
            &env_string("KB_DEV_PROXY_PREFIX").unwrap_or_else(|| DEFAULT_DEV_PROXY_PREFIX.to_owned()),
        );

        Ok(Self { addr, static_dir: PathBuf::from(static_dir), proxy_prefix, upstream: api_url_from_env() })
    }
}

/// Parse a listen address such as `0.0.0.0:5173`.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] on malformed input.
pub fn parse_addr(raw: &str) -> Result<SocketAddr, ConfigError> {
    raw.trim()
        .parse::<SocketAddr>()
        .map_err(|e| ConfigError::Parse(format!("invalid listen address '{raw}': {e}")))
}

/// Trim whitespace and trailing slashes from a base URL.
#[must_use]
pub fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_owned()
}

fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with('/') { trimmed.to_owned() } else { format!("/{trimmed}") }
}

fn api_url_from_env() -> String {
    normalize_base_url(&env_string("KB_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_owned()))
}

fn hydration_timeout(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

fn default_session_file(home: Option<String>) -> PathBuf {
    match home {
        Some(home) => PathBuf::from(home).join(SESSION_DIR).join(SESSION_FILE),
        None => PathBuf::from(FALLBACK_SESSION_FILE),
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn env_parse_u64(key: &str, default: u64) -> u64 {
    env_string(key)
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
