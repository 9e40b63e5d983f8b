//! Configuration loader for the `madrid-o3-monitor` service.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). Nothing else in the crate calls `env::var`.
//!
use std::{env, net::SocketAddr, time::Duration};

use anyhow::{anyhow, Result};

/// Parse an optional integer environment variable with a default value.
macro_rules! parse_env_u32 {
    ($var_name:expr, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<u32>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse an optional boolean environment variable (`1|true|yes` / `0|false|no`).
macro_rules! parse_env_bool {
    ($var_name:expr, $default:expr) => {
        match env::var($var_name).ok().as_deref().map(str::to_ascii_lowercase).as_deref() {
            None => $default,
            Some("1") | Some("true") | Some("yes") => true,
            Some("0") | Some("false") | Some("no") => false,
            Some(other) => return Err(anyhow!("Invalid {}: '{}'", $var_name, other)),
        }
    };
}

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// Listen address.
    pub bind_addr: SocketAddr,

    /// Upstream feed URL; `None` means synthetic data only.
    pub feed_url: Option<String>,

    /// Bearer token for the feed.
    pub feed_token: Option<String>,

    /// Skip the feed and always use synthetic frames.
    pub feed_force_mock: bool,

    /// Hours of frames requested per ingest.
    pub feed_window_hours: u32,

    pub feed_timeout: Duration,

    /// Maximum number of feed pages to fetch (safety limit).
    pub feed_max_pages: u32,

    pub changelog_capacity: usize,

    pub episode_capacity: usize,

    /// Allow `?demo=` scenarios, which bypass debounce.
    pub demo_enabled: bool,

    /// Background ingest period; `None` disables the loop.
    pub ingest_interval: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            feed_url: None,
            feed_token: None,
            feed_force_mock: false,
            feed_window_hours: 48,
            feed_timeout: Duration::from_secs(60),
            feed_max_pages: 100,
            changelog_capacity: 100,
            episode_capacity: 50,
            demo_enabled: false,
            ingest_interval: None,
        }
    }
}

/// Load configuration from environment variables with defaults.
///
/// Optional:
/// - `BIND_ADDR` – listen address (default: 0.0.0.0:8080)
/// - `FEED_URL` / `FEED_TOKEN` – upstream feed and its bearer token
/// - `FEED_FORCE_MOCK` – use synthetic frames only (default: false)
/// - `FEED_WINDOW_HOURS` – hours requested per ingest (default: 48)
/// - `FEED_TIMEOUT_SECS` – feed HTTP timeout (default: 60)
/// - `FEED_MAX_PAGES` – max feed pages to fetch (default: 100)
/// - `CHANGELOG_CAPACITY` – change-log ring size (default: 100)
/// - `EPISODE_CAPACITY` – episode-snapshot ring size (default: 50)
/// - `DEMO_ENABLED` – allow demo scenarios (default: false)
/// - `INGEST_INTERVAL_SECS` – background ingest period, 0 disables (default: 0)
///
/// Returns an error if any variable is present but invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let defaults = Config::default();

    let bind_addr = match env::var("BIND_ADDR") {
        Ok(v) => v
            .parse::<SocketAddr>()
            .map_err(|e| anyhow!("Invalid BIND_ADDR: {}", e))?,
        Err(_) => defaults.bind_addr,
    };
    let feed_url = env::var("FEED_URL").ok().filter(|v| !v.is_empty());
    let feed_token = env::var("FEED_TOKEN").ok().filter(|v| !v.is_empty());
    let feed_force_mock = parse_env_bool!("FEED_FORCE_MOCK", defaults.feed_force_mock);
    let feed_window_hours = parse_env_u32!("FEED_WINDOW_HOURS", defaults.feed_window_hours);
    let feed_timeout_secs = parse_env_u32!("FEED_TIMEOUT_SECS", 60);
    let feed_max_pages = parse_env_u32!("FEED_MAX_PAGES", defaults.feed_max_pages);
    let changelog_capacity = parse_env_u32!("CHANGELOG_CAPACITY", 100);
    let episode_capacity = parse_env_u32!("EPISODE_CAPACITY", 50);
    let demo_enabled = parse_env_bool!("DEMO_ENABLED", defaults.demo_enabled);
    let ingest_interval_secs = parse_env_u32!("INGEST_INTERVAL_SECS", 0);

    if feed_window_hours == 0 {
        return Err(anyhow!("FEED_WINDOW_HOURS must be at least 1"));
    }

    Ok(Config {
        bind_addr,
        feed_url,
        feed_token,
        feed_force_mock,
        feed_window_hours,
        feed_timeout: Duration::from_secs(u64::from(feed_timeout_secs)),
        feed_max_pages,
        changelog_capacity: changelog_capacity as usize,
        episode_capacity: episode_capacity as usize,
        demo_enabled,
        ingest_interval: (ingest_interval_secs > 0)
            .then(|| Duration::from_secs(u64::from(ingest_interval_secs))),
    })
}

impl Config {
    /// Log the loaded configuration for debugging purposes.
    ///
    /// The feed token is never printed, only whether one is set.
    pub fn log_config(&self) {
        // ---
        let feed_url = self.feed_url.as_deref().unwrap_or("(none, synthetic data)");
        let feed_token = if self.feed_token.is_some() { "****" } else { "(none)" };
        let interval = self
            .ingest_interval
            .map(|d| format!("{}s", d.as_secs()))
            .unwrap_or_else(|| "disabled".to_string());

        tracing::info!("Configuration loaded:");
        tracing::info!("  BIND_ADDR            : {}", self.bind_addr);
        tracing::info!("  FEED_URL             : {}", feed_url);
        tracing::info!("  FEED_TOKEN           : {}", feed_token);
        tracing::info!("  FEED_FORCE_MOCK      : {}", self.feed_force_mock);
        tracing::info!("  FEED_WINDOW_HOURS    : {}", self.feed_window_hours);
        tracing::info!("  FEED_TIMEOUT_SECS    : {}", self.feed_timeout.as_secs());
        tracing::info!("  FEED_MAX_PAGES       : {}", self.feed_max_pages);
        tracing::info!("  CHANGELOG_CAPACITY   : {}", self.changelog_capacity);
        tracing::info!("  EPISODE_CAPACITY     : {}", self.episode_capacity);
        tracing::info!("  DEMO_ENABLED         : {}", self.demo_enabled);
        tracing::info!("  INGEST_INTERVAL_SECS : {}", interval);
    }
}
