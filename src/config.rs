//! Configuration and settings management
//!
//! Loads settings from config files and environment variables and defines
//! the tunables used by the IMDb, auto-kick and posting plugins.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    pub telegram_token: String,

    /// R2 Storage access key ID
    pub r2_access_key_id: Option<String>,
    /// R2 Storage secret access key
    pub r2_secret_access_key: Option<String>,
    /// R2 Storage endpoint URL
    pub r2_endpoint_url: Option<String>,
    /// R2 Storage bucket name
    pub r2_bucket_name: Option<String>,

    /// Headless-rendering solver used when IMDb hides its metadata.
    /// An empty value disables the solver stage.
    #[serde(default = "default_solver_api_url")]
    pub solver_api_url: String,

    /// Picture attached to the search and settings menus
    #[serde(default = "default_imdb_splash_image")]
    pub imdb_splash_image: String,
}

fn default_solver_api_url() -> String {
    "https://solver.pika.web.id/".to_string()
}

fn default_imdb_splash_image() -> String {
    "https://img.yasirweb.eu.org/file/270955ef0d1a8a16831a9.jpg".to_string()
}

/// Build the layered configuration source shared by every settings struct.
///
/// # Errors
///
/// Returns a `ConfigError` if one of the sources cannot be read.
pub fn build_config() -> Result<Config, ConfigError> {
    let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

    Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
        // Local overrides, not checked into git
        .add_source(File::with_name("config/local").required(false))
        // Eg.. `APP_SOLVER_API_URL=... ./target/app`
        .add_source(Environment::with_prefix("APP").separator("__"))
        // Plain UPPER_SNAKE_CASE variables; empty values count as unset
        .add_source(Environment::default().ignore_empty(true))
        .build()
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use katy_bot::config::Settings;
    ///
    /// let settings = Settings::new().expect("Failed to load configuration");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        let mut settings: Self = build_config()?.try_deserialize()?;

        // Fallback: read the R2 variables directly if the mapping missed them
        fill_from_env(&mut settings.r2_endpoint_url, "R2_ENDPOINT_URL");
        fill_from_env(&mut settings.r2_access_key_id, "R2_ACCESS_KEY_ID");
        fill_from_env(&mut settings.r2_secret_access_key, "R2_SECRET_ACCESS_KEY");
        fill_from_env(&mut settings.r2_bucket_name, "R2_BUCKET_NAME");

        Ok(settings)
    }

    /// Solver endpoint, or `None` when the solver stage is disabled
    #[must_use]
    pub fn solver_url(&self) -> Option<&str> {
        let url = self.solver_api_url.trim();
        if url.is_empty() {
            None
        } else {
            Some(url)
        }
    }
}

fn fill_from_env(slot: &mut Option<String>, key: &str) {
    if slot.is_none() {
        if let Ok(val) = std::env::var(key) {
            if !val.is_empty() {
                *slot = Some(val);
            }
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

// IMDb lookup
/// Lifetime of a pending search query waiting for a language choice
pub const CANDIDATE_TTL_SECS: u64 = 15;
/// Upper bound of pending search queries kept in memory
pub const CANDIDATE_CACHE_MAX_SIZE: u64 = 10_000;
/// Timeout of the direct page request and suggestion API
pub const IMDB_HTTP_TIMEOUT_SECS: u64 = 20;
/// Timeout of a single challenge-solving scraper request
pub const IMDB_SCRAPER_TIMEOUT_SECS: u64 = 30;
/// Timeout of the headless solver proxy
pub const IMDB_SOLVER_TIMEOUT_SECS: u64 = 60;
/// Blocked attempts tolerated before the final scraper request
pub const IMDB_SCRAPER_ATTEMPTS: u32 = 3;
/// Number of cast members shown in a caption
pub const IMDB_CAST_LIMIT: usize = 10;
/// Maximum length of a custom caption template
pub const IMDB_TEMPLATE_MAX_CHARS: usize = 3500;
/// Maximum length of the credit line override
pub const IMDB_CREDIT_MAX_CHARS: usize = 64;

/// Browser user agent presented to IMDb
pub const IMDB_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
/// Accept-Language presented to IMDb
pub const IMDB_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

// Auto-kick
/// Delay (minutes) used when `/auto_kick` is called without one.
/// 720 minutes = 12 hours.
pub const AUTO_KICK_DEFAULT_MINUTES: i64 = 720;
/// Longest accepted delay: one year
pub const AUTO_KICK_MAX_MINUTES: i64 = 525_600;
/// Interval between scans for due kicks
pub const AUTO_KICK_POLL_SECS: u64 = 60;

// Telegram API retries
/// Initial backoff for Telegram API retries
pub const TELEGRAM_API_INITIAL_BACKOFF_MS: u64 = 500;
/// Maximum backoff for Telegram API retries
pub const TELEGRAM_API_MAX_BACKOFF_MS: u64 = 4000;
/// Number of Telegram API retries
pub const TELEGRAM_API_MAX_RETRIES: usize = 3;

/// Get the pending-search lifetime from env or default.
///
/// Environment variable: `IMDB_CANDIDATE_TTL_SECS`.
#[must_use]
pub fn get_candidate_ttl_secs() -> u64 {
    env_or("IMDB_CANDIDATE_TTL_SECS", CANDIDATE_TTL_SECS)
}

/// Get the default kick delay in minutes from env or default.
///
/// Environment variable: `AUTO_KICK_DEFAULT_MINUTES`.
#[must_use]
pub fn get_auto_kick_default_minutes() -> i64 {
    env_or("AUTO_KICK_DEFAULT_MINUTES", AUTO_KICK_DEFAULT_MINUTES)
}

/// Get the auto-kick poll interval from env or default.
///
/// Environment variable: `AUTO_KICK_POLL_SECS`.
#[must_use]
pub fn get_auto_kick_poll_secs() -> u64 {
    env_or("AUTO_KICK_POLL_SECS", AUTO_KICK_POLL_SECS).max(1)
}
