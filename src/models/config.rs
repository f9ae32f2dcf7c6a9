//! Configuration data model and validation

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// OAuth request token obtained during first-time authorization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestToken {
    pub oauth_token: String,
    pub oauth_token_secret: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauth_callback_confirmed: Option<String>,
}

/// OAuth access token, stored as `[token, secret]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessToken(pub String, pub String);

impl AccessToken {
    pub fn token(&self) -> &str {
        &self.0
    }

    pub fn secret(&self) -> &str {
        &self.1
    }
}

/// Main application configuration, persisted as the JSON `cfg` file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Consumer key of the registered application
    #[serde(default)]
    pub api_key: String,

    /// Consumer secret of the registered application
    #[serde(default)]
    pub api_secret: String,

    /// Request token from the interactive authorization step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_token: Option<RequestToken>,

    /// Access token from the interactive authorization step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<AccessToken>,

    /// OAuth callback URL used when requesting a token
    #[serde(default = "default_callback_url")]
    pub callback_url: String,

    /// Minimum time between two posts
    #[serde(default = "default_tweet_interval_secs")]
    pub tweet_interval_secs: u64,

    /// How far back history is loaded, charted and summarized
    #[serde(default = "default_history_window_secs")]
    pub history_window_secs: u64,

    /// Minimum time between two M-Lab tests
    #[serde(default = "default_mlab_interval_secs")]
    pub mlab_interval_secs: u64,

    /// Trailing window of the averaged chart lines
    #[serde(default = "default_average_window_secs")]
    pub average_window_secs: u64,

    /// Attempts for the fast.com test before giving up
    #[serde(default = "default_fastcom_attempts")]
    pub fastcom_attempts: u32,

    /// Large file timed by the download test
    #[serde(default = "default_chrome_download_url")]
    pub chrome_download_url: String,

    /// Enable colored terminal output
    #[serde(skip, default = "default_enable_color")]
    pub enable_color: bool,

    /// Enable verbose output
    #[serde(skip)]
    pub verbose: bool,

    /// Enable debug output
    #[serde(skip)]
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_secret: String::new(),
            request_token: None,
            access_token: None,
            callback_url: default_callback_url(),
            tweet_interval_secs: default_tweet_interval_secs(),
            history_window_secs: default_history_window_secs(),
            mlab_interval_secs: default_mlab_interval_secs(),
            average_window_secs: default_average_window_secs(),
            fastcom_attempts: default_fastcom_attempts(),
            chrome_download_url: default_chrome_download_url(),
            enable_color: default_enable_color(),
            verbose: false,
            debug: false,
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tweet_interval(&self) -> Duration {
        Duration::from_secs(self.tweet_interval_secs)
    }

    pub fn history_window(&self) -> Duration {
        Duration::from_secs(self.history_window_secs)
    }

    pub fn mlab_interval(&self) -> Duration {
        Duration::from_secs(self.mlab_interval_secs)
    }

    pub fn average_window(&self) -> Duration {
        Duration::from_secs(self.average_window_secs)
    }

    /// Whether consumer credentials are present
    pub fn has_credentials(&self) -> bool {
        !self.api_key.trim().is_empty() && !self.api_secret.trim().is_empty()
    }

    /// Whether the interactive authorization step has been completed
    pub fn is_authorized(&self) -> bool {
        self.request_token.is_some() && self.access_token.is_some()
    }

    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Result<()> {
        if self.tweet_interval_secs == 0 {
            return Err(AppError::config("tweet_interval_secs must be greater than 0"));
        }

        if self.history_window_secs == 0 {
            return Err(AppError::config("history_window_secs must be greater than 0"));
        }

        if self.mlab_interval_secs == 0 {
            return Err(AppError::config("mlab_interval_secs must be greater than 0"));
        }

        if self.average_window_secs == 0 {
            return Err(AppError::config("average_window_secs must be greater than 0"));
        }

        if self.average_window_secs > self.history_window_secs {
            return Err(AppError::config(format!(
                "average_window_secs ({}) cannot exceed history_window_secs ({})",
                self.average_window_secs, self.history_window_secs
            )));
        }

        if self.fastcom_attempts == 0 {
            return Err(AppError::config("fastcom_attempts must be greater than 0"));
        }

        validate_http_url("callback_url", &self.callback_url)?;
        validate_http_url("chrome_download_url", &self.chrome_download_url)?;

        Ok(())
    }

    /// Merge environment variables into this configuration
    pub fn merge_from_env(&mut self) -> Result<()> {
        if let Some(value) = env_u64("TWEET_INTERVAL_SECS")? {
            self.tweet_interval_secs = value;
        }

        if let Some(value) = env_u64("HISTORY_WINDOW_SECS")? {
            self.history_window_secs = value;
        }

        if let Some(value) = env_u64("MLAB_INTERVAL_SECS")? {
            self.mlab_interval_secs = value;
        }

        if let Some(value) = env_u64("AVERAGE_WINDOW_SECS")? {
            self.average_window_secs = value;
        }

        if let Ok(attempts) = std::env::var("FASTCOM_ATTEMPTS") {
            self.fastcom_attempts = attempts.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid FASTCOM_ATTEMPTS value '{}': {}", attempts, e)))?;
        }

        Ok(())
    }
}

fn env_u64(key: &str) -> Result<Option<u64>> {
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e))),
        Err(_) => Ok(None),
    }
}

fn validate_http_url(field: &str, value: &str) -> Result<()> {
    let parsed = url::Url::parse(value)
        .map_err(|e| AppError::config(format!("Invalid {} '{}': {}", field, value, e)))?;

    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(AppError::config(format!("{} must use http or https, got '{}'", field, scheme))),
    }
}

/// Locations of the files the bot reads and writes
#[derive(Debug, Clone, PartialEq)]
pub struct BotPaths {
    /// JSON credentials and settings
    pub config: PathBuf,
    /// Append-only measurement log
    pub db: PathBuf,
    /// Rendered chart
    pub plot: PathBuf,
}

impl BotPaths {
    /// Default file names inside a base directory
    pub fn in_dir(base: &Path) -> Self {
        Self {
            config: base.join(crate::defaults::DEFAULT_CONFIG_FILE),
            db: base.join(crate::defaults::DEFAULT_DB_FILE),
            plot: base.join(crate::defaults::DEFAULT_PLOT_FILE),
        }
    }
}

// Default value functions for serde
fn default_callback_url() -> String {
    crate::defaults::DEFAULT_CALLBACK_URL.to_string()
}

fn default_tweet_interval_secs() -> u64 {
    crate::defaults::DEFAULT_TWEET_INTERVAL.as_secs()
}

fn default_history_window_secs() -> u64 {
    crate::defaults::DEFAULT_HISTORY_WINDOW.as_secs()
}

fn default_mlab_interval_secs() -> u64 {
    crate::defaults::DEFAULT_MLAB_INTERVAL.as_secs()
}

fn default_average_window_secs() -> u64 {
    crate::defaults::DEFAULT_AVERAGE_WINDOW.as_secs()
}

fn default_fastcom_attempts() -> u32 {
    crate::defaults::DEFAULT_FASTCOM_ATTEMPTS
}

fn default_chrome_download_url() -> String {
    crate::defaults::DEFAULT_CHROME_DOWNLOAD_URL.to_string()
}

fn default_enable_color() -> bool {
    crate::defaults::DEFAULT_ENABLE_COLOR
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(!config.has_credentials());
        assert!(!config.is_authorized());
    }

    #[test]
    fn test_default_intervals() {
        let config = Config::default();
        assert_eq!(config.tweet_interval(), Duration::from_secs(8 * 60 * 60));
        assert_eq!(config.history_window(), Duration::from_secs(24 * 60 * 60));
        assert_eq!(config.mlab_interval(), Duration::from_secs(60 * 60));
        assert_eq!(config.average_window(), Duration::from_secs(3 * 60 * 60));
        assert_eq!(config.fastcom_attempts, 5);
    }

    #[test]
    fn test_parses_legacy_cfg_file() {
        let json = r#"{
            "api_key": "key",
            "api_secret": "secret",
            "request_token": {
                "oauth_token": "req",
                "oauth_token_secret": "req-secret",
                "oauth_callback_confirmed": "true"
            },
            "access_token": ["acc", "acc-secret"]
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();

        assert!(config.has_credentials());
        assert!(config.is_authorized());
        let access = config.access_token.as_ref().unwrap();
        assert_eq!(access.token(), "acc");
        assert_eq!(access.secret(), "acc-secret");
        assert_eq!(config.tweet_interval_secs, 8 * 60 * 60);
        assert!(config.enable_color);
    }

    #[test]
    fn test_access_token_serializes_as_pair() {
        let token = AccessToken("a".to_string(), "b".to_string());
        assert_eq!(serde_json::to_string(&token).unwrap(), r#"["a","b"]"#);
    }

    #[test]
    fn test_runtime_flags_are_not_persisted() {
        let mut config = Config::default();
        config.verbose = true;
        config.debug = true;
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("verbose"));
        assert!(!json.contains("debug"));
        assert!(!json.contains("enable_color"));
    }

    #[test]
    fn test_zero_intervals_invalid() {
        let mut config = Config::default();
        config.tweet_interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.mlab_interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.fastcom_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_average_window_cannot_exceed_history() {
        let mut config = Config::default();
        config.average_window_secs = config.history_window_secs + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_download_url_must_be_http() {
        let mut config = Config::default();
        config.chrome_download_url = "ftp://example.com/file.deb".to_string();
        assert!(config.validate().is_err());

        config.chrome_download_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_paths_in_dir() {
        let paths = BotPaths::in_dir(Path::new("/srv/bot"));
        assert_eq!(paths.config, PathBuf::from("/srv/bot/cfg"));
        assert_eq!(paths.db, PathBuf::from("/srv/bot/db.json"));
        assert_eq!(paths.plot, PathBuf::from("/srv/bot/plot.png"));
    }
}
