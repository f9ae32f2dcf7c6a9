//! Configuration parsing from the JSON config file, environment variables and CLI arguments

use crate::{
    cli::Cli,
    config::env::EnvManager,
    error::{AppError, ErrorContext, Result},
    models::{AccessToken, BotPaths, Config, RequestToken},
};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Fully resolved configuration for one run
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    pub paths: BotPaths,
}

/// Configuration parser that combines the config file, environment variables and CLI arguments
pub struct ConfigParser {
    cli: Cli,
}

impl ConfigParser {
    /// Create a new configuration parser with CLI arguments
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Parse and build the complete configuration
    pub fn parse(&self) -> Result<LoadedConfig> {
        self.cli.validate().map_err(AppError::config)?;

        // Load from environment file if it exists
        EnvManager::load_env_file(self.cli.debug)?;

        let paths = self.resolve_paths();

        let mut config = if paths.config.exists() {
            read_config_file(&paths.config)?
        } else if self.cli.needs_credentials() {
            return Err(AppError::config(format!(
                "Config file not found at '{}'; create it with \"api_key\" and \"api_secret\"",
                paths.config.display()
            )));
        } else {
            Config::default()
        };

        config.merge_from_env()?;
        self.apply_cli_overrides(&mut config);
        config.validate()?;

        if self.cli.needs_credentials() && !config.has_credentials() {
            return Err(AppError::config(format!(
                "'{}' must define non-empty \"api_key\" and \"api_secret\"",
                paths.config.display()
            )));
        }

        Ok(LoadedConfig { config, paths })
    }

    /// Resolve file locations: CLI flag, then environment, then the base directory
    pub fn resolve_paths(&self) -> BotPaths {
        let base = EnvManager::path_var("NETSPEED_HOME").unwrap_or_else(|| PathBuf::from("."));
        let defaults = BotPaths::in_dir(&base);

        BotPaths {
            config: pick_path(&self.cli.config, "NETSPEED_CONFIG", defaults.config),
            db: pick_path(&self.cli.db, "NETSPEED_DB", defaults.db),
            plot: pick_path(&self.cli.plot, "NETSPEED_PLOT", defaults.plot),
        }
    }

    /// Apply CLI argument overrides to configuration
    fn apply_cli_overrides(&self, config: &mut Config) {
        if self.cli.no_color {
            config.enable_color = false;
        }

        // CLI-only flags
        config.verbose = self.cli.verbose;
        config.debug = self.cli.debug;
    }
}

fn pick_path(flag: &Option<PathBuf>, env_key: &str, fallback: PathBuf) -> PathBuf {
    flag.clone()
        .or_else(|| EnvManager::path_var(env_key))
        .unwrap_or(fallback)
}

/// Convenience function to load complete configuration from CLI arguments
pub fn load_config(cli: Cli) -> Result<LoadedConfig> {
    ConfigParser::new(cli).parse()
}

/// Read the JSON config file
pub fn read_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;

    serde_json::from_str(&content)
        .map_err(|e| AppError::config(format!("Invalid config file '{}': {}", path.display(), e)))
}

/// Render a value as 4-space indented JSON
pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut serializer)?;

    String::from_utf8(buf).map_err(|e| AppError::internal(format!("Config JSON is not UTF-8: {}", e)))
}

/// Add the OAuth tokens to the config file and return the rewritten JSON.
///
/// Only the two token keys change; every other key the operator wrote is
/// kept as is, and nothing merged from the environment or defaults leaks in.
pub async fn store_tokens(path: &Path, request_token: &RequestToken, access_token: &AccessToken) -> Result<String> {
    let mut document = match tokio::fs::read_to_string(path).await {
        Ok(content) => serde_json::from_str::<serde_json::Map<String, Value>>(&content)
            .map_err(|e| AppError::config(format!("Invalid config file '{}': {}", path.display(), e)))?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => serde_json::Map::new(),
        Err(e) => return Err(e).with_context(|| format!("Failed to read config file '{}'", path.display())),
    };

    document.insert("request_token".to_string(), serde_json::to_value(request_token)?);
    document.insert("access_token".to_string(), serde_json::to_value(access_token)?);

    let json = to_pretty_json(&document)?;
    tokio::fs::write(path, &json)
        .await
        .with_context(|| format!("Failed to write config file '{}'", path.display()))?;
    Ok(json)
}

/// Display configuration summary for debug purposes
pub fn display_config_summary(loaded: &LoadedConfig) -> String {
    let config = &loaded.config;
    let mut summary = Vec::new();

    summary.push(format!(
        "Build: {} ({}, {})",
        crate::GIT_COMMIT,
        crate::TARGET_TRIPLE,
        crate::BUILD_TIME
    ));
    summary.push(format!("Config file: {}", loaded.paths.config.display()));
    summary.push(format!("Measurement log: {}", loaded.paths.db.display()));
    summary.push(format!("Chart: {}", loaded.paths.plot.display()));
    summary.push(format!("Authorized: {}", config.is_authorized()));
    summary.push(format!("Tweet interval: {}s", config.tweet_interval_secs));
    summary.push(format!("History window: {}s", config.history_window_secs));
    summary.push(format!("M-Lab interval: {}s", config.mlab_interval_secs));
    summary.push(format!("Average window: {}s", config.average_window_secs));
    summary.push(format!("fast.com attempts: {}", config.fastcom_attempts));
    summary.push(format!("Color Output: {}", config.enable_color));

    summary.join("\n")
}
