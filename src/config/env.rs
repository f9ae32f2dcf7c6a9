//! Environment variable handling and .env file management

use crate::error::{AppError, Result};
use std::path::{Path, PathBuf};

/// Environment variable configuration manager
pub struct EnvManager;

impl EnvManager {
    /// Load .env file if it exists
    pub fn load_env_file(debug: bool) -> Result<()> {
        if Path::new(".env").exists() {
            dotenv::from_filename(".env")
                .map_err(|e| AppError::config(format!("Failed to load .env file: {}", e)))?;

            if debug {
                println!("Loaded configuration from .env file");
            }
        } else if debug {
            println!("No .env file found, using defaults and CLI arguments");
        }

        Ok(())
    }

    /// Path from an environment variable, if set and non-empty
    pub fn path_var(key: &str) -> Option<PathBuf> {
        std::env::var_os(key)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
    }

    /// Validate environment variable format before parsing
    pub fn validate_env_var(key: &str, value: &str) -> Result<()> {
        match key {
            "TWEET_INTERVAL_SECS" | "HISTORY_WINDOW_SECS" | "MLAB_INTERVAL_SECS" | "AVERAGE_WINDOW_SECS" => {
                let secs: u64 = value.trim().parse()
                    .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
                if secs == 0 {
                    return Err(AppError::config(format!("{} must be greater than 0", key)));
                }
            }
            "FASTCOM_ATTEMPTS" => {
                let attempts: u32 = value.trim().parse()
                    .map_err(|e| AppError::config(format!("Invalid FASTCOM_ATTEMPTS value '{}': {}", value, e)))?;
                if attempts == 0 || attempts > 20 {
                    return Err(AppError::config(format!("FASTCOM_ATTEMPTS must be between 1 and 20, got: {}", attempts)));
                }
            }
            "NETSPEED_LOG_LEVEL" => {
                value.parse::<crate::logging::LogLevel>()?;
            }
            "NETSPEED_HOME" | "NETSPEED_CONFIG" | "NETSPEED_DB" | "NETSPEED_PLOT" => {
                if value.trim().is_empty() {
                    return Err(AppError::config(format!("{} cannot be empty", key)));
                }
            }
            _ => {
                // Unknown environment variable, ignore
            }
        }

        Ok(())
    }

    /// Get list of all supported environment variables with descriptions
    pub fn get_supported_env_vars() -> Vec<(&'static str, &'static str)> {
        vec![
            ("NETSPEED_HOME", "Base directory for the default file locations"),
            ("NETSPEED_CONFIG", "Path of the JSON credentials file"),
            ("NETSPEED_DB", "Path of the measurement log"),
            ("NETSPEED_PLOT", "Path of the rendered chart"),
            ("TWEET_INTERVAL_SECS", "Minimum seconds between two posts"),
            ("HISTORY_WINDOW_SECS", "Seconds of history summarized"),
            ("MLAB_INTERVAL_SECS", "Minimum seconds between two M-Lab tests"),
            ("AVERAGE_WINDOW_SECS", "Trailing window of the averaged lines"),
            ("FASTCOM_ATTEMPTS", "Attempts for the fast.com test"),
            ("NETSPEED_LOG_LEVEL", "Log level overriding --verbose and --debug"),
        ]
    }

    /// Validate all currently set environment variables
    pub fn validate_current_env() -> Vec<String> {
        let mut warnings = Vec::new();

        for (var_name, _) in Self::get_supported_env_vars() {
            if let Ok(value) = std::env::var(var_name) {
                if let Err(e) = Self::validate_env_var(var_name, &value) {
                    warnings.push(format!("Warning: {}", e));
                }
            }
        }

        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_env_var() {
        assert!(EnvManager::validate_env_var("TWEET_INTERVAL_SECS", "28800").is_ok());
        assert!(EnvManager::validate_env_var("FASTCOM_ATTEMPTS", "3").is_ok());
        assert!(EnvManager::validate_env_var("NETSPEED_DB", "/tmp/db.json").is_ok());
        assert!(EnvManager::validate_env_var("SOMETHING_ELSE", "whatever").is_ok());

        assert!(EnvManager::validate_env_var("TWEET_INTERVAL_SECS", "0").is_err());
        assert!(EnvManager::validate_env_var("MLAB_INTERVAL_SECS", "an hour").is_err());
        assert!(EnvManager::validate_env_var("FASTCOM_ATTEMPTS", "0").is_err());
        assert!(EnvManager::validate_env_var("FASTCOM_ATTEMPTS", "21").is_err());
        assert!(EnvManager::validate_env_var("NETSPEED_HOME", "  ").is_err());
        assert!(EnvManager::validate_env_var("NETSPEED_LOG_LEVEL", "debug").is_ok());
        assert!(EnvManager::validate_env_var("NETSPEED_LOG_LEVEL", "chatty").is_err());
    }

    #[test]
    fn test_supported_vars_are_unique() {
        let vars = EnvManager::get_supported_env_vars();
        let mut names: Vec<&str> = vars.iter().map(|(name, _)| *name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), vars.len());
    }

    #[test]
    fn test_path_var_ignores_unset_variables() {
        assert!(EnvManager::path_var("NETSPEED_TEST_UNSET_PATH_VARIABLE").is_none());
    }
}
