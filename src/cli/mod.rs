//! Command-line interface

use clap::Parser;
use std::path::PathBuf;

/// Network Speed Bot - measures throughput, charts it and posts a summary
#[derive(Parser, Debug, Clone)]
#[command(name = "netspeed-bot")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Post a summary even if one was posted recently
    #[arg(long = "force_tweet", visible_alias = "force-tweet")]
    pub force_tweet: bool,

    /// Run the speed tests but never post
    #[arg(long = "only_test", visible_alias = "only-test")]
    pub only_test: bool,

    /// Skip the speed tests and work with stored history only
    #[arg(long = "skip_test", visible_alias = "skip-test")]
    pub skip_test: bool,

    /// Render the chart instead of posting; no credentials needed
    #[arg(long = "dry_run", visible_alias = "dry-run")]
    pub dry_run: bool,

    /// Path of the JSON credentials file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Path of the measurement log
    #[arg(long, value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// Path of the rendered chart
    #[arg(long, value_name = "PATH")]
    pub plot: Option<PathBuf>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Enable verbose output
    #[arg(long)]
    pub verbose: bool,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Validate CLI arguments
    pub fn validate(&self) -> Result<(), String> {
        for (flag, path) in [("--config", &self.config), ("--db", &self.db), ("--plot", &self.plot)] {
            if let Some(path) = path {
                if path.as_os_str().is_empty() {
                    return Err(format!("{} requires a non-empty path", flag));
                }
            }
        }

        Ok(())
    }

    /// Whether this run needs posting credentials
    pub fn needs_credentials(&self) -> bool {
        !self.dry_run
    }

    /// Check if colors should be enabled
    pub fn use_colors(&self) -> bool {
        if self.no_color {
            false
        } else {
            supports_color()
        }
    }
}

/// Check if the terminal supports color output
fn supports_color() -> bool {
    if let Ok(term) = std::env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }

    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    if std::env::var("FORCE_COLOR").is_ok() {
        return true;
    }

    #[cfg(unix)]
    {
        true
    }
    #[cfg(not(unix))]
    {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["netspeed-bot"]);
        assert!(!cli.force_tweet);
        assert!(!cli.only_test);
        assert!(!cli.skip_test);
        assert!(!cli.dry_run);
        assert!(cli.config.is_none());
        assert!(cli.needs_credentials());
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_snake_case_flags() {
        let cli = Cli::parse_from([
            "netspeed-bot",
            "--force_tweet",
            "--only_test",
            "--skip_test",
            "--dry_run",
        ]);
        assert!(cli.force_tweet);
        assert!(cli.only_test);
        assert!(cli.skip_test);
        assert!(cli.dry_run);
        assert!(!cli.needs_credentials());
    }

    #[test]
    fn test_kebab_case_aliases() {
        let cli = Cli::parse_from(["netspeed-bot", "--force-tweet", "--dry-run"]);
        assert!(cli.force_tweet);
        assert!(cli.dry_run);
    }

    #[test]
    fn test_path_options() {
        let cli = Cli::parse_from([
            "netspeed-bot",
            "--config", "/etc/bot/cfg",
            "--db", "/var/lib/bot/db.json",
            "--plot", "/tmp/plot.png",
        ]);
        assert_eq!(cli.config.unwrap(), PathBuf::from("/etc/bot/cfg"));
        assert_eq!(cli.db.unwrap(), PathBuf::from("/var/lib/bot/db.json"));
        assert_eq!(cli.plot.unwrap(), PathBuf::from("/tmp/plot.png"));
    }

    #[test]
    fn test_empty_path_rejected() {
        let rejected = match Cli::try_parse_from(["netspeed-bot", "--db", ""]) {
            Ok(cli) => cli.validate().is_err(),
            Err(_) => true,
        };
        assert!(rejected);
    }

    #[test]
    fn test_no_color_disables_colors() {
        let cli = Cli::parse_from(["netspeed-bot", "--no-color"]);
        assert!(!cli.use_colors());
    }

    #[test]
    fn test_unknown_flag_rejected() {
        assert!(Cli::try_parse_from(["netspeed-bot", "--count", "5"]).is_err());
    }
}
