//! Network Speed Bot
//!
//! A scheduled bot that measures home network throughput with several
//! third-party speed-test utilities, keeps an append-only log of the
//! results, renders a trend chart and periodically posts a summary.

pub mod app;
pub mod chart;
pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod models;
pub mod output;
pub mod sources;
pub mod stats;
pub mod store;
pub mod twitter;

// Re-export commonly used types
pub use error::{AppError, Result};
pub use models::{Config, MeasurementRecord, Sample, SourceKind, SourceResults};
pub use stats::{Direction, HistorySummary, TimePoint};
pub use store::RecordStore;

/// Application version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Build information set by the build script
pub const BUILD_TIME: &str = env!("BUILD_TIME");
pub const GIT_COMMIT: &str = env!("GIT_COMMIT");
pub const TARGET_TRIPLE: &str = env!("TARGET_TRIPLE");

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    pub const DEFAULT_CONFIG_FILE: &str = "cfg";
    pub const DEFAULT_DB_FILE: &str = "db.json";
    pub const DEFAULT_PLOT_FILE: &str = "plot.png";

    pub const DEFAULT_TWEET_INTERVAL: Duration = Duration::from_secs(8 * 60 * 60);
    pub const DEFAULT_HISTORY_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);
    pub const DEFAULT_MLAB_INTERVAL: Duration = Duration::from_secs(60 * 60);
    pub const DEFAULT_AVERAGE_WINDOW: Duration = Duration::from_secs(3 * 60 * 60);
    pub const DEFAULT_FASTCOM_ATTEMPTS: u32 = 5;

    pub const DEFAULT_CALLBACK_URL: &str = "https://oauthdebugger.com/debug";
    pub const DEFAULT_CHROME_DOWNLOAD_URL: &str =
        "https://dl.google.com/linux/direct/google-chrome-stable_current_amd64.deb";

    pub const TWITTER_API_BASE: &str = "https://api.twitter.com";
    pub const TWITTER_UPLOAD_BASE: &str = "https://upload.twitter.com";

    pub const DEFAULT_ENABLE_COLOR: bool = true;
}
