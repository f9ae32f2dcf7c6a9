//! Data models and structures for the speed-test bot

pub mod config;
pub mod record;

// Re-export main model types
pub use config::{AccessToken, BotPaths, Config, RequestToken};
pub use record::{MeasurementRecord, Sample, SourceKind, SourceResults};
