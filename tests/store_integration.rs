//! Measurement log files as written by earlier versions of the bot

use netspeed_bot::{
    models::{MeasurementRecord, Sample, SourceKind, SourceResults},
    stats::{self, HistorySummary},
    AppError, RecordStore,
};
use serde_json::Value;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

const NOW: f64 = 1_700_000_000.0;
const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Records at 30 h, 5 h and 20 min ago, with a legacy `-1` upload placeholder,
/// an M-Lab retransmission figure, a broken document and a foreign table
fn legacy_log() -> String {
    format!(
        r#"{{
  "_default": {{
    "1": {{"timestamp": {old}, "tweeted": true, "data": {{"speedtest": [50.0, 5.0, 20.0]}}}},
    "2": {{"timestamp": {mid}, "tweeted": true, "data": {{"fastcom": [80.0, -1, -1], "mlab": [70.0, 7.0, 9.0, 0.02]}}}},
    "3": {{"tweeted": false}},
    "10": {{"timestamp": {new}, "tweeted": false, "data": {{"speedtest": [90.0, 9.0, 11.0], "chromedl": [60.0, null, null]}}}}
  }},
  "settings": {{"1": {{"theme": "dark"}}}}
}}"#,
        old = NOW - 30.0 * 3600.0,
        mid = NOW - 5.0 * 3600.0,
        new = NOW - 1200.0,
    )
}

fn open_legacy(dir: &TempDir) -> RecordStore {
    let path = dir.path().join("db.json");
    fs::write(&path, legacy_log()).unwrap();
    RecordStore::open(&path).unwrap()
}

#[test]
fn test_reads_legacy_log() {
    let dir = TempDir::new().unwrap();
    let store = open_legacy(&dir);

    assert_eq!(store.len(), 3);
    assert_eq!(store.malformed_count(), 1);

    let timestamps: Vec<f64> = store.records().iter().map(|r| r.timestamp).collect();
    assert_eq!(timestamps, vec![NOW - 30.0 * 3600.0, NOW - 5.0 * 3600.0, NOW - 1200.0]);

    let mlab = store.records()[1].sample(SourceKind::Mlab).unwrap();
    assert_eq!(mlab.retransmission, Some(0.02));
    assert_eq!(store.records()[1].sample(SourceKind::Fastcom).unwrap().upload_mbps(), None);
}

#[test]
fn test_history_window_and_summary() {
    let dir = TempDir::new().unwrap();
    let store = open_legacy(&dir);

    let history = store.recent(NOW, DAY);
    assert_eq!(history.len(), 2);

    let summary = HistorySummary::from_history(&history, Duration::from_secs(3 * 3600)).unwrap();
    // Downloads 80, 70, 90, 60; uploads 7, 9 (the -1 placeholder is dropped)
    assert_eq!(summary.median_down, Some(75.0));
    assert_eq!(summary.median_up, Some(8.0));
    assert_eq!(summary.status_text(), "Median speed: 75.0 Mbps down / 8.0 Mbps up");

    assert!(!stats::tweet_due(&history, NOW, Duration::from_secs(8 * 3600)));
    assert!(stats::tweet_due(&history, NOW, Duration::from_secs(4 * 3600)));
    assert!(stats::should_run_mlab(&history, NOW, Duration::from_secs(3600)));
}

#[test]
fn test_insert_keeps_foreign_data() {
    let dir = TempDir::new().unwrap();
    let mut store = open_legacy(&dir);

    let results: SourceResults = [(SourceKind::Fastcom, Sample::download_only(123.0))].into_iter().collect();
    let id = store.insert(MeasurementRecord::new(NOW, true, &results)).unwrap();
    assert_eq!(id, 11);

    let raw: Value = serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
    assert_eq!(raw["settings"]["1"]["theme"], "dark");
    assert_eq!(raw["_default"]["3"]["tweeted"], false);
    assert_eq!(raw["_default"]["11"]["data"]["fastcom"], serde_json::json!([123.0, null, null]));
    assert_eq!(raw["_default"]["11"]["tweeted"], true);

    let reopened = RecordStore::open(store.path()).unwrap();
    assert_eq!(reopened.len(), 4);
    assert_eq!(reopened.malformed_count(), 1);
    assert!(!dir.path().join("db.json.tmp").exists());
}

#[test]
fn test_invalid_json_is_store_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("db.json");
    fs::write(&path, "[1, 2").unwrap();

    let err = RecordStore::open(&path).unwrap_err();
    assert!(matches!(err, AppError::Store(_)));
    assert_eq!(err.exit_code(), 5);
}

#[test]
fn test_insert_creates_parent_directory() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state").join("db.json");
    let mut store = RecordStore::open(&path).unwrap();

    let results: SourceResults = [(SourceKind::Chromedl, Sample::download_only(40.0))].into_iter().collect();
    assert_eq!(store.insert(MeasurementRecord::new(NOW, false, &results)).unwrap(), 1);
    assert!(path.exists());
}
