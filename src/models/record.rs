//! Measurement records and per-source samples

use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// External speed-test sources, in the order they are run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Ookla speedtest.net via `speedtest-cli`
    Speedtest,
    /// Netflix fast.com via `fast-cli`
    Fastcom,
    /// M-Lab NDT7 via `ndt7-client`
    Mlab,
    /// Timed download of a large file via `curl`
    Chromedl,
}

impl SourceKind {
    /// All sources in run order
    pub const ALL: [SourceKind; 4] = [
        SourceKind::Speedtest,
        SourceKind::Fastcom,
        SourceKind::Mlab,
        SourceKind::Chromedl,
    ];

    /// Key used for this source in stored records
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Speedtest => "speedtest",
            SourceKind::Fastcom => "fastcom",
            SourceKind::Mlab => "mlab",
            SourceKind::Chromedl => "chromedl",
        }
    }

    /// Human-readable label for charts and console output
    pub fn label(&self) -> &'static str {
        match self {
            SourceKind::Speedtest => "speedtest",
            SourceKind::Fastcom => "fast.com",
            SourceKind::Mlab => "mlab",
            SourceKind::Chromedl => "chrome",
        }
    }

    /// Parse a stored record key
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == key)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One source's result: download Mbps, upload Mbps, ping ms and an
/// optional retransmission metric.
///
/// Stored as a JSON array `[down, up, ping]`, with a fourth element only
/// when the retransmission metric is present.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Option<f64>>", into = "Vec<Option<f64>>")]
pub struct Sample {
    pub download: Option<f64>,
    pub upload: Option<f64>,
    pub ping: Option<f64>,
    pub retransmission: Option<f64>,
}

impl Sample {
    /// Sample with download, upload and ping
    pub fn new(download: f64, upload: f64, ping: Option<f64>) -> Self {
        Self {
            download: Some(download),
            upload: Some(upload),
            ping,
            retransmission: None,
        }
    }

    /// Sample carrying only a download figure
    pub fn download_only(download: f64) -> Self {
        Self {
            download: Some(download),
            ..Self::default()
        }
    }

    /// Attach a retransmission metric
    pub fn with_retransmission(mut self, retransmission: Option<f64>) -> Self {
        self.retransmission = retransmission;
        self
    }

    /// Download Mbps, ignoring negative placeholders written by old runs
    pub fn download_mbps(&self) -> Option<f64> {
        usable(self.download)
    }

    /// Upload Mbps, ignoring negative placeholders written by old runs
    pub fn upload_mbps(&self) -> Option<f64> {
        usable(self.upload)
    }

    /// Ping in milliseconds
    pub fn ping_ms(&self) -> Option<f64> {
        usable(self.ping)
    }
}

fn usable(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v >= 0.0)
}

impl From<Vec<Option<f64>>> for Sample {
    fn from(values: Vec<Option<f64>>) -> Self {
        let field = |i: usize| values.get(i).copied().flatten();
        Self {
            download: field(0),
            upload: field(1),
            ping: field(2),
            retransmission: field(3),
        }
    }
}

impl From<Sample> for Vec<Option<f64>> {
    fn from(sample: Sample) -> Self {
        let mut values = vec![sample.download, sample.upload, sample.ping];
        if sample.retransmission.is_some() {
            values.push(sample.retransmission);
        }
        values
    }
}

/// Results of one run, keyed by source
pub type SourceResults = BTreeMap<SourceKind, Sample>;

/// One stored measurement event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    /// Per-source results keyed by source name
    #[serde(default)]
    pub data: BTreeMap<String, Sample>,

    /// Whether this run published a summary
    #[serde(default)]
    pub tweeted: bool,

    /// Seconds since the Unix epoch
    pub timestamp: f64,
}

impl MeasurementRecord {
    /// Build a record from the results of a run
    pub fn new(timestamp: f64, tweeted: bool, results: &SourceResults) -> Self {
        let data = results
            .iter()
            .map(|(kind, sample)| (kind.as_str().to_string(), *sample))
            .collect();

        Self {
            data,
            tweeted,
            timestamp,
        }
    }

    /// Result for a given source, if it produced data in this run
    pub fn sample(&self, kind: SourceKind) -> Option<&Sample> {
        self.data.get(kind.as_str())
    }

    /// Whether the given source produced data in this run
    pub fn has_source(&self, kind: SourceKind) -> bool {
        self.data.contains_key(kind.as_str())
    }

    /// Known sources present in this record, in run order
    pub fn samples(&self) -> impl Iterator<Item = (SourceKind, &Sample)> {
        SourceKind::ALL
            .into_iter()
            .filter_map(move |kind| self.sample(kind).map(|sample| (kind, sample)))
    }

    /// Record time in the local timezone
    pub fn local_time(&self) -> Option<DateTime<Local>> {
        let secs = self.timestamp.floor();
        let nanos = ((self.timestamp - secs) * 1e9) as u32;
        Local.timestamp_opt(secs as i64, nanos).single()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_serializes_as_array() {
        let sample = Sample::new(95.2, 11.4, Some(14.1));
        let json = serde_json::to_string(&sample).unwrap();
        assert_eq!(json, "[95.2,11.4,14.1]");

        let fast = Sample::download_only(120.0);
        assert_eq!(serde_json::to_string(&fast).unwrap(), "[120.0,null,null]");
    }

    #[test]
    fn test_sample_retransmission_adds_fourth_element() {
        let sample = Sample::new(80.0, 10.0, Some(9.0)).with_retransmission(Some(0.02));
        let json = serde_json::to_string(&sample).unwrap();
        assert_eq!(json, "[80.0,10.0,9.0,0.02]");
    }

    #[test]
    fn test_sample_accepts_short_and_long_arrays() {
        let short: Sample = serde_json::from_str("[50.5]").unwrap();
        assert_eq!(short.download, Some(50.5));
        assert_eq!(short.upload, None);

        let long: Sample = serde_json::from_str("[1.0, 2.0, 3.0, 4.0]").unwrap();
        assert_eq!(long.retransmission, Some(4.0));
    }

    #[test]
    fn test_negative_placeholders_are_not_usable() {
        let sample: Sample = serde_json::from_str("[-1, -1, -1]").unwrap();
        assert_eq!(sample.download, Some(-1.0));
        assert_eq!(sample.download_mbps(), None);
        assert_eq!(sample.upload_mbps(), None);
        assert_eq!(sample.ping_ms(), None);
    }

    #[test]
    fn test_record_round_trips_stored_layout() {
        let json = r#"{"data": {"speedtest": [90.1, 10.2, 12.0], "fastcom": [100.0, null, null]},
                       "tweeted": true, "timestamp": 1600000000.5}"#;
        let record: MeasurementRecord = serde_json::from_str(json).unwrap();

        assert!(record.tweeted);
        assert!(record.has_source(SourceKind::Speedtest));
        assert!(record.has_source(SourceKind::Fastcom));
        assert!(!record.has_source(SourceKind::Mlab));
        assert_eq!(record.sample(SourceKind::Fastcom).unwrap().download, Some(100.0));

        let kinds: Vec<SourceKind> = record.samples().map(|(k, _)| k).collect();
        assert_eq!(kinds, vec![SourceKind::Speedtest, SourceKind::Fastcom]);
    }

    #[test]
    fn test_record_from_results() {
        let mut results = SourceResults::new();
        results.insert(SourceKind::Mlab, Sample::new(70.0, 8.0, Some(20.0)));
        let record = MeasurementRecord::new(1_700_000_000.0, false, &results);

        assert_eq!(record.data.len(), 1);
        assert!(record.has_source(SourceKind::Mlab));
        assert!(record.local_time().is_some());
    }

    #[test]
    fn test_source_kind_keys() {
        for kind in SourceKind::ALL {
            assert_eq!(SourceKind::from_key(kind.as_str()), Some(kind));
        }
        assert_eq!(SourceKind::from_key("ookla"), None);
    }
}
