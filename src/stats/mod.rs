//! Statistics over the measurement history
//!
//! History window filtering, the posting and M-Lab throttle decisions,
//! the per-record aggregate series with their trailing-window averages,
//! and the medians used in the posted summary.

use crate::{
    error::{AppError, Result},
    models::{MeasurementRecord, SourceKind},
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::time::Duration;

/// Which way a figure was measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Down,
    Up,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Down => f.write_str("down"),
            Direction::Up => f.write_str("up"),
        }
    }
}

/// A value at a point in time (epoch seconds)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimePoint {
    pub timestamp: f64,
    pub value: f64,
}

impl TimePoint {
    pub fn new(timestamp: f64, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Per-source scatter series, in legend order
pub const SCATTER_SERIES: [(SourceKind, Direction); 6] = [
    (SourceKind::Speedtest, Direction::Down),
    (SourceKind::Mlab, Direction::Down),
    (SourceKind::Fastcom, Direction::Down),
    (SourceKind::Chromedl, Direction::Down),
    (SourceKind::Speedtest, Direction::Up),
    (SourceKind::Mlab, Direction::Up),
];

/// Points measured by one source in one direction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSeries {
    pub source: SourceKind,
    pub direction: Direction,
    pub points: Vec<TimePoint>,
}

impl SourceSeries {
    /// Legend label, e.g. `fast.com down`
    pub fn label(&self) -> String {
        format!("{} {}", self.source.label(), self.direction)
    }
}

/// Everything derived from the history window: chart series and medians
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistorySummary {
    pub series: Vec<SourceSeries>,
    /// Trailing-window average of the per-record mean download
    pub avg_down: Vec<TimePoint>,
    /// Trailing-window average of the per-record mean upload
    pub avg_up: Vec<TimePoint>,
    pub median_down: Option<f64>,
    pub median_up: Option<f64>,
    pub record_count: usize,
}

impl HistorySummary {
    /// Summarize a set of records, averaging over `average_window`
    pub fn from_history(history: &[MeasurementRecord], average_window: Duration) -> Result<Self> {
        if average_window.is_zero() {
            return Err(AppError::statistics("average window must be longer than zero"));
        }

        let records = chronological(history);

        let series = SCATTER_SERIES
            .iter()
            .map(|&(source, direction)| SourceSeries {
                source,
                direction,
                points: source_points(&records, source, direction),
            })
            .collect();

        let (down, up) = aggregate_series(&records);

        Ok(Self {
            series,
            avg_down: windowed_average(&down, average_window),
            avg_up: windowed_average(&up, average_window),
            median_down: median(all_values(&records, Direction::Down)),
            median_up: median(all_values(&records, Direction::Up)),
            record_count: records.len(),
        })
    }

    /// True when no record carried a usable figure
    pub fn is_empty(&self) -> bool {
        self.series.iter().all(|s| s.points.is_empty())
    }

    /// Earliest and latest timestamp of any plotted point
    pub fn time_span(&self) -> Option<(f64, f64)> {
        let timestamps = self
            .series
            .iter()
            .flat_map(|s| s.points.iter())
            .chain(self.avg_down.iter())
            .chain(self.avg_up.iter())
            .map(|p| p.timestamp);

        timestamps.fold(None, |span, t| match span {
            None => Some((t, t)),
            Some((lo, hi)) => Some((lo.min(t), hi.max(t))),
        })
    }

    /// Largest plotted value
    pub fn max_value(&self) -> Option<f64> {
        self.series
            .iter()
            .flat_map(|s| s.points.iter())
            .chain(self.avg_down.iter())
            .chain(self.avg_up.iter())
            .map(|p| p.value)
            .max_by(f64::total_cmp)
    }

    /// Text of the posted status
    pub fn status_text(&self) -> String {
        format!(
            "Median speed: {} Mbps down / {} Mbps up",
            format_median(self.median_down),
            format_median(self.median_up)
        )
    }
}

/// One decimal place, or `n/a` without samples
pub fn format_median(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.1}", v),
        None => "n/a".to_string(),
    }
}

/// Records strictly newer than `now - window`
pub fn within_window(records: &[MeasurementRecord], now: f64, window: Duration) -> Vec<MeasurementRecord> {
    let cutoff = now - window.as_secs_f64();
    records
        .iter()
        .filter(|r| r.timestamp > cutoff)
        .cloned()
        .collect()
}

/// Posting is due unless a record inside `interval` was posted
pub fn tweet_due(history: &[MeasurementRecord], now: f64, interval: Duration) -> bool {
    let cutoff = now - interval.as_secs_f64();
    !history.iter().any(|r| r.tweeted && r.timestamp > cutoff)
}

/// Final posting decision for a run
pub fn should_tweet(force_tweet: bool, due: bool, only_test: bool) -> bool {
    (force_tweet || due) && !only_test
}

/// M-Lab runs unless a record inside `interval` already has M-Lab data
pub fn should_run_mlab(history: &[MeasurementRecord], now: f64, interval: Duration) -> bool {
    let cutoff = now - interval.as_secs_f64();
    !history
        .iter()
        .any(|r| r.has_source(SourceKind::Mlab) && r.timestamp > cutoff)
}

/// Per record, the mean download and the mean upload over all sources
/// that reported one. Records without a figure contribute no point.
pub fn aggregate_series(records: &[MeasurementRecord]) -> (Vec<TimePoint>, Vec<TimePoint>) {
    let mut down = Vec::new();
    let mut up = Vec::new();

    for record in records {
        if let Some(mean) = mean(record.samples().filter_map(|(_, s)| s.download_mbps())) {
            down.push(TimePoint::new(record.timestamp, mean));
        }
        if let Some(mean) = mean(record.samples().filter_map(|(_, s)| s.upload_mbps())) {
            up.push(TimePoint::new(record.timestamp, mean));
        }
    }

    (down, up)
}

/// Replace each point with the mean of every point at or before it whose
/// age relative to it is less than `window`.
///
/// Each point is computed independently, so the cost is quadratic in the
/// number of points. Input must be in chronological order.
pub fn windowed_average(points: &[TimePoint], window: Duration) -> Vec<TimePoint> {
    let window = window.as_secs_f64();

    points
        .iter()
        .enumerate()
        .map(|(i, current)| {
            let (sum, count) = points[..=i]
                .iter()
                .filter(|earlier| current.timestamp - earlier.timestamp < window)
                .fold((0.0, 0usize), |(sum, count), p| (sum + p.value, count + 1));

            // `current` itself always passes the filter
            TimePoint::new(current.timestamp, sum / count.max(1) as f64)
        })
        .collect()
}

/// Median; the mean of the two middle values for even counts
pub fn median<I: IntoIterator<Item = f64>>(values: I) -> Option<f64> {
    let mut values: Vec<f64> = values.into_iter().filter(|v| !v.is_nan()).collect();
    if values.is_empty() {
        return None;
    }

    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;

    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

fn mean<I: Iterator<Item = f64>>(values: I) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

fn chronological(records: &[MeasurementRecord]) -> Vec<MeasurementRecord> {
    let mut sorted: Vec<MeasurementRecord> = records
        .iter()
        .filter(|r| r.timestamp.is_finite())
        .cloned()
        .collect();
    sorted.sort_by(|a, b| a.timestamp.partial_cmp(&b.timestamp).unwrap_or(Ordering::Equal));
    sorted
}

fn figure(sample: &crate::models::Sample, direction: Direction) -> Option<f64> {
    match direction {
        Direction::Down => sample.download_mbps(),
        Direction::Up => sample.upload_mbps(),
    }
}

fn source_points(records: &[MeasurementRecord], source: SourceKind, direction: Direction) -> Vec<TimePoint> {
    records
        .iter()
        .filter_map(|r| {
            let value = figure(r.sample(source)?, direction)?;
            Some(TimePoint::new(r.timestamp, value))
        })
        .collect()
}

fn all_values(records: &[MeasurementRecord], direction: Direction) -> Vec<f64> {
    records
        .iter()
        .flat_map(|r| r.samples().filter_map(move |(_, s)| figure(s, direction)))
        .collect()
}
