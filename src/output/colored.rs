//! Colored formatter for terminals

use super::formatter::{mbps_cell, FormattingOptions, OutputFormatter, PlainFormatter, RowData};
use crate::{
    executor::{ExecutionReport, SourceStatus},
    stats::{format_median, HistorySummary},
};
use colored::*;

/// Throughput classification for color coding
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpeedLevel {
    Fast,     // >= 100 Mbps
    Adequate, // 25-100 Mbps
    Slow,     // < 25 Mbps
}

impl SpeedLevel {
    pub fn from_mbps(mbps: f64) -> Self {
        if mbps >= 100.0 {
            Self::Fast
        } else if mbps >= 25.0 {
            Self::Adequate
        } else {
            Self::Slow
        }
    }

    pub fn color(&self) -> Color {
        match self {
            Self::Fast => Color::Green,
            Self::Adequate => Color::Yellow,
            Self::Slow => Color::Red,
        }
    }
}

/// Color scheme configuration
#[derive(Debug, Clone)]
pub struct ColorScheme {
    pub header: Color,
    pub success: Color,
    pub warning: Color,
    pub muted: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            header: Color::Blue,
            success: Color::Green,
            warning: Color::Yellow,
            muted: Color::BrightBlack,
        }
    }
}

pub struct ColoredFormatter {
    plain: PlainFormatter,
    color_scheme: ColorScheme,
}

impl ColoredFormatter {
    pub fn new(options: FormattingOptions) -> Self {
        Self::with_color_scheme(options, ColorScheme::default())
    }

    pub fn with_color_scheme(options: FormattingOptions, color_scheme: ColorScheme) -> Self {
        Self {
            plain: PlainFormatter::new(options),
            color_scheme,
        }
    }

    fn colorize(&self, text: &str, color: Color) -> ColoredString {
        if self.plain.options().enable_color {
            text.color(color)
        } else {
            text.normal()
        }
    }

    fn emphasize(&self, text: &str, color: Color) -> ColoredString {
        if self.plain.options().enable_color {
            text.color(color).bold()
        } else {
            text.normal()
        }
    }

    fn speed(&self, value: Option<f64>) -> String {
        let text = mbps_cell(value);
        match value {
            Some(v) => self.colorize(&text, SpeedLevel::from_mbps(v).color()).to_string(),
            None => self.colorize(&text, self.color_scheme.muted).to_string(),
        }
    }

    fn status(&self, status: &SourceStatus, plain: &str) -> String {
        let color = match status {
            SourceStatus::Measured(_) => self.color_scheme.success,
            SourceStatus::NoData => self.color_scheme.warning,
            SourceStatus::Skipped(_) => self.color_scheme.muted,
        };
        self.colorize(plain, color).to_string()
    }
}

impl OutputFormatter for ColoredFormatter {
    fn format_header(&self, title: &str) -> String {
        self.emphasize(&self.plain.format_header(title), self.color_scheme.header)
            .to_string()
    }

    fn format_run_report(&self, report: &ExecutionReport) -> String {
        let plain_rows = self.plain.report_rows(report);
        let display_rows: Vec<RowData> = plain_rows
            .iter()
            .zip(report.outcomes.iter())
            .map(|(row, outcome)| {
                let sample = match &outcome.status {
                    SourceStatus::Measured(sample) => Some(*sample),
                    _ => None,
                };
                let mut display = row.clone();
                display[0] = self.emphasize(&row[0], Color::White).to_string();
                display[1] = self.speed(sample.and_then(|s| s.download_mbps()));
                display[2] = self.speed(sample.and_then(|s| s.upload_mbps()));
                if let Some(last) = display.last_mut() {
                    *last = self.status(&outcome.status, &row[row.len() - 1]);
                }
                display
            })
            .collect();

        let table = self.plain.create_table(&self.plain.report_columns(), &plain_rows, &display_rows);
        let footer = format!(
            "{} of {} sources measured in {}",
            report.measured_count(),
            report.outcomes.len(),
            super::formatter::format_duration(report.total_duration)
        );
        format!("{}\n{}", table, self.colorize(&footer, self.color_scheme.muted))
    }

    fn format_summary(&self, summary: &HistorySummary) -> String {
        let figure = |value: Option<f64>| match value {
            Some(v) => self.emphasize(&format_median(value), SpeedLevel::from_mbps(v).color()).to_string(),
            None => self.colorize("n/a", self.color_scheme.muted).to_string(),
        };
        format!(
            "Median over {} records: {} Mbps down / {} Mbps up",
            summary.record_count,
            figure(summary.median_down),
            figure(summary.median_up)
        )
    }

    fn format_success(&self, message: &str) -> String {
        format!("{} {}", self.emphasize("✓", self.color_scheme.success), message)
    }

    fn format_warning(&self, message: &str) -> String {
        format!("{} {}", self.emphasize("!", self.color_scheme.warning), message)
    }
}
