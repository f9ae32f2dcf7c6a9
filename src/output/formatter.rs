//! Console formatting of run reports and history summaries
//!
//! Defines the [`OutputFormatter`] interface and a plain-text
//! implementation with simple aligned tables.

use crate::{
    executor::{ExecutionReport, SourceStatus},
    models::Sample,
    stats::{format_median, HistorySummary},
};
use std::fmt::Write as _;
use std::time::Duration;

/// Main trait for output formatting
pub trait OutputFormatter {
    /// Format a header section
    fn format_header(&self, title: &str) -> String;

    /// One row per source with its figures or the reason it has none
    fn format_run_report(&self, report: &ExecutionReport) -> String;

    /// Medians and record count of the history window
    fn format_summary(&self, summary: &HistorySummary) -> String;

    fn format_success(&self, message: &str) -> String;

    fn format_warning(&self, message: &str) -> String;
}

/// Configuration options for formatting
#[derive(Debug, Clone)]
pub struct FormattingOptions {
    pub enable_color: bool,
    /// Show per-source timing and ping
    pub verbose_mode: bool,
    pub table_borders: bool,
}

impl Default for FormattingOptions {
    fn default() -> Self {
        Self {
            enable_color: true,
            verbose_mode: false,
            table_borders: true,
        }
    }
}

/// Text alignment options
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Alignment {
    Left,
    Right,
}

/// Column definition for table formatting
#[derive(Debug, Clone)]
pub struct Column {
    pub header: &'static str,
    pub alignment: Alignment,
}

impl Column {
    pub fn left(header: &'static str) -> Self {
        Self { header, alignment: Alignment::Left }
    }

    pub fn right(header: &'static str) -> Self {
        Self { header, alignment: Alignment::Right }
    }
}

/// Row data for table formatting
pub type RowData = Vec<String>;

/// Plain text formatter implementation
pub struct PlainFormatter {
    options: FormattingOptions,
}

impl PlainFormatter {
    pub fn new(options: FormattingOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &FormattingOptions {
        &self.options
    }

    /// Columns shown for the run report
    pub fn report_columns(&self) -> Vec<Column> {
        let mut columns = vec![
            Column::left("Source"),
            Column::right("Down"),
            Column::right("Up"),
        ];
        if self.options.verbose_mode {
            columns.push(Column::right("Ping"));
            columns.push(Column::right("Time"));
        }
        columns.push(Column::left("Status"));
        columns
    }

    /// Cells of the run report, uncolored
    pub fn report_rows(&self, report: &ExecutionReport) -> Vec<RowData> {
        report
            .outcomes
            .iter()
            .map(|outcome| {
                let sample = match &outcome.status {
                    SourceStatus::Measured(sample) => Some(sample),
                    _ => None,
                };
                let mut row = vec![
                    outcome.source.label().to_string(),
                    mbps_cell(sample.and_then(Sample::download_mbps)),
                    mbps_cell(sample.and_then(Sample::upload_mbps)),
                ];
                if self.options.verbose_mode {
                    row.push(sample.and_then(Sample::ping_ms).map_or_else(|| "-".to_string(), |p| format!("{:.0} ms", p)));
                    row.push(format_duration(outcome.elapsed));
                }
                row.push(status_label(&outcome.status));
                row
            })
            .collect()
    }

    /// Render a table; cells may already carry ANSI codes, widths come from `plain_rows`
    pub fn create_table(&self, columns: &[Column], plain_rows: &[RowData], display_rows: &[RowData]) -> String {
        let widths: Vec<usize> = columns
            .iter()
            .enumerate()
            .map(|(i, column)| {
                plain_rows
                    .iter()
                    .filter_map(|row| row.get(i))
                    .map(|cell| cell.chars().count())
                    .chain(std::iter::once(column.header.len()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let mut output = String::new();
        let border = self.horizontal_border(&widths);
        let headers: Vec<String> = columns.iter().map(|c| c.header.to_string()).collect();

        if self.options.table_borders {
            let _ = writeln!(output, "{}", border);
        }
        let _ = writeln!(output, "{}", self.create_row(columns, &headers, &headers, &widths));
        if self.options.table_borders {
            let _ = writeln!(output, "{}", border);
        }
        for (plain, display) in plain_rows.iter().zip(display_rows.iter()) {
            let _ = writeln!(output, "{}", self.create_row(columns, plain, display, &widths));
        }
        if self.options.table_borders {
            output.push_str(&border);
        }

        output.trim_end().to_string()
    }

    fn create_row(&self, columns: &[Column], plain: &[String], display: &[String], widths: &[usize]) -> String {
        let mut row = String::new();
        if self.options.table_borders {
            row.push('|');
        }

        for (i, (column, &width)) in columns.iter().zip(widths.iter()).enumerate() {
            let text = plain.get(i).map(String::as_str).unwrap_or("");
            let shown = display.get(i).map(String::as_str).unwrap_or(text);
            let padding = " ".repeat(width.saturating_sub(text.chars().count()));
            let cell = match column.alignment {
                Alignment::Left => format!("{}{}", shown, padding),
                Alignment::Right => format!("{}{}", padding, shown),
            };

            if self.options.table_borders {
                let _ = write!(row, " {} |", cell);
            } else {
                let _ = write!(row, "{}  ", cell);
            }
        }

        row.trim_end().to_string()
    }

    fn horizontal_border(&self, widths: &[usize]) -> String {
        let mut border = String::from("+");
        for &width in widths {
            border.push_str(&"-".repeat(width + 2));
            border.push('+');
        }
        border
    }
}

impl OutputFormatter for PlainFormatter {
    fn format_header(&self, title: &str) -> String {
        let border = "=".repeat(title.len() + 4);
        format!("{}\n  {}\n{}", border, title, border)
    }

    fn format_run_report(&self, report: &ExecutionReport) -> String {
        let rows = self.report_rows(report);
        let mut output = self.create_table(&self.report_columns(), &rows, &rows);
        let _ = write!(
            output,
            "\n{} of {} sources measured in {}",
            report.measured_count(),
            report.outcomes.len(),
            format_duration(report.total_duration)
        );
        output
    }

    fn format_summary(&self, summary: &HistorySummary) -> String {
        format!(
            "Median over {} records: {} Mbps down / {} Mbps up",
            summary.record_count,
            format_median(summary.median_down),
            format_median(summary.median_up)
        )
    }

    fn format_success(&self, message: &str) -> String {
        format!("[OK] {}", message)
    }

    fn format_warning(&self, message: &str) -> String {
        format!("[WARN] {}", message)
    }
}

pub(crate) fn mbps_cell(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.1}", v))
}

pub(crate) fn status_label(status: &SourceStatus) -> String {
    match status {
        SourceStatus::Measured(_) => "ok".to_string(),
        SourceStatus::NoData => "no data".to_string(),
        SourceStatus::Skipped(reason) => format!("skipped ({})", reason),
    }
}

/// Human-readable duration: `850ms`, `12.3s` or `2m05s`
pub fn format_duration(duration: Duration) -> String {
    let ms = duration.as_secs_f64() * 1000.0;
    if ms < 1000.0 {
        format!("{:.0}ms", ms)
    } else if ms < 60_000.0 {
        format!("{:.1}s", ms / 1000.0)
    } else {
        let secs = duration.as_secs();
        format!("{}m{:02}s", secs / 60, secs % 60)
    }
}
