//! Trend chart of the history window
//!
//! Per-source download points as down-triangles and upload points as
//! up-triangles, the trailing-window averages as thick lines, a Mbps axis
//! starting at zero and local `HH:MM` time labels.

pub mod canvas;
pub mod font;

use crate::{
    error::{AppError, ErrorContext, Result},
    stats::{Direction, HistorySummary, TimePoint},
};
use canvas::{Canvas, Marker};
use chrono::{Local, Offset, TimeZone};
use image::{ImageFormat, Rgb, RgbImage};
use std::path::Path;

pub const WIDTH: u32 = 800;
pub const HEIGHT: u32 = 440;

const MARGIN_LEFT: i32 = 56;
const MARGIN_RIGHT: i32 = 16;
const MARGIN_TOP: i32 = 24;
const MARGIN_BOTTOM: i32 = 32;
const TEXT_SCALE: u32 = 2;
const MARKER_SIZE: i32 = 3;
const MARKER_ALPHA: f32 = 0.5;
const AVERAGE_THICKNESS: u32 = 2;

const AXIS: Rgb<u8> = Rgb([0, 0, 0]);
const GRID: Rgb<u8> = Rgb([225, 225, 225]);
const LEGEND_BORDER: Rgb<u8> = Rgb([200, 200, 200]);

/// Scatter colours, cycling red/green/blue/cyan over the series
pub const SERIES_COLORS: [Rgb<u8>; 4] = [
    Rgb([255, 0, 0]),
    Rgb([0, 128, 0]),
    Rgb([0, 0, 255]),
    Rgb([0, 191, 191]),
];
pub const AVG_DOWN_COLOR: Rgb<u8> = Rgb([227, 119, 194]);
pub const AVG_UP_COLOR: Rgb<u8> = Rgb([148, 103, 189]);

/// Candidate x tick spacings in seconds
const TIME_STEPS: [i64; 8] = [900, 1800, 3600, 7200, 10800, 21600, 43200, 86400];
const MAX_TIME_TICKS: i64 = 8;

/// Maps data coordinates onto the plot area
struct Frame {
    left: i32,
    top: i32,
    width: i32,
    height: i32,
    t0: f64,
    t1: f64,
    y_max: f64,
}

impl Frame {
    fn x(&self, timestamp: f64) -> i32 {
        let ratio = (timestamp - self.t0) / (self.t1 - self.t0);
        self.left + (ratio * self.width as f64).round() as i32
    }

    fn y(&self, value: f64) -> i32 {
        let ratio = value / self.y_max;
        self.top + self.height - (ratio * self.height as f64).round() as i32
    }

    fn bottom(&self) -> i32 {
        self.top + self.height
    }

    fn right(&self) -> i32 {
        self.left + self.width
    }
}

enum LegendSwatch {
    Marker(Marker),
    Line,
}

/// Render the chart into an image
pub fn render(summary: &HistorySummary) -> RgbImage {
    let mut canvas = Canvas::new(WIDTH, HEIGHT);

    let (t0, t1) = match summary.time_span() {
        Some((lo, hi)) if hi > lo => (lo, hi),
        Some((t, _)) => (t - 1800.0, t + 1800.0),
        None => {
            let now = chrono::Utc::now().timestamp() as f64;
            (now - 3600.0, now)
        }
    };
    let (y_max, y_step) = value_axis(summary.max_value().unwrap_or(0.0));

    let frame = Frame {
        left: MARGIN_LEFT,
        top: MARGIN_TOP,
        width: WIDTH as i32 - MARGIN_LEFT - MARGIN_RIGHT,
        height: HEIGHT as i32 - MARGIN_TOP - MARGIN_BOTTOM,
        t0,
        t1,
        y_max,
    };

    draw_value_axis(&mut canvas, &frame, y_step);
    draw_time_axis(&mut canvas, &frame);

    for (n, series) in summary.series.iter().enumerate() {
        let marker = marker_for(series.direction);
        let color = SERIES_COLORS[n % SERIES_COLORS.len()];
        for point in &series.points {
            canvas.marker(frame.x(point.timestamp), frame.y(point.value), MARKER_SIZE, marker, color, MARKER_ALPHA);
        }
    }

    draw_polyline(&mut canvas, &frame, &summary.avg_down, AVG_DOWN_COLOR);
    draw_polyline(&mut canvas, &frame, &summary.avg_up, AVG_UP_COLOR);

    draw_frame(&mut canvas, &frame);
    draw_legend(&mut canvas, &frame, summary);
    font::draw_text(&mut canvas, 8, 6, "Mbps", AXIS, TEXT_SCALE);

    canvas.into_image()
}

/// Render the chart and write it as PNG
pub fn render_to_file(summary: &HistorySummary, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory '{}'", parent.display()))?;
    }

    render(summary)
        .save_with_format(path, ImageFormat::Png)
        .map_err(|e| AppError::chart(format!("Failed to write chart '{}': {}", path.display(), e)))
}

/// Axis top and tick spacing: a 1/2/5 step giving at most six intervals
pub fn value_axis(max_value: f64) -> (f64, f64) {
    if !max_value.is_finite() || max_value <= 0.0 {
        return (10.0, 2.0);
    }

    let target = max_value * 1.05;
    let magnitude = 10f64.powf((target / 6.0).log10().floor());
    let step = [1.0, 2.0, 5.0, 10.0]
        .iter()
        .map(|m| m * magnitude)
        .find(|step| target / step <= 6.0)
        .unwrap_or(10.0 * magnitude);

    ((target / step).ceil() * step, step)
}

/// Tick positions aligned to local clock boundaries
pub fn time_ticks(t0: f64, t1: f64) -> Vec<i64> {
    let span = (t1 - t0).max(1.0) as i64;
    let step = TIME_STEPS
        .iter()
        .copied()
        .find(|step| span / step <= MAX_TIME_TICKS)
        .unwrap_or(TIME_STEPS[TIME_STEPS.len() - 1]);

    let offset = local_offset_secs(t0 as i64);
    let first = ((t0 as i64 + offset) / step + 1) * step - offset;

    (0..)
        .map(|i| first + i * step)
        .take_while(|t| (*t as f64) <= t1)
        .collect()
}

/// `HH:MM` in local time
pub fn time_label(timestamp: i64) -> String {
    Local
        .timestamp_opt(timestamp, 0)
        .single()
        .map(|dt| dt.format("%H:%M").to_string())
        .unwrap_or_default()
}

fn local_offset_secs(timestamp: i64) -> i64 {
    Local
        .timestamp_opt(timestamp, 0)
        .single()
        .map(|dt| dt.offset().fix().local_minus_utc() as i64)
        .unwrap_or(0)
}

fn marker_for(direction: Direction) -> Marker {
    match direction {
        Direction::Down => Marker::TriangleDown,
        Direction::Up => Marker::TriangleUp,
    }
}

fn format_value(value: f64, step: f64) -> String {
    if step >= 1.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.1}", value)
    }
}

fn draw_value_axis(canvas: &mut Canvas, frame: &Frame, step: f64) {
    let glyph_height = (font::GLYPH_HEIGHT * TEXT_SCALE) as i32;
    let ticks = (frame.y_max / step).round() as i64;

    for i in 0..=ticks {
        let value = i as f64 * step;
        let y = frame.y(value);
        if i > 0 {
            canvas.line(frame.left + 1, y, frame.right() - 1, y, GRID, 1);
        }
        canvas.line(frame.left - 4, y, frame.left, y, AXIS, 1);

        let label = format_value(value, step);
        let x = frame.left - 8 - font::text_width(&label, TEXT_SCALE) as i32;
        font::draw_text(canvas, x, y - glyph_height / 2, &label, AXIS, TEXT_SCALE);
    }
}

fn draw_time_axis(canvas: &mut Canvas, frame: &Frame) {
    for tick in time_ticks(frame.t0, frame.t1) {
        let x = frame.x(tick as f64);
        canvas.line(x, frame.bottom(), x, frame.bottom() + 4, AXIS, 1);

        let label = time_label(tick);
        let width = font::text_width(&label, TEXT_SCALE) as i32;
        font::draw_text(canvas, x - width / 2, frame.bottom() + 10, &label, AXIS, TEXT_SCALE);
    }
}

fn draw_frame(canvas: &mut Canvas, frame: &Frame) {
    canvas.stroke_rect(
        frame.left,
        frame.top,
        frame.width as u32 + 1,
        frame.height as u32 + 1,
        AXIS,
    );
}

fn draw_polyline(canvas: &mut Canvas, frame: &Frame, points: &[TimePoint], color: Rgb<u8>) {
    for pair in points.windows(2) {
        canvas.line(
            frame.x(pair[0].timestamp),
            frame.y(pair[0].value),
            frame.x(pair[1].timestamp),
            frame.y(pair[1].value),
            color,
            AVERAGE_THICKNESS,
        );
    }
    if let [only] = points {
        canvas.marker(frame.x(only.timestamp), frame.y(only.value), 1, Marker::TriangleUp, color, 1.0);
    }
}

fn draw_legend(canvas: &mut Canvas, frame: &Frame, summary: &HistorySummary) {
    let mut entries: Vec<(String, Rgb<u8>, LegendSwatch)> = summary
        .series
        .iter()
        .enumerate()
        .map(|(n, series)| {
            let swatch = LegendSwatch::Marker(marker_for(series.direction));
            (series.label(), SERIES_COLORS[n % SERIES_COLORS.len()], swatch)
        })
        .collect();
    entries.push(("avg down".to_string(), AVG_DOWN_COLOR, LegendSwatch::Line));
    entries.push(("avg up".to_string(), AVG_UP_COLOR, LegendSwatch::Line));

    // Two columns, filled top to bottom
    let rows = entries.len().div_ceil(2) as i32;
    let row_height = (font::GLYPH_HEIGHT * TEXT_SCALE) as i32 + 6;
    let swatch = 18;
    let column_width = entries
        .iter()
        .map(|(label, _, _)| font::text_width(label, TEXT_SCALE) as i32)
        .max()
        .unwrap_or(0)
        + swatch
        + 16;

    let x0 = frame.left + 8;
    let y0 = frame.top + 8;
    let width = column_width * 2 + 8;
    let height = rows * row_height + 8;

    canvas.fill_rect(x0, y0, width as u32, height as u32, canvas::WHITE, 0.8);
    canvas.stroke_rect(x0, y0, width as u32, height as u32, LEGEND_BORDER);

    for (i, (label, color, kind)) in entries.iter().enumerate() {
        let column = i as i32 / rows;
        let row = i as i32 % rows;
        let x = x0 + 6 + column * column_width;
        let y = y0 + 6 + row * row_height;
        let mid = y + (font::GLYPH_HEIGHT * TEXT_SCALE) as i32 / 2;

        match kind {
            LegendSwatch::Marker(marker) => canvas.marker(x + swatch / 2, mid, MARKER_SIZE, *marker, *color, MARKER_ALPHA),
            LegendSwatch::Line => canvas.line(x, mid, x + swatch - 2, mid, *color, AVERAGE_THICKNESS),
        }
        font::draw_text(canvas, x + swatch + 4, y, label, AXIS, TEXT_SCALE);
    }
}
