//! Console output
//!
//! Plain and colored renditions of the per-source run report and the
//! history medians.

mod colored;
mod formatter;

pub use self::colored::{ColorScheme, ColoredFormatter, SpeedLevel};
pub use self::formatter::{format_duration, Alignment, Column, FormattingOptions, OutputFormatter, PlainFormatter, RowData};

/// Picks the formatter for the current terminal
pub struct OutputFormatterFactory;

impl OutputFormatterFactory {
    pub fn create_formatter(enable_color: bool, verbose: bool) -> Box<dyn OutputFormatter> {
        let options = FormattingOptions {
            enable_color,
            verbose_mode: verbose,
            table_borders: true,
        };

        if enable_color {
            Box::new(ColoredFormatter::new(options))
        } else {
            Box::new(PlainFormatter::new(options))
        }
    }
}
