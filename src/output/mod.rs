//! Terminal rendering of the run summary
//!
//! The ledger is the authoritative output; this module only prints a
//! human-readable digest of it once the run completes.

mod colored;
mod formatter;

pub use colored::{ColorScheme, ColoredFormatter, ReliabilityLevel};
pub use formatter::{
    format_duration, format_percentage, Alignment, Column, FormattingOptions, OutputFormatter, PlainFormatter,
    RowData,
};

use crate::{error::Result, models::RunSummary};

/// Output formatting factory for creating appropriate formatters
pub struct OutputFormatterFactory;

impl OutputFormatterFactory {
    /// Create a formatter based on color support and preferences
    pub fn create_formatter(enable_color: bool, show_pairs: bool) -> Box<dyn OutputFormatter> {
        let options = FormattingOptions {
            enable_color,
            show_pairs,
            table_borders: true,
        };

        if enable_color {
            Box::new(ColoredFormatter::new(options))
        } else {
            Box::new(PlainFormatter::new(options))
        }
    }

    /// Create a plain text formatter for scripts/logs
    pub fn create_plain_formatter() -> Box<dyn OutputFormatter> {
        Self::create_formatter(false, true)
    }
}

/// Assembles the final report from a formatter
pub struct OutputCoordinator {
    formatter: Box<dyn OutputFormatter>,
}

impl OutputCoordinator {
    pub fn new(formatter: Box<dyn OutputFormatter>) -> Self {
        Self { formatter }
    }

    pub fn display_summary(&self, summary: &RunSummary) -> Result<String> {
        let mut output = String::new();

        output.push_str(&self.formatter.format_header("Handshake Benchmark Results")?);
        output.push_str("\n\n");
        output.push_str(&self.formatter.format_run_overview(summary)?);

        let table = self.formatter.format_pair_table(&summary.pairs)?;
        if !table.is_empty() {
            output.push_str("\n\n");
            output.push_str(&table);
        }

        output.push_str("\n\n");
        output.push_str(
            &self
                .formatter
                .format_success(&format!("Results were stored in \"{}\". Finished.", summary.ledger_path))?,
        );
        Ok(output)
    }

    pub fn display_error(&self, message: &str) -> Result<String> {
        self.formatter.format_error(message)
    }
}
