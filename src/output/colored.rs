//! Colored formatter with ANSI colors

use super::formatter::{
    pair_row, render_table, FormattingOptions, OutputFormatter, RowData, PAIR_COLUMNS,
};
use crate::{
    error::{AppError, Result},
    models::{PairReport, RunSummary},
};
use colored::*;
use std::fmt::Write as _;

/// Classification of a pair's success rate for color coding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReliabilityLevel {
    /// Every handshake succeeded
    Clean,
    /// At least 90% succeeded
    Degraded,
    Poor,
}

impl ReliabilityLevel {
    pub fn from_success_rate(rate: f64) -> Self {
        if rate >= 100.0 {
            Self::Clean
        } else if rate >= 90.0 {
            Self::Degraded
        } else {
            Self::Poor
        }
    }

    pub fn color(&self) -> Color {
        match self {
            Self::Clean => Color::Green,
            Self::Degraded => Color::Yellow,
            Self::Poor => Color::Red,
        }
    }
}

/// Color scheme configuration
#[derive(Debug, Clone)]
pub struct ColorScheme {
    pub header: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    pub info: Color,
    pub border: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            header: Color::Blue,
            success: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
            info: Color::Cyan,
            border: Color::BrightBlack,
        }
    }
}

pub struct ColoredFormatter {
    options: FormattingOptions,
    color_scheme: ColorScheme,
}

impl ColoredFormatter {
    pub fn new(options: FormattingOptions) -> Self {
        Self {
            options,
            color_scheme: ColorScheme::default(),
        }
    }

    fn colorize(&self, text: &str, color: Color) -> ColoredString {
        if self.options.enable_color {
            text.color(color)
        } else {
            text.normal()
        }
    }

    /// Check if the terminal supports colors
    pub fn supports_color() -> bool {
        std::env::var("NO_COLOR").is_err() && std::env::var("TERM").map(|term| term != "dumb").unwrap_or(true)
    }
}

impl OutputFormatter for ColoredFormatter {
    fn format_header(&self, title: &str) -> Result<String> {
        let mut output = String::new();
        let border = "═".repeat(title.chars().count() + 4);

        writeln!(output, "{}", self.colorize(&border, self.color_scheme.border))
            .map_err(|e| AppError::io(format!("Failed to format header: {}", e)))?;
        writeln!(output, "  {}  ", self.colorize(title, self.color_scheme.header).bold())
            .map_err(|e| AppError::io(format!("Failed to format header: {}", e)))?;
        write!(output, "{}", self.colorize(&border, self.color_scheme.border))
            .map_err(|e| AppError::io(format!("Failed to format header: {}", e)))?;

        Ok(output)
    }

    fn format_run_overview(&self, summary: &RunSummary) -> Result<String> {
        let mut output = String::new();
        let fail = |e: std::fmt::Error| AppError::io(format!("Failed to format summary: {}", e));
        let label = |text: &str| self.colorize(text, self.color_scheme.info);

        let timeouts = summary.total_timeouts();
        let timeout_color = if timeouts == 0 {
            self.color_scheme.success
        } else {
            self.color_scheme.warning
        };

        writeln!(output, "{}", self.colorize("Run Summary", self.color_scheme.header).bold()).map_err(fail)?;
        writeln!(output, "{} {}", label("Algorithms:       "), summary.algorithms().join(", ")).map_err(fail)?;
        writeln!(output, "{} {}", label("Pairs:            "), summary.pairs.len()).map_err(fail)?;
        writeln!(output, "{} {}", label("Rows Recorded:    "), summary.total_rounds()).map_err(fail)?;
        writeln!(
            output,
            "{} {}",
            label("Timed-out Batches:"),
            self.colorize(&timeouts.to_string(), timeout_color)
        )
        .map_err(fail)?;
        write!(output, "{} {}", label("Ledger:           "), summary.ledger_path.as_str().bold()).map_err(fail)?;

        Ok(output)
    }

    fn format_pair_table(&self, pairs: &[PairReport]) -> Result<String> {
        if pairs.is_empty() || !self.options.show_pairs {
            return Ok(String::new());
        }

        let rows: Vec<RowData> = pairs.iter().map(pair_row).collect();
        let table = render_table(&PAIR_COLUMNS, &rows, self.options.table_borders);
        if !self.options.enable_color {
            return Ok(table);
        }

        // Color each data line by the pair's reliability, after alignment
        let header_lines = if self.options.table_borders { 3 } else { 1 };
        let mut output = String::new();
        for (index, line) in table.lines().enumerate() {
            let colored = match index.checked_sub(header_lines).and_then(|i| pairs.get(i)) {
                Some(pair) => line
                    .color(ReliabilityLevel::from_success_rate(pair.success_rate()).color())
                    .to_string(),
                None => self.colorize(line, self.color_scheme.border).to_string(),
            };
            if index > 0 {
                output.push('\n');
            }
            output.push_str(&colored);
        }
        Ok(output)
    }

    fn format_error(&self, error: &str) -> Result<String> {
        Ok(format!("{} {}", self.colorize("ERROR:", self.color_scheme.error).bold(), error))
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(format!("{} {}", self.colorize("WARNING:", self.color_scheme.warning).bold(), warning))
    }

    fn format_success(&self, message: &str) -> Result<String> {
        Ok(format!(
            "{} {}",
            self.colorize("SUCCESS:", self.color_scheme.success).bold(),
            self.colorize(message, self.color_scheme.success)
        ))
    }
}
