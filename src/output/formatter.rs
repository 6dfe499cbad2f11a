//! Core formatting trait and the plain-text implementation

use crate::{
    error::{AppError, Result},
    models::{PairReport, RunSummary},
    types::format_value,
};
use std::fmt::Write as _;

/// Renders a finished run for the terminal
pub trait OutputFormatter {
    fn format_header(&self, title: &str) -> Result<String>;

    /// Totals over the whole run
    fn format_run_overview(&self, summary: &RunSummary) -> Result<String>;

    /// One row per (algorithm, condition) pair
    fn format_pair_table(&self, pairs: &[PairReport]) -> Result<String>;

    fn format_error(&self, error: &str) -> Result<String>;

    fn format_warning(&self, warning: &str) -> Result<String>;

    fn format_success(&self, message: &str) -> Result<String>;
}

/// Configuration options for formatting
#[derive(Debug, Clone)]
pub struct FormattingOptions {
    pub enable_color: bool,
    /// Show the per-pair table, not only the totals
    pub show_pairs: bool,
    pub table_borders: bool,
}

impl Default for FormattingOptions {
    fn default() -> Self {
        Self {
            enable_color: true,
            show_pairs: true,
            table_borders: true,
        }
    }
}

/// Text alignment options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
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

/// Row data for table formatting
pub type RowData = Vec<String>;

pub(crate) const PAIR_COLUMNS: [Column; 7] = [
    Column { header: "Algorithm", alignment: Alignment::Left },
    Column { header: "Rate [Mbit/s]", alignment: Alignment::Right },
    Column { header: "Delay [ms]", alignment: Alignment::Right },
    Column { header: "Loss [%]", alignment: Alignment::Right },
    Column { header: "Success", alignment: Alignment::Right },
    Column { header: "Timeouts", alignment: Alignment::Right },
    Column { header: "Mean / Median", alignment: Alignment::Right },
];

/// Cells of one pair row, uncoloured
pub(crate) fn pair_row(pair: &PairReport) -> RowData {
    let timing = match (pair.mean_ms(), pair.median_ms()) {
        (Some(mean), Some(median)) => format!("{} / {}", format_duration(mean), format_duration(median)),
        _ => "-".to_string(),
    };
    vec![
        pair.algorithm.clone(),
        format_value(pair.condition.rate_mbit),
        format_value(pair.condition.delay_ms),
        format_value(pair.condition.loss_percent),
        format!("{}/{} ({})", pair.successes, pair.rounds, format_percentage(pair.success_rate())),
        pair.timeouts.to_string(),
        timing,
    ]
}

/// Render a table; `widths` are computed from the uncoloured cells
pub(crate) fn render_table(columns: &[Column], rows: &[RowData], borders: bool) -> String {
    let mut widths: Vec<usize> = columns.iter().map(|c| c.header.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut output = String::new();
    let headers: RowData = columns.iter().map(|c| c.header.to_string()).collect();

    if borders {
        output.push_str(&horizontal_border(&widths));
        output.push('\n');
    }
    output.push_str(&render_row(&headers, &widths, columns, borders));
    output.push('\n');
    if borders {
        output.push_str(&horizontal_border(&widths));
        output.push('\n');
    }
    for row in rows {
        output.push_str(&render_row(row, &widths, columns, borders));
        output.push('\n');
    }
    if borders {
        output.push_str(&horizontal_border(&widths));
    }

    output.trim_end().to_string()
}

fn render_row(cells: &[String], widths: &[usize], columns: &[Column], borders: bool) -> String {
    let mut row = String::new();
    if borders {
        row.push('|');
    }
    for ((cell, &width), column) in cells.iter().zip(widths).zip(columns) {
        let padded = align_text(cell, width, column.alignment);
        if borders {
            row.push(' ');
            row.push_str(&padded);
            row.push_str(" |");
        } else {
            row.push_str(&padded);
            row.push_str("  ");
        }
    }
    row.trim_end().to_string()
}

fn horizontal_border(widths: &[usize]) -> String {
    let mut border = String::from("+");
    for &width in widths {
        border.push_str(&"-".repeat(width + 2));
        border.push('+');
    }
    border
}

fn align_text(text: &str, width: usize, alignment: Alignment) -> String {
    let padding = width.saturating_sub(text.chars().count());
    match alignment {
        Alignment::Left => format!("{}{}", text, " ".repeat(padding)),
        Alignment::Right => format!("{}{}", " ".repeat(padding), text),
    }
}

/// Format a handshake duration in human-readable form
pub fn format_duration(duration_ms: f64) -> String {
    if duration_ms < 1.0 {
        format!("{:.0}μs", duration_ms * 1000.0)
    } else if duration_ms < 1000.0 {
        format!("{:.2}ms", duration_ms)
    } else {
        format!("{:.2}s", duration_ms / 1000.0)
    }
}

/// Format percentage with appropriate precision
pub fn format_percentage(percentage: f64) -> String {
    if percentage >= 99.95 {
        "100.0%".to_string()
    } else if percentage < 0.05 {
        "0.0%".to_string()
    } else {
        format!("{:.1}%", percentage)
    }
}

/// Plain text formatter implementation
pub struct PlainFormatter {
    options: FormattingOptions,
}

impl PlainFormatter {
    pub fn new(options: FormattingOptions) -> Self {
        Self { options }
    }
}

impl OutputFormatter for PlainFormatter {
    fn format_header(&self, title: &str) -> Result<String> {
        let mut output = String::new();
        let border = "=".repeat(title.len() + 4);

        writeln!(output, "{}", border).map_err(|e| AppError::io(format!("Failed to format header: {}", e)))?;
        writeln!(output, "  {}  ", title).map_err(|e| AppError::io(format!("Failed to format header: {}", e)))?;
        write!(output, "{}", border).map_err(|e| AppError::io(format!("Failed to format header: {}", e)))?;

        Ok(output)
    }

    fn format_run_overview(&self, summary: &RunSummary) -> Result<String> {
        let mut output = String::new();
        let fail = |e: std::fmt::Error| AppError::io(format!("Failed to format summary: {}", e));

        writeln!(output, "Run Summary:").map_err(fail)?;
        writeln!(output, "------------").map_err(fail)?;
        writeln!(output, "Algorithms:       {}", summary.algorithms().join(", ")).map_err(fail)?;
        writeln!(output, "Pairs:            {}", summary.pairs.len()).map_err(fail)?;
        writeln!(output, "Rows Recorded:    {}", summary.total_rounds()).map_err(fail)?;
        writeln!(output, "Timed-out Batches: {}", summary.total_timeouts()).map_err(fail)?;
        write!(output, "Ledger:           {}", summary.ledger_path).map_err(fail)?;

        Ok(output)
    }

    fn format_pair_table(&self, pairs: &[PairReport]) -> Result<String> {
        if pairs.is_empty() || !self.options.show_pairs {
            return Ok(String::new());
        }
        let rows: Vec<RowData> = pairs.iter().map(pair_row).collect();
        Ok(render_table(&PAIR_COLUMNS, &rows, self.options.table_borders))
    }

    fn format_error(&self, error: &str) -> Result<String> {
        Ok(format!("ERROR: {}", error))
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(format!("WARNING: {}", warning))
    }

    fn format_success(&self, message: &str) -> Result<String> {
        Ok(format!("SUCCESS: {}", message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Algorithm, NetworkCondition, ResultRecord, TrialOutcome};

    fn pair(durations: &[f64], failures: u32, timeouts: u32) -> PairReport {
        let algorithm = Algorithm::post_quantum("dilithium2", true);
        let condition = NetworkCondition::new(10000.0, 5.0, 0.1);
        let mut report = PairReport::new(&algorithm, condition);
        let mut index = 1;
        for &ms in durations {
            report.record(&ResultRecord::new(&algorithm, index, condition, TrialOutcome::new(true, ms)));
            index += 1;
        }
        for _ in 0..failures {
            report.record(&ResultRecord::new(&algorithm, index, condition, TrialOutcome::failed()));
            index += 1;
        }
        for _ in 0..timeouts {
            report.record_timeout();
        }
        report
    }

    #[test]
    fn test_pair_row() {
        let row = pair_row(&pair(&[10.0, 12.0, 14.0], 1, 2));
        assert_eq!(row[0], "dilithium2");
        assert_eq!(row[1], "10000.0");
        assert_eq!(row[3], "0.1");
        assert_eq!(row[4], "3/4 (75.0%)");
        assert_eq!(row[5], "2");
        assert_eq!(row[6], "12.00ms / 12.00ms");
    }

    #[test]
    fn test_all_failed_pair_has_no_timing() {
        let row = pair_row(&pair(&[], 3, 0));
        assert_eq!(row[4], "0/3 (0.0%)");
        assert_eq!(row[6], "-");
    }

    #[test]
    fn test_table_alignment() {
        let formatter = PlainFormatter::new(FormattingOptions::default());
        let table = formatter.format_pair_table(&[pair(&[1.5], 0, 0)]).unwrap();
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("+-"));
        assert!(lines[1].starts_with("| Algorithm "));
        assert!(lines[3].starts_with("| dilithium2 |"));
        // every line has the same width
        assert!(lines.iter().all(|l| l.chars().count() == lines[0].chars().count()));
    }

    #[test]
    fn test_empty_table() {
        let formatter = PlainFormatter::new(FormattingOptions::default());
        assert!(formatter.format_pair_table(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_duration_and_percentage() {
        assert_eq!(format_duration(0.25), "250μs");
        assert_eq!(format_duration(104.731), "104.73ms");
        assert_eq!(format_duration(2500.0), "2.50s");
        assert_eq!(format_percentage(99.99), "100.0%");
        assert_eq!(format_percentage(66.666), "66.7%");
    }

    #[test]
    fn test_overview() {
        let mut summary = RunSummary::new("/out/results_2024-01-01_00-00-00.csv");
        summary.push(pair(&[1.0, 2.0], 0, 1));
        let formatter = PlainFormatter::new(FormattingOptions::default());
        let overview = formatter.format_run_overview(&summary).unwrap();
        assert!(overview.contains("Algorithms:       dilithium2"));
        assert!(overview.contains("Rows Recorded:    2"));
        assert!(overview.contains("Timed-out Batches: 1"));
        assert!(overview.ends_with("results_2024-01-01_00-00-00.csv"));
    }
}
