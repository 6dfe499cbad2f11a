//! Append-only result ledger

use crate::error::{AppError, ErrorContext, Result};
use crate::types::{ResultRecord, LEDGER_HEADER};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Destination for completed rounds
pub trait RecordSink: Send + Sync {
    fn append(&self, record: &ResultRecord) -> Result<()>;
}

/// CSV ledger on disk.
///
/// Every record is written with its own open, append, close cycle, so a
/// crash loses at most the row being written.
#[derive(Debug, Clone)]
pub struct ResultSink {
    path: PathBuf,
}

impl ResultSink {
    /// Create a fresh ledger holding only the header
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| AppError::io(format!("Cannot create ledger {}: {}", path.display(), e)))?;
        writeln!(file, "{}", LEDGER_HEADER).with_context(|| format!("Writing header to {}", path.display()))?;
        Ok(Self { path })
    }

    /// Ledger file name for a run started at `timestamp`
    pub fn file_name(timestamp: &chrono::DateTime<chrono::Local>) -> String {
        format!("results_{}.csv", timestamp.format("%Y-%m-%d_%H-%M-%S"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSink for ResultSink {
    fn append(&self, record: &ResultRecord) -> Result<()> {
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Opening ledger {}", self.path.display()))?;
        writeln!(file, "{}", record.to_csv_row()).with_context(|| format!("Appending to {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Algorithm, NetworkCondition, TrialOutcome};
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn record(index: u32) -> ResultRecord {
        ResultRecord::new(
            &Algorithm::post_quantum("dilithium2", true),
            index,
            NetworkCondition::new(10000.0, 5.0, 0.1),
            TrialOutcome::new(true, 3.25),
        )
    }

    #[test]
    fn test_header_then_rows_in_order() {
        let dir = TempDir::new().unwrap();
        let sink = ResultSink::create(dir.path().join("results.csv")).unwrap();
        sink.append(&record(1)).unwrap();
        sink.append(&record(2)).unwrap();

        let contents = std::fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], LEDGER_HEADER);
        assert_eq!(lines[1], "dilithium2,1,10000.0,5.0,0.1,true,3.25");
        assert_eq!(lines[2], "dilithium2,2,10000.0,5.0,0.1,true,3.25");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_existing_ledger_is_not_clobbered() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("results.csv");
        std::fs::write(&path, "previous run\n").unwrap();

        let error = ResultSink::create(&path).unwrap_err();
        assert_eq!(error.category(), "IO");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "previous run\n");
    }

    #[test]
    fn test_append_fails_when_ledger_vanishes() {
        let dir = TempDir::new().unwrap();
        let sink = ResultSink::create(dir.path().join("results.csv")).unwrap();
        std::fs::remove_file(sink.path()).unwrap();
        assert!(sink.append(&record(1)).is_err());
    }

    #[test]
    fn test_file_name_from_timestamp() {
        let timestamp = chrono::Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(ResultSink::file_name(&timestamp), "results_2024-03-09_14-05-07.csv");
    }
}
