//! Per-pair and per-run result aggregation

use crate::types::{Algorithm, NetworkCondition, ResultRecord};
use serde::{Deserialize, Serialize};

/// Aggregate over the rows recorded for one (algorithm, condition) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairReport {
    pub algorithm: String,
    pub condition: NetworkCondition,
    /// Rows written to the ledger
    pub rounds: u32,
    /// Rounds whose handshake succeeded
    pub successes: u32,
    /// Batches that timed out and were repeated
    pub timeouts: u32,
    /// Durations of successful handshakes, in production order
    pub durations_ms: Vec<f64>,
}

impl PairReport {
    pub fn new(algorithm: &Algorithm, condition: NetworkCondition) -> Self {
        Self {
            algorithm: algorithm.name.clone(),
            condition,
            rounds: 0,
            successes: 0,
            timeouts: 0,
            durations_ms: Vec::new(),
        }
    }

    pub fn record(&mut self, record: &ResultRecord) {
        self.rounds += 1;
        if record.outcome.success {
            self.successes += 1;
            self.durations_ms.push(record.outcome.duration_ms);
        }
    }

    pub fn record_timeout(&mut self) {
        self.timeouts += 1;
    }

    /// Success rate as a percentage
    pub fn success_rate(&self) -> f64 {
        if self.rounds == 0 {
            0.0
        } else {
            (self.successes as f64 / self.rounds as f64) * 100.0
        }
    }

    pub fn mean_ms(&self) -> Option<f64> {
        if self.durations_ms.is_empty() {
            return None;
        }
        Some(self.durations_ms.iter().sum::<f64>() / self.durations_ms.len() as f64)
    }

    pub fn median_ms(&self) -> Option<f64> {
        if self.durations_ms.is_empty() {
            return None;
        }
        let mut sorted = self.durations_ms.clone();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let mid = sorted.len() / 2;
        if sorted.len() % 2 == 0 {
            Some((sorted[mid - 1] + sorted[mid]) / 2.0)
        } else {
            Some(sorted[mid])
        }
    }
}

/// Everything a finished run produced
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub ledger_path: String,
    pub pairs: Vec<PairReport>,
}

impl RunSummary {
    pub fn new<S: Into<String>>(ledger_path: S) -> Self {
        Self {
            ledger_path: ledger_path.into(),
            pairs: Vec::new(),
        }
    }

    pub fn push(&mut self, report: PairReport) {
        self.pairs.push(report);
    }

    pub fn total_rounds(&self) -> u32 {
        self.pairs.iter().map(|p| p.rounds).sum()
    }

    pub fn total_timeouts(&self) -> u32 {
        self.pairs.iter().map(|p| p.timeouts).sum()
    }

    /// Distinct algorithms in run order
    pub fn algorithms(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for pair in &self.pairs {
            if !seen.contains(&pair.algorithm.as_str()) {
                seen.push(&pair.algorithm);
            }
        }
        seen
    }
}
