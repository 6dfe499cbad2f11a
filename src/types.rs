//! Type definitions shared across the benchmark engine

use serde::{Deserialize, Serialize};
use std::fmt;

// Re-export commonly used types
pub use crate::error::{AppError, Result};

/// Header line of every result ledger
pub const LEDGER_HEADER: &str =
    "Signature Algorithm,Test Round,Rate Limit,Delay,Packet Loss,Success,Handshake Duration [ms]";

/// Family of a signature algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlgorithmFamily {
    /// Classical reference algorithm (RSA, ECDSA, EdDSA)
    Traditional,
    /// Algorithm served by the post-quantum provider
    PostQuantum,
}

impl AlgorithmFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Traditional => "traditional",
            Self::PostQuantum => "post-quantum",
        }
    }
}

/// A signature algorithm under test. Immutable once the catalog is loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Algorithm {
    pub name: String,
    pub family: AlgorithmFamily,
    pub supported: bool,
}

impl Algorithm {
    /// Traditional algorithms are not checked against the provider listing.
    pub fn traditional<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            family: AlgorithmFamily::Traditional,
            supported: true,
        }
    }

    pub fn post_quantum<S: Into<String>>(name: S, supported: bool) -> Self {
        Self {
            name: name.into(),
            family: AlgorithmFamily::PostQuantum,
            supported,
        }
    }

    /// Name used in directory and file names (`RSA:2048` becomes `RSA2048`)
    pub fn file_stem(&self) -> String {
        self.name.replace(':', "")
    }

    /// Curve name for `ECDSA<curve>` identifiers
    pub fn ec_curve(&self) -> Option<&str> {
        self.name
            .strip_prefix("ECDSA")
            .filter(|curve| !curve.is_empty())
    }

    /// Key size for `RSA:<bits>` identifiers
    pub fn rsa_bits(&self) -> Option<&str> {
        self.name
            .strip_prefix("RSA:")
            .filter(|bits| !bits.is_empty() && bits.chars().all(|c| c.is_ascii_digit()))
    }

    /// Name shown in certificate subjects
    pub fn subject_name(&self) -> &str {
        self.ec_curve().unwrap_or(&self.name)
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Symmetric link impairment: bandwidth cap, one-way delay and packet loss.
///
/// The same condition is applied to both link endpoints, so the round-trip
/// time seen by a handshake is roughly twice the configured delay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NetworkCondition {
    /// Rate limit in Mbit/s
    pub rate_mbit: f64,
    /// One-way delay in milliseconds
    pub delay_ms: f64,
    /// Packet loss in percent
    pub loss_percent: f64,
}

impl NetworkCondition {
    pub fn new(rate_mbit: f64, delay_ms: f64, loss_percent: f64) -> Self {
        Self {
            rate_mbit,
            delay_ms,
            loss_percent,
        }
    }

    /// Unimpaired link installed right after topology bring-up
    pub fn baseline() -> Self {
        Self::new(crate::defaults::BASELINE_RATE_MBIT, 0.0, 0.0)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("rate", self.rate_mbit),
            ("delay", self.delay_ms),
            ("loss", self.loss_percent),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(AppError::validation(format!(
                    "Network condition {} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        if self.loss_percent > 100.0 {
            return Err(AppError::validation(format!(
                "Packet loss cannot exceed 100%, got {}",
                self.loss_percent
            )));
        }
        Ok(())
    }

    /// Arguments following `netem` in a `tc qdisc` invocation
    pub fn netem_args(&self) -> Vec<String> {
        vec![
            "rate".to_string(),
            format!("{}mbit", format_value(self.rate_mbit)),
            "delay".to_string(),
            format!("{}ms", format_value(self.delay_ms)),
            "loss".to_string(),
            format!("{}%", format_value(self.loss_percent)),
        ]
    }

    /// Label used in artifact file names
    pub fn label(&self) -> String {
        format!(
            "Rate-{}_Delay-{}_Loss-{}",
            format_value(self.rate_mbit),
            format_value(self.delay_ms),
            format_value(self.loss_percent)
        )
    }

    pub fn approx_rtt_ms(&self) -> f64 {
        2.0 * self.delay_ms
    }
}

impl fmt::Display for NetworkCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}Mbit/s, {}ms delay, {}% loss",
            format_value(self.rate_mbit),
            format_value(self.delay_ms),
            format_value(self.loss_percent)
        )
    }
}

/// Render a measurement value the way the ledger stores it: whole numbers
/// keep one decimal place (`0.0`, `10000.0`), others print as-is.
pub fn format_value(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

/// A contiguous block of rounds still owed for one pair.
///
/// Batches are consumed whole or retried whole; a batch is never split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundBatch {
    /// Number of rounds in this batch
    pub size: u32,
    /// Round index of the first round in this batch (1-based)
    pub first_index: u32,
}

impl RoundBatch {
    /// Next batch for `remaining` owed rounds, or `None` once nothing is owed
    pub fn next(remaining: u32, sample_size: u32, first_index: u32) -> Option<Self> {
        if remaining == 0 {
            return None;
        }
        Some(Self {
            size: remaining.min(sample_size.max(1)),
            first_index,
        })
    }

    /// Round indices covered by this batch
    pub fn indices(&self) -> std::ops::Range<u32> {
        self.first_index..self.first_index + self.size
    }
}

/// Result of a single handshake round
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrialOutcome {
    pub success: bool,
    pub duration_ms: f64,
}

impl TrialOutcome {
    pub fn new(success: bool, duration_ms: f64) -> Self {
        Self {
            success,
            duration_ms,
        }
    }

    /// Failed handshake with the sentinel duration
    pub fn failed() -> Self {
        Self::new(false, 0.0)
    }
}

/// One ledger row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub algorithm: String,
    pub round_index: u32,
    pub condition: NetworkCondition,
    pub outcome: TrialOutcome,
}

impl ResultRecord {
    pub fn new(
        algorithm: &Algorithm,
        round_index: u32,
        condition: NetworkCondition,
        outcome: TrialOutcome,
    ) -> Self {
        Self {
            algorithm: algorithm.name.clone(),
            round_index,
            condition,
            outcome,
        }
    }

    /// Render as a ledger line without the trailing newline
    pub fn to_csv_row(&self) -> String {
        format!(
            "{},{},{},{},{},{},{}",
            self.algorithm,
            self.round_index,
            format_value(self.condition.rate_mbit),
            format_value(self.condition.delay_ms),
            format_value(self.condition.loss_percent),
            self.outcome.success,
            format_value(self.outcome.duration_ms)
        )
    }
}
