//! Trial execution for one (algorithm, condition) pair
//!
//! A pair owes `rounds` ledger rows. Rounds are run in batches of at most
//! `sample_size`; each batch gets a fresh responder and initiator and a time
//! budget of `max_handshake × batch size`. A batch that runs out of time is
//! thrown away and repeated in full. A batch that finishes is validated
//! before any of its rows reach the sink, so the ledger never holds part of
//! a batch.

pub mod peers;
pub mod protocol;
pub mod retry;

pub use peers::{PeerCommands, PeerLauncher, PeerProcess, ReadinessProbe, SystemPeerLauncher};
pub use protocol::{parse_initiator_output, ProtocolExpectations};
pub use retry::RetryPolicy;

use crate::error::{AppError, ErrorContext, Result};
use crate::logging::{ErrorEventLogger, TrialLogger};
use crate::models::PairReport;
use crate::pki::TrustMaterial;
use crate::sink::RecordSink;
use crate::types::{Algorithm, NetworkCondition, ResultRecord, RoundBatch, TrialOutcome};
use std::path::Path;
use std::time::Duration;

/// Knobs of the trial loop
#[derive(Debug, Clone)]
pub struct TrialSettings {
    pub sample_size: u32,
    /// Time budget per handshake
    pub max_handshake: Duration,
    pub retry: RetryPolicy,
    pub expectations: ProtocolExpectations,
}

impl Default for TrialSettings {
    fn default() -> Self {
        Self {
            sample_size: crate::defaults::DEFAULT_SAMPLE_SIZE,
            max_handshake: crate::defaults::DEFAULT_MAX_HANDSHAKE,
            retry: RetryPolicy::default(),
            expectations: ProtocolExpectations::default(),
        }
    }
}

/// What a pair is benchmarked with
pub struct TrialTarget<'a> {
    pub algorithm: &'a Algorithm,
    pub condition: NetworkCondition,
    pub material: &'a TrustMaterial,
    /// Session secrets file handed to the responder while recording
    pub keylog: Option<&'a Path>,
}

enum BatchOutcome {
    Completed(Vec<TrialOutcome>),
    TimedOut,
}

pub struct TrialRunner<'a> {
    launcher: &'a dyn PeerLauncher,
    settings: &'a TrialSettings,
    logger: TrialLogger,
    errors: ErrorEventLogger,
}

impl<'a> TrialRunner<'a> {
    pub fn new(
        launcher: &'a dyn PeerLauncher,
        settings: &'a TrialSettings,
        logger: TrialLogger,
        errors: ErrorEventLogger,
    ) -> Self {
        Self {
            launcher,
            settings,
            logger,
            errors,
        }
    }

    /// Time budget for a batch of `batch_size` rounds
    pub fn batch_timeout(&self, batch_size: u32) -> Duration {
        self.settings.max_handshake * batch_size
    }

    /// Run `rounds` rounds for the target, appending one record per round.
    pub async fn run(&self, target: &TrialTarget<'_>, rounds: u32, sink: &dyn RecordSink) -> Result<PairReport> {
        let algorithm = target.algorithm.name.as_str();
        let mut report = PairReport::new(target.algorithm, target.condition);
        let mut remaining = rounds;
        let mut next_index = 1;
        let mut attempts = 0;

        self.logger.log_pair_start(algorithm, &target.condition, rounds).await;

        while let Some(batch) = RoundBatch::next(remaining, self.settings.sample_size, next_index) {
            attempts += 1;
            self.logger.log_batch_start(algorithm, &batch, attempts).await;

            match self.run_batch(target, &batch).await? {
                BatchOutcome::Completed(outcomes) => {
                    for (round_index, outcome) in batch.indices().zip(outcomes) {
                        let record = ResultRecord::new(target.algorithm, round_index, target.condition, outcome);
                        sink.append(&record)?;
                        report.record(&record);
                    }
                    remaining -= batch.size;
                    next_index += batch.size;
                    attempts = 0;
                    self.logger
                        .log_batch_recorded(algorithm, &target.condition, &batch, remaining)
                        .await;
                }
                BatchOutcome::TimedOut => {
                    report.record_timeout();
                    self.logger
                        .log_timeout(algorithm, &target.condition, &batch, attempts)
                        .await;

                    let error = AppError::timeout(format!(
                        "{} at {}: batch of {} round(s) exceeded {:?}",
                        algorithm,
                        target.condition,
                        batch.size,
                        self.batch_timeout(batch.size)
                    ));
                    if !self.settings.retry.permits(attempts) {
                        self.errors.log_retry_exhausted(&error, attempts).await;
                        return Err(AppError::retries_exhausted(format!(
                            "{} after {} attempt(s)",
                            error, attempts
                        )));
                    }
                    self.errors
                        .log_retry_attempt(&error, attempts + 1, self.settings.retry.max_attempts)
                        .await;
                }
            }
        }

        self.logger.log_pair_complete(&report).await;
        Ok(report)
    }

    /// One attempt at a batch; the responder never outlives it
    async fn run_batch(&self, target: &TrialTarget<'_>, batch: &RoundBatch) -> Result<BatchOutcome> {
        let mut responder = self.launcher.spawn_responder(target.material, target.keylog).await?;
        let result = self.drive_initiator(target, batch).await;
        responder.terminate().await;
        result
    }

    async fn drive_initiator(&self, target: &TrialTarget<'_>, batch: &RoundBatch) -> Result<BatchOutcome> {
        self.launcher.wait_ready().await?;

        let mut initiator = self.launcher.spawn_initiator(target.material, batch.size).await?;
        let budget = self.batch_timeout(batch.size);

        let output = match tokio::time::timeout(budget, initiator.wait_output()).await {
            Ok(output) => output?,
            Err(_) => {
                initiator.terminate().await;
                return Ok(BatchOutcome::TimedOut);
            }
        };

        let outcomes = parse_initiator_output(&output.stdout, &self.settings.expectations, batch.size)
            .with_context(|| format!("{} at {}", target.algorithm, target.condition))?;
        Ok(BatchOutcome::Completed(outcomes))
    }
}
