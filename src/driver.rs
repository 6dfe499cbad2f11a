//! Top-level benchmark sweep
//!
//! Order of a run: load the algorithm catalog, bring the topology up, then
//! for every algorithm provision its trust chain and walk the condition sweep
//! (rate → delay → loss). Each condition is applied to the link, optionally
//! captured, and run to completion by the [`TrialRunner`]. The topology is
//! torn down at the end, and on a best-effort basis after a fatal error.

use crate::capture::{CaptureSession, TrafficRecorder, TsharkRecorder, RECORDINGS_DIR};
use crate::catalog::{AlgorithmCatalog, CatalogSettings};
use crate::error::{AppError, Result};
use crate::exec::{CommandRunner, SystemCommandRunner};
use crate::fsutil::DirectoryPreparer;
use crate::logging::{ErrorEventLogger, Logger, LoggerFactory, NetworkLogger, TrialLogger};
use crate::models::{Config, RunSummary};
use crate::network::{LinkPair, NetworkConditionController, Topology, TopologyScripts};
use crate::pki::{OpensslProvisioner, TrustMaterial, TrustProvisioner};
use crate::runner::{
    PeerCommands, PeerLauncher, ProtocolExpectations, ReadinessProbe, RetryPolicy, SystemPeerLauncher,
    TrialRunner, TrialSettings, TrialTarget,
};
use crate::sink::{RecordSink, ResultSink};
use crate::types::{Algorithm, NetworkCondition};
use std::path::PathBuf;
use std::sync::Arc;

/// Everything a run needs to know, fixed before the first command is issued
#[derive(Debug, Clone)]
pub struct RunContext {
    pub rounds: u32,
    pub out_dir: PathBuf,
    pub record_traffic: bool,
    pub sweep: Vec<NetworkCondition>,
    pub catalog: CatalogSettings,
    pub trial: TrialSettings,
    pub scripts: TopologyScripts,
    pub link: LinkPair,
    pub use_sudo: bool,
}

impl RunContext {
    /// Validate `config` and freeze it into a run context
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        if !config.sigs_file.is_file() {
            return Err(AppError::config(format!(
                "File \"{}\" does not exist. Provide a file listing the post-quantum signature algorithms to test",
                config.sigs_file.display()
            )));
        }
        if !config.out_dir.is_dir() {
            return Err(AppError::config(format!(
                "Directory \"{}\" does not exist. Provide a directory to store the results in",
                config.out_dir.display()
            )));
        }

        let retry = match config.max_attempts {
            Some(limit) => RetryPolicy::limited(limit),
            None => RetryPolicy::unbounded(),
        };

        Ok(Self {
            rounds: config.rounds,
            out_dir: config.out_dir.clone(),
            record_traffic: config.record_traffic,
            sweep: config.sweep(),
            catalog: CatalogSettings {
                sigs_file: config.sigs_file.clone(),
                openssl_binary: config.openssl_binary.clone(),
                provider_name: config.provider_name.clone(),
                traditional: config.traditional_algorithms.clone(),
            },
            trial: TrialSettings {
                sample_size: config.sample_size,
                max_handshake: config.max_handshake(),
                retry,
                expectations: ProtocolExpectations::new(&config.expected_version, &config.provider_marker),
            },
            scripts: TopologyScripts {
                setup: PathBuf::from(&config.setup_script),
                cleanup: PathBuf::from(&config.cleanup_script),
            },
            link: LinkPair::default(),
            use_sudo: config.use_sudo,
        })
    }

    pub fn recordings_dir(&self) -> PathBuf {
        self.out_dir.join(RECORDINGS_DIR)
    }
}

/// External effects of a run, swappable in tests
pub struct Collaborators {
    pub commands: Arc<dyn CommandRunner>,
    pub launcher: Arc<dyn PeerLauncher>,
    pub provisioner: Arc<dyn TrustProvisioner>,
    pub recorder: Option<Arc<dyn TrafficRecorder>>,
    pub sink: Arc<dyn RecordSink>,
    pub ledger_path: PathBuf,
}

impl Collaborators {
    /// Real processes, a fresh ledger and, when recording, the capture directory
    pub async fn system(context: &RunContext, config: &Config, factory: &LoggerFactory) -> Result<Self> {
        let commands: Arc<dyn CommandRunner> = Arc::new(SystemCommandRunner::new());
        let preparer = DirectoryPreparer::new(config.overwrite, config.enable_color);

        let ledger_path = context.out_dir.join(ResultSink::file_name(&chrono::Local::now()));
        let sink = ResultSink::create(&ledger_path)?;

        let recorder: Option<Arc<dyn TrafficRecorder>> = if context.record_traffic {
            let dir = context.recordings_dir();
            preparer.prepare(&dir)?;
            Some(Arc::new(TsharkRecorder::new(
                dir,
                context.link.clone(),
                context.use_sudo,
                config.capture_grace(),
                factory.create_logger("CAPTURE").await,
            )))
        } else {
            None
        };

        let probe = if config.probe_readiness {
            ReadinessProbe::listening(config.responder_grace())
        } else {
            ReadinessProbe::FixedDelay(config.responder_grace())
        };
        let launcher = SystemPeerLauncher::new(
            PeerCommands {
                openssl_binary: config.openssl_binary.clone(),
                stimer_binary: config.stimer_binary.clone(),
                openssl_config: PathBuf::from(&config.openssl_config),
                link: context.link.clone(),
                use_sudo: context.use_sudo,
            },
            probe,
            commands.clone(),
        );

        let provisioner = OpensslProvisioner::new(
            context.out_dir.clone(),
            config.openssl_binary.clone(),
            PathBuf::from(&config.rca_config_template),
            PathBuf::from(&config.ica_config_template),
            preparer,
            commands.clone(),
            factory.create_logger("PKI").await,
        );

        Ok(Self {
            commands,
            launcher: Arc::new(launcher),
            provisioner: Arc::new(provisioner),
            recorder,
            sink: Arc::new(sink),
            ledger_path,
        })
    }
}

/// Loggers the driver hands down to its components
#[derive(Clone)]
pub struct DriverLoggers {
    pub general: Logger,
    pub trial: TrialLogger,
    pub network: NetworkLogger,
    pub errors: ErrorEventLogger,
}

impl DriverLoggers {
    pub async fn from_factory(factory: &LoggerFactory) -> Self {
        Self {
            general: factory.create_logger("BENCH").await,
            trial: factory.create_trial_logger().await,
            network: factory.create_network_logger().await,
            errors: factory.create_error_logger().await,
        }
    }
}

pub struct BenchmarkDriver {
    context: RunContext,
    collaborators: Collaborators,
    loggers: DriverLoggers,
}

impl BenchmarkDriver {
    pub fn new(context: RunContext, collaborators: Collaborators, loggers: DriverLoggers) -> Self {
        Self {
            context,
            collaborators,
            loggers,
        }
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    /// Run the whole benchmark
    pub async fn run(&self) -> Result<RunSummary> {
        let algorithms = AlgorithmCatalog::new(
            self.collaborators.commands.as_ref(),
            &self.context.catalog,
            &self.loggers.general,
        )
        .load()
        .await?;

        let controller = NetworkConditionController::new(
            self.collaborators.commands.clone(),
            self.context.link.clone(),
            self.context.use_sudo,
            self.loggers.network.clone(),
        );
        let topology = Topology::new(
            self.collaborators.commands.clone(),
            self.context.scripts.clone(),
            self.context.link.clone(),
            self.context.use_sudo,
            self.loggers.network.clone(),
        );

        if let Err(e) = topology.bring_up(&controller).await {
            self.abandon(&topology, &e).await;
            return Err(e);
        }

        match self.sweep(&algorithms, &controller).await {
            Ok(summary) => {
                topology.teardown().await?;
                self.loggers
                    .general
                    .info(&format!("Results were stored in \"{}\"", summary.ledger_path))
                    .field("rows", summary.total_rounds())
                    .field("timeouts", summary.total_timeouts())
                    .log()
                    .await;
                Ok(summary)
            }
            Err(e) => {
                self.abandon(&topology, &e).await;
                Err(e)
            }
        }
    }

    async fn sweep(&self, algorithms: &[Algorithm], controller: &NetworkConditionController) -> Result<RunSummary> {
        let mut summary = RunSummary::new(self.collaborators.ledger_path.display().to_string());
        let runner = TrialRunner::new(
            self.collaborators.launcher.as_ref(),
            &self.context.trial,
            self.loggers.trial.clone(),
            self.loggers.errors.clone(),
        );

        for algorithm in algorithms {
            let material = self.provision(algorithm).await?;

            self.loggers
                .general
                .info(&format!("Starting \"{}\" benchmark tests", algorithm))
                .field("algorithm", &algorithm.name)
                .field("conditions", self.context.sweep.len())
                .log()
                .await;

            for condition in &self.context.sweep {
                controller.apply(condition).await?;
                self.loggers
                    .general
                    .info(&format!("{}: {}", algorithm, condition))
                    .condition(condition)
                    .log()
                    .await;

                let report = self.run_condition(&runner, algorithm, *condition, &material).await?;
                summary.push(report);
            }
        }

        Ok(summary)
    }

    /// Run one pair, stopping its capture whatever the outcome
    async fn run_condition(
        &self,
        runner: &TrialRunner<'_>,
        algorithm: &Algorithm,
        condition: NetworkCondition,
        material: &TrustMaterial,
    ) -> Result<crate::models::PairReport> {
        let capture: Option<Box<dyn CaptureSession>> = match &self.collaborators.recorder {
            Some(recorder) => Some(recorder.start(algorithm, &condition).await?),
            None => None,
        };

        let target = TrialTarget {
            algorithm,
            condition,
            material,
            keylog: capture.as_ref().map(|session| session.keylog()),
        };
        let outcome = runner
            .run(&target, self.context.rounds, self.collaborators.sink.as_ref())
            .await;

        if let Some(session) = capture {
            let stopped = session.stop().await;
            if outcome.is_ok() {
                stopped?;
            }
        }

        outcome
    }

    /// Provision the chain, retrying a failed provisioning once.
    ///
    /// A second failure reports both diagnostics when they differ.
    async fn provision(&self, algorithm: &Algorithm) -> Result<TrustMaterial> {
        let provisioner = &self.collaborators.provisioner;
        match provisioner.provision(algorithm).await {
            Err(first @ AppError::Provisioning(_)) => {
                self.loggers.errors.log_retry_attempt(&first, 2, Some(2)).await;
                provisioner.reprovision(algorithm).await.map_err(|retry| match (retry, first) {
                    (AppError::Provisioning(again), AppError::Provisioning(cause)) if again != cause => {
                        AppError::Provisioning(format!("{} (first attempt: {})", again, cause))
                    }
                    (retry, _) => retry,
                })
            }
            other => other,
        }
    }

    /// Best-effort teardown after a fatal error
    async fn abandon(&self, topology: &Topology, cause: &AppError) {
        self.loggers.errors.log_error(cause, Some("Benchmark aborted")).await;
        if let Err(e) = topology.teardown().await {
            self.loggers.errors.log_error(&e, Some("Teardown after abort")).await;
        }
    }
}
