//! Main application orchestration and execution

use crate::{
    cli::Cli,
    config::{display_config_summary, load_config, validate_config, EnvManager},
    driver::{BenchmarkDriver, Collaborators, DriverLoggers, RunContext},
    error::Result,
    logging::LoggerFactory,
    models::RunSummary,
    output::{OutputCoordinator, OutputFormatterFactory},
};

/// Main application struct that coordinates all components
pub struct App {
    cli: Cli,
}

impl App {
    /// Create a new application instance with CLI configuration
    pub fn new(cli: Cli) -> Result<Self> {
        Ok(Self { cli })
    }

    /// Run the benchmark and return the printed summary
    pub async fn run(self) -> Result<Option<RunSummary>> {
        if self.cli.env_help {
            println!("{}", EnvManager::display_env_help());
            return Ok(None);
        }

        let config = load_config(self.cli.clone())?;
        let warnings = validate_config(&config)?;

        if !config.quiet {
            println!("{}", version_banner());
        }

        if config.debug {
            println!("\nConfiguration Summary:");
            println!("{}", display_config_summary(&config));
        }

        if !warnings.is_empty() && !config.quiet {
            println!("\nConfiguration Warnings:");
            for warning in &warnings {
                println!("  {}", warning.format(config.enable_color));
            }
        }

        let context = RunContext::from_config(&config)?;
        let factory = LoggerFactory::new(config.clone());
        let collaborators = Collaborators::system(&context, &config, &factory).await?;
        let loggers = DriverLoggers::from_factory(&factory).await;

        let driver = BenchmarkDriver::new(context, collaborators, loggers);
        let summary = driver.run().await?;

        let formatter = OutputFormatterFactory::create_formatter(config.enable_color, !config.quiet);
        let coordinator = OutputCoordinator::new(formatter);
        println!("{}", coordinator.display_summary(&summary)?);

        Ok(Some(summary))
    }
}

/// Name, version and build metadata
pub fn version_banner() -> String {
    let mut banner = format!("{} v{}", crate::PKG_NAME, crate::VERSION);
    if let Some(commit) = option_env!("GIT_COMMIT") {
        banner.push_str(&format!(" ({})", commit));
    }
    if let Some(built) = option_env!("BUILD_TIME") {
        banner.push_str(&format!(", built {}", built));
    }
    banner
}
