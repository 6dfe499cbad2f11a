//! Configuration parsing from CLI arguments and environment variables

use crate::{
    cli::Cli,
    config::env::EnvManager,
    error::{AppError, Result},
    models::{config::split_list, Config},
};
use std::path::PathBuf;

/// Configuration parser that combines CLI arguments with environment variables
pub struct ConfigParser {
    cli: Cli,
    env_file: PathBuf,
}

impl ConfigParser {
    /// Create a new configuration parser with CLI arguments
    pub fn new(cli: Cli) -> Self {
        Self {
            cli,
            env_file: PathBuf::from(".env"),
        }
    }

    /// Read a different env file instead of `./.env`
    pub fn with_env_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.env_file = path.into();
        self
    }

    /// Parse and build the complete configuration
    pub fn parse(&self) -> Result<Config> {
        let mut config = Config::default();

        EnvManager::load_env_file_from(&self.env_file, self.cli.debug)?;
        config.merge_from_env()?;

        self.apply_cli_overrides(&mut config)?;

        config.validate()?;

        Ok(config)
    }

    /// Apply CLI argument overrides to configuration
    fn apply_cli_overrides(&self, config: &mut Config) -> Result<()> {
        self.cli.validate().map_err(AppError::config)?;

        if let Some(rounds) = self.cli.rounds {
            config.rounds = rounds;
        }

        if let Some(ref sigs) = self.cli.sigs {
            config.sigs_file = sigs.clone();
        }

        if let Some(ref out) = self.cli.out {
            config.out_dir = out.clone();
        }

        config.record_traffic = self.cli.rec;

        if let Some(sample_size) = self.cli.sample_size {
            config.sample_size = sample_size;
        }

        if let Some(max_attempts) = self.cli.max_attempts {
            config.max_attempts = Some(max_attempts);
        }

        if let Some(secs) = self.cli.max_handshake {
            config.max_handshake_secs = secs;
        }

        if let Some(policy) = self.cli.overwrite_policy() {
            config.overwrite = policy;
        }

        if let Some(ref list) = self.cli.traditional {
            config.traditional_algorithms = split_list(list);
        }

        if self.cli.no_sudo {
            config.use_sudo = false;
        }

        if self.cli.no_probe {
            config.probe_readiness = false;
        }

        if self.cli.color {
            config.enable_color = true;
        } else if self.cli.no_color {
            config.enable_color = false;
        }

        // CLI-only
        config.verbose = self.cli.verbose;
        config.debug = self.cli.debug;
        config.quiet = self.cli.quiet;

        if config.debug {
            eprintln!("Applied CLI overrides to configuration");
            eprintln!("{}", display_config_summary(config));
        }

        Ok(())
    }
}

/// Convenience function to load complete configuration from CLI arguments
pub fn load_config(cli: Cli) -> Result<Config> {
    ConfigParser::new(cli).parse()
}

/// Display configuration summary for debug purposes
pub fn display_config_summary(config: &Config) -> String {
    let join = |values: &[f64]| {
        values
            .iter()
            .map(|v| crate::types::format_value(*v))
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut summary = Vec::new();

    summary.push(format!("Algorithm List: {}", config.sigs_file.display()));
    summary.push(format!("Output Directory: {}", config.out_dir.display()));
    summary.push(format!("Rounds: {}", config.rounds));
    summary.push(format!("Sample Size: {}", config.sample_size));
    summary.push(format!("Max Handshake: {}s", config.max_handshake_secs));
    summary.push(format!(
        "Max Attempts: {}",
        config
            .max_attempts
            .map(|n| n.to_string())
            .unwrap_or_else(|| "unbounded".to_string())
    ));
    summary.push(format!("Rates [Mbit/s]: {}", join(&config.rate_values)));
    summary.push(format!("Delays [ms]: {}", join(&config.delay_values)));
    summary.push(format!("Losses [%]: {}", join(&config.loss_values)));
    if !config.traditional_algorithms.is_empty() {
        summary.push(format!("Traditional: {}", config.traditional_algorithms.join(", ")));
    }
    summary.push(format!("Record Traffic: {}", config.record_traffic));
    summary.push(format!("Overwrite: {}", config.overwrite));
    summary.push(format!("Use Sudo: {}", config.use_sudo));
    summary.push(format!("Color Output: {}", config.enable_color));
    summary.push(format!("Verbose: {}", config.verbose));
    summary.push(format!("Debug: {}", config.debug));

    summary.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fsutil::OverwritePolicy;
    use clap::Parser;
    use std::env;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &["ROUNDS", "SAMPLE_SIZE", "MAX_HS_DUR", "DELAY_VALUES", "TRADITIONAL_SIGS", "USE_SUDO"];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    fn parser(args: &[&str]) -> ConfigParser {
        ConfigParser::new(Cli::parse_from(args)).with_env_file("/nonexistent/.env")
    }

    #[test]
    fn test_cli_overrides() {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        let config = parser(&[
            "hsbench",
            "--rounds",
            "3",
            "--sigs",
            "sigs.txt",
            "--out",
            "/tmp/out",
            "--rec",
            "--sample-size",
            "2",
            "--max-attempts",
            "4",
            "--traditional",
            "ED25519, RSA:2048",
            "--no-sudo",
            "--no-color",
            "-y",
        ])
        .parse()
        .unwrap();

        assert_eq!(config.rounds, 3);
        assert_eq!(config.sigs_file, PathBuf::from("sigs.txt"));
        assert_eq!(config.out_dir, PathBuf::from("/tmp/out"));
        assert!(config.record_traffic);
        assert_eq!(config.sample_size, 2);
        assert_eq!(config.max_attempts, Some(4));
        assert_eq!(config.traditional_algorithms, vec!["ED25519", "RSA:2048"]);
        assert!(!config.use_sudo);
        assert!(!config.enable_color);
        assert_eq!(config.overwrite, OverwritePolicy::Always);
    }

    #[test]
    fn test_env_values_apply_without_cli() {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        env::set_var("SAMPLE_SIZE", "5");
        env::set_var("DELAY_VALUES", "1.5,20");

        let result = parser(&["hsbench", "--sigs", "s", "--out", "o"]).parse();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.sample_size, 5);
        assert_eq!(config.delay_values, vec![1.5, 20.0]);
        assert_eq!(config.rounds, 10);
    }

    #[test]
    fn test_cli_overrides_env_vars() {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        env::set_var("ROUNDS", "8");

        let result = parser(&["hsbench", "--rounds", "12", "--sigs", "s", "--out", "o"]).parse();
        clear_env();

        assert_eq!(result.unwrap().rounds, 12);
    }

    #[test]
    fn test_env_file_is_loaded() {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        let env_file = NamedTempFile::new().unwrap();
        std::fs::write(env_file.path(), "MAX_HS_DUR=12\nTRADITIONAL_SIGS=ED25519\n").unwrap();

        let result = ConfigParser::new(Cli::parse_from(["hsbench", "--sigs", "s", "--out", "o"]))
            .with_env_file(env_file.path())
            .parse();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.max_handshake_secs, 12);
        assert_eq!(config.traditional_algorithms, vec!["ED25519"]);
    }

    #[test]
    fn test_invalid_env_value_is_config_error() {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        env::set_var("USE_SUDO", "sometimes");

        let result = parser(&["hsbench", "--sigs", "s", "--out", "o"]).parse();
        clear_env();

        assert_eq!(result.unwrap_err().category(), "CONFIG");
    }

    #[test]
    fn test_conflicting_flags_rejected() {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        let result = parser(&["hsbench", "--sigs", "s", "--out", "o", "--color", "--no-color"]).parse();
        assert!(result.is_err());
    }

    #[test]
    fn test_config_summary() {
        let config = Config {
            sigs_file: PathBuf::from("sigs.txt"),
            traditional_algorithms: vec!["ED25519".to_string()],
            ..Default::default()
        };
        let summary = display_config_summary(&config);

        assert!(summary.contains("Algorithm List: sigs.txt"));
        assert!(summary.contains("Max Attempts: unbounded"));
        assert!(summary.contains("Delays [ms]: 0.0, 5.0, 50.0"));
        assert!(summary.contains("Traditional: ED25519"));
    }
}
