//! Configuration data model and validation

use crate::fsutil::OverwritePolicy;
use crate::types::{AppError, NetworkCondition, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Rounds to complete per (algorithm, condition) pair
    #[serde(default = "default_rounds")]
    pub rounds: u32,

    /// Newline-delimited list of post-quantum algorithms to benchmark
    #[serde(default)]
    pub sigs_file: PathBuf,

    /// Directory receiving the ledger, trust material and recordings
    #[serde(default)]
    pub out_dir: PathBuf,

    /// Record traffic and export session secrets
    #[serde(default)]
    pub record_traffic: bool,

    /// Maximum rounds per batch
    #[serde(default = "default_sample_size")]
    pub sample_size: u32,

    /// Time budget per handshake, in seconds
    #[serde(default = "default_max_handshake_secs")]
    pub max_handshake_secs: u64,

    /// Retry ceiling per batch; `None` retries until success
    #[serde(default)]
    pub max_attempts: Option<u32>,

    #[serde(default = "default_rate_values")]
    pub rate_values: Vec<f64>,

    #[serde(default = "default_delay_values")]
    pub delay_values: Vec<f64>,

    #[serde(default = "default_loss_values")]
    pub loss_values: Vec<f64>,

    /// Reference algorithms prepended to the post-quantum list
    #[serde(default)]
    pub traditional_algorithms: Vec<String>,

    /// Handshake initiator binary
    #[serde(default = "default_stimer_binary")]
    pub stimer_binary: String,

    #[serde(default = "default_openssl_binary")]
    pub openssl_binary: String,

    #[serde(default = "default_setup_script")]
    pub setup_script: String,

    #[serde(default = "default_cleanup_script")]
    pub cleanup_script: String,

    /// OpenSSL config handed to the initiator
    #[serde(default = "default_openssl_config")]
    pub openssl_config: String,

    #[serde(default = "default_rca_template")]
    pub rca_config_template: String,

    #[serde(default = "default_ica_template")]
    pub ica_config_template: String,

    /// Substring expected on the first line of initiator output
    #[serde(default = "default_expected_version")]
    pub expected_version: String,

    /// Substring expected on the second line of initiator output
    #[serde(default = "default_provider_marker")]
    pub provider_marker: String,

    /// Provider tag in `openssl list -signature-algorithms`
    #[serde(default = "default_provider_name")]
    pub provider_name: String,

    #[serde(default = "default_responder_grace_ms")]
    pub responder_grace_ms: u64,

    /// Probe for a listening socket instead of only sleeping
    #[serde(default = "default_probe_readiness")]
    pub probe_readiness: bool,

    #[serde(default = "default_capture_grace_ms")]
    pub capture_grace_ms: u64,

    #[serde(default)]
    pub overwrite: OverwritePolicy,

    /// Prefix namespace commands with sudo
    #[serde(default = "default_use_sudo")]
    pub use_sudo: bool,

    /// Enable colored terminal output
    #[serde(default = "default_enable_color")]
    pub enable_color: bool,

    #[serde(default)]
    pub verbose: bool,

    #[serde(default)]
    pub debug: bool,

    /// Only warnings and errors are logged
    #[serde(default)]
    pub quiet: bool,

    /// console, json or compact
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rounds: default_rounds(),
            sigs_file: PathBuf::new(),
            out_dir: PathBuf::new(),
            record_traffic: false,
            sample_size: default_sample_size(),
            max_handshake_secs: default_max_handshake_secs(),
            max_attempts: None,
            rate_values: default_rate_values(),
            delay_values: default_delay_values(),
            loss_values: default_loss_values(),
            traditional_algorithms: Vec::new(),
            stimer_binary: default_stimer_binary(),
            openssl_binary: default_openssl_binary(),
            setup_script: default_setup_script(),
            cleanup_script: default_cleanup_script(),
            openssl_config: default_openssl_config(),
            rca_config_template: default_rca_template(),
            ica_config_template: default_ica_template(),
            expected_version: default_expected_version(),
            provider_marker: default_provider_marker(),
            provider_name: default_provider_name(),
            responder_grace_ms: default_responder_grace_ms(),
            probe_readiness: default_probe_readiness(),
            capture_grace_ms: default_capture_grace_ms(),
            overwrite: OverwritePolicy::default(),
            use_sudo: default_use_sudo(),
            enable_color: default_enable_color(),
            verbose: false,
            debug: false,
            quiet: false,
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_handshake(&self) -> Duration {
        Duration::from_secs(self.max_handshake_secs)
    }

    pub fn responder_grace(&self) -> Duration {
        Duration::from_millis(self.responder_grace_ms)
    }

    pub fn capture_grace(&self) -> Duration {
        Duration::from_millis(self.capture_grace_ms)
    }

    /// All conditions to run, nested rate → delay → loss
    pub fn sweep(&self) -> Vec<NetworkCondition> {
        let mut conditions =
            Vec::with_capacity(self.rate_values.len() * self.delay_values.len() * self.loss_values.len());
        for &rate in &self.rate_values {
            for &delay in &self.delay_values {
                for &loss in &self.loss_values {
                    conditions.push(NetworkCondition::new(rate, delay, loss));
                }
            }
        }
        conditions
    }

    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Result<()> {
        if self.rounds == 0 {
            return Err(AppError::validation("Rounds must be greater than 0"));
        }

        if self.sample_size == 0 {
            return Err(AppError::validation("Sample size must be greater than 0"));
        }

        if self.max_handshake_secs == 0 {
            return Err(AppError::validation("Maximum handshake duration must be greater than 0"));
        }

        if self.max_attempts == Some(0) {
            return Err(AppError::validation("Maximum attempts must be greater than 0 when set"));
        }

        for (name, values) in [
            ("rate", &self.rate_values),
            ("delay", &self.delay_values),
            ("loss", &self.loss_values),
        ] {
            if values.is_empty() {
                return Err(AppError::validation(format!("At least one {} value is required", name)));
            }
        }

        for condition in self.sweep() {
            condition.validate()?;
        }

        for name in &self.traditional_algorithms {
            if name.trim().is_empty() {
                return Err(AppError::validation("Traditional algorithm name cannot be empty"));
            }
        }

        if self.stimer_binary.is_empty() {
            return Err(AppError::validation("Initiator binary path cannot be empty"));
        }

        if self.expected_version.is_empty() || self.provider_marker.is_empty() {
            return Err(AppError::validation("Output protocol markers cannot be empty"));
        }

        crate::logging::LogFormat::from_str(&self.log_format)?;

        Ok(())
    }

    /// Merge environment variables into this configuration
    pub fn merge_from_env(&mut self) -> Result<()> {
        if let Ok(value) = std::env::var("ROUNDS") {
            self.rounds = parse_env("ROUNDS", &value)?;
        }

        if let Ok(value) = std::env::var("SAMPLE_SIZE") {
            self.sample_size = parse_env("SAMPLE_SIZE", &value)?;
        }

        if let Ok(value) = std::env::var("MAX_HS_DUR") {
            self.max_handshake_secs = parse_env("MAX_HS_DUR", &value)?;
        }

        if let Ok(value) = std::env::var("MAX_ATTEMPTS") {
            self.max_attempts = Some(parse_env("MAX_ATTEMPTS", &value)?);
        }

        if let Ok(value) = std::env::var("RATE_VALUES") {
            self.rate_values = parse_env_list("RATE_VALUES", &value)?;
        }

        if let Ok(value) = std::env::var("DELAY_VALUES") {
            self.delay_values = parse_env_list("DELAY_VALUES", &value)?;
        }

        if let Ok(value) = std::env::var("LOSS_VALUES") {
            self.loss_values = parse_env_list("LOSS_VALUES", &value)?;
        }

        if let Ok(value) = std::env::var("TRADITIONAL_SIGS") {
            self.traditional_algorithms = split_list(&value);
        }

        for (key, target) in [
            ("STIMER_BINARY", &mut self.stimer_binary),
            ("OPENSSL_BINARY", &mut self.openssl_binary),
            ("NSPACE_SETUP", &mut self.setup_script),
            ("NSPACE_CLEANUP", &mut self.cleanup_script),
            ("OSSL_CONFIG", &mut self.openssl_config),
            ("OSSL_RCA_CONFIG", &mut self.rca_config_template),
            ("OSSL_ICA_CONFIG", &mut self.ica_config_template),
            ("EXPECTED_VERSION", &mut self.expected_version),
            ("PROVIDER_MARKER", &mut self.provider_marker),
            ("PROVIDER_NAME", &mut self.provider_name),
        ] {
            if let Ok(value) = std::env::var(key) {
                *target = value;
            }
        }

        if let Ok(value) = std::env::var("RESPONDER_GRACE_MS") {
            self.responder_grace_ms = parse_env("RESPONDER_GRACE_MS", &value)?;
        }

        if let Ok(value) = std::env::var("READINESS_PROBE") {
            self.probe_readiness = parse_env("READINESS_PROBE", &value)?;
        }

        if let Ok(value) = std::env::var("CAPTURE_GRACE_MS") {
            self.capture_grace_ms = parse_env("CAPTURE_GRACE_MS", &value)?;
        }

        if let Ok(value) = std::env::var("USE_SUDO") {
            self.use_sudo = parse_env("USE_SUDO", &value)?;
        }

        if let Ok(value) = std::env::var("ENABLE_COLOR") {
            self.enable_color = parse_env("ENABLE_COLOR", &value)?;
        }

        if let Ok(value) = std::env::var("LOG_FORMAT") {
            self.log_format = value.trim().to_lowercase();
        }

        Ok(())
    }
}

fn parse_env<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))
}

fn parse_env_list(key: &str, value: &str) -> Result<Vec<f64>> {
    split_list(value)
        .iter()
        .map(|item| parse_env(key, item))
        .collect()
}

/// Split a comma-separated list, dropping blanks
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

// Default value functions for serde
fn default_rounds() -> u32 {
    crate::defaults::DEFAULT_ROUNDS
}

fn default_sample_size() -> u32 {
    crate::defaults::DEFAULT_SAMPLE_SIZE
}

fn default_max_handshake_secs() -> u64 {
    crate::defaults::DEFAULT_MAX_HANDSHAKE.as_secs()
}

fn default_rate_values() -> Vec<f64> {
    crate::defaults::DEFAULT_RATE_VALUES.to_vec()
}

fn default_delay_values() -> Vec<f64> {
    crate::defaults::DEFAULT_DELAY_VALUES.to_vec()
}

fn default_loss_values() -> Vec<f64> {
    crate::defaults::DEFAULT_LOSS_VALUES.to_vec()
}

fn default_stimer_binary() -> String {
    crate::defaults::DEFAULT_STIMER_BINARY.to_string()
}

fn default_openssl_binary() -> String {
    crate::defaults::DEFAULT_OPENSSL_BINARY.to_string()
}

fn default_setup_script() -> String {
    crate::defaults::DEFAULT_NSPACE_SETUP.to_string()
}

fn default_cleanup_script() -> String {
    crate::defaults::DEFAULT_NSPACE_CLEANUP.to_string()
}

fn default_openssl_config() -> String {
    crate::defaults::DEFAULT_OSSL_CONFIG.to_string()
}

fn default_rca_template() -> String {
    crate::defaults::DEFAULT_OSSL_RCA_CONFIG.to_string()
}

fn default_ica_template() -> String {
    crate::defaults::DEFAULT_OSSL_ICA_CONFIG.to_string()
}

fn default_expected_version() -> String {
    crate::defaults::DEFAULT_EXPECTED_VERSION.to_string()
}

fn default_provider_marker() -> String {
    crate::defaults::DEFAULT_PROVIDER_MARKER.to_string()
}

fn default_provider_name() -> String {
    crate::defaults::DEFAULT_PROVIDER_NAME.to_string()
}

fn default_responder_grace_ms() -> u64 {
    crate::defaults::DEFAULT_RESPONDER_GRACE.as_millis() as u64
}

fn default_probe_readiness() -> bool {
    true
}

fn default_capture_grace_ms() -> u64 {
    crate::defaults::DEFAULT_CAPTURE_GRACE.as_millis() as u64
}

fn default_use_sudo() -> bool {
    true
}

fn default_enable_color() -> bool {
    crate::defaults::DEFAULT_ENABLE_COLOR
}

fn default_log_format() -> String {
    "console".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.rounds, 10);
        assert_eq!(config.sample_size, 1);
        assert_eq!(config.max_handshake(), Duration::from_secs(30));
        assert!(config.max_attempts.is_none());
    }

    #[test]
    fn test_default_sweep_order() {
        let config = Config::default();
        let sweep = config.sweep();
        assert_eq!(sweep.len(), 9);
        assert_eq!(sweep[0], NetworkCondition::new(10000.0, 0.0, 0.0));
        assert_eq!(sweep[1], NetworkCondition::new(10000.0, 0.0, 0.1));
        assert_eq!(sweep[3], NetworkCondition::new(10000.0, 5.0, 0.0));
        assert_eq!(sweep[8], NetworkCondition::new(10000.0, 50.0, 1.0));
    }

    #[test]
    fn test_sweep_nests_rate_outermost() {
        let config = Config {
            rate_values: vec![10.0, 100.0],
            delay_values: vec![0.0],
            loss_values: vec![0.0, 1.0],
            ..Default::default()
        };
        let rates: Vec<f64> = config.sweep().iter().map(|c| c.rate_mbit).collect();
        assert_eq!(rates, vec![10.0, 10.0, 100.0, 100.0]);
    }

    #[test]
    fn test_zero_rounds_invalid() {
        let config = Config { rounds: 0, ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_sample_size_invalid() {
        let config = Config { sample_size: 0, ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_negative_values_invalid() {
        let config = Config { delay_values: vec![5.0, -1.0], ..Default::default() };
        let error = config.validate().unwrap_err();
        assert_eq!(error.category(), "VALIDATION");
    }

    #[test]
    fn test_empty_value_list_invalid() {
        let config = Config { loss_values: Vec::new(), ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_max_attempts_invalid() {
        let config = Config { max_attempts: Some(0), ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_log_format_invalid() {
        let config = Config { log_format: "xml".to_string(), ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list("RSA:2048, ECDSAprime256v1,,"), vec!["RSA:2048", "ECDSAprime256v1"]);
        assert!(split_list("  ").is_empty());
    }

    #[test]
    fn test_parse_env_list() {
        assert_eq!(parse_env_list("DELAY_VALUES", "0, 5.5,50").unwrap(), vec![0.0, 5.5, 50.0]);
        assert!(parse_env_list("DELAY_VALUES", "0,fast").is_err());
    }
}
