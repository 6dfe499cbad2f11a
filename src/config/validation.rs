//! Soft configuration checks
//!
//! [`Config::validate`] rejects values the engine cannot run with. The
//! checks here only produce warnings about settings that are legal but
//! likely to waste a long run.

use crate::{error::Result, models::Config, types::format_value};
use colored::Colorize;
use std::path::Path;

/// One-way delay at which a handshake needs roughly this many trips
const HANDSHAKE_ROUND_TRIPS: f64 = 4.0;

/// Configuration validator with advanced validation rules
pub struct ConfigValidator;

impl ConfigValidator {
    /// Run the hard checks, then collect warnings
    pub fn validate_comprehensive(config: &Config) -> Result<Vec<ValidationWarning>> {
        config.validate()?;

        let mut warnings = Vec::new();
        warnings.extend(Self::validate_sweep(config));
        warnings.extend(Self::validate_retry_settings(config));
        warnings.extend(Self::validate_tool_paths(config));
        warnings.extend(Self::validate_algorithms(config));

        Ok(warnings)
    }

    /// Condition values that are legal but suspicious
    fn validate_sweep(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        for (name, values) in [
            ("rate", &config.rate_values),
            ("delay", &config.delay_values),
            ("loss", &config.loss_values),
        ] {
            let mut seen: Vec<f64> = Vec::new();
            for &value in values.iter() {
                if seen.contains(&value) {
                    warnings.push(ValidationWarning::new(
                        ValidationLevel::Warning,
                        format!("Duplicate {} value {} runs the same conditions twice", name, format_value(value)),
                    ));
                } else {
                    seen.push(value);
                }
            }
        }

        for &rate in &config.rate_values {
            if rate < 1.0 {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Warning,
                    format!("Rate limit of {} Mbit/s will make large certificate chains very slow", format_value(rate)),
                ));
            }
        }

        let budget_ms = config.max_handshake_secs as f64 * 1000.0;
        for &delay in &config.delay_values {
            if delay * HANDSHAKE_ROUND_TRIPS >= budget_ms {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Warning,
                    format!(
                        "Delay of {} ms leaves almost no room in the {}s handshake budget; batches may time out repeatedly",
                        format_value(delay),
                        config.max_handshake_secs
                    ),
                ));
            }
        }

        for &loss in &config.loss_values {
            if loss > 10.0 {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Warning,
                    format!("Packet loss of {}% will cause frequent batch timeouts", format_value(loss)),
                ));
            }
        }

        let conditions = config.sweep().len() as u64;
        let handshakes = conditions * config.rounds as u64;
        if conditions > 50 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                format!("Sweep covers {} network conditions ({} handshakes per algorithm)", conditions, handshakes),
            ));
        }

        warnings
    }

    fn validate_retry_settings(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        match config.max_attempts {
            None => {
                let lossy = config.loss_values.iter().any(|&loss| loss > 0.0);
                if lossy {
                    warnings.push(ValidationWarning::new(
                        ValidationLevel::Info,
                        "Timed-out batches are retried without limit; use --max-attempts to bound the run".to_string(),
                    ));
                }
            }
            Some(1) => warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                "A single attempt per batch aborts the run on the first timeout".to_string(),
            )),
            Some(_) => {}
        }

        if config.sample_size > config.rounds {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                format!(
                    "Sample size {} exceeds {} rounds; each pair runs as a single batch",
                    config.sample_size, config.rounds
                ),
            ));
        }

        warnings
    }

    /// External tools are only checked for presence, not executed
    fn validate_tool_paths(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        for (label, path) in [
            ("Initiator binary", &config.stimer_binary),
            ("Namespace setup script", &config.setup_script),
            ("Namespace cleanup script", &config.cleanup_script),
            ("OpenSSL config", &config.openssl_config),
            ("Root CA config template", &config.rca_config_template),
            ("Intermediate CA config template", &config.ica_config_template),
        ] {
            if looks_like_path(path) && !Path::new(path).exists() {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Warning,
                    format!("{} '{}' does not exist", label, path),
                ));
            }
        }

        if config.record_traffic && !config.use_sudo {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                "Traffic recording without sudo needs capture permissions in both namespaces".to_string(),
            ));
        }

        warnings
    }

    fn validate_algorithms(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();
        let mut seen: Vec<&str> = Vec::new();

        for name in &config.traditional_algorithms {
            if seen.contains(&name.as_str()) {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Warning,
                    format!("Traditional algorithm '{}' is listed more than once", name),
                ));
            } else {
                seen.push(name);
            }
        }

        warnings
    }
}

/// Bare command names are resolved through PATH and not checked
fn looks_like_path(value: &str) -> bool {
    value.contains('/')
}

/// Validation warning levels
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationLevel {
    Info,
    Warning,
    Error,
}

impl ValidationLevel {
    /// Get display string for level
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }

    /// Get color for terminal display
    pub fn color(&self) -> &'static str {
        match self {
            Self::Info => "blue",
            Self::Warning => "yellow",
            Self::Error => "red",
        }
    }
}

/// Configuration validation warning
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub level: ValidationLevel,
    pub message: String,
}

impl ValidationWarning {
    /// Create a new validation warning
    pub fn new(level: ValidationLevel, message: String) -> Self {
        Self { level, message }
    }

    /// Format warning for display
    pub fn format(&self, use_color: bool) -> String {
        let tag = format!("[{}]", self.level.as_str());
        if use_color {
            format!("{} {}", tag.color(self.level.color()).bold(), self.message)
        } else {
            format!("{} {}", tag, self.message)
        }
    }
}

/// Convenience function for comprehensive configuration validation
pub fn validate_config(config: &Config) -> Result<Vec<ValidationWarning>> {
    ConfigValidator::validate_comprehensive(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Defaults with tool paths that never trigger the presence check
    fn quiet_config() -> Config {
        Config {
            stimer_binary: "s_timer".to_string(),
            setup_script: "setup.sh".to_string(),
            cleanup_script: "cleanup.sh".to_string(),
            openssl_config: "oqs.cnf".to_string(),
            rca_config_template: "rca.cnf".to_string(),
            ica_config_template: "ica.cnf".to_string(),
            max_attempts: Some(5),
            ..Default::default()
        }
    }

    fn messages(warnings: &[ValidationWarning]) -> Vec<&str> {
        warnings.iter().map(|w| w.message.as_str()).collect()
    }

    #[test]
    fn test_validation_warning() {
        let warning = ValidationWarning::new(ValidationLevel::Warning, "Test warning".to_string());
        assert_eq!(warning.format(false), "[WARNING] Test warning");
        assert!(warning.format(true).contains("Test warning"));
    }

    #[test]
    fn test_validation_levels() {
        assert_eq!(ValidationLevel::Info.as_str(), "INFO");
        assert_eq!(ValidationLevel::Error.color(), "red");
    }

    #[test]
    fn test_clean_configuration_has_no_warnings() {
        let warnings = validate_config(&quiet_config()).unwrap();
        assert!(warnings.is_empty(), "{:?}", messages(&warnings));
    }

    #[test]
    fn test_hard_errors_still_fail() {
        let config = Config { rounds: 0, ..quiet_config() };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_duplicate_and_extreme_values() {
        let config = Config {
            delay_values: vec![5.0, 5.0, 10000.0],
            loss_values: vec![0.0, 25.0],
            rate_values: vec![0.5],
            ..quiet_config()
        };
        let warnings = validate_config(&config).unwrap();
        let text = messages(&warnings).join("\n");
        assert!(text.contains("Duplicate delay value 5.0"));
        assert!(text.contains("Delay of 10000.0 ms"));
        assert!(text.contains("Packet loss of 25.0%"));
        assert!(text.contains("Rate limit of 0.5 Mbit/s"));
    }

    #[test]
    fn test_unbounded_retry_on_lossy_sweep() {
        let config = Config { max_attempts: None, ..quiet_config() };
        let warnings = validate_config(&config).unwrap();
        assert!(warnings
            .iter()
            .any(|w| w.level == ValidationLevel::Info && w.message.contains("--max-attempts")));

        let config = Config { max_attempts: Some(1), ..quiet_config() };
        let warnings = validate_config(&config).unwrap();
        assert!(warnings.iter().any(|w| w.message.contains("single attempt")));
    }

    #[test]
    fn test_missing_tool_paths() {
        let config = Config {
            setup_script: "/nonexistent/namespace-setup.sh".to_string(),
            ..quiet_config()
        };
        let warnings = validate_config(&config).unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("Namespace setup script"));
    }

    #[test]
    fn test_duplicate_traditional_algorithms() {
        let config = Config {
            traditional_algorithms: vec!["ED25519".to_string(), "ED25519".to_string()],
            ..quiet_config()
        };
        let warnings = validate_config(&config).unwrap();
        assert!(messages(&warnings)[0].contains("more than once"));
    }
}
