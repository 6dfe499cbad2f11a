//! Environment variable handling and .env file management

use crate::error::{AppError, Result};
use crate::models::config::split_list;
use std::path::Path;

/// Environment variable configuration manager
pub struct EnvManager;

impl EnvManager {
    /// Load .env file if it exists
    pub fn load_env_file(debug: bool) -> Result<()> {
        Self::load_env_file_from(Path::new(".env"), debug)
    }

    /// Load the given env file if it exists; variables already set win
    pub fn load_env_file_from(path: &Path, debug: bool) -> Result<()> {
        if path.exists() {
            dotenv::from_path(path)
                .map_err(|e| AppError::config(format!("Failed to load {}: {}", path.display(), e)))?;

            if debug {
                eprintln!("Loaded configuration from {}", path.display());
            }
        } else if debug {
            eprintln!("No {} file found, using defaults and CLI arguments", path.display());
        }

        Ok(())
    }

    /// Create example .env file content
    pub fn create_example_env_content() -> String {
        r#"# Handshake Benchmark Configuration
#
# Values here are used as defaults and can be overridden by command-line
# arguments.

# Maximum rounds per batch; a timed-out batch is repeated in full
# SAMPLE_SIZE=1

# Time budget per handshake in seconds
# MAX_HS_DUR=30

# Give up on a batch after this many timed-out attempts (unset = retry forever)
# MAX_ATTEMPTS=5

# Emulated conditions (comma-separated); every combination is run
# RATE_VALUES=10000.0
# DELAY_VALUES=0.0,5.0,50.0
# LOSS_VALUES=0,0.1,1.0

# Traditional reference algorithms prepended to the post-quantum list
# TRADITIONAL_SIGS=ED25519,RSA:2048,ECDSAprime256v1

# Tool and script locations
# STIMER_BINARY=./tls-client/s_timer
# OPENSSL_BINARY=openssl
# NSPACE_SETUP=./virt-test-env/namespace-setup.sh
# NSPACE_CLEANUP=./virt-test-env/namespace-cleanup.sh
# OSSL_CONFIG=./emulated-nw-assessmnt/oqs-openssl.cnf
# OSSL_RCA_CONFIG=./emulated-nw-assessmnt/oqs-openssl-rca.cnf
# OSSL_ICA_CONFIG=./emulated-nw-assessmnt/oqs-openssl-ica.cnf

# Initiator output markers
# EXPECTED_VERSION=OpenSSL 3.2.0
# PROVIDER_MARKER=provider loaded successfully
# PROVIDER_NAME=oqsprovider

# Responder start-up grace and capture warm-up, in milliseconds
# RESPONDER_GRACE_MS=200
# READINESS_PROBE=true
# CAPTURE_GRACE_MS=2000

# Prefix namespace commands with sudo (true/false)
# USE_SUDO=true

# Enable colored output (true/false)
# ENABLE_COLOR=true

# Log format: console, json or compact
# LOG_FORMAT=console
"#
        .to_string()
    }

    /// Save example .env file to disk
    pub fn save_example_env_file(path: &Path) -> Result<()> {
        std::fs::write(path, Self::create_example_env_content())
            .map_err(|e| AppError::config(format!("Failed to write example .env file: {}", e)))
    }

    /// Validate environment variable format before parsing
    pub fn validate_env_var(key: &str, value: &str) -> Result<()> {
        match key {
            "ROUNDS" | "SAMPLE_SIZE" | "MAX_ATTEMPTS" => {
                let count: u32 = value
                    .trim()
                    .parse()
                    .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
                if count == 0 {
                    return Err(AppError::config(format!("{} must be greater than 0", key)));
                }
            }
            "MAX_HS_DUR" => {
                let secs: u64 = value
                    .trim()
                    .parse()
                    .map_err(|e| AppError::config(format!("Invalid MAX_HS_DUR value '{}': {}", value, e)))?;
                if secs == 0 || secs > 3600 {
                    return Err(AppError::config(format!(
                        "MAX_HS_DUR must be between 1 and 3600 seconds, got: {}",
                        secs
                    )));
                }
            }
            "RATE_VALUES" | "DELAY_VALUES" | "LOSS_VALUES" => {
                let items = split_list(value);
                if items.is_empty() {
                    return Err(AppError::config(format!("{} cannot be empty", key)));
                }
                for item in items {
                    let number: f64 = item
                        .parse()
                        .map_err(|e| AppError::config(format!("Invalid {} entry '{}': {}", key, item, e)))?;
                    if !number.is_finite() || number < 0.0 {
                        return Err(AppError::config(format!("{} entries must be non-negative, got: {}", key, item)));
                    }
                    if key == "LOSS_VALUES" && number > 100.0 {
                        return Err(AppError::config(format!("LOSS_VALUES entries cannot exceed 100, got: {}", item)));
                    }
                }
            }
            "RESPONDER_GRACE_MS" | "CAPTURE_GRACE_MS" => {
                value
                    .trim()
                    .parse::<u64>()
                    .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
            }
            "USE_SUDO" | "ENABLE_COLOR" | "READINESS_PROBE" => {
                value
                    .trim()
                    .parse::<bool>()
                    .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
            }
            "LOG_FORMAT" => {
                value.parse::<crate::logging::LogFormat>()?;
            }
            "EXPECTED_VERSION" | "PROVIDER_MARKER" | "PROVIDER_NAME" | "STIMER_BINARY" => {
                if value.is_empty() {
                    return Err(AppError::config(format!("{} cannot be empty", key)));
                }
            }
            _ => {
                // Paths and unknown variables are not checked here
            }
        }

        Ok(())
    }

    /// Get list of all supported environment variables with descriptions
    pub fn get_supported_env_vars() -> Vec<(&'static str, &'static str, &'static str)> {
        vec![
            ("ROUNDS", "Rounds per algorithm and condition", "10"),
            ("SAMPLE_SIZE", "Maximum rounds per batch", "1"),
            ("MAX_HS_DUR", "Time budget per handshake in seconds", "30"),
            ("MAX_ATTEMPTS", "Attempts per batch before giving up", "5"),
            ("RATE_VALUES", "Rate limits in Mbit/s", "10000.0"),
            ("DELAY_VALUES", "One-way delays in ms", "0.0,5.0,50.0"),
            ("LOSS_VALUES", "Packet loss in percent", "0,0.1,1.0"),
            ("TRADITIONAL_SIGS", "Reference algorithms", "ED25519,RSA:2048"),
            ("STIMER_BINARY", "Handshake timing client", "./tls-client/s_timer"),
            ("OPENSSL_BINARY", "OpenSSL command", "openssl"),
            ("NSPACE_SETUP", "Namespace setup script", "./virt-test-env/namespace-setup.sh"),
            ("NSPACE_CLEANUP", "Namespace cleanup script", "./virt-test-env/namespace-cleanup.sh"),
            ("OSSL_CONFIG", "OpenSSL config for the initiator", "./emulated-nw-assessmnt/oqs-openssl.cnf"),
            ("OSSL_RCA_CONFIG", "Root CA config template", "./emulated-nw-assessmnt/oqs-openssl-rca.cnf"),
            ("OSSL_ICA_CONFIG", "Intermediate CA config template", "./emulated-nw-assessmnt/oqs-openssl-ica.cnf"),
            ("EXPECTED_VERSION", "Expected first line of initiator output", "OpenSSL 3.2.0 "),
            ("PROVIDER_MARKER", "Expected second line of initiator output", "provider loaded successfully"),
            ("PROVIDER_NAME", "Provider tag in the algorithm listing", "oqsprovider"),
            ("RESPONDER_GRACE_MS", "Responder start-up grace in ms", "200"),
            ("READINESS_PROBE", "Poll for the listening socket", "true"),
            ("CAPTURE_GRACE_MS", "Capture warm-up in ms", "2000"),
            ("USE_SUDO", "Prefix namespace commands with sudo", "true"),
            ("ENABLE_COLOR", "Enable colored output", "true"),
            ("LOG_FORMAT", "console, json or compact", "console"),
        ]
    }

    /// Display environment variable help
    pub fn display_env_help() -> String {
        let mut help = String::new();
        help.push_str("Supported Environment Variables:\n\n");

        for (var, description, example) in Self::get_supported_env_vars() {
            help.push_str(&format!("  {:<20} {}\n", var, description));
            help.push_str(&format!("  {:<20} Example: {}\n\n", "", example));
        }

        help.push_str("Configuration Priority (highest to lowest):\n");
        help.push_str("  1. Command-line arguments\n");
        help.push_str("  2. Environment variables\n");
        help.push_str("  3. .env file values\n");
        help.push_str("  4. Default values\n");

        help
    }

    /// Validate all currently set environment variables
    pub fn validate_current_env() -> Result<Vec<String>> {
        let mut warnings = Vec::new();

        for (var_name, _, _) in Self::get_supported_env_vars() {
            if let Ok(value) = std::env::var(var_name) {
                if let Err(e) = Self::validate_env_var(var_name, &value) {
                    warnings.push(format!("Warning: {}", e));
                }
            }
        }

        Ok(warnings)
    }

    /// Validate the contents of an env file without loading it
    pub fn check_env_file(path: &Path) -> Result<Option<Vec<String>>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::config(format!("Failed to read {}: {}", path.display(), e)))?;

        let mut warnings = Vec::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                if let Err(e) = Self::validate_env_var(key.trim(), value.trim()) {
                    warnings.push(format!("Line '{}': {}", line, e));
                }
            }
        }

        Ok(Some(warnings))
    }
}
