//! Error handling for the handshake benchmark

use thiserror::Error;

/// Error classes raised by the benchmark engine.
///
/// Everything except [`AppError::Timeout`] is fatal: it signals that the
/// environment or tooling is unusable and the run must stop with a nonzero
/// exit status.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors (CLI, .env, missing paths)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation errors for configuration values
    #[error("Validation error: {0}")]
    Validation(String),

    /// Emulated topology or impairment could not be applied
    #[error("Environment error: {0}")]
    Environment(String),

    /// Trust chain provisioning failed
    #[error("Provisioning error: {0}")]
    Provisioning(String),

    /// No usable signature algorithm
    #[error("Algorithm catalog error: {0}")]
    Catalog(String),

    /// Peer tool reports an unexpected runtime version
    #[error("Peer version mismatch: {0}")]
    PeerVersion(String),

    /// Peer tool could not load the crypto provider
    #[error("Provider not loaded: {0}")]
    ProviderNotLoaded(String),

    /// Peer tool output does not follow the measurement protocol
    #[error("Malformed trial output: {0}")]
    MalformedOutput(String),

    /// A peer or helper process could not be started
    #[error("Process error: {0}")]
    Process(String),

    /// A trial batch exceeded its time budget (retryable)
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// The retry policy gave up on a batch
    #[error("Retries exhausted: {0}")]
    RetriesExhausted(String),

    /// I/O errors (ledger, directories, artifacts)
    #[error("I/O error: {0}")]
    Io(String),

    /// Parsing errors
    #[error("Parsing error: {0}")]
    Parse(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation(message.into())
    }

    pub fn environment<S: Into<String>>(message: S) -> Self {
        Self::Environment(message.into())
    }

    pub fn provisioning<S: Into<String>>(message: S) -> Self {
        Self::Provisioning(message.into())
    }

    pub fn catalog<S: Into<String>>(message: S) -> Self {
        Self::Catalog(message.into())
    }

    pub fn peer_version<S: Into<String>>(message: S) -> Self {
        Self::PeerVersion(message.into())
    }

    pub fn provider_not_loaded<S: Into<String>>(message: S) -> Self {
        Self::ProviderNotLoaded(message.into())
    }

    pub fn malformed_output<S: Into<String>>(message: S) -> Self {
        Self::MalformedOutput(message.into())
    }

    pub fn process<S: Into<String>>(message: S) -> Self {
        Self::Process(message.into())
    }

    pub fn timeout<S: Into<String>>(message: S) -> Self {
        Self::Timeout(message.into())
    }

    pub fn retries_exhausted<S: Into<String>>(message: S) -> Self {
        Self::RetriesExhausted(message.into())
    }

    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io(message.into())
    }

    pub fn parse<S: Into<String>>(message: S) -> Self {
        Self::Parse(message.into())
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    /// Get error category for logging and reporting
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG",
            Self::Validation(_) => "VALIDATION",
            Self::Environment(_) => "ENVIRONMENT",
            Self::Provisioning(_) => "PKI",
            Self::Catalog(_) => "CATALOG",
            Self::PeerVersion(_) => "PEER_VERSION",
            Self::ProviderNotLoaded(_) => "PROVIDER",
            Self::MalformedOutput(_) => "PROTOCOL",
            Self::Process(_) => "PROCESS",
            Self::Timeout(_) => "TIMEOUT",
            Self::RetriesExhausted(_) => "RETRY",
            Self::Io(_) => "IO",
            Self::Parse(_) => "PARSE",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// Only a batch timeout may be retried; everything else ends the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Whether the error came from the peer tool's output protocol
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            Self::PeerVersion(_) | Self::ProviderNotLoaded(_) | Self::MalformedOutput(_)
        )
    }

    /// Get user-friendly error message with suggestions
    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::Config(msg) => {
                format!("Configuration problem: {}\n\nSuggestion: Check -sigs/-out arguments and your .env file.", msg)
            }
            Self::Validation(msg) => {
                format!("Invalid setting: {}\n\nSuggestion: Rates, delays and losses must be non-negative; rounds and sample size must be positive.", msg)
            }
            Self::Environment(msg) => {
                format!("Emulated network unavailable: {}\n\nSuggestion: Run the namespace cleanup script manually and make sure sudo, ip and tc are available.", msg)
            }
            Self::Provisioning(msg) => {
                format!("Certificate setup failed: {}\n\nSuggestion: Verify the OpenSSL config templates and that the provider supports this algorithm for key generation.", msg)
            }
            Self::Catalog(msg) => {
                format!("Nothing to benchmark: {}\n\nSuggestion: Compare the algorithm file with `openssl list -signature-algorithms`.", msg)
            }
            Self::PeerVersion(msg) => {
                format!("Wrong OpenSSL in the handshake client: {}\n\nSuggestion: Adjust PATH and LD_LIBRARY_PATH to point at the expected OpenSSL build.", msg)
            }
            Self::ProviderNotLoaded(msg) => {
                format!("Crypto provider missing: {}\n\nSuggestion: Check the provider section of the OpenSSL config passed to the client.", msg)
            }
            Self::MalformedOutput(msg) => {
                format!("Unexpected client output: {}\n\nSuggestion: The client binary does not match this tool's output protocol.", msg)
            }
            Self::Process(msg) => {
                format!("Process start failed: {}\n\nSuggestion: Check that the peer binaries exist and are executable.", msg)
            }
            Self::Timeout(msg) => {
                format!("Batch timed out: {}\n\nThe batch will be repeated.", msg)
            }
            Self::RetriesExhausted(msg) => {
                format!("Gave up retrying: {}\n\nSuggestion: Raise --max-attempts or --max-hs-dur, or drop the failing condition.", msg)
            }
            Self::Io(msg) => {
                format!("File operation failed: {}\n\nSuggestion: Check file permissions and disk space.", msg)
            }
            Self::Parse(msg) => {
                format!("Failed to parse data: {}\n\nSuggestion: Check the format of your input data or configuration files.", msg)
            }
            Self::Internal(msg) => {
                format!("Internal error: {}\n\nThis is likely a bug. Please report this issue with the error details.", msg)
            }
        }
    }

    /// Get exit code for this error type
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Validation(_) | Self::Parse(_) => 1,
            Self::Environment(_) => 2,
            Self::Provisioning(_) => 3,
            Self::Catalog(_) => 4,
            Self::PeerVersion(_) | Self::ProviderNotLoaded(_) | Self::MalformedOutput(_) => 5,
            Self::Process(_) => 6,
            Self::Timeout(_) | Self::RetriesExhausted(_) => 7,
            Self::Io(_) => 8,
            Self::Internal(_) => 99,
        }
    }

    /// Format error for console display with color coding
    pub fn format_for_console(&self, use_color: bool) -> String {
        let category = self.category();
        let message = self.to_string();

        if use_color {
            use colored::Colorize;
            match self {
                Self::Config(_) | Self::Validation(_) | Self::Parse(_) => {
                    format!("[{}] {}", category.red().bold(), message.red())
                }
                Self::Environment(_) | Self::Provisioning(_) | Self::Catalog(_) => {
                    format!("[{}] {}", category.yellow().bold(), message.yellow())
                }
                Self::Timeout(_) | Self::RetriesExhausted(_) => {
                    format!("[{}] {}", category.blue().bold(), message.blue())
                }
                Self::PeerVersion(_) | Self::ProviderNotLoaded(_) | Self::MalformedOutput(_) => {
                    format!("[{}] {}", category.magenta().bold(), message.magenta())
                }
                Self::Process(_) | Self::Io(_) => {
                    format!("[{}] {}", category.cyan().bold(), message.cyan())
                }
                Self::Internal(_) => {
                    format!("[{}] {}", category.bright_red().bold(), message.bright_red())
                }
            }
        } else {
            format!("[{}] {}", category, message)
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::io(error.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::parse(format!("JSON parse error: {}", error))
    }
}

impl From<dotenv::Error> for AppError {
    fn from(error: dotenv::Error) -> Self {
        Self::config(format!("Environment file error: {}", error))
    }
}

impl From<std::num::ParseIntError> for AppError {
    fn from(error: std::num::ParseIntError) -> Self {
        Self::parse(format!("Integer parse error: {}", error))
    }
}

impl From<std::num::ParseFloatError> for AppError {
    fn from(error: std::num::ParseFloatError) -> Self {
        Self::parse(format!("Float parse error: {}", error))
    }
}

impl From<std::str::ParseBoolError> for AppError {
    fn from(error: std::str::ParseBoolError) -> Self {
        Self::parse(format!("Boolean parse error: {}", error))
    }
}

/// Custom Result type for the application
pub type Result<T> = std::result::Result<T, AppError>;

/// Error context trait for adding context to errors
pub trait ErrorContext<T> {
    /// Add context to an error, keeping its category
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;

    /// Add static context to an error
    fn context(self, message: &'static str) -> Result<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<AppError>,
{
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let original = e.into();
            let context = f();
            original.rewrap(|msg| format!("{}: {}", context, msg))
        })
    }

    fn context(self, message: &'static str) -> Result<T> {
        self.with_context(|| message.to_string())
    }
}

impl AppError {
    /// Rebuild this error with a transformed message, preserving the variant.
    fn rewrap<F: FnOnce(&str) -> String>(self, f: F) -> Self {
        match self {
            Self::Config(m) => Self::Config(f(&m)),
            Self::Validation(m) => Self::Validation(f(&m)),
            Self::Environment(m) => Self::Environment(f(&m)),
            Self::Provisioning(m) => Self::Provisioning(f(&m)),
            Self::Catalog(m) => Self::Catalog(f(&m)),
            Self::PeerVersion(m) => Self::PeerVersion(f(&m)),
            Self::ProviderNotLoaded(m) => Self::ProviderNotLoaded(f(&m)),
            Self::MalformedOutput(m) => Self::MalformedOutput(f(&m)),
            Self::Process(m) => Self::Process(f(&m)),
            Self::Timeout(m) => Self::Timeout(f(&m)),
            Self::RetriesExhausted(m) => Self::RetriesExhausted(f(&m)),
            Self::Io(m) => Self::Io(f(&m)),
            Self::Parse(m) => Self::Parse(f(&m)),
            Self::Internal(m) => Self::Internal(f(&m)),
        }
    }
}

/// Error reporter for structured error output and user feedback
pub struct ErrorReporter {
    pub use_color: bool,
    pub verbose: bool,
}

impl ErrorReporter {
    pub fn new(use_color: bool, verbose: bool) -> Self {
        Self { use_color, verbose }
    }

    /// Report an error to the user
    pub fn report_error(&self, error: &AppError) {
        eprintln!("{}", self.render(error));
    }

    /// Render what [`report_error`](Self::report_error) prints
    pub fn render(&self, error: &AppError) -> String {
        let mut out = error.format_for_console(self.use_color);
        if self.verbose {
            out.push_str("\n\n");
            out.push_str(&error.user_friendly_message());
        }
        out
    }
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_timeouts_are_recoverable() {
        assert!(AppError::timeout("batch").is_recoverable());

        for error in [
            AppError::config("c"),
            AppError::environment("e"),
            AppError::provisioning("p"),
            AppError::catalog("c"),
            AppError::peer_version("v"),
            AppError::provider_not_loaded("p"),
            AppError::malformed_output("m"),
            AppError::retries_exhausted("r"),
            AppError::io("i"),
        ] {
            assert!(!error.is_recoverable(), "{} should be fatal", error.category());
        }
    }

    #[test]
    fn test_protocol_violations() {
        assert!(AppError::peer_version("x").is_protocol_violation());
        assert!(AppError::provider_not_loaded("x").is_protocol_violation());
        assert!(AppError::malformed_output("x").is_protocol_violation());
        assert!(!AppError::timeout("x").is_protocol_violation());
    }

    #[test]
    fn test_exit_codes_are_nonzero() {
        let errors = [
            AppError::config("x"),
            AppError::validation("x"),
            AppError::environment("x"),
            AppError::provisioning("x"),
            AppError::catalog("x"),
            AppError::peer_version("x"),
            AppError::process("x"),
            AppError::timeout("x"),
            AppError::io("x"),
            AppError::internal("x"),
        ];
        for error in &errors {
            assert_ne!(error.exit_code(), 0);
        }
        assert_eq!(AppError::config("x").exit_code(), 1);
        assert_eq!(AppError::environment("x").exit_code(), 2);
        assert_eq!(AppError::catalog("x").exit_code(), 4);
        assert_eq!(AppError::malformed_output("x").exit_code(), 5);
        assert_eq!(AppError::internal("x").exit_code(), 99);
    }

    #[test]
    fn test_error_display() {
        let error = AppError::peer_version("found OpenSSL 3.0.2");
        let display = error.to_string();
        assert!(display.contains("Peer version mismatch"));
        assert!(display.contains("OpenSSL 3.0.2"));
    }

    #[test]
    fn test_error_conversions() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "ledger missing");
        let app_error: AppError = io_error.into();
        assert_eq!(app_error.category(), "IO");

        let parse_error = "abc".parse::<f64>().unwrap_err();
        let app_error: AppError = parse_error.into();
        assert_eq!(app_error.category(), "PARSE");

        let bool_error = "maybe".parse::<bool>().unwrap_err();
        let app_error: AppError = bool_error.into();
        assert_eq!(app_error.category(), "PARSE");
        assert!(app_error.to_string().contains("Boolean parse error"));
    }

    #[test]
    fn test_error_context_keeps_category() {
        let result: Result<()> = Err(AppError::environment("tc failed"));
        let error = result.context("While applying impairment").unwrap_err();
        assert_eq!(error.category(), "ENVIRONMENT");
        assert!(error.to_string().contains("While applying impairment: tc failed"));

        let io: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"));
        let error = io.with_context(|| "Appending to ledger".to_string()).unwrap_err();
        assert_eq!(error.category(), "IO");
        assert!(error.to_string().contains("Appending to ledger"));
    }

    #[test]
    fn test_console_formatting() {
        let error = AppError::catalog("no supported algorithms");
        let plain = error.format_for_console(false);
        assert_eq!(plain, "[CATALOG] Algorithm catalog error: no supported algorithms");
        assert!(error.format_for_console(true).contains("no supported algorithms"));
    }

    #[test]
    fn test_reporter_verbose_render() {
        let reporter = ErrorReporter::new(false, true);
        let rendered = reporter.render(&AppError::provider_not_loaded("line 2"));
        assert!(rendered.starts_with("[PROVIDER]"));
        assert!(rendered.contains("Suggestion:"));

        let terse = ErrorReporter::new(false, false).render(&AppError::io("disk full"));
        assert!(!terse.contains("Suggestion:"));
    }
}
