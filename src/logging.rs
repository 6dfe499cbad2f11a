//! Structured logging system for the handshake benchmark
//!
//! This module provides:
//! - Structured logging with multiple levels and contexts
//! - Debug mode output carrying every structured field
//! - Trial and batch progress logging
//! - Error event logging tagged with the run's session
//! - JSON structured output for integration with log aggregators

use crate::error::{AppError, Result};
use crate::models::{Config, PairReport};
use crate::types::{NetworkCondition, RoundBatch};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Log level enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    /// Trace level - most detailed
    Trace = 0,
    /// Debug level - detailed information for debugging
    Debug = 1,
    /// Info level - general application information
    Info = 2,
    /// Warning level - potentially harmful situations
    Warn = 3,
    /// Error level - error events but application can continue
    Error = 4,
    /// Fatal level - severe error events that cause application termination
    Fatal = 5,
}

impl LogLevel {
    /// Get log level name as string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Fatal => "FATAL",
        }
    }

    /// Get ANSI color code for console output
    pub fn color_code(&self) -> &'static str {
        match self {
            LogLevel::Trace => "\x1b[37m",    // White
            LogLevel::Debug => "\x1b[36m",    // Cyan
            LogLevel::Info => "\x1b[34m",     // Blue
            LogLevel::Warn => "\x1b[33m",     // Yellow
            LogLevel::Error => "\x1b[31m",    // Red
            LogLevel::Fatal => "\x1b[35m",    // Magenta
        }
    }

    /// Reset ANSI color code
    pub fn reset_code() -> &'static str {
        "\x1b[0m"
    }
}

impl std::str::FromStr for LogLevel {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "TRACE" => Ok(LogLevel::Trace),
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARN" | "WARNING" => Ok(LogLevel::Warn),
            "ERROR" => Ok(LogLevel::Error),
            "FATAL" => Ok(LogLevel::Fatal),
            _ => Err(AppError::parse(format!("Invalid log level: {}", s))),
        }
    }
}

/// Log entry structure for structured logging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Timestamp when log entry was created
    pub timestamp: DateTime<Utc>,
    /// Log level
    pub level: LogLevel,
    /// Log message
    pub message: String,
    /// Logger name/component
    pub logger: String,
    /// Additional structured fields
    pub fields: HashMap<String, serde_json::Value>,
}

/// Logger implementation with multiple output formats
#[derive(Clone)]
pub struct Logger {
    /// Minimum log level to output
    min_level: LogLevel,
    /// Whether to use colored output
    use_color: bool,
    /// Whether console output lists the structured fields
    show_fields: bool,
    /// Output format
    format: LogFormat,
    /// Logger name
    name: String,
    /// Shared context storage
    context: Arc<RwLock<LogContext>>,
}

/// Log output format options
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogFormat {
    /// Human-readable console format
    Console,
    /// JSON format for structured logging
    Json,
    /// Compact single-line format
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "console" | "" => Ok(LogFormat::Console),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            _ => Err(AppError::validation(format!(
                "Invalid log format '{}' (expected console, json or compact)",
                s
            ))),
        }
    }
}

/// Shared logging context for session tracking
#[derive(Debug, Default)]
struct LogContext {
    /// Identifier shared by every logger of a run
    session_id: Option<String>,
}

/// Progress of trial batches for each (algorithm, condition) pair
#[derive(Clone)]
pub struct TrialLogger {
    logger: Logger,
}

/// Specialized logger for topology and impairment operations
#[derive(Clone)]
pub struct NetworkLogger {
    logger: Logger,
}

/// Error event logger with enhanced context
#[derive(Clone)]
pub struct ErrorEventLogger {
    logger: Logger,
}

impl Logger {
    /// Create a new logger
    pub fn new(name: String) -> Self {
        Self {
            min_level: LogLevel::Info,
            use_color: true,
            show_fields: false,
            format: LogFormat::Console,
            name,
            context: Arc::new(RwLock::new(LogContext::default())),
        }
    }

    /// Create a logger with specific configuration
    pub fn with_config(name: String, config: &Config) -> Self {
        let min_level = if config.debug {
            LogLevel::Debug
        } else if config.quiet {
            LogLevel::Warn
        } else {
            LogLevel::Info
        };

        let format = config.log_format.parse().unwrap_or(LogFormat::Console);

        Self {
            min_level,
            use_color: config.enable_color,
            show_fields: config.debug,
            format,
            name,
            context: Arc::new(RwLock::new(LogContext::default())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tag every subsequent entry with `session_id`
    pub async fn set_session_id(&self, session_id: String) {
        let mut context = self.context.write().await;
        context.session_id = Some(session_id);
    }

    /// Create a log entry builder
    pub fn log(&self, level: LogLevel, message: &str) -> LogEntryBuilder<'_> {
        LogEntryBuilder::new(self, level, message.to_string())
    }

    /// Convenience methods for different log levels
    pub fn debug(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Debug, message)
    }

    pub fn info(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Info, message)
    }

    pub fn warn(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Warn, message)
    }

    pub fn error(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Error, message)
    }

    /// Write log entry to output
    async fn write_entry(&self, mut entry: LogEntry) {
        if entry.level < self.min_level {
            return;
        }

        let context = self.context.read().await;
        if let Some(session_id) = &context.session_id {
            entry.fields.insert("session_id".to_string(), serde_json::Value::String(session_id.clone()));
        }
        drop(context);

        let output = match self.format {
            LogFormat::Console => self.format_console(&entry),
            LogFormat::Json => self.format_json(&entry),
            LogFormat::Compact => self.format_compact(&entry),
        };

        // Write to stderr for errors/warnings, stdout for others
        if entry.level >= LogLevel::Warn {
            let _ = writeln!(io::stderr(), "{}", output);
        } else {
            let _ = writeln!(io::stdout(), "{}", output);
        }
    }

    /// Format log entry for console output
    fn format_console(&self, entry: &LogEntry) -> String {
        let timestamp = entry.timestamp.format("%Y-%m-%d %H:%M:%S%.3f");
        let level_str = entry.level.as_str();

        let formatted_level = if self.use_color {
            format!("{}{:>5}{}", entry.level.color_code(), level_str, LogLevel::reset_code())
        } else {
            format!("{:>5}", level_str)
        };

        let mut output = format!("{} {} [{}] {}", timestamp, formatted_level, entry.logger, entry.message);

        // Fields only at debug detail; the message already carries the essentials
        if self.show_fields && !entry.fields.is_empty() {
            let mut fields_str: Vec<String> = entry
                .fields
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            fields_str.sort();
            output.push_str(&format!(" {{{}}}", fields_str.join(", ")));
        }

        output
    }

    /// Format log entry as JSON
    fn format_json(&self, entry: &LogEntry) -> String {
        match serde_json::to_string(entry) {
            Ok(json) => json,
            Err(_) => format!(
                "{{\"error\": \"Failed to serialize log entry\", \"message\": \"{}\"}}",
                entry.message
            ),
        }
    }

    /// Format log entry in compact format
    fn format_compact(&self, entry: &LogEntry) -> String {
        let timestamp = entry.timestamp.format("%H:%M:%S");
        format!(
            "{} {} {}: {}",
            timestamp,
            entry.level.as_str().chars().next().unwrap_or('?'),
            entry.logger,
            entry.message
        )
    }
}

/// Builder pattern for creating log entries
pub struct LogEntryBuilder<'a> {
    logger: &'a Logger,
    entry: LogEntry,
}

impl<'a> LogEntryBuilder<'a> {
    fn new(logger: &'a Logger, level: LogLevel, message: String) -> Self {
        Self {
            logger,
            entry: LogEntry {
                timestamp: Utc::now(),
                level,
                message,
                logger: logger.name.clone(),
                fields: HashMap::new(),
            },
        }
    }

    /// Add a structured field
    pub fn field<T: Serialize>(mut self, key: &str, value: T) -> Self {
        if let Ok(json_value) = serde_json::to_value(value) {
            self.entry.fields.insert(key.to_string(), json_value);
        }
        self
    }

    /// Add the impairment fields of a network condition
    pub fn condition(self, condition: &NetworkCondition) -> Self {
        self.field("rate_mbit", condition.rate_mbit)
            .field("delay_ms", condition.delay_ms)
            .field("loss_percent", condition.loss_percent)
    }

    /// Add error information
    pub fn error_info(self, error: &AppError) -> Self {
        self.field("error_category", error.category())
            .field("error_recoverable", error.is_recoverable())
            .field("error_exit_code", error.exit_code())
    }

    /// Finalize and write the log entry
    pub async fn log(self) {
        self.logger.write_entry(self.entry).await;
    }
}

impl TrialLogger {
    pub fn new(config: &Config) -> Self {
        Self {
            logger: Logger::with_config("TRIAL".to_string(), config),
        }
    }

    pub async fn log_pair_start(&self, algorithm: &str, condition: &NetworkCondition, rounds: u32) {
        self.logger
            .info(&format!("Benchmarking {} at {} ({} rounds)", algorithm, condition, rounds))
            .field("algorithm", algorithm)
            .condition(condition)
            .field("rounds", rounds)
            .log()
            .await;
    }

    pub async fn log_batch_start(&self, algorithm: &str, batch: &RoundBatch, attempt: u32) {
        self.logger
            .debug(&format!(
                "Starting batch of {} round(s) from round {} for {} (attempt {})",
                batch.size, batch.first_index, algorithm, attempt
            ))
            .field("algorithm", algorithm)
            .field("batch_size", batch.size)
            .field("first_round", batch.first_index)
            .field("attempt", attempt)
            .log()
            .await;
    }

    pub async fn log_batch_recorded(
        &self,
        algorithm: &str,
        condition: &NetworkCondition,
        batch: &RoundBatch,
        remaining: u32,
    ) {
        self.logger
            .info(&format!(
                "Open rounds: {}. Results for {} at {} written to ledger",
                remaining, algorithm, condition
            ))
            .field("algorithm", algorithm)
            .condition(condition)
            .field("batch_size", batch.size)
            .field("remaining", remaining)
            .log()
            .await;
    }

    pub async fn log_timeout(&self, algorithm: &str, condition: &NetworkCondition, batch: &RoundBatch, attempt: u32) {
        self.logger
            .warn(&format!(
                "Timeout reached for {} at {}; repeating batch of {} round(s)",
                algorithm, condition, batch.size
            ))
            .field("algorithm", algorithm)
            .condition(condition)
            .field("batch_size", batch.size)
            .field("attempt", attempt)
            .log()
            .await;
    }

    pub async fn log_pair_complete(&self, report: &PairReport) {
        self.logger
            .debug(&format!(
                "Completed {} at {}: {} rounds, {:.1}% success, {} timeout(s)",
                report.algorithm,
                report.condition,
                report.rounds,
                report.success_rate(),
                report.timeouts
            ))
            .field("algorithm", &report.algorithm)
            .condition(&report.condition)
            .field("rounds", report.rounds)
            .field("successes", report.successes)
            .field("timeouts", report.timeouts)
            .field("mean_ms", report.mean_ms())
            .log()
            .await;
    }
}

impl NetworkLogger {
    pub fn new(config: &Config) -> Self {
        Self {
            logger: Logger::with_config("NET".to_string(), config),
        }
    }

    /// Log an impairment change on one endpoint
    pub async fn log_condition_applied(&self, condition: &NetworkCondition, namespace: &str, device: &str) {
        self.logger
            .debug(&format!("Applied {} on {}/{}", condition, namespace, device))
            .condition(condition)
            .field("namespace", namespace)
            .field("device", device)
            .log()
            .await;
    }

    /// Log a topology lifecycle step
    pub async fn log_topology_step(&self, step: &str, success: bool) {
        let level = if success { LogLevel::Info } else { LogLevel::Warn };
        let message = format!("{}: {}", step, if success { "done" } else { "failed" });

        self.logger
            .log(level, &message)
            .field("step", step)
            .field("success", success)
            .log()
            .await;
    }

    /// Log an external command and its exit status
    pub async fn log_command(&self, command: &str, success: bool, code: Option<i32>) {
        let level = if success { LogLevel::Trace } else { LogLevel::Debug };
        self.logger
            .log(level, &format!("{} -> {}", command, code.map_or("signal".to_string(), |c| c.to_string())))
            .field("command", command)
            .field("success", success)
            .field("exit_code", code)
            .log()
            .await;
    }
}

impl ErrorEventLogger {
    pub fn new(config: &Config) -> Self {
        Self {
            logger: Logger::with_config("ERR".to_string(), config),
        }
    }

    /// Log an application error with full context
    pub async fn log_error(&self, error: &AppError, context: Option<&str>) {
        let message = if let Some(ctx) = context {
            format!("{}: {}", ctx, error)
        } else {
            error.to_string()
        };

        let mut builder = self.logger.error(&message).error_info(error);

        if let Some(ctx) = context {
            builder = builder.field("context", ctx);
        }

        builder.log().await;
    }

    /// Log a retry of a timed-out batch
    pub async fn log_retry_attempt(&self, error: &AppError, attempt: u32, max_attempts: Option<u32>) {
        let limit = max_attempts.map_or("unbounded".to_string(), |m| m.to_string());
        self.logger
            .debug(&format!("Retrying after {} (attempt {} of {})", error.category(), attempt, limit))
            .field("error_category", error.category())
            .field("attempt", attempt)
            .field("max_attempts", max_attempts)
            .log()
            .await;
    }

    /// Log that the retry policy gave up
    pub async fn log_retry_exhausted(&self, error: &AppError, attempts: u32) {
        self.logger
            .error(&format!("Giving up after {} attempt(s): {}", attempts, error))
            .error_info(error)
            .field("attempts", attempts)
            .log()
            .await;
    }
}

/// Global logger factory and management
pub struct LoggerFactory {
    config: Config,
    session_id: String,
}

impl LoggerFactory {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            session_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create a logger with a specific name
    pub async fn create_logger(&self, name: &str) -> Logger {
        let logger = Logger::with_config(name.to_string(), &self.config);
        logger.set_session_id(self.session_id.clone()).await;
        logger
    }

    pub async fn create_trial_logger(&self) -> TrialLogger {
        let trial = TrialLogger::new(&self.config);
        trial.logger.set_session_id(self.session_id.clone()).await;
        trial
    }

    pub async fn create_network_logger(&self) -> NetworkLogger {
        let net = NetworkLogger::new(&self.config);
        net.logger.set_session_id(self.session_id.clone()).await;
        net
    }

    pub async fn create_error_logger(&self) -> ErrorEventLogger {
        let err = ErrorEventLogger::new(&self.config);
        err.logger.set_session_id(self.session_id.clone()).await;
        err
    }

    /// Get session ID
    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}
