//! Command-line interface

use crate::error::{AppError, Result};
use crate::fsutil::OverwritePolicy;
use clap::Parser;
use regex::Regex;
use std::path::PathBuf;

/// Long options accepted with a single leading dash
const LEGACY_OPTIONS: &[&str] = &[
    "rounds",
    "sigs",
    "out",
    "rec",
    "sample-size",
    "max-attempts",
    "max-handshake",
    "overwrite",
    "traditional",
];

/// Handshake Bench - TLS handshake latency of post-quantum signature algorithms under emulated network conditions
#[derive(Parser, Debug, Clone)]
#[command(name = "hsbench")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Rounds per algorithm and network condition [default: 10]
    #[arg(long)]
    pub rounds: Option<u32>,

    /// File listing the post-quantum signature algorithms, one per line
    #[arg(long, value_name = "FILE", required_unless_present = "env_help")]
    pub sigs: Option<PathBuf>,

    /// Existing directory receiving the ledger and trust material
    #[arg(long, value_name = "DIR", required_unless_present = "env_help")]
    pub out: Option<PathBuf>,

    /// Record traffic and export TLS session secrets
    #[arg(long)]
    pub rec: bool,

    /// Maximum rounds per batch
    #[arg(long)]
    pub sample_size: Option<u32>,

    /// Give up on a batch after this many timed-out attempts
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Time budget per handshake in seconds
    #[arg(long, value_name = "SECS", value_parser = parse_duration)]
    pub max_handshake: Option<u64>,

    /// What to do with existing trust material directories (ask, always, never)
    #[arg(long, value_parser = parse_overwrite)]
    pub overwrite: Option<OverwritePolicy>,

    /// Overwrite existing directories without asking
    #[arg(short = 'y', long, conflicts_with = "overwrite")]
    pub yes: bool,

    /// Traditional reference algorithms (comma-separated)
    #[arg(long, value_name = "LIST")]
    pub traditional: Option<String>,

    /// Run namespace commands without sudo
    #[arg(long)]
    pub no_sudo: bool,

    /// Wait a fixed grace period instead of probing for the responder socket
    #[arg(long)]
    pub no_probe: bool,

    /// Force colored output
    #[arg(long)]
    pub color: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Enable verbose output
    #[arg(long)]
    pub verbose: bool,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,

    /// Only log warnings and errors
    #[arg(short, long)]
    pub quiet: bool,

    /// List supported environment variables and exit
    #[arg(long)]
    pub env_help: bool,
}

impl Cli {
    /// Parse the process arguments, accepting legacy single-dash options
    pub fn parse_normalized() -> Result<Self> {
        let args = normalize_args(std::env::args())?;
        Ok(Self::parse_from(args))
    }

    /// Validate CLI arguments for conflicts and requirements
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.color && self.no_color {
            return Err("Cannot specify both --color and --no-color".to_string());
        }

        if self.quiet && (self.verbose || self.debug) {
            return Err("--quiet cannot be combined with --verbose or --debug".to_string());
        }

        if self.rounds == Some(0) {
            return Err("--rounds must be greater than 0".to_string());
        }

        if self.sample_size == Some(0) {
            return Err("--sample-size must be greater than 0".to_string());
        }

        if self.max_attempts == Some(0) {
            return Err("--max-attempts must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Effective overwrite policy requested on the command line
    pub fn overwrite_policy(&self) -> Option<OverwritePolicy> {
        if self.yes {
            Some(OverwritePolicy::Always)
        } else {
            self.overwrite
        }
    }

    /// Check if colors should be enabled
    pub fn use_colors(&self) -> bool {
        if self.color {
            true
        } else if self.no_color {
            false
        } else {
            supports_color()
        }
    }
}

/// Rewrite `-rounds 5` style options to `--rounds 5`.
///
/// Only known long names are rewritten so short flags like `-y` and
/// `-q` keep their meaning. Everything after `--` is left alone.
pub fn normalize_args<I, S>(args: I) -> Result<Vec<String>>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let pattern = Regex::new(r"^-([a-z][a-z0-9-]+)(=.*)?$")
        .map_err(|e| AppError::internal(format!("Invalid option pattern: {}", e)))?;

    let mut normalized = Vec::new();
    let mut passthrough = false;

    for arg in args {
        let arg = arg.into();
        if passthrough {
            normalized.push(arg);
            continue;
        }
        if arg == "--" {
            passthrough = true;
            normalized.push(arg);
            continue;
        }

        let rewritten = pattern.captures(&arg).and_then(|caps| {
            let name = caps.get(1)?.as_str();
            if LEGACY_OPTIONS.contains(&name) {
                let value = caps.get(2).map(|m| m.as_str()).unwrap_or("");
                Some(format!("--{}{}", name, value))
            } else {
                None
            }
        });
        normalized.push(rewritten.unwrap_or(arg));
    }

    Ok(normalized)
}

/// Parse duration from seconds string
fn parse_duration(s: &str) -> std::result::Result<u64, String> {
    if s.starts_with('+') || s.starts_with("0x") || s.starts_with("0X") {
        return Err(format!("Invalid duration: {}", s));
    }

    s.parse::<u64>()
        .map_err(|_| format!("Invalid duration: {}", s))
        .and_then(|secs| {
            if secs == 0 {
                Err("Duration must be greater than 0".to_string())
            } else if secs > 3600 {
                Err("Duration cannot exceed 3600 seconds".to_string())
            } else {
                Ok(secs)
            }
        })
}

fn parse_overwrite(s: &str) -> std::result::Result<OverwritePolicy, String> {
    s.parse::<OverwritePolicy>().map_err(|e| e.to_string())
}

/// Check if the terminal supports color output
fn supports_color() -> bool {
    if let Ok(term) = std::env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }

    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    if std::env::var("FORCE_COLOR").is_ok() {
        return true;
    }

    #[cfg(unix)]
    {
        true
    }
    #[cfg(not(unix))]
    {
        false
    }
}
