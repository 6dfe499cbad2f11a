//! Output directory preparation and the overwrite prompt

use crate::error::{AppError, ErrorContext, Result};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::str::FromStr;

/// Invalid answers tolerated before the prompt gives up
const MAX_PROMPT_ATTEMPTS: usize = 5;

/// What to do when a directory the run wants to create already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverwritePolicy {
    /// Ask on the terminal
    #[default]
    Ask,
    /// Delete and recreate without asking
    Always,
    /// Keep the existing directory
    Never,
}

impl FromStr for OverwritePolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ask" => Ok(Self::Ask),
            "always" | "yes" => Ok(Self::Always),
            "never" | "no" => Ok(Self::Never),
            _ => Err(AppError::validation(format!(
                "Invalid overwrite policy '{}' (expected ask, always or never)",
                s
            ))),
        }
    }
}

impl fmt::Display for OverwritePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ask => "ask",
            Self::Always => "always",
            Self::Never => "never",
        })
    }
}

/// State of a directory after preparation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryState {
    Created,
    Overwritten,
    /// Existed and was left untouched
    Kept,
}

/// Creates run directories, honoring the overwrite policy
#[derive(Debug, Clone)]
pub struct DirectoryPreparer {
    policy: OverwritePolicy,
    use_color: bool,
}

impl DirectoryPreparer {
    pub fn new(policy: OverwritePolicy, use_color: bool) -> Self {
        Self { policy, use_color }
    }

    pub fn policy(&self) -> OverwritePolicy {
        self.policy
    }

    /// Prepare `path`, prompting on the terminal if the policy says so
    pub fn prepare(&self, path: &Path) -> Result<DirectoryState> {
        let stdin = io::stdin();
        let mut input = stdin.lock();
        let mut output = io::stdout();
        self.prepare_with(path, &mut input, &mut output)
    }

    /// Prepare `path` using the given prompt streams
    pub fn prepare_with<R: BufRead, W: Write>(
        &self,
        path: &Path,
        input: &mut R,
        output: &mut W,
    ) -> Result<DirectoryState> {
        if !path.exists() {
            std::fs::create_dir_all(path).with_context(|| format!("Creating {}", path.display()))?;
            return Ok(DirectoryState::Created);
        }

        if !path.is_dir() {
            return Err(AppError::io(format!("{} exists and is not a directory", path.display())));
        }

        let overwrite = match self.policy {
            OverwritePolicy::Always => true,
            OverwritePolicy::Never => false,
            OverwritePolicy::Ask => self.ask(path, input, output)?,
        };

        if overwrite {
            std::fs::remove_dir_all(path).with_context(|| format!("Removing {}", path.display()))?;
            std::fs::create_dir_all(path).with_context(|| format!("Recreating {}", path.display()))?;
            Ok(DirectoryState::Overwritten)
        } else {
            Ok(DirectoryState::Kept)
        }
    }

    fn ask<R: BufRead, W: Write>(&self, path: &Path, input: &mut R, output: &mut W) -> Result<bool> {
        for _ in 0..MAX_PROMPT_ATTEMPTS {
            write!(
                output,
                "Directory \"{}\" already exists. Overwrite it (ALL subdirectories and files will be lost)? [y/N] ",
                path.display()
            )?;
            output.flush()?;

            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                // EOF keeps the directory
                writeln!(output)?;
                return Ok(false);
            }

            match parse_answer(&line) {
                Some(answer) => return Ok(answer),
                None => {
                    let hint = "Please respond with yes or no.";
                    if self.use_color {
                        writeln!(output, "{}", hint.blue())?;
                    } else {
                        writeln!(output, "{}", hint)?;
                    }
                }
            }
        }

        Err(AppError::validation(format!(
            "No valid answer after {} attempts for {}",
            MAX_PROMPT_ATTEMPTS,
            path.display()
        )))
    }
}

/// `yes`, `ye`, `y` mean yes; `no`, `n` and an empty line mean no
fn parse_answer(line: &str) -> Option<bool> {
    match line.trim().to_lowercase().as_str() {
        "yes" | "ye" | "y" => Some(true),
        "no" | "n" | "" => Some(false),
        _ => None,
    }
}
