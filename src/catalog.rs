//! Algorithm catalog
//!
//! Candidates come from the algorithm file and are filtered against what the
//! post-quantum provider reports through `openssl list -signature-algorithms`.
//! Traditional reference algorithms are prepended without filtering.

use crate::error::{AppError, ErrorContext, Result};
use crate::exec::{CommandRunner, CommandSpec};
use crate::logging::Logger;
use crate::types::Algorithm;
use std::path::{Path, PathBuf};

/// Inputs of catalog loading
#[derive(Debug, Clone)]
pub struct CatalogSettings {
    pub sigs_file: PathBuf,
    pub openssl_binary: String,
    /// Provider tag in the listing, e.g. `oqsprovider`
    pub provider_name: String,
    pub traditional: Vec<String>,
}

/// Algorithm names the provider advertises.
///
/// Lines look like `  dilithium2 @ oqsprovider`; grouped aliases appear as
/// `  { 1.3.6.1.4.1.2.267.7.4.4, dilithium2 } @ oqsprovider` and every alias
/// counts.
pub fn parse_provider_listing(listing: &str, provider: &str) -> Vec<String> {
    let suffix = format!(" @ {}", provider);
    let mut names = Vec::new();

    for line in listing.lines() {
        let Some(entry) = line.trim_end().strip_suffix(&suffix) else {
            continue;
        };
        let entry = entry.trim();
        let entry = entry
            .strip_prefix('{')
            .and_then(|inner| inner.strip_suffix('}'))
            .unwrap_or(entry);

        for name in entry.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            if !names.iter().any(|known: &String| known == name) {
                names.push(name.to_string());
            }
        }
    }

    names
}

/// Read candidate names, one per line; blank lines and `#` comments are skipped
pub fn read_candidates(path: &Path) -> Result<Vec<String>> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| AppError::config(format!("Cannot read algorithm file {}: {}", path.display(), e)))?;

    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect())
}

/// Split candidates into supported algorithms and dropped names
pub fn filter_supported(candidates: &[String], supported: &[String]) -> (Vec<Algorithm>, Vec<String>) {
    let mut kept = Vec::new();
    let mut dropped = Vec::new();

    for candidate in candidates {
        if supported.contains(candidate) {
            kept.push(Algorithm::post_quantum(candidate.as_str(), true));
        } else {
            dropped.push(candidate.clone());
        }
    }

    (kept, dropped)
}

/// Candidates split by provider support, both in file order
#[derive(Debug, Clone)]
pub struct CatalogSelection {
    pub post_quantum: Vec<Algorithm>,
    pub dropped: Vec<String>,
}

/// Loads the ordered list of algorithms to benchmark
pub struct AlgorithmCatalog<'a> {
    runner: &'a dyn CommandRunner,
    settings: &'a CatalogSettings,
    logger: &'a Logger,
}

impl<'a> AlgorithmCatalog<'a> {
    pub fn new(runner: &'a dyn CommandRunner, settings: &'a CatalogSettings, logger: &'a Logger) -> Self {
        Self {
            runner,
            settings,
            logger,
        }
    }

    /// Ask the provider which signature algorithms it serves
    pub async fn supported(&self) -> Result<Vec<String>> {
        let spec = CommandSpec::new(&self.settings.openssl_binary).args(["list", "-signature-algorithms"]);
        let output = self
            .runner
            .run(&spec)
            .await
            .context("Querying supported signature algorithms")?;

        if !output.success() {
            return Err(AppError::catalog(format!(
                "'{}' failed: {}",
                spec,
                output.describe_failure()
            )));
        }

        Ok(parse_provider_listing(&output.stdout, &self.settings.provider_name))
    }

    /// Match the candidate file against the provider listing
    pub async fn resolve(&self) -> Result<CatalogSelection> {
        let candidates = read_candidates(&self.settings.sigs_file)?;
        let supported = self.supported().await?;
        let (post_quantum, dropped) = filter_supported(&candidates, &supported);
        Ok(CatalogSelection { post_quantum, dropped })
    }

    /// Traditional algorithms followed by the supported post-quantum ones.
    ///
    /// Every dropped candidate is reported; an empty post-quantum list is fatal.
    pub async fn load(&self) -> Result<Vec<Algorithm>> {
        let CatalogSelection { post_quantum, dropped } = self.resolve().await?;

        for name in &dropped {
            self.logger
                .warn(&format!("Algorithm \"{}\" not supported, removed from list", name))
                .field("algorithm", name)
                .field("provider", &self.settings.provider_name)
                .log()
                .await;
        }

        if post_quantum.is_empty() {
            return Err(AppError::catalog(format!(
                "No supported algorithms found in \"{}\"",
                self.settings.sigs_file.display()
            )));
        }

        let mut algorithms: Vec<Algorithm> = self
            .settings
            .traditional
            .iter()
            .map(|name| Algorithm::traditional(name.as_str()))
            .collect();
        algorithms.extend(post_quantum);

        self.logger
            .info(&format!("{} algorithm(s) selected", algorithms.len()))
            .field(
                "algorithms",
                algorithms.iter().map(|a| a.name.as_str()).collect::<Vec<_>>(),
            )
            .log()
            .await;

        Ok(algorithms)
    }
}
