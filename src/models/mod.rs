//! Data models and structures for the handshake benchmark

pub mod config;
pub mod report;

// Re-export main model types
pub use config::Config;
pub use report::{PairReport, RunSummary};
