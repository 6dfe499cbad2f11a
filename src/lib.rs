//! Handshake Bench
//!
//! Measures TLS handshake latency for post-quantum and traditional
//! signature algorithms between two network namespaces joined by a
//! virtual link, under a sweep of emulated rate, delay and loss.

pub mod app;
pub mod capture;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod driver;
pub mod error;
pub mod exec;
pub mod fsutil;
pub mod logging;
pub mod models;
pub mod network;
pub mod output;
pub mod pki;
pub mod runner;
pub mod sink;
pub mod types;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use driver::{BenchmarkDriver, RunContext};
pub use error::{AppError, Result};
pub use models::{Config, PairReport, RunSummary};
pub use output::{ColoredFormatter, OutputCoordinator, OutputFormatter, OutputFormatterFactory, PlainFormatter};

/// Application version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    pub const DEFAULT_ROUNDS: u32 = 10;
    pub const DEFAULT_SAMPLE_SIZE: u32 = 1;
    pub const DEFAULT_MAX_HANDSHAKE: Duration = Duration::from_secs(30);

    pub const DEFAULT_RATE_VALUES: &[f64] = &[10000.0];
    pub const DEFAULT_DELAY_VALUES: &[f64] = &[0.0, 5.0, 50.0];
    pub const DEFAULT_LOSS_VALUES: &[f64] = &[0.0, 0.1, 1.0];

    /// Impairment installed when the link comes up
    pub const BASELINE_RATE_MBIT: f64 = 10000.0;

    pub const DEFAULT_STIMER_BINARY: &str = "./tls-client/s_timer";
    pub const DEFAULT_OPENSSL_BINARY: &str = "openssl";
    pub const DEFAULT_NSPACE_SETUP: &str = "./virt-test-env/namespace-setup.sh";
    pub const DEFAULT_NSPACE_CLEANUP: &str = "./virt-test-env/namespace-cleanup.sh";
    pub const DEFAULT_OSSL_CONFIG: &str = "./emulated-nw-assessmnt/oqs-openssl.cnf";
    pub const DEFAULT_OSSL_RCA_CONFIG: &str = "./emulated-nw-assessmnt/oqs-openssl-rca.cnf";
    pub const DEFAULT_OSSL_ICA_CONFIG: &str = "./emulated-nw-assessmnt/oqs-openssl-ica.cnf";

    /// Note the trailing space; it keeps `3.2.0` from matching `3.2.0x`
    pub const DEFAULT_EXPECTED_VERSION: &str = "OpenSSL 3.2.0 ";
    pub const DEFAULT_PROVIDER_MARKER: &str = "provider loaded successfully";
    pub const DEFAULT_PROVIDER_NAME: &str = "oqsprovider";

    pub const DEFAULT_RESPONDER_GRACE: Duration = Duration::from_millis(200);
    pub const DEFAULT_CAPTURE_GRACE: Duration = Duration::from_secs(2);
    pub const READINESS_DEADLINE: Duration = Duration::from_secs(5);
    pub const READINESS_INTERVAL: Duration = Duration::from_millis(50);

    pub const DEFAULT_ENABLE_COLOR: bool = true;

    pub const RESPONDER_NAMESPACE: &str = "ns1";
    pub const RESPONDER_DEVICE: &str = "veth101";
    pub const RESPONDER_ADDRESS: &str = "192.168.101.1";
    pub const RESPONDER_MAC: &str = "00:00:00:00:00:01";
    pub const INITIATOR_NAMESPACE: &str = "ns2";
    pub const INITIATOR_DEVICE: &str = "veth102";
    pub const INITIATOR_ADDRESS: &str = "192.168.102.1";
    pub const INITIATOR_MAC: &str = "00:00:00:00:00:02";
    pub const RENDEZVOUS_PORT: u16 = 4433;
}
