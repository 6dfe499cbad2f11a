//! Handshake Bench - Main CLI Application
//!
//! Benchmarks TLS handshake latency for post-quantum and traditional
//! signature algorithms across emulated network conditions.

use handshake_bench::{app::App, cli::Cli, error::ErrorReporter};
use std::process;

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panic: {}", panic_info);
        process::exit(99);
    }));

    let cli = match Cli::parse_normalized() {
        Ok(cli) => cli,
        Err(e) => {
            ErrorReporter::new(false, false).report_error(&e);
            process::exit(e.exit_code());
        }
    };

    let reporter = ErrorReporter::new(cli.use_colors(), cli.verbose || cli.debug);

    let app = match App::new(cli) {
        Ok(app) => app,
        Err(e) => {
            reporter.report_error(&e);
            process::exit(e.exit_code());
        }
    };

    if let Err(e) = app.run().await {
        reporter.report_error(&e);
        process::exit(e.exit_code());
    }
}
