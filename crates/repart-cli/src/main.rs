//! repart - online table re-partitioning from the command line.

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use repart_cli::{run, Args, DEFAULT_LOG_FILTER};

/// Exit code when the command ran but its outcome was negative.
const EXIT_REJECTED: u8 = 2;

fn main() -> ExitCode {
    // Logs go to stderr so stdout stays a clean script or JSON document
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    tracing::debug!(format = %args.format, "arguments parsed");

    match run(&args) {
        Ok(outcome) => {
            println!("{}", outcome.output);
            if outcome.success {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(EXIT_REJECTED)
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
