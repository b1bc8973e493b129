//! Main entry point for the prospector binary
//!
//! Wires the real HTTP-backed collaborators into the orchestrator and hands
//! Ctrl+C to a cancellation flag so an interrupted run stops at the next
//! leaf boundary with progress already on disk.

use clap::Parser;
use tokio::signal;

use prospector::config::{Args, Settings};
use prospector::core::CancellationFlag;
use prospector::logging;
use prospector::services::{CountriesNowDirectory, GoogleTranslator, MapsFetcher};
use prospector::{Orchestrator, Result};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let args = Args::parse();
    logging::init_tracing(&args.log_level);

    let settings = Settings::from_args(args)?;
    logging::log_startup(&format!(
        "prospector: '{}' across {} (parallel {}, retry budget {})",
        settings.query,
        settings.countries.join(", "),
        settings.parallel,
        settings.retry
    ));

    let directory = CountriesNowDirectory::new()?;
    let fetcher = MapsFetcher::new()?;
    let translator = GoogleTranslator::new()?;

    // Set up graceful shutdown
    let cancel = CancellationFlag::new();
    let signal_flag = cancel.clone();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                logging::log_shutdown("Received Ctrl+C, finishing in-flight tasks");
                signal_flag.cancel();
            }
            Err(err) => logging::log_error("Signal handling", &err),
        }
    });

    let orchestrator = Orchestrator::new(settings, directory, fetcher, translator, cancel);
    let stats = orchestrator.run().await?;

    logging::log_success(&stats.summary());
    Ok(())
}
