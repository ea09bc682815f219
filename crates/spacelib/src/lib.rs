//! # spacelib runner
//!
//! Command-line front end for the spacelib crates. It launches a vessel in an
//! in-process simulated game, attaches a spacecraft whose timeserver follows
//! either a synthetic wall clock or the game's own time stream, and flies a
//! short engine burn while reporting status.
//!
//! ## Quick Start
//!
//! ```bash
//! # Run with default configuration (writes spacelib.toml if missing)
//! spacelib
//!
//! # Use the simulated game's time stream and stop after ten seconds
//! spacelib --config flight.toml --duration 10
//!
//! # JSON logging with a slower clock
//! spacelib --json-logs --period-ms 50
//! ```
//!
//! ## Signal Handling
//!
//! SIGINT (Ctrl+C) and SIGTERM close the spacecraft, which closes its
//! control channels and timeserver; the runner then waits for every task.
//! A second signal exits immediately.

use tracing::error;

pub mod app;
pub mod cli;
pub mod config;
pub mod logging;
pub mod signals;

use app::Application;
use cli::CliArgs;
use config::AppConfig;

/// Parses arguments, sets up logging and runs the application.
///
/// # Exit Codes
///
/// * **0**: Successful execution and shutdown
/// * **1**: Error during startup, configuration, or runtime
pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Logging comes first so configuration problems are reported through it.
    let mut config = AppConfig::load_from_file(&args.config_path)
        .await
        .unwrap_or_default();
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }

    if let Err(e) = logging::setup_logging(&config.logging, args.json_logs) {
        eprintln!("❌ Failed to setup logging: {e}");
        std::process::exit(1);
    }

    match Application::new(args).await {
        Ok(app) => {
            if let Err(e) = app.run().await {
                error!("❌ Application error: {:?}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!("❌ Failed to start application: {e:?}");
            std::process::exit(1);
        }
    }

    Ok(())
}

pub use config::{ClockSettings, ClockSource, LoggingSettings, VesselSettings};
pub use signals::ShutdownState;
