//! # Extension Host - Main Entry Point
//!
//! Command-line host around the `extension_host` library. Handles CLI
//! parsing, configuration loading, logging setup and the application
//! lifecycle.
//!
//! ## Quick Start
//!
//! ```bash
//! # Run with default configuration (host.toml, created if missing)
//! extension-host
//!
//! # Point at a project and override settings
//! extension-host --root /path/to/project --plugins-dir addons --log-level debug
//!
//! # JSON logging
//! extension-host --json-logs
//! ```
//!
//! ## Signal Handling
//!
//! The host uninstalls plugins and unloads modules on SIGINT / SIGTERM
//! (Ctrl+C on Windows). A second signal exits immediately.

use tracing::error;

pub mod app;
pub mod cli;
pub mod config;
pub mod logging;
pub mod signals;

use app::Application;
use cli::CliArgs;
use config::AppConfig;

/// Runs the host until shutdown.
///
/// Called from the binary's `#[tokio::main]`; exits the process with code 1
/// on startup or runtime failure.
pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // logging settings come from the file, before CLI overrides are validated
    let mut logging = AppConfig::load_from_file(&args.config_path)
        .await
        .map(|config| config.logging)
        .unwrap_or_default();
    if let Some(level) = &args.log_level {
        logging.level = level.clone();
    }

    if let Err(e) = logging::setup_logging(&logging, args.json_logs) {
        eprintln!("Failed to setup logging: {e}");
        std::process::exit(1);
    }

    match Application::new(args).await {
        Ok(app) => {
            if let Err(e) = app.run().await {
                error!("Application error: {:?}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!("Failed to start application: {e:?}");
            std::process::exit(1);
        }
    }

    Ok(())
}

pub use config::{HostSettings, LoggingSettings, PluginSettings};
