//! # Astro Controller
//!
//! Drives the controller link of an astromech droid.
//!
//! The binary loads the configuration, opens the evdev transport for the
//! configured controller family and runs the controller tick on a fixed
//! interval until Ctrl+C.

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use astro_controller::config::{Config, LoggingConfig};
use astro_controller::controller::{self, ConnectionState, ControllerSettings, InputSnapshot};
use astro_controller::error::AstroError;
use astro_controller::transport::evdev::EvdevTransport;

/// Configuration used when no path is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Prefix of the rolling log files
const LOG_FILE_PREFIX: &str = "astro-controller.log";

/// Number of ticks between status log messages
const STATUS_INTERVAL_TICKS: u64 = 1000;

/// Main entry point for Astro Controller
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration (first argument, or `config/default.toml`)
///    - Set up logging with tracing subscriber
///    - Open the evdev transport and build the controller
///
/// 2. **Main Loop**
///    - Run one controller tick every `poll_interval_ms`
///    - Log connection state changes and faults
///    - Handle Ctrl+C for graceful shutdown
///
/// 3. **Graceful Shutdown**
///    - Unregister from attach events
///    - Disconnect every unit
///
/// # Errors
///
/// Returns error if the configuration cannot be loaded or the input
/// directory does not exist.
#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load configuration from {}", config_path))?;

    // Keep the guard alive so buffered log lines are flushed on exit
    let _log_guard = init_logging(&config.logging);

    info!("Astro Controller v{} starting...", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from {}", config_path);

    if !Path::new(&config.transport.input_dir).is_dir() {
        return Err(AstroError::Transport(format!(
            "input directory {} not found",
            config.transport.input_dir
        ))
        .into());
    }

    let kind = config.controller.kind;
    let transport = EvdevTransport::new(kind, &config.transport);
    let mut pad = controller::build(
        kind,
        Box::new(transport),
        ControllerSettings::from_config(&config),
    );
    pad.begin();

    info!(
        "Waiting for {} (poll every {} ms, fault timeout {} ms)",
        kind, config.controller.poll_interval_ms, config.safety.fault_timeout_ms
    );
    info!("Press Ctrl+C to exit");

    let started = Instant::now();
    let mut tick_interval = interval(Duration::from_millis(config.controller.poll_interval_ms));
    let mut snapshot = InputSnapshot::default();
    let mut last_state = ConnectionState::Disconnected;
    let mut tick_count: u64 = 0;

    // Main control loop
    loop {
        tokio::select! {
            _ = tick_interval.tick() => {
                let now_ms = started.elapsed().as_millis() as u64;
                let read = controller::run_tick(pad.as_mut(), now_ms, &mut snapshot);
                tick_count += 1;

                let state = pad.connection_state();
                if state != last_state {
                    match (state, pad.last_fault()) {
                        (ConnectionState::Disconnected, Some(fault)) => {
                            warn!("Controller {} ({})", state, fault)
                        }
                        _ => info!("Controller {}", state),
                    }
                    last_state = state;
                }

                if read {
                    debug!(
                        "drive ({}, {}) dome ({}, {})",
                        snapshot.drive_stick_x,
                        snapshot.drive_stick_y,
                        snapshot.dome_stick_x,
                        snapshot.dome_stick_y
                    );
                }

                if tick_count % STATUS_INTERVAL_TICKS == 0 {
                    for (slot, record) in pad.fault_records() {
                        debug!(
                            "{} unit: disconnects {} reconnects {} bad reports {}",
                            slot, record.disconnect_count, record.reconnect_count, record.bad_data_count
                        );
                    }
                }
            }

            // Handle Ctrl+C for graceful shutdown
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    pad.shutdown();
    info!("Controller released after {} ticks", tick_count);

    Ok(())
}

/// Builds the log filter: `RUST_LOG` wins, the configured level fills in.
fn log_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Initializes the tracing subscriber.
///
/// Logs go to stdout, or to a daily rolling file when `log_dir` is set.
fn init_logging(logging: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = log_filter(&logging.level);

    match &logging.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_path() {
        assert_eq!(DEFAULT_CONFIG_PATH, "config/default.toml");
    }

    #[test]
    fn test_shipped_config_is_valid() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join(DEFAULT_CONFIG_PATH);
        let config = Config::load(path).unwrap();
        assert!(config.controller.poll_interval_ms < config.safety.fault_timeout_ms);
    }

    #[test]
    fn test_log_filter_accepts_config_levels() {
        for level in ["trace", "debug", "info", "warn", "error"] {
            let filter = log_filter(level);
            assert!(!filter.to_string().is_empty());
        }
    }
}
