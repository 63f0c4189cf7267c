//! Logging setup for applications embedding dbconduit.
//!
//! The library itself only emits `tracing` events; installing a subscriber is
//! left to the host application, which may use this helper.

use crate::{Result, error::DbConduitError};
use tracing_subscriber::EnvFilter;

/// Maps quiet/verbosity flags onto a tracing level.
fn level_for(verbose: u8, quiet: bool) -> tracing::Level {
    match (quiet, verbose) {
        (true, _) => tracing::Level::ERROR,
        (false, 0) => tracing::Level::INFO,
        (false, 1) => tracing::Level::DEBUG,
        (false, _) => tracing::Level::TRACE,
    }
}

/// Builds the event filter. `RUST_LOG` wins over the flags unless `quiet`
/// is set.
fn filter_for(verbose: u8, quiet: bool) -> EnvFilter {
    let fallback = || EnvFilter::new(level_for(verbose, quiet).as_str());
    if quiet {
        return fallback();
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback())
}

/// Installs a global fmt subscriber at the level chosen by the flags.
///
/// # Arguments
/// * `verbose` - Verbosity level (0=INFO, 1=DEBUG, 2+=TRACE)
/// * `quiet` - Only ERROR events; also ignores `RUST_LOG`
///
/// # Errors
/// Returns a configuration error if a global subscriber is already installed.
///
/// # Example
/// ```rust,no_run
/// use dbconduit::logging::init_logging;
///
/// init_logging(1, false).expect("Failed to initialize logging");
/// ```
pub fn init_logging(verbose: u8, quiet: bool) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(filter_for(verbose, quiet))
        .with_target(verbose > 1)
        .try_init()
        .map_err(|e| {
            DbConduitError::configuration(format!("Failed to initialize logging: {}", e))
        })
}
