//! Tracing setup for the server binary
//!
//! One fmt subscriber for the whole process. `RUST_LOG` overrides the
//! built-in default, so URB-level debug output can be switched on per
//! module without a rebuild (e.g. `RUST_LOG=server::emulate=debug`).

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Install the global subscriber, filtered at `default_level` unless the
/// environment says otherwise
pub fn setup_logging(default_level: &str) -> crate::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| crate::Error::Config(format!("invalid log filter: {}", e)))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();

    Ok(())
}
