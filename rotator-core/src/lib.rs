//! Core library for the vpn-rotator CLI tool
//!
//! This crate provides profile and credential loading, the OpenVPN tunnel
//! client binding, public IP lookups, and the rotation loop itself.

pub mod error;
pub mod types;

pub mod config;
pub mod oracle;
pub mod rotation;
pub mod tunnel;

/// Initialize logging infrastructure
///
/// Sets up tracing with systemd journal logging when running as a service.
/// Otherwise logs to stderr with pretty formatting. `verbose` lowers the
/// level from INFO to DEBUG.
pub fn init_logging(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    use tracing_subscriber::filter::LevelFilter;
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    #[cfg(target_os = "linux")]
    {
        if std::env::var("JOURNAL_STREAM").is_ok() {
            // We're running under systemd, use journal logging
            let journal_layer = tracing_journald::layer()?;
            tracing_subscriber::registry()
                .with(journal_layer)
                .with(level)
                .try_init()?;
            return Ok(());
        }
    }

    // Fallback to stderr logging with pretty formatting
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .pretty()
                .with_writer(std::io::stderr),
        )
        .with(level)
        .try_init()?;

    Ok(())
}
