//! Logging setup and thin string wrappers over `tracing`.
//!
//! Call sites hand over preformatted messages (`debug(format!(...))`) so the
//! supervisor code stays free of macro-level field plumbing.

use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber.
///
/// `filter` overrides the `RUST_LOG` environment variable; without either the
/// level defaults to `info`.
pub fn init(filter: Option<&str>) -> Result<()> {
    let env_filter = if let Some(filter) = filter {
        EnvFilter::try_new(filter)?
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    Ok(())
}

pub fn debug(msg: impl AsRef<str>) {
    tracing::debug!("{}", msg.as_ref());
}

pub fn info(msg: impl AsRef<str>) {
    tracing::info!("{}", msg.as_ref());
}

pub fn warn(msg: impl AsRef<str>) {
    tracing::warn!("{}", msg.as_ref());
}

pub fn error(msg: impl AsRef<str>) {
    tracing::error!("{}", msg.as_ref());
}
