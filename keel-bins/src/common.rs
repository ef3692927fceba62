//! Common utilities for all binaries

use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Wire Ctrl+C to the engine's stop token so the intake loop and the
/// background tasks wind down instead of dying mid-handler.
pub fn install_shutdown_handler(stop: Arc<AtomicBool>) -> Result<()> {
    ctrlc::set_handler(move || {
        tracing::warn!("shutdown signal received");
        stop.store(true, Ordering::Release);
    })?;
    Ok(())
}
