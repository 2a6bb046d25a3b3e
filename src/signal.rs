//! One-way stop flags and Ctrl+C wiring.

use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cloneable one-way flag: once triggered it stays triggered.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    stopped: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag. Calling it again is a no-op.
    pub fn trigger(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// Set up a Ctrl+C handler that triggers the returned signal.
pub fn interrupt_on_ctrl_c() -> Result<StopSignal> {
    let interrupt = StopSignal::new();
    let handle = interrupt.clone();
    ctrlc::set_handler(move || {
        log::info!("Received interrupt, stopping sweep");
        handle.trigger();
    })
    .with_context(|| "Failed to set Ctrl+C handler")?;
    Ok(interrupt)
}
