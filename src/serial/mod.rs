//! Serial link to the glitcher
//!
//! This module provides:
//! - The [`Channel`] abstraction shared by the controller and the listener
//! - The `serialport`-backed connection and port listing
//! - The background listener that echoes device output

pub mod channel;
pub mod listener;
#[cfg(test)]
pub mod mock;
pub mod port;

pub use channel::{shared, Channel};
pub use listener::{Listener, OutputSink};
pub use port::SerialConnection;
