//! Byte channel abstraction shared by the sweep controller and the listener
//!
//! The controller is the only writer. Both the listener and the completion
//! wait read from the same channel, so reads go through [`classify_read`],
//! which decides which failures are downgraded to "nothing this cycle".

use crate::error::{Error, Result};
use std::io::ErrorKind;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Duplex byte stream to the glitcher
pub trait Channel: Send {
    /// Number of bytes waiting in the input buffer
    fn bytes_available(&mut self) -> Result<usize>;

    /// Read bytes into buffer, returns number of bytes read
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize>;

    /// Write the whole buffer
    fn write_all(&mut self, data: &[u8]) -> Result<()>;

    /// Flush pending writes
    fn flush(&mut self) -> Result<()>;
}

/// Channel handle shared between threads
pub type SharedChannel<C> = Arc<Mutex<C>>;

/// Wrap a channel for sharing between the controller and the listener
pub fn shared<C: Channel>(channel: C) -> SharedChannel<C> {
    Arc::new(Mutex::new(channel))
}

/// Lock a shared channel.
///
/// A panic in another holder leaves the port itself usable, so a poisoned
/// lock is recovered rather than propagated.
pub fn lock<C>(channel: &SharedChannel<C>) -> MutexGuard<'_, C> {
    channel.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Result of one read attempt after classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// `n > 0` bytes were read
    Data(usize),
    /// Nothing arrived within the read timeout
    Empty,
    /// The read failed and the failure was downgraded to "no data"
    Swallowed,
}

/// Downgrade a raw read result to a [`ReadOutcome`].
///
/// Timeouts are the normal "nothing yet" case. Every other transport error
/// (USB re-enumeration, broken pipe, driver hiccup) is swallowed and logged,
/// so that neither the listener nor the completion wait ever aborts the
/// sweep because of the link.
pub fn classify_read(result: Result<usize>) -> ReadOutcome {
    match result {
        Ok(0) => ReadOutcome::Empty,
        Ok(n) => ReadOutcome::Data(n),
        Err(Error::Io(ref e)) if e.kind() == ErrorKind::TimedOut => ReadOutcome::Empty,
        Err(e) => {
            log::debug!("Serial read failed, treating as no data: {}", e);
            ReadOutcome::Swallowed
        }
    }
}

/// Decode a chunk from the device as ASCII.
///
/// Returns `None` for chunks containing any non-ASCII byte; such chunks are
/// dropped the same way as a failed read.
pub fn decode_ascii(bytes: &[u8]) -> Option<&str> {
    if bytes.is_ascii() {
        std::str::from_utf8(bytes).ok()
    } else {
        None
    }
}
