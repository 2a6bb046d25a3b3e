//! In-memory channel for testing the controller and the listener

use super::Channel;
use crate::error::{Error, Result};
use crate::signal::StopSignal;
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

/// Mock glitcher link.
///
/// Clones share the same buffers, so a test keeps one handle for
/// inspection while the code under test owns another.
#[derive(Clone, Default)]
pub struct MockChannel {
    inner: Arc<Mutex<MockChannelInner>>,
}

#[derive(Default)]
struct MockChannelInner {
    read_buffer: VecDeque<u8>,
    writes: Vec<Vec<u8>>,
    read_calls: usize,
    failing_calls: usize,
    scheduled: Vec<(usize, Vec<u8>)>,
    trip: Option<(usize, StopSignal)>,
    glitches: usize,
}

impl MockChannel {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, MockChannelInner> {
        self.inner.lock().unwrap()
    }

    /// Make data readable immediately
    pub fn inject_read(&self, data: &[u8]) {
        self.inner().read_buffer.extend(data);
    }

    /// Make data readable once `read` has been called `after_reads` times
    pub fn inject_after_reads(&self, after_reads: usize, data: &[u8]) {
        self.inner().scheduled.push((after_reads, data.to_vec()));
    }

    /// Fail the next `count` reads or availability checks with an I/O error
    pub fn fail_next(&self, count: usize) {
        self.inner().failing_calls = count;
    }

    /// Trigger `signal` as soon as the `glitches`-th glitch command is written
    pub fn trip_after_glitches(&self, glitches: usize, signal: StopSignal) {
        self.inner().trip = Some((glitches, signal));
    }

    /// Each `write_all` call, in order
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.inner().writes.clone()
    }

    /// Each write decoded as a line without its terminator
    pub fn written_lines(&self) -> Vec<String> {
        self.writes()
            .iter()
            .map(|w| String::from_utf8_lossy(w).trim_end_matches('\n').to_string())
            .collect()
    }

    pub fn read_calls(&self) -> usize {
        self.inner().read_calls
    }

    fn take_failure(inner: &mut MockChannelInner) -> Result<()> {
        if inner.failing_calls > 0 {
            inner.failing_calls -= 1;
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "mock link failure",
            )));
        }
        Ok(())
    }
}

impl Channel for MockChannel {
    fn bytes_available(&mut self) -> Result<usize> {
        let mut inner = self.inner();
        Self::take_failure(&mut inner)?;
        Ok(inner.read_buffer.len())
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let mut inner = self.inner();
        inner.read_calls += 1;

        let calls = inner.read_calls;
        let (due, later): (Vec<_>, Vec<_>) = std::mem::take(&mut inner.scheduled)
            .into_iter()
            .partition(|(after, _)| *after < calls);
        inner.scheduled = later;
        for (_, data) in due {
            inner.read_buffer.extend(data);
        }

        Self::take_failure(&mut inner)?;

        if inner.read_buffer.is_empty() {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::TimedOut,
                "Operation timed out",
            )));
        }

        let n = inner.read_buffer.len().min(buffer.len());
        for (slot, byte) in buffer.iter_mut().zip(inner.read_buffer.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let mut inner = self.inner();
        inner.writes.push(data.to_vec());

        if data == b"g\n" {
            inner.glitches += 1;
            if let Some((limit, ref signal)) = inner.trip {
                if inner.glitches >= limit {
                    signal.trigger();
                }
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduled_data_arrives_on_later_read() {
        let mut mock = MockChannel::new();
        mock.inject_after_reads(2, b"x");
        let mut buf = [0u8; 1];

        assert!(mock.read(&mut buf).is_err());
        assert!(mock.read(&mut buf).is_err());
        assert_eq!(mock.read(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], b'x');
        assert_eq!(mock.read_calls(), 3);
    }
}
