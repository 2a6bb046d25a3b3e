//! Background listener for glitcher output
//!
//! Drains whatever the device sends and echoes it to the console (and an
//! optional capture file) while the sweep controller keeps writing:
//! - Polls every 100 ms, reading all buffered bytes in one call
//! - Emits ASCII text verbatim, drops anything else
//! - Never stops because of a read error
//! - Stops on a [`StopSignal`] with a bounded join

use super::channel::{classify_read, decode_ascii, lock, Channel, ReadOutcome, SharedChannel};
use crate::signal::StopSignal;
use anyhow::{Context, Result};
use chrono::Local;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Interval between polls of the channel
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Granularity of the bounded join in [`Listener::stop`]
const JOIN_CHECK_INTERVAL: Duration = Duration::from_millis(5);

/// Where decoded device output goes
pub struct OutputSink {
    console: Box<dyn Write + Send>,
    capture: Option<BufWriter<File>>,
}

impl OutputSink {
    /// Sink that writes device output to stdout
    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    pub fn new(console: Box<dyn Write + Send>) -> Self {
        Self {
            console,
            capture: None,
        }
    }

    /// Also append timestamped output to `path`
    pub fn with_capture(mut self, path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open capture file: {}", path.display()))?;
        self.capture = Some(BufWriter::new(file));
        Ok(self)
    }

    /// Write one decoded chunk. Output failures are not fatal.
    fn emit(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }

        if let Err(e) = self
            .console
            .write_all(text.as_bytes())
            .and_then(|_| self.console.flush())
        {
            log::debug!("Console write failed: {}", e);
        }

        if let Some(ref mut writer) = self.capture {
            let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
            if let Err(e) = write!(writer, "[{}] {}", timestamp, text).and_then(|_| writer.flush())
            {
                log::debug!("Capture write failed: {}", e);
            }
        }
    }
}

/// Counters reported when the listener stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerStats {
    /// Bytes read from the channel
    pub bytes_received: usize,
    /// Chunks written to the sink
    pub chunks_emitted: usize,
    /// Polls whose read failed or whose bytes were not ASCII
    pub chunks_dropped: usize,
}

/// Handle to the running listener thread
pub struct Listener {
    stop: StopSignal,
    handle: Option<JoinHandle<ListenerStats>>,
}

impl Listener {
    /// Start the background read loop with the default poll interval
    pub fn start<C>(channel: SharedChannel<C>, sink: OutputSink) -> Result<Self>
    where
        C: Channel + 'static,
    {
        Self::start_with_interval(channel, sink, POLL_INTERVAL)
    }

    pub fn start_with_interval<C>(
        channel: SharedChannel<C>,
        mut sink: OutputSink,
        poll_interval: Duration,
    ) -> Result<Self>
    where
        C: Channel + 'static,
    {
        let stop = StopSignal::new();
        let observed = stop.clone();

        let handle = thread::Builder::new()
            .name("listener".to_string())
            .spawn(move || {
                let mut stats = ListenerStats::default();
                while !observed.is_triggered() {
                    poll_once(&channel, &mut sink, &mut stats);
                    thread::sleep(poll_interval);
                }
                stats
            })
            .with_context(|| "Failed to spawn listener thread")?;

        log::debug!("Listener started (poll interval {:?})", poll_interval);

        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// Signal the loop to stop and wait up to `timeout` for it to exit.
    ///
    /// Returns the listener's counters if it exited in time. Otherwise the
    /// thread is left detached; it exits by itself within one poll interval.
    pub fn stop(mut self, timeout: Duration) -> Option<ListenerStats> {
        self.stop.trigger();
        println!("stopping listener.");

        let handle = self.handle.take()?;
        let deadline = Instant::now() + timeout;
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                log::warn!("Listener did not stop within {:?}, detaching", timeout);
                return None;
            }
            thread::sleep(JOIN_CHECK_INTERVAL);
        }

        match handle.join() {
            Ok(stats) => {
                log::debug!("Listener stopped: {:?}", stats);
                Some(stats)
            }
            Err(_) => {
                log::warn!("Listener thread panicked");
                None
            }
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.stop.trigger();
    }
}

/// One iteration of the read loop: drain, decode, emit.
fn poll_once<C: Channel>(
    channel: &SharedChannel<C>,
    sink: &mut OutputSink,
    stats: &mut ListenerStats,
) {
    let chunk = {
        let mut port = lock(channel);

        let waiting = match classify_read(port.bytes_available()) {
            ReadOutcome::Data(n) => n,
            ReadOutcome::Empty => return,
            ReadOutcome::Swallowed => {
                stats.chunks_dropped += 1;
                return;
            }
        };

        let mut buffer = vec![0u8; waiting];
        match classify_read(port.read(&mut buffer)) {
            ReadOutcome::Data(n) => {
                buffer.truncate(n);
                buffer
            }
            ReadOutcome::Empty => return,
            ReadOutcome::Swallowed => {
                stats.chunks_dropped += 1;
                return;
            }
        }
    };

    stats.bytes_received += chunk.len();

    match decode_ascii(&chunk) {
        Some(text) => {
            sink.emit(text);
            stats.chunks_emitted += 1;
        }
        None => {
            log::debug!("Dropped non-ASCII chunk: {:02x?}", chunk);
            stats.chunks_dropped += 1;
        }
    }
}
