//! Sweep controller
//!
//! Drives the glitcher through every (delay, pulse) pair, delay-major, and
//! repeats the sweep until interrupted:
//! - Startup handshake: `h`, settle, then `e` or `f` once
//! - Per pair: pace, `d <delay>`, `p <pulse>`, `g`
//! - With power cycling disabled, wait a bounded time for the `x` marker
//!
//! The listener reads the same channel, so it can consume the marker before
//! the completion wait sees it. That only costs the rest of the wait budget
//! for that pair and is accepted.

use super::command::{Command, COMPLETION_MARKER};
use super::sweep::{pairs, SweepRange};
use crate::error::Result;
use crate::serial::channel::{classify_read, lock, Channel, ReadOutcome, SharedChannel};
use crate::signal::StopSignal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::thread;
use std::time::Duration;

/// Read attempts spent waiting for the completion marker after a glitch
pub const COMPLETION_POLL_ATTEMPTS: usize = 11;

/// Time the glitcher gets to reset and print its banner after `h`
pub const HELLO_SETTLE_DELAY: Duration = Duration::from_secs(1);

/// Whether the glitcher power-cycles the target after each attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PowerCycling {
    /// Device power-cycles the target on its own
    Enabled,
    /// Host polls for the completion marker
    Disabled,
}

impl PowerCycling {
    /// Command that puts the device into this mode
    pub fn command(self) -> Command {
        match self {
            PowerCycling::Enabled => Command::PowerCyclingEnable,
            PowerCycling::Disabled => Command::PowerCyclingDisable,
        }
    }
}

impl fmt::Display for PowerCycling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerCycling::Enabled => write!(f, "enabled"),
            PowerCycling::Disabled => write!(f, "disabled"),
        }
    }
}

/// What to sweep and how fast
#[derive(Debug, Clone, PartialEq)]
pub struct SweepPlan {
    pub delay: SweepRange,
    pub pulse: SweepRange,
    pub power_cycling: PowerCycling,
    /// Pacing between pairs and between completion polls (the read timeout)
    pub interval: Duration,
    /// Stop after this many full sweeps; `None` runs until interrupted
    pub cycles: Option<u64>,
}

/// Check of the target after a glitch, e.g. over JTAG.
///
/// Nothing in this crate implements it yet; it is the hook for deciding
/// that a glitch succeeded and the sweep can stop.
#[allow(dead_code)] // No probe is wired up by the CLI yet
pub trait SuccessProbe: Send {
    fn target_compromised(&mut self, delay: i64, pulse: i64) -> anyhow::Result<bool>;
}

/// Result of waiting for the completion marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionWait {
    /// Marker seen on the given attempt (1-based)
    Acknowledged { attempts: usize },
    /// No marker within [`COMPLETION_POLL_ATTEMPTS`]
    TimedOut,
    /// Interrupt observed while waiting
    Interrupted,
}

/// Why the sweep ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepExit {
    Interrupted,
    CyclesCompleted(u64),
    TargetCompromised { delay: i64, pulse: i64 },
}

/// Counters for one sweep cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub pairs: usize,
    pub acknowledged: usize,
    pub missed: usize,
}

pub struct SweepController<C: Channel> {
    channel: SharedChannel<C>,
    plan: SweepPlan,
    interrupt: StopSignal,
    settle_delay: Duration,
    probe: Option<Box<dyn SuccessProbe>>,
}

impl<C: Channel> SweepController<C> {
    pub fn new(channel: SharedChannel<C>, plan: SweepPlan, interrupt: StopSignal) -> Self {
        Self {
            channel,
            plan,
            interrupt,
            settle_delay: HELLO_SETTLE_DELAY,
            probe: None,
        }
    }

    /// Override the pause after `h`
    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    /// Consult `probe` after every pair
    #[allow(dead_code)]
    pub fn with_probe(mut self, probe: Box<dyn SuccessProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Handshake, then sweep until interrupted, the cycle limit is hit, or
    /// the probe reports success.
    ///
    /// Only a failed write ends the sweep with an error; read problems are
    /// downgraded to "no data".
    pub fn run(&mut self) -> Result<SweepExit> {
        self.handshake()?;

        let mut completed = 0u64;
        loop {
            let mut stats = CycleStats::default();
            if let Some(exit) = self.run_cycle(&mut stats)? {
                return Ok(exit);
            }

            completed += 1;
            log::info!(
                "Sweep cycle {} complete: {} pairs, {} acknowledged, {} missed",
                completed,
                stats.pairs,
                stats.acknowledged,
                stats.missed
            );

            if self.plan.cycles.is_some_and(|limit| completed >= limit) {
                return Ok(SweepExit::CyclesCompleted(completed));
            }
        }
    }

    /// Startup: settle, `h`, settle, power cycling mode.
    pub fn handshake(&mut self) -> Result<()> {
        thread::sleep(self.plan.interval);
        if self.interrupt.is_triggered() {
            return Ok(());
        }
        self.send(Command::Hello)?;

        thread::sleep(self.settle_delay);
        if self.interrupt.is_triggered() {
            return Ok(());
        }
        self.send(self.plan.power_cycling.command())?;

        log::info!("Power cycling {}", self.plan.power_cycling);
        Ok(())
    }

    /// One pass over all pairs. Returns `Some` if the sweep should end.
    fn run_cycle(&mut self, stats: &mut CycleStats) -> Result<Option<SweepExit>> {
        for (delay, pulse) in pairs(&self.plan.delay, &self.plan.pulse) {
            if self.interrupt.is_triggered() {
                return Ok(Some(SweepExit::Interrupted));
            }

            thread::sleep(self.plan.interval);
            if self.interrupt.is_triggered() {
                return Ok(Some(SweepExit::Interrupted));
            }

            println!("delay={}, pulse={}", delay, pulse);
            self.glitch(delay, pulse)?;
            stats.pairs += 1;

            if self.plan.power_cycling == PowerCycling::Disabled {
                match self.wait_for_completion() {
                    CompletionWait::Acknowledged { attempts } => {
                        log::debug!("Glitch done after {} poll(s)", attempts);
                        stats.acknowledged += 1;
                    }
                    CompletionWait::TimedOut => {
                        log::debug!("No completion marker for delay={}, pulse={}", delay, pulse);
                        stats.missed += 1;
                    }
                    CompletionWait::Interrupted => return Ok(Some(SweepExit::Interrupted)),
                }
            }

            if self.probe_success(delay, pulse) {
                return Ok(Some(SweepExit::TargetCompromised { delay, pulse }));
            }
        }
        Ok(None)
    }

    /// Stage delay and pulse, then trigger, under a single lock so no
    /// other write can land between them.
    pub fn glitch(&mut self, delay: i64, pulse: i64) -> Result<()> {
        let mut port = lock(&self.channel);
        for command in [Command::Delay(delay), Command::Pulse(pulse), Command::Glitch] {
            log::trace!("TX {}", command);
            port.write_all(&command.encode())?;
        }
        port.flush()
    }

    /// Poll for the completion marker, one byte per attempt, one interval
    /// apart. Gives up quietly after [`COMPLETION_POLL_ATTEMPTS`].
    pub fn wait_for_completion(&mut self) -> CompletionWait {
        for attempt in 1..=COMPLETION_POLL_ATTEMPTS {
            if self.interrupt.is_triggered() {
                return CompletionWait::Interrupted;
            }

            let mut byte = [0u8; 1];
            let outcome = classify_read(lock(&self.channel).read(&mut byte));
            if outcome == ReadOutcome::Data(1) && byte[0] == COMPLETION_MARKER {
                return CompletionWait::Acknowledged { attempts: attempt };
            }

            thread::sleep(self.plan.interval);
        }
        CompletionWait::TimedOut
    }

    fn send(&mut self, command: Command) -> Result<()> {
        log::trace!("TX {}", command);
        let mut port = lock(&self.channel);
        port.write_all(&command.encode())?;
        port.flush()
    }

    fn probe_success(&mut self, delay: i64, pulse: i64) -> bool {
        let Some(probe) = self.probe.as_mut() else {
            return false;
        };
        match probe.target_compromised(delay, pulse) {
            Ok(true) => {
                log::info!("Target compromised at delay={}, pulse={}", delay, pulse);
                true
            }
            Ok(false) => false,
            Err(e) => {
                log::warn!("Success probe failed at delay={}, pulse={}: {:#}", delay, pulse, e);
                false
            }
        }
    }
}
