//! Sweep ranges for the delay and pulse-width axes

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Inclusive integer range walked by a fixed step.
///
/// `start == stop` yields a single value. The step must be non-zero and
/// point from `start` toward `stop`, so every range is finite and non-empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "[i64; 3]", into = "[i64; 3]")]
pub struct SweepRange {
    start: i64,
    stop: i64,
    step: i64,
}

impl SweepRange {
    pub fn new(start: i64, stop: i64, step: i64) -> Result<Self> {
        let invalid = |reason| Error::InvalidRange {
            start,
            stop,
            step,
            reason,
        };

        if step == 0 {
            return Err(invalid("step must be non-zero"));
        }
        if (stop > start && step < 0) || (stop < start && step > 0) {
            return Err(invalid("step moves away from stop"));
        }

        Ok(Self { start, stop, step })
    }

    pub fn start(&self) -> i64 {
        self.start
    }

    pub fn stop(&self) -> i64 {
        self.stop
    }

    pub fn step(&self) -> i64 {
        self.step
    }

    /// Number of values in the range.
    ///
    /// A range may span all of `i64`, so the count needs 65 bits.
    pub fn value_count(&self) -> u128 {
        ((self.stop as i128 - self.start as i128) / self.step as i128).unsigned_abs() + 1
    }

    /// Values from `start` toward `stop` (inclusive when a step lands on it)
    pub fn iter(&self) -> SweepIter {
        SweepIter {
            next: Some(self.start),
            range: *self,
        }
    }
}

impl Default for SweepRange {
    fn default() -> Self {
        Self {
            start: 1,
            stop: 100,
            step: 1,
        }
    }
}

impl TryFrom<[i64; 3]> for SweepRange {
    type Error = Error;

    fn try_from([start, stop, step]: [i64; 3]) -> Result<Self> {
        Self::new(start, stop, step)
    }
}

impl From<SweepRange> for [i64; 3] {
    fn from(range: SweepRange) -> Self {
        [range.start, range.stop, range.step]
    }
}

impl IntoIterator for &SweepRange {
    type Item = i64;
    type IntoIter = SweepIter;

    fn into_iter(self) -> SweepIter {
        self.iter()
    }
}

/// Iterator over a [`SweepRange`]
#[derive(Debug, Clone)]
pub struct SweepIter {
    next: Option<i64>,
    range: SweepRange,
}

impl Iterator for SweepIter {
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        let current = self.next?;
        self.next = current
            .checked_add(self.range.step)
            .filter(|v| {
                if self.range.step > 0 {
                    *v <= self.range.stop
                } else {
                    *v >= self.range.stop
                }
            });
        Some(current)
    }
}

/// Number of pairs in one sweep cycle, saturating at `u128::MAX`
pub fn pairs_per_cycle(delay: &SweepRange, pulse: &SweepRange) -> u128 {
    delay.value_count().saturating_mul(pulse.value_count())
}

/// Every (delay, pulse) pair of one sweep cycle, delay-major
pub fn pairs(delay: &SweepRange, pulse: &SweepRange) -> impl Iterator<Item = (i64, i64)> {
    let pulse = *pulse;
    delay
        .iter()
        .flat_map(move |d| pulse.iter().map(move |p| (d, p)))
}
