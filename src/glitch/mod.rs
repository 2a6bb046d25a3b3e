//! Glitch sweep: command set, sweep ranges, and the controller loop

pub mod command;
pub mod controller;
pub mod sweep;

pub use controller::{PowerCycling, SweepController, SweepExit, SweepPlan};
pub use sweep::SweepRange;
