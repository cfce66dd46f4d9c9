//! Runtime system
//!
//! This module contains the cooperative script runner, the controller that
//! owns its lifecycle, and the timers that resume it.

pub mod controller;
pub mod host;
pub mod listener;
pub mod motion;
pub mod runner;
pub mod sim;
pub mod timer;

pub use controller::{RunController, RunState};
pub use listener::{RunListener, TracingListener};
pub use motion::{Maneuver, MotionError, MotionProfile};
pub use runner::{Env, RunOutcome, Runner, RunnerError, RunnerState};
pub use timer::{Timer, TimerId, TokioTimer};

#[cfg(test)]
mod tests;
