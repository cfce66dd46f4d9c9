//! Run-state controller.
//!
//! Owns the one [`Runner`] of a session together with its dispatcher, timer
//! and listener, and is the only thing that mutates it.

use super::listener::RunListener;
use super::motion::MotionProfile;
use super::runner::{Env, RunOutcome, Runner, RunnerState};
use super::timer::{Timer, TimerId};
use crate::dispatch::Dispatcher;
use crate::program::{Program, Statement};
use tracing::{debug, info};

/// Session-level run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Suspended,
    Stopped,
}

impl From<RunnerState> for RunState {
    fn from(state: RunnerState) -> Self {
        match state {
            RunnerState::Idle => RunState::Idle,
            RunnerState::Running => RunState::Running,
            RunnerState::Suspended => RunState::Suspended,
            RunnerState::Done => RunState::Stopped,
        }
    }
}

/// Starts, stops and resumes program runs; at most one is live at a time.
pub struct RunController<D, T, L> {
    dispatcher: D,
    timer: T,
    listener: L,
    runner: Runner,
}

impl<D, T, L> RunController<D, T, L>
where
    D: Dispatcher,
    T: Timer,
    L: RunListener,
{
    /// Create an idle controller.
    pub fn new(
        dispatcher: D,
        timer: T,
        listener: L,
        profile: MotionProfile,
    ) -> Self {
        Self {
            dispatcher,
            timer,
            listener,
            runner: Runner::new(profile),
        }
    }

    fn parts(&mut self) -> (&mut Runner, Env<'_>) {
        (
            &mut self.runner,
            Env {
                dispatcher: &self.dispatcher,
                timer: &mut self.timer,
                listener: &mut self.listener,
            },
        )
    }

    /// Run `program`, stopping the active run first if there is one.
    pub fn run(
        &mut self,
        program: Program,
    ) {
        if self.is_active() {
            debug!("stopping active run before starting a new one");
            self.stop();
        }

        let (runner, mut env) = self.parts();
        // Not active at this point, so neither call can fail.
        let _ = runner.reset();
        info!("running program ({} statements)", program.len());
        if let Err(err) = runner.start(program, &mut env) {
            debug!("{}", err);
        }
    }

    /// Stop the active run. Safe to call at any time.
    pub fn stop(&mut self) {
        let (runner, mut env) = self.parts();
        if runner.stop(&mut env) {
            info!("run stopped");
        }
    }

    /// Return a finished controller to `Idle`.
    pub fn reset(&mut self) {
        if !self.is_active() {
            let _ = self.runner.reset();
        }
    }

    /// The program was edited: an active run is stale and is dropped.
    pub fn program_changed(&mut self) {
        if self.is_active() {
            debug!("program changed while running");
            self.stop();
        }
        let _ = self.runner.reset();
    }

    /// Deliver a timer firing from the host. Stale firings are ignored.
    pub fn on_timer(
        &mut self,
        id: TimerId,
    ) -> bool {
        let (runner, mut env) = self.parts();
        runner.resume(id, &mut env)
    }

    /// Whether a program is running or suspended.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.runner.is_active()
    }

    /// Current run state.
    pub fn state(&self) -> RunState {
        self.runner.state().into()
    }

    /// Outcome of the last finished run.
    pub fn outcome(&self) -> Option<&RunOutcome> {
        self.runner.outcome()
    }

    /// Statement currently executing or waited on.
    pub fn current(&self) -> Option<&Statement> {
        self.runner.current()
    }

    /// Timer the active run is waiting for.
    pub fn pending_timer(&self) -> Option<TimerId> {
        self.runner.pending_timer()
    }

    /// Mutable access to the timer, e.g. to drive a simulated clock.
    pub fn timer_mut(&mut self) -> &mut T {
        &mut self.timer
    }
}
