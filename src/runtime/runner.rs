//! Cooperative script runner.
//!
//! Executes a [`Program`] one statement at a time. Side-effecting statements
//! go straight to the dispatcher; `wait`, `move` and `turn` suspend the runner
//! on a one-shot timer and the host resumes it with [`Runner::resume`] when
//! that timer fires. Nothing here blocks or sleeps.
//!
//! ```text
//! Idle --start--> Running --wait/move/turn--> Suspended --timer--> Running
//!                    |                            |
//!                    +--end of program / stop-----+--stop--> Done --reset--> Idle
//! ```

use super::listener::RunListener;
use super::motion::{seconds, MotionProfile};
use super::timer::{Timer, TimerId};
use crate::dispatch::Dispatcher;
use crate::program::{Program, ProgramError, Statement, StatementKind};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Runner state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    /// No program loaded.
    Idle,
    /// Executing statements.
    Running,
    /// Waiting for a one-shot timer.
    Suspended,
    /// Finished, stopped or rejected; see [`Runner::outcome`].
    Done,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Every statement executed.
    Completed,
    /// Cancelled by `stop`.
    Stopped,
    /// The program failed validation and nothing was executed.
    Rejected(ProgramError),
}

/// Misuse of the runner lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunnerError {
    #[error("runner must be idle to start, but is {0:?}")]
    NotIdle(RunnerState),

    #[error("runner is still active and cannot be reset")]
    StillActive,
}

/// Collaborators of a runner step.
pub struct Env<'a> {
    pub dispatcher: &'a dyn Dispatcher,
    pub timer: &'a mut dyn Timer,
    pub listener: &'a mut dyn RunListener,
}

/// What happens when the pending timer fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AfterWait {
    /// Plain wait: continue with the next statement.
    Advance,
    /// A timed drive: halt the motors, then continue.
    HaltMotors,
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    timer: TimerId,
    after: AfterWait,
}

/// Steps through one program at a time.
#[derive(Debug)]
pub struct Runner {
    profile: MotionProfile,
    program: Option<Program>,
    cursor: usize,
    state: RunnerState,
    pending: Option<Pending>,
    outcome: Option<RunOutcome>,
}

impl Runner {
    /// Create an idle runner.
    pub fn new(profile: MotionProfile) -> Self {
        Self {
            profile,
            program: None,
            cursor: 0,
            state: RunnerState::Idle,
            pending: None,
            outcome: None,
        }
    }

    /// Current state.
    #[inline]
    pub fn state(&self) -> RunnerState {
        self.state
    }

    /// Whether a program is running or suspended.
    #[inline]
    pub fn is_active(&self) -> bool {
        matches!(self.state, RunnerState::Running | RunnerState::Suspended)
    }

    /// Outcome of the last run, once `Done`.
    pub fn outcome(&self) -> Option<&RunOutcome> {
        self.outcome.as_ref()
    }

    /// The statement being executed or waited on.
    pub fn current(&self) -> Option<&Statement> {
        if !self.is_active() {
            return None;
        }
        self.program.as_ref()?.get(self.cursor)
    }

    /// The timer the runner is suspended on.
    pub fn pending_timer(&self) -> Option<TimerId> {
        self.pending.map(|p| p.timer)
    }

    /// Begin executing `program` from its first statement.
    ///
    /// An empty or invalid program goes straight to `Done` without touching
    /// the dispatcher.
    pub fn start(
        &mut self,
        program: Program,
        env: &mut Env<'_>,
    ) -> Result<(), RunnerError> {
        if self.state != RunnerState::Idle {
            return Err(RunnerError::NotIdle(self.state));
        }

        if let Err(err) = program.validate() {
            debug!("program rejected: {}", err);
            self.program = Some(program);
            self.finish(RunOutcome::Rejected(err), env);
            return Ok(());
        }

        debug!("starting program with {} statements", program.len());
        self.program = Some(program);
        self.cursor = 0;
        self.state = RunnerState::Running;
        self.advance(env);
        Ok(())
    }

    /// Deliver a timer firing.
    ///
    /// Returns `false` for a firing that does not belong to the current
    /// suspension (stale, from a stopped run); such firings change nothing.
    pub fn resume(
        &mut self,
        timer: TimerId,
        env: &mut Env<'_>,
    ) -> bool {
        let pending = match self.pending {
            Some(p) if self.state == RunnerState::Suspended && p.timer == timer => p,
            _ => {
                debug!("ignoring stale {}", timer);
                return false;
            }
        };

        self.pending = None;
        if pending.after == AfterWait::HaltMotors {
            env.dispatcher.move_motor(0.0, 0.0);
        }
        self.cursor += 1;
        self.state = RunnerState::Running;
        self.advance(env);
        true
    }

    /// Cancel the active run. Returns `false` when nothing was active.
    ///
    /// The pending timer is cancelled before returning. Motors left running
    /// by a suspended `move`/`turn` are halted.
    pub fn stop(
        &mut self,
        env: &mut Env<'_>,
    ) -> bool {
        if !self.is_active() {
            return false;
        }

        if let Some(pending) = self.pending.take() {
            env.timer.cancel(pending.timer);
            if pending.after == AfterWait::HaltMotors {
                env.dispatcher.move_motor(0.0, 0.0);
            }
        }
        self.finish(RunOutcome::Stopped, env);
        true
    }

    /// Drop the finished program and return to `Idle`.
    pub fn reset(&mut self) -> Result<(), RunnerError> {
        if self.is_active() {
            return Err(RunnerError::StillActive);
        }
        self.program = None;
        self.cursor = 0;
        self.pending = None;
        self.outcome = None;
        self.state = RunnerState::Idle;
        Ok(())
    }

    fn advance(
        &mut self,
        env: &mut Env<'_>,
    ) {
        while self.state == RunnerState::Running {
            let Some(stmt) = self.program.as_ref().and_then(|p| p.get(self.cursor)) else {
                self.finish(RunOutcome::Completed, env);
                return;
            };

            env.listener.highlight(Some(&stmt.id));
            debug!("exec {}: {}", stmt.id, stmt.kind);

            let suspend = match &stmt.kind {
                StatementKind::Move {
                    direction,
                    distance,
                } => {
                    let m = self.profile.drive(*direction, *distance);
                    env.dispatcher.move_motor(m.x, m.y);
                    Some((m.duration, AfterWait::HaltMotors))
                }
                StatementKind::Turn { direction, degrees } => {
                    let m = self.profile.turn(*direction, *degrees);
                    env.dispatcher.move_motor(m.x, m.y);
                    Some((m.duration, AfterWait::HaltMotors))
                }
                StatementKind::Wait { seconds: secs } => Some((seconds(*secs), AfterWait::Advance)),
                StatementKind::Speak { text } => {
                    env.dispatcher.speak(text);
                    None
                }
                StatementKind::Servo { servo, value } => {
                    env.dispatcher.set_servo(servo, *value);
                    None
                }
                StatementKind::Audio { clip } => {
                    env.dispatcher.play_audio(clip);
                    None
                }
                StatementKind::Stop => {
                    env.dispatcher.move_motor(0.0, 0.0);
                    None
                }
            };

            match suspend {
                Some((delay, after)) => self.suspend(delay, after, env),
                None => self.cursor += 1,
            }
        }
    }

    fn suspend(
        &mut self,
        delay: Duration,
        after: AfterWait,
        env: &mut Env<'_>,
    ) {
        let timer = env.timer.schedule(delay);
        self.pending = Some(Pending { timer, after });
        self.state = RunnerState::Suspended;
        debug!("suspended on {} for {:?}", timer, delay);
    }

    fn finish(
        &mut self,
        outcome: RunOutcome,
        env: &mut Env<'_>,
    ) {
        self.state = RunnerState::Done;
        self.pending = None;
        env.listener.highlight(None);
        env.listener.finished(&outcome);
        self.outcome = Some(outcome);
    }
}
