//! Simulated clock and recording collaborators.
//!
//! Used for dry runs (`walle simulate`) and tests: the clock only moves when
//! a one-shot is fired, and every command and notification is recorded with
//! the simulated time it happened at.

use super::controller::RunController;
use super::listener::RunListener;
use super::motion::MotionProfile;
use super::runner::RunOutcome;
use super::timer::{Timer, TimerId, TimerIdGenerator};
use crate::dispatch::{Command, Dispatcher};
use crate::program::{Program, StatementId};
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Shared simulated time.
#[derive(Debug, Clone, Default)]
pub struct SimClock(Arc<Mutex<Duration>>);

impl SimClock {
    /// Create a clock at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current simulated time.
    pub fn now(&self) -> Duration {
        *self.0.lock()
    }

    fn set(
        &self,
        at: Duration,
    ) {
        let mut now = self.0.lock();
        if at > *now {
            *now = at;
        }
    }
}

/// Timer driven by hand.
///
/// Scheduled one-shots wait in insertion order until [`fire_next`] pops the
/// earliest one and moves the clock to its due time. Zero-delay one-shots are
/// due immediately but still have to be fired.
///
/// [`fire_next`]: ManualTimer::fire_next
#[derive(Debug)]
pub struct ManualTimer {
    clock: SimClock,
    ids: TimerIdGenerator,
    pending: IndexMap<TimerId, Duration>,
}

impl ManualTimer {
    /// Create a timer on `clock`.
    pub fn new(clock: SimClock) -> Self {
        Self {
            clock,
            ids: TimerIdGenerator::new(),
            pending: IndexMap::new(),
        }
    }

    /// The clock this timer advances.
    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    /// One-shots not yet fired or cancelled.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Whether `id` is still scheduled.
    pub fn is_pending(
        &self,
        id: TimerId,
    ) -> bool {
        self.pending.contains_key(&id)
    }

    /// Due time of the earliest one-shot.
    pub fn next_due(&self) -> Option<(TimerId, Duration)> {
        self.pending
            .iter()
            .min_by_key(|(_, due)| **due)
            .map(|(id, due)| (*id, *due))
    }

    /// Pop the earliest one-shot and advance the clock to its due time.
    pub fn fire_next(&mut self) -> Option<TimerId> {
        let (id, due) = self.next_due()?;
        self.pending.shift_remove(&id);
        self.clock.set(due);
        Some(id)
    }

    /// Advance the clock by `by`, popping every one-shot that became due.
    pub fn advance(
        &mut self,
        by: Duration,
    ) -> Vec<TimerId> {
        let target = self.clock.now().saturating_add(by);
        let mut fired = Vec::new();
        while let Some((id, due)) = self.next_due() {
            if due > target {
                break;
            }
            self.pending.shift_remove(&id);
            self.clock.set(due);
            fired.push(id);
        }
        self.clock.set(target);
        fired
    }
}

impl Timer for ManualTimer {
    fn schedule(
        &mut self,
        delay: Duration,
    ) -> TimerId {
        let id = self.ids.next_id();
        self.pending.insert(id, self.clock.now().saturating_add(delay));
        id
    }

    fn cancel(
        &mut self,
        id: TimerId,
    ) {
        self.pending.shift_remove(&id);
    }
}

/// Something that happened during a recorded run.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Dispatched(Command),
    Highlight(Option<StatementId>),
    Finished(RunOutcome),
}

/// An event with its simulated time.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub at: Duration,
    pub event: Event,
}

/// Dispatcher and listener that append to a shared log.
#[derive(Debug, Clone)]
pub struct Recorder {
    clock: SimClock,
    log: Arc<Mutex<Vec<Record>>>,
}

impl Recorder {
    /// Create a recorder stamping events with `clock`.
    pub fn new(clock: SimClock) -> Self {
        Self {
            clock,
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn push(
        &self,
        event: Event,
    ) {
        self.log.lock().push(Record {
            at: self.clock.now(),
            event,
        });
    }

    /// Everything recorded so far.
    pub fn records(&self) -> Vec<Record> {
        self.log.lock().clone()
    }

    /// Only the dispatched commands, in order.
    pub fn commands(&self) -> Vec<Command> {
        self.log
            .lock()
            .iter()
            .filter_map(|r| match &r.event {
                Event::Dispatched(c) => Some(c.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of dispatched commands.
    pub fn command_count(&self) -> usize {
        self.log
            .lock()
            .iter()
            .filter(|r| matches!(r.event, Event::Dispatched(_)))
            .count()
    }
}

impl Dispatcher for Recorder {
    fn dispatch(
        &self,
        command: Command,
    ) {
        self.push(Event::Dispatched(command));
    }
}

impl RunListener for Recorder {
    fn highlight(
        &mut self,
        statement: Option<&StatementId>,
    ) {
        self.push(Event::Highlight(statement.cloned()));
    }

    fn finished(
        &mut self,
        outcome: &RunOutcome,
    ) {
        self.push(Event::Finished(outcome.clone()));
    }
}

/// Controller wired to a simulated clock.
pub type SimController = RunController<Recorder, ManualTimer, Recorder>;

/// Build a controller whose dispatcher and listener share one recorder.
pub fn sim_controller(profile: MotionProfile) -> (SimController, Recorder) {
    let clock = SimClock::new();
    let recorder = Recorder::new(clock.clone());
    let controller = RunController::new(
        recorder.clone(),
        ManualTimer::new(clock),
        recorder.clone(),
        profile,
    );
    (controller, recorder)
}

/// Fire timers until the controller goes inactive or `limit` firings were
/// delivered. Returns the number of firings.
pub fn drain(
    controller: &mut SimController,
    limit: usize,
) -> usize {
    let mut fired = 0;
    while controller.is_active() && fired < limit {
        let Some(id) = controller.timer_mut().fire_next() else {
            break;
        };
        controller.on_timer(id);
        fired += 1;
    }
    fired
}

/// Result of a dry run.
#[derive(Debug, Clone)]
pub struct Simulation {
    pub records: Vec<Record>,
    pub outcome: Option<RunOutcome>,
    pub elapsed: Duration,
}

/// Run `program` to completion on a simulated clock.
pub fn simulate(
    program: Program,
    profile: MotionProfile,
) -> Simulation {
    let limit = program.len().saturating_add(1);
    let (mut controller, recorder) = sim_controller(profile);
    controller.run(program);
    drain(&mut controller, limit);

    let elapsed = controller.timer_mut().clock().now();
    Simulation {
        records: recorder.records(),
        outcome: controller.outcome().cloned(),
        elapsed,
    }
}
