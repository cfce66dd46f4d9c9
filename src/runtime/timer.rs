//! One-shot timers.
//!
//! The runner never sleeps. It asks a [`Timer`] for a one-shot and gets
//! resumed by its host when that one-shot fires. [`TokioTimer`] backs real
//! runs; `runtime::sim::ManualTimer` backs tests and dry runs.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Identifier of a scheduled one-shot.
///
/// Ids are never reused by a timer, so a firing can always be matched
/// against the one-shot the runner is currently waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

impl fmt::Display for TimerId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "Timer({})", self.0)
    }
}

/// One-shot timer service.
pub trait Timer {
    /// Schedule a one-shot after `delay`. A zero delay still fires
    /// asynchronously, on the next turn of the host loop.
    fn schedule(
        &mut self,
        delay: Duration,
    ) -> TimerId;

    /// Cancel a one-shot. Unknown or already fired ids are ignored.
    fn cancel(
        &mut self,
        id: TimerId,
    );
}

/// Monotonic id source shared by the timer implementations.
#[derive(Debug, Default)]
pub struct TimerIdGenerator {
    next: u64,
}

impl TimerIdGenerator {
    /// Create a new generator.
    pub fn new() -> Self {
        Self { next: 0 }
    }

    /// Hand out the next id.
    pub fn next_id(&mut self) -> TimerId {
        let id = TimerId(self.next);
        self.next += 1;
        id
    }
}

/// Timer on top of the tokio runtime.
///
/// Each one-shot is a sleeping task that posts its id to the `fired`
/// channel. Cancelling aborts the task.
#[derive(Debug)]
pub struct TokioTimer {
    runtime: Handle,
    fired: mpsc::UnboundedSender<TimerId>,
    ids: TimerIdGenerator,
    tasks: HashMap<TimerId, JoinHandle<()>>,
}

impl TokioTimer {
    /// Create a timer posting firings to `fired`.
    pub fn new(
        runtime: Handle,
        fired: mpsc::UnboundedSender<TimerId>,
    ) -> Self {
        Self {
            runtime,
            fired,
            ids: TimerIdGenerator::new(),
            tasks: HashMap::new(),
        }
    }

    /// Number of one-shots that have neither fired nor been cancelled.
    pub fn pending(&self) -> usize {
        self.tasks.values().filter(|t| !t.is_finished()).count()
    }
}

impl Timer for TokioTimer {
    fn schedule(
        &mut self,
        delay: Duration,
    ) -> TimerId {
        self.tasks.retain(|_, task| !task.is_finished());

        let id = self.ids.next_id();
        let fired = self.fired.clone();
        let task = self.runtime.spawn(async move {
            if delay.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(delay).await;
            }
            let _ = fired.send(id);
        });
        debug!("{} scheduled in {:?}", id, delay);
        self.tasks.insert(id, task);
        id
    }

    fn cancel(
        &mut self,
        id: TimerId,
    ) {
        if let Some(task) = self.tasks.remove(&id) {
            task.abort();
            debug!("{} cancelled", id);
        }
    }
}

impl Drop for TokioTimer {
    fn drop(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.abort();
        }
    }
}
