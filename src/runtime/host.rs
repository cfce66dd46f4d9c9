//! Tokio host loop.
//!
//! Drives one [`RunController`] against the real backend: timer firings,
//! dispatcher failures and the shutdown signal all arrive on the same task,
//! so the controller itself is never shared.

use super::controller::RunController;
use super::listener::TracingListener;
use super::motion::MotionProfile;
use super::runner::RunOutcome;
use super::timer::TokioTimer;
use crate::dispatch::{DispatchError, HttpDispatcher, RobotClient};
use crate::program::Program;
use std::future::Future;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::warn;

/// What a hosted run produced.
#[derive(Debug, Clone, Default)]
pub struct HostReport {
    /// Outcome of the run; `None` only if it never started.
    pub outcome: Option<RunOutcome>,
    /// Backend failures, in arrival order. They never halt the run.
    pub failures: Vec<DispatchError>,
}

/// Run `program` until it finishes or Ctrl-C is pressed.
pub async fn execute(
    program: Program,
    client: RobotClient,
    profile: MotionProfile,
) -> HostReport {
    execute_until(program, client, profile, tokio::signal::ctrl_c()).await
}

/// Run `program` until it finishes or `shutdown` resolves, whichever is
/// first. Queued commands are delivered before returning.
pub async fn execute_until<S>(
    program: Program,
    client: RobotClient,
    profile: MotionProfile,
    shutdown: S,
) -> HostReport
where
    S: Future,
{
    let runtime = Handle::current();
    let (notice_tx, mut notices) = mpsc::unbounded_channel();
    let (fired_tx, mut fired) = mpsc::unbounded_channel();
    let dispatcher = HttpDispatcher::spawn(client, &runtime, notice_tx);
    let mut report = HostReport::default();

    {
        let timer = TokioTimer::new(runtime, fired_tx);
        let mut controller = RunController::new(&dispatcher, timer, TracingListener, profile);
        controller.run(program);

        tokio::pin!(shutdown);
        while controller.is_active() {
            tokio::select! {
                Some(id) = fired.recv() => {
                    controller.on_timer(id);
                }
                Some(err) = notices.recv() => {
                    report.failures.push(err);
                }
                _ = &mut shutdown => {
                    warn!("interrupted, stopping the robot");
                    controller.stop();
                }
                else => break,
            }
        }
        report.outcome = controller.outcome().cloned();
    }

    dispatcher.settle().await;
    while let Ok(err) = notices.try_recv() {
        report.failures.push(err);
    }
    report
}
