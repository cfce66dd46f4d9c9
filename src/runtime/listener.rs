//! Run notifications.

use super::runner::RunOutcome;
use crate::program::StatementId;
use tracing::{debug, info, warn};

/// Receives what the editing surface shows while a program runs.
pub trait RunListener {
    /// The statement now executing, or `None` when highlighting is cleared.
    fn highlight(
        &mut self,
        _statement: Option<&StatementId>,
    ) {
    }

    /// The run ended.
    fn finished(
        &mut self,
        _outcome: &RunOutcome,
    ) {
    }
}

/// Listener that logs through `tracing`.
#[derive(Debug, Default)]
pub struct TracingListener;

impl RunListener for TracingListener {
    fn highlight(
        &mut self,
        statement: Option<&StatementId>,
    ) {
        match statement {
            Some(id) => debug!("highlight {}", id),
            None => debug!("highlight cleared"),
        }
    }

    fn finished(
        &mut self,
        outcome: &RunOutcome,
    ) {
        match outcome {
            RunOutcome::Completed => info!("program finished"),
            RunOutcome::Stopped => info!("program stopped"),
            RunOutcome::Rejected(err) => warn!("program not started: {}", err),
        }
    }
}
