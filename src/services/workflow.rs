use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::debug;

use crate::error::{AppError, ErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "kind", rename_all = "lowercase")]
pub enum WorkflowState {
    Idle,
    Validating,
    Submitting,
    Succeeded,
    Failed(ErrorKind),
}

impl WorkflowState {
    pub fn in_flight(&self) -> bool {
        matches!(self, WorkflowState::Validating | WorkflowState::Submitting)
    }
}

/// Tracks one submission site. Only one submission may be in flight; a
/// finished one (either outcome) goes back through `Idle` on the next start.
pub struct Workflow {
    name: &'static str,
    state: Mutex<WorkflowState>,
}

impl Workflow {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Mutex::new(WorkflowState::Idle),
        }
    }

    fn lock(&self) -> MutexGuard<'_, WorkflowState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> WorkflowState {
        *self.lock()
    }

    /// Enters `Validating`, or fails with `Conflict` while another
    /// submission is running.
    pub fn begin(&self) -> Result<Submission<'_>, AppError> {
        let mut state = self.lock();
        if state.in_flight() {
            return Err(AppError::Conflict(format!(
                "A {} submission is already in progress",
                self.name
            )));
        }
        *state = WorkflowState::Validating;
        debug!("{} workflow: validating", self.name);
        Ok(Submission {
            workflow: self,
            finished: false,
        })
    }

    fn set(&self, next: WorkflowState) {
        *self.lock() = next;
    }
}

/// Handle for one in-flight submission. Dropping it unfinished marks the
/// workflow failed so the site is never stuck in flight.
pub struct Submission<'a> {
    workflow: &'a Workflow,
    finished: bool,
}

impl Submission<'_> {
    pub fn submitting(&self) {
        debug!("{} workflow: submitting", self.workflow.name);
        self.workflow.set(WorkflowState::Submitting);
    }

    pub fn succeed(mut self) {
        self.finished = true;
        self.workflow.set(WorkflowState::Succeeded);
    }

    pub fn fail(mut self, err: &AppError) {
        self.finished = true;
        self.workflow.set(WorkflowState::Failed(err.kind()));
    }

    /// Settles the submission from a result and passes the result through.
    pub fn finish<T>(self, result: Result<T, AppError>) -> Result<T, AppError> {
        match &result {
            Ok(_) => self.succeed(),
            Err(e) => self.fail(e),
        }
        result
    }
}

impl Drop for Submission<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.workflow.set(WorkflowState::Failed(ErrorKind::Generic));
        }
    }
}
