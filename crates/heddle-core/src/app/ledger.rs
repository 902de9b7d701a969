//! Completion bookkeeping. Control loop only.

use tracing::warn;

use crate::domain::errors::{HeddleError, StoreError, TaskError};
use crate::domain::outcome::TaskOutcome;
use crate::domain::result::{RunResult, TaskResult};
use crate::domain::task::{Task, TaskList};
use crate::ports::TaskStore;

/// Applies terminal results to the task list and the store.
///
/// Every task result passes through [`Ledger::record`] exactly once; that is
/// where status resolves and successes are persisted.
pub(crate) struct Ledger<'a> {
    tasks: &'a mut TaskList,
    store: &'a mut dyn TaskStore,
}

impl<'a> Ledger<'a> {
    pub(crate) fn new(tasks: &'a mut TaskList, store: &'a mut dyn TaskStore) -> Self {
        Self { tasks, store }
    }

    pub(crate) fn task(&self, index: usize) -> Result<&Task, TaskError> {
        self.tasks.get(index).ok_or(TaskError::UnknownIndex(index))
    }

    pub(crate) fn record(&mut self, result: TaskResult, phase: &mut RunResult) -> Result<(), HeddleError> {
        self.tasks.resolve(result.task_index, result.outcome.status())?;
        if result.outcome == TaskOutcome::Success {
            let task = self
                .tasks
                .get(result.task_index)
                .ok_or(TaskError::UnknownIndex(result.task_index))?;
            if let Err(e) = self.store.mark_completed(task) {
                // the task did succeed; a resumed run will simply redo it
                warn!(task = %result.task_name, error = %e, "failed to persist task completion");
            }
        }
        phase.push(result);
        Ok(())
    }

    pub(crate) fn finish_run(&mut self, overall: &RunResult) -> Result<(), StoreError> {
        self.store.finish_run(overall)
    }
}
