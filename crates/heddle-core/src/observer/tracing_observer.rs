//! Structured logging of progress events.

use tracing::{debug, error, info, warn};

use crate::domain::events::TaskEvent;
use crate::domain::outcome::TaskOutcome;

use super::ProgressObserver;

/// Forwards events to `tracing`. Output lines go out at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ProgressObserver for TracingObserver {
    fn apply(&mut self, event: &TaskEvent) {
        match event {
            TaskEvent::RunStarted { total_tasks, .. } => {
                info!(total_tasks, "run started");
            }
            TaskEvent::Started {
                task_index,
                task_name,
                ..
            } => {
                info!(task_index, task = %task_name, "task started");
            }
            TaskEvent::OutputLine {
                task_index,
                task_name,
                line,
                ..
            } => {
                debug!(task_index, task = %task_name, "{line}");
            }
            TaskEvent::Finished {
                task_index,
                task_name,
                outcome,
                duration,
                error,
                ..
            } => {
                let secs = duration.as_secs_f64();
                match outcome {
                    TaskOutcome::Success => {
                        info!(task_index, task = %task_name, duration_secs = secs, "task succeeded")
                    }
                    TaskOutcome::Failed => error!(
                        task_index,
                        task = %task_name,
                        duration_secs = secs,
                        error = error.as_deref().unwrap_or(""),
                        "task failed"
                    ),
                    TaskOutcome::Skipped => warn!(task_index, task = %task_name, "task skipped"),
                }
            }
            TaskEvent::RunFinished {
                total,
                succeeded,
                failed,
                skipped,
                ..
            } => {
                info!(total, succeeded, failed, skipped, "run finished");
            }
        }
    }
}
