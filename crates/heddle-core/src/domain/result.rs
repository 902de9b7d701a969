//! Per-task results and per-phase / per-run aggregates.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ids::RunId;
use super::outcome::TaskOutcome;

/// Terminal record for one task in one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_index: usize,
    pub task_name: String,
    pub outcome: TaskOutcome,
    pub duration: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Worker invocations made (0 for skipped tasks).
    pub attempts: u32,
}

impl TaskResult {
    pub fn skipped(task_index: usize, task_name: impl Into<String>) -> Self {
        Self {
            task_index,
            task_name: task_name.into(),
            outcome: TaskOutcome::Skipped,
            duration: Duration::ZERO,
            error: None,
            attempts: 0,
        }
    }
}

/// Aggregate of task results. Produced once per phase and once for the whole run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub results: Vec<TaskResult>,
}

impl RunResult {
    pub fn push(&mut self, result: TaskResult) {
        self.results.push(result);
    }

    /// Concatenate two aggregates (phase results into the run result).
    pub fn merged(phases: &[&RunResult]) -> RunResult {
        RunResult {
            results: phases.iter().flat_map(|r| r.results.iter().cloned()).collect(),
        }
    }

    fn names_with(&self, outcome: TaskOutcome) -> Vec<&str> {
        self.results
            .iter()
            .filter(|r| r.outcome == outcome)
            .map(|r| r.task_name.as_str())
            .collect()
    }

    pub fn completed(&self) -> Vec<&str> {
        self.names_with(TaskOutcome::Success)
    }

    pub fn failed(&self) -> Vec<&str> {
        self.names_with(TaskOutcome::Failed)
    }

    pub fn skipped(&self) -> Vec<&str> {
        self.names_with(TaskOutcome::Skipped)
    }

    pub fn count(&self, outcome: TaskOutcome) -> usize {
        self.results.iter().filter(|r| r.outcome == outcome).count()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// True iff no task failed. Skips do not count as failures.
    pub fn success(&self) -> bool {
        self.count(TaskOutcome::Failed) == 0
    }

    pub fn get(&self, task_name: &str) -> Option<&TaskResult> {
        self.results.iter().find(|r| r.task_name == task_name)
    }

    /// One-line summary, e.g. `3 succeeded, 1 failed, 2 skipped`.
    pub fn summary(&self) -> String {
        format!(
            "{} succeeded, {} failed, {} skipped",
            self.count(TaskOutcome::Success),
            self.count(TaskOutcome::Failed),
            self.count(TaskOutcome::Skipped),
        )
    }
}

/// Everything a run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub fundamental: RunResult,
    pub independent: RunResult,
    pub overall: RunResult,
}

impl RunReport {
    pub fn success(&self) -> bool {
        self.overall.success()
    }
}
