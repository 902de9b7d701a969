//! Outcome model: the terminal result of one task in one run.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::task::TaskStatus;

/// How a task ended. Exactly one per task per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskOutcome {
    Success,
    Failed,
    Skipped,
}

impl TaskOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskOutcome::Success => "success",
            TaskOutcome::Failed => "failed",
            TaskOutcome::Skipped => "skipped",
        }
    }

    /// The task status this outcome resolves to.
    pub fn status(self) -> TaskStatus {
        match self {
            TaskOutcome::Success => TaskStatus::Completed,
            TaskOutcome::Failed => TaskStatus::Failed,
            TaskOutcome::Skipped => TaskStatus::Skipped,
        }
    }

    pub fn is_failure(self) -> bool {
        self == TaskOutcome::Failed
    }
}

impl fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_maps_to_terminal_status() {
        assert_eq!(TaskOutcome::Success.status(), TaskStatus::Completed);
        assert_eq!(TaskOutcome::Failed.status(), TaskStatus::Failed);
        assert_eq!(TaskOutcome::Skipped.status(), TaskStatus::Skipped);
    }

    #[test]
    fn outcome_serializes_snake_case() {
        let s = serde_json::to_string(&TaskOutcome::Skipped).unwrap();
        assert_eq!(s, "\"skipped\"");
    }
}
