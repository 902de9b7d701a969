//! Status - タスク一覧の集計ビュー

use serde::{Deserialize, Serialize};

use crate::domain::task::{TaskList, TaskStatus};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl StatusCounts {
    pub fn from_tasks(tasks: &TaskList) -> Self {
        let mut counts = Self::default();
        for task in tasks.tasks() {
            match task.status() {
                TaskStatus::Pending => counts.pending += 1,
                TaskStatus::Completed => counts.completed += 1,
                TaskStatus::Failed => counts.failed += 1,
                TaskStatus::Skipped => counts.skipped += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.pending + self.completed + self.failed + self.skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::task::Task;

    #[test]
    fn counts_each_status() {
        let list = TaskList::new(vec![
            Task::fundamental("a").already_completed(),
            Task::fundamental("b"),
            Task::independent("c"),
        ])
        .unwrap();
        let counts = StatusCounts::from_tasks(&list);
        assert_eq!(counts.completed, 1);
        assert_eq!(counts.pending, 2);
        assert_eq!(counts.total(), 3);
    }
}
