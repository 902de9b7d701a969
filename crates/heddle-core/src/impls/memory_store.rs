//! InMemoryTaskStore - テスト用・開発用のタスク一覧

use crate::domain::errors::StoreError;
use crate::domain::result::RunResult;
use crate::domain::task::Task;
use crate::ports::TaskStore;

/// InMemoryTaskStore はメモリ上にタスク一覧を保持
///
/// mark_completed / finish_run の呼び出しを記録するので、
/// 「成功したタスクだけが記録される」「finish_run は 1 回だけ」をテストで確認できる。
#[derive(Debug, Default, Clone)]
pub struct InMemoryTaskStore {
    tasks: Vec<Task>,
    completed: Vec<String>,
    finished_runs: Vec<RunResult>,
}

impl InMemoryTaskStore {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self {
            tasks,
            completed: Vec::new(),
            finished_runs: Vec::new(),
        }
    }

    /// mark_completed された順のタスク名
    pub fn completed(&self) -> &[String] {
        &self.completed
    }

    pub fn finished_runs(&self) -> &[RunResult] {
        &self.finished_runs
    }
}

impl TaskStore for InMemoryTaskStore {
    fn load(&mut self) -> Result<Vec<Task>, StoreError> {
        Ok(self
            .tasks
            .iter()
            .map(|t| {
                if self.completed.iter().any(|c| c == t.name()) {
                    t.clone().already_completed()
                } else {
                    t.clone()
                }
            })
            .collect())
    }

    fn mark_completed(&mut self, task: &Task) -> Result<(), StoreError> {
        if !self.tasks.iter().any(|t| t.name() == task.name()) {
            return Err(StoreError::UnknownTask(task.name().to_string()));
        }
        self.completed.push(task.name().to_string());
        Ok(())
    }

    fn finish_run(&mut self, result: &RunResult) -> Result<(), StoreError> {
        self.finished_runs.push(result.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::task::TaskStatus;

    #[test]
    fn completed_tasks_reload_as_completed() {
        let mut store = InMemoryTaskStore::new(vec![Task::fundamental("a"), Task::independent("b")]);
        store.mark_completed(&Task::fundamental("a")).unwrap();

        let tasks = store.load().unwrap();
        assert_eq!(tasks[0].status(), TaskStatus::Completed);
        assert_eq!(tasks[1].status(), TaskStatus::Pending);
    }

    #[test]
    fn unknown_task_cannot_be_marked() {
        let mut store = InMemoryTaskStore::new(vec![Task::fundamental("a")]);
        let err = store.mark_completed(&Task::fundamental("zzz")).unwrap_err();
        assert!(matches!(err, StoreError::UnknownTask(name) if name == "zzz"));
    }
}
