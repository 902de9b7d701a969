//! JsonTaskStore - JSON ファイルに置いたタスク一覧
//!
//! # ファイル形式
//! ```json
//! [
//!   { "name": "set up schema", "category": "fundamental", "order": 1 },
//!   { "name": "write docs", "category": "independent", "group": "docs", "done": true }
//! ]
//! ```
//!
//! - mark_completed: 該当タスクに `"done": true` を付けて書き戻す
//! - finish_run: 集計を `<file>.last-run.json` に書き出す
//!
//! 書き込みは一時ファイルに書いてから rename するので、途中で落ちても元ファイルは壊れない。

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::errors::StoreError;
use crate::domain::result::RunResult;
use crate::domain::task::{Task, TaskCategory};
use crate::ports::TaskStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEntry {
    pub name: String,
    pub category: TaskCategory,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub order: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub done: bool,
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

impl TaskEntry {
    fn to_task(&self) -> Task {
        let mut task = Task::new(self.name.clone(), self.category).with_order(self.order);
        if let Some(group) = &self.group {
            task = task.with_group(group.clone());
        }
        if self.done {
            task = task.already_completed();
        }
        task
    }
}

pub struct JsonTaskStore {
    path: PathBuf,
    entries: Vec<TaskEntry>,
}

impl JsonTaskStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn summary_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".last-run.json");
        self.path.with_file_name(name)
    }

    fn write_atomically(path: &Path, contents: &str) -> Result<(), StoreError> {
        let mut tmp = path.as_os_str().to_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

impl TaskStore for JsonTaskStore {
    fn load(&mut self) -> Result<Vec<Task>, StoreError> {
        let raw = fs::read_to_string(&self.path)?;
        self.entries = serde_json::from_str(&raw)?;
        debug!(path = %self.path.display(), tasks = self.entries.len(), "loaded task list");
        Ok(self.entries.iter().map(TaskEntry::to_task).collect())
    }

    fn mark_completed(&mut self, task: &Task) -> Result<(), StoreError> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.name == task.name())
            .ok_or_else(|| StoreError::UnknownTask(task.name().to_string()))?;
        entry.done = true;
        let contents = serde_json::to_string_pretty(&self.entries)?;
        Self::write_atomically(&self.path, &contents)
    }

    fn finish_run(&mut self, result: &RunResult) -> Result<(), StoreError> {
        let contents = serde_json::to_string_pretty(result)?;
        Self::write_atomically(&self.summary_path(), &contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::result::TaskResult;
    use crate::domain::task::TaskStatus;

    const TASKS: &str = r#"[
        { "name": "schema", "category": "fundamental", "order": 1 },
        { "name": "docs", "category": "independent", "group": "docs", "done": true },
        { "name": "lint", "category": "independent" }
    ]"#;

    fn store_with_tasks() -> (tempfile::TempDir, JsonTaskStore) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.json");
        fs::write(&path, TASKS).unwrap();
        (dir, JsonTaskStore::new(path))
    }

    #[test]
    fn load_maps_entries_to_tasks() {
        let (_dir, mut store) = store_with_tasks();
        let tasks = store.load().unwrap();
        assert_eq!(tasks.len(), 3);
        assert_eq!(tasks[0].order(), 1);
        assert_eq!(tasks[1].group(), Some("docs"));
        assert_eq!(tasks[1].status(), TaskStatus::Completed);
        assert_eq!(tasks[2].status(), TaskStatus::Pending);
    }

    #[test]
    fn mark_completed_persists_done_flag() {
        let (_dir, mut store) = store_with_tasks();
        let tasks = store.load().unwrap();
        store.mark_completed(&tasks[2]).unwrap();

        let mut reopened = JsonTaskStore::new(store.path());
        let reloaded = reopened.load().unwrap();
        assert_eq!(reloaded[2].status(), TaskStatus::Completed);
        assert_eq!(reloaded[0].status(), TaskStatus::Pending);
    }

    #[test]
    fn finish_run_writes_summary_next_to_task_file() {
        let (_dir, mut store) = store_with_tasks();
        store.load().unwrap();
        let mut result = RunResult::default();
        result.push(TaskResult::skipped(2, "lint"));
        store.finish_run(&result).unwrap();

        let summary = fs::read_to_string(store.summary_path()).unwrap();
        let parsed: RunResult = serde_json::from_str(&summary).unwrap();
        assert_eq!(parsed, result);
        assert!(store.summary_path().ends_with("tasks.json.last-run.json"));
    }

    #[test]
    fn malformed_file_is_a_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.json");
        fs::write(&path, "{ not json").unwrap();
        let err = JsonTaskStore::new(path).load().unwrap_err();
        assert!(matches!(err, StoreError::Format(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = JsonTaskStore::new(dir.path().join("nope.json")).load().unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
    }
}
