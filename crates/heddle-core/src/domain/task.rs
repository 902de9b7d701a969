//! Task model and phase ordering.
//!
//! A run is built from an ordered source list. Each task belongs to one of two
//! scheduling tiers:
//! - **Fundamental**: executed one by one, before anything else, in
//!   `(explicit order, source position)` order.
//! - **Independent**: handed to the bounded worker pool, no ordering among peers.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::errors::{ConfigError, TaskError};

/// Scheduling tier of a task. Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskCategory {
    Fundamental,
    Independent,
}

/// Per-run task status.
///
/// State transitions (exactly one per task per run):
/// - Pending -> Completed
/// - Pending -> Failed
/// - Pending -> Skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    Completed,
    Failed,
    Skipped,
}

impl TaskStatus {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        !matches!(self, TaskStatus::Pending)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// One unit of work.
///
/// `order == 0` means "no explicit order"; such tasks sort after every task
/// with `order > 0`. `sequence_index` is the position in the source list and
/// breaks ties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    name: String,
    category: TaskCategory,

    #[serde(default)]
    order: u32,

    #[serde(default)]
    sequence_index: usize,

    #[serde(default)]
    status: TaskStatus,

    /// Display-only label. Never used for scheduling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    group: Option<String>,
}

impl Task {
    pub fn new(name: impl Into<String>, category: TaskCategory) -> Self {
        Self {
            name: name.into(),
            category,
            order: 0,
            sequence_index: 0,
            status: TaskStatus::Pending,
            group: None,
        }
    }

    pub fn fundamental(name: impl Into<String>) -> Self {
        Self::new(name, TaskCategory::Fundamental)
    }

    pub fn independent(name: impl Into<String>) -> Self {
        Self::new(name, TaskCategory::Independent)
    }

    pub fn with_order(mut self, order: u32) -> Self {
        self.order = order;
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn with_sequence_index(mut self, sequence_index: usize) -> Self {
        self.sequence_index = sequence_index;
        self
    }

    /// Mark as already done in the source list (resumed runs skip it).
    pub fn already_completed(mut self) -> Self {
        self.status = TaskStatus::Completed;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> TaskCategory {
        self.category
    }

    pub fn order(&self) -> u32 {
        self.order
    }

    pub fn sequence_index(&self) -> usize {
        self.sequence_index
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    pub fn is_pending(&self) -> bool {
        self.status == TaskStatus::Pending
    }

    /// Sort key for the fundamental phase: explicit orders first, then source order.
    pub fn sort_key(&self) -> (u8, u32, usize) {
        let bucket = if self.order > 0 { 0 } else { 1 };
        (bucket, self.order, self.sequence_index)
    }

    /// Resolve the task. Only a pending task can be resolved, and only once.
    pub(crate) fn resolve(&mut self, status: TaskStatus) -> Result<(), TaskError> {
        if self.status.is_terminal() {
            return Err(TaskError::AlreadyResolved {
                name: self.name.clone(),
                status: self.status,
            });
        }
        if !status.is_terminal() {
            return Err(TaskError::NotTerminal {
                name: self.name.clone(),
            });
        }
        self.status = status;
        Ok(())
    }
}

/// Fundamental tasks in execution order.
///
/// Stable sort by `(0 if order > 0 else 1, order, sequence_index)`.
pub fn order_fundamental<'a, I>(tasks: I) -> Vec<&'a Task>
where
    I: IntoIterator<Item = &'a Task>,
{
    let mut ordered: Vec<&Task> = tasks
        .into_iter()
        .filter(|t| t.category == TaskCategory::Fundamental)
        .collect();
    ordered.sort_by_key(|t| t.sort_key());
    ordered
}

/// Independent tasks in source order. `group` is never consulted.
pub fn order_independent<'a, I>(tasks: I) -> Vec<&'a Task>
where
    I: IntoIterator<Item = &'a Task>,
{
    tasks
        .into_iter()
        .filter(|t| t.category == TaskCategory::Independent)
        .collect()
}

/// The task collection for one run.
///
/// Owns every task; `sequence_index` equals the position in this list, so it
/// doubles as the handle the scheduler uses to address a task.
#[derive(Debug, Clone, Default)]
pub struct TaskList {
    tasks: Vec<Task>,
}

impl TaskList {
    /// Build from the source list, renumbering `sequence_index` by position.
    /// Names must be unique within a run. Only `Completed` survives from a
    /// previous run; any other status starts over as `Pending`.
    pub fn new(tasks: Vec<Task>) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        for task in &tasks {
            if !seen.insert(task.name.as_str()) {
                return Err(ConfigError::DuplicateTaskName(task.name.clone()));
            }
        }
        let tasks = tasks
            .into_iter()
            .enumerate()
            .map(|(i, mut t)| {
                if t.status != TaskStatus::Completed {
                    t.status = TaskStatus::Pending;
                }
                t.with_sequence_index(i)
            })
            .collect();
        Ok(Self { tasks })
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, index: usize) -> Option<&Task> {
        self.tasks.get(index)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Pending fundamental tasks, in execution order (as list indices).
    pub fn pending_fundamental(&self) -> Vec<usize> {
        order_fundamental(self.tasks.iter().filter(|t| t.is_pending()))
            .into_iter()
            .map(Task::sequence_index)
            .collect()
    }

    /// Pending independent tasks, in source order (as list indices).
    pub fn pending_independent(&self) -> Vec<usize> {
        order_independent(self.tasks.iter().filter(|t| t.is_pending()))
            .into_iter()
            .map(Task::sequence_index)
            .collect()
    }

    pub(crate) fn resolve(&mut self, index: usize, status: TaskStatus) -> Result<(), TaskError> {
        let task = self
            .tasks
            .get_mut(index)
            .ok_or(TaskError::UnknownIndex(index))?;
        task.resolve(status)
    }

    pub fn into_tasks(self) -> Vec<Task> {
        self.tasks
    }
}
