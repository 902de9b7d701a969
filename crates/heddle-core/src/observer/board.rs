//! Task run board: the display model of a run.
//!
//! One record per task, updated from events on the control loop. `render_text`
//! produces a plain-text snapshot; the CLI prints it, tests assert on it.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt::Write as _;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::domain::events::TaskEvent;
use crate::domain::outcome::TaskOutcome;
use crate::domain::task::{TaskList, TaskStatus};

use super::ProgressObserver;

/// Output lines kept per task.
pub const MAX_TAIL_LINES: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskRunStatus {
    Pending,
    Running,
    Success,
    Failed,
    Skipped,
}

impl From<TaskOutcome> for TaskRunStatus {
    fn from(outcome: TaskOutcome) -> Self {
        match outcome {
            TaskOutcome::Success => TaskRunStatus::Success,
            TaskOutcome::Failed => TaskRunStatus::Failed,
            TaskOutcome::Skipped => TaskRunStatus::Skipped,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskRunRecord {
    pub task_index: usize,
    pub task_name: String,
    pub status: TaskRunStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub duration: Option<Duration>,
    pub error: Option<String>,
    pub tail: VecDeque<String>,
}

impl TaskRunRecord {
    pub fn new(task_index: usize, task_name: impl Into<String>) -> Self {
        Self {
            task_index,
            task_name: task_name.into(),
            status: TaskRunStatus::Pending,
            started_at: None,
            duration: None,
            error: None,
            tail: VecDeque::new(),
        }
    }

    pub fn status_icon(&self) -> &'static str {
        match self.status {
            TaskRunStatus::Pending => "○",
            TaskRunStatus::Running => "⟳",
            TaskRunStatus::Success => "✓",
            TaskRunStatus::Failed => "✗",
            TaskRunStatus::Skipped => "⊘",
        }
    }

    /// Empty until the task has finished.
    pub fn format_duration(&self) -> String {
        self.duration.map(format_duration).unwrap_or_default()
    }

    fn push_line(&mut self, line: &str) {
        if self.tail.len() == MAX_TAIL_LINES {
            self.tail.pop_front();
        }
        self.tail.push_back(line.to_string());
    }
}

/// `1.5s` under a minute, `1m 30s` from one minute on.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{secs:.1}s")
    } else {
        let whole = d.as_secs();
        format!("{}m {}s", whole / 60, whole % 60)
    }
}

#[derive(Debug, Default)]
pub struct TaskRunBoard {
    records: BTreeMap<usize, TaskRunRecord>,
    running: BTreeSet<usize>,
    parallel_mode: bool,
    total: usize,
    finished: bool,
}

impl TaskRunBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-register every task so pending ones show up before they start.
    /// Tasks already completed in the source list are shown as done.
    pub fn for_tasks(tasks: &TaskList) -> Self {
        let mut board = Self::new();
        for task in tasks.tasks() {
            let mut record = TaskRunRecord::new(task.sequence_index(), task.name());
            if task.status() == TaskStatus::Completed {
                record.status = TaskRunStatus::Success;
            }
            board.records.insert(task.sequence_index(), record);
        }
        board
    }

    pub fn set_parallel_mode(&mut self, parallel: bool) {
        self.parallel_mode = parallel;
    }

    pub fn parallel_mode(&self) -> bool {
        self.parallel_mode
    }

    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    pub fn running_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.running.iter().copied()
    }

    pub fn record(&self, task_index: usize) -> Option<&TaskRunRecord> {
        self.records.get(&task_index)
    }

    pub fn records(&self) -> impl Iterator<Item = &TaskRunRecord> {
        self.records.values()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn entry(&mut self, task_index: usize, task_name: &str) -> &mut TaskRunRecord {
        self.records
            .entry(task_index)
            .or_insert_with(|| TaskRunRecord::new(task_index, task_name))
    }

    pub fn status_bar(&self) -> String {
        if self.finished {
            let failed = self.count(TaskRunStatus::Failed);
            return if failed == 0 {
                "Done".to_string()
            } else {
                format!("Done ({failed} failed)")
            };
        }
        if self.parallel_mode && !self.running.is_empty() {
            format!("{} tasks running", self.running.len())
        } else if !self.running.is_empty() {
            "Running".to_string()
        } else {
            "Idle".to_string()
        }
    }

    fn count(&self, status: TaskRunStatus) -> usize {
        self.records.values().filter(|r| r.status == status).count()
    }

    /// Plain-text snapshot of the board.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let done = self
            .records
            .values()
            .filter(|r| !matches!(r.status, TaskRunStatus::Pending | TaskRunStatus::Running))
            .count();
        let total = self.total.max(self.records.len());
        if self.parallel_mode && self.running.len() > 1 {
            let _ = writeln!(out, "Tasks {done}/{total} ({} in parallel)", self.running.len());
        } else {
            let _ = writeln!(out, "Tasks {done}/{total}");
        }

        let width = self
            .records
            .values()
            .map(|r| r.task_name.chars().count())
            .max()
            .unwrap_or(0);
        for r in self.records.values() {
            let detail = match r.status {
                TaskRunStatus::Running if self.parallel_mode => "⚡".to_string(),
                TaskRunStatus::Running => "Running".to_string(),
                TaskRunStatus::Pending => String::new(),
                _ => r.format_duration(),
            };
            let line = format!(
                "  {} {:<width$}  {}",
                r.status_icon(),
                r.task_name,
                detail,
                width = width
            );
            let _ = writeln!(out, "{}", line.trim_end());
            if let Some(err) = &r.error {
                let _ = writeln!(out, "      {err}");
            }
        }
        let _ = write!(out, "{}", self.status_bar());
        out
    }
}

impl ProgressObserver for TaskRunBoard {
    fn apply(&mut self, event: &TaskEvent) {
        match event {
            TaskEvent::RunStarted { total_tasks, .. } => {
                self.total = *total_tasks;
                self.finished = false;
            }
            TaskEvent::Started {
                task_index,
                task_name,
                timestamp,
            } => {
                let record = self.entry(*task_index, task_name);
                record.status = TaskRunStatus::Running;
                record.started_at = Some(*timestamp);
                self.running.insert(*task_index);
            }
            TaskEvent::OutputLine {
                task_index,
                task_name,
                line,
                ..
            } => {
                self.entry(*task_index, task_name).push_line(line);
            }
            TaskEvent::Finished {
                task_index,
                task_name,
                outcome,
                duration,
                error,
                ..
            } => {
                let record = self.entry(*task_index, task_name);
                record.status = (*outcome).into();
                record.duration = Some(*duration);
                record.error = error.clone();
                self.running.remove(task_index);
            }
            TaskEvent::RunFinished { .. } => {
                self.finished = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::task::Task;
    use chrono::TimeZone;
    use rstest::rstest;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 45).unwrap()
    }

    #[rstest]
    #[case(TaskRunStatus::Pending, "○")]
    #[case(TaskRunStatus::Running, "⟳")]
    #[case(TaskRunStatus::Success, "✓")]
    #[case(TaskRunStatus::Failed, "✗")]
    #[case(TaskRunStatus::Skipped, "⊘")]
    fn status_icons(#[case] status: TaskRunStatus, #[case] icon: &str) {
        let mut record = TaskRunRecord::new(0, "t");
        record.status = status;
        assert_eq!(record.status_icon(), icon);
    }

    #[rstest]
    #[case(Duration::from_millis(1500), "1.5s")]
    #[case(Duration::from_secs(90), "1m 30s")]
    #[case(Duration::from_secs(60), "1m 0s")]
    #[case(Duration::ZERO, "0.0s")]
    fn durations_format_for_humans(#[case] d: Duration, #[case] expected: &str) {
        assert_eq!(format_duration(d), expected);
    }

    #[test]
    fn parallel_mode_defaults_to_false() {
        assert!(!TaskRunBoard::new().parallel_mode());
    }

    #[test]
    fn tracks_running_set_through_events() {
        let mut board = TaskRunBoard::new();
        board.set_parallel_mode(true);
        board.apply(&TaskEvent::started(0, "a", ts()));
        board.apply(&TaskEvent::started(2, "c", ts()));
        assert_eq!(board.running_indices().collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(board.status_bar(), "2 tasks running");

        board.apply(&TaskEvent::finished(
            0,
            "a",
            TaskOutcome::Failed,
            Duration::from_secs(2),
            Some("boom".into()),
            ts(),
        ));
        assert_eq!(board.running_count(), 1);
        let a = board.record(0).unwrap();
        assert_eq!(a.status, TaskRunStatus::Failed);
        assert_eq!(a.error.as_deref(), Some("boom"));
        assert_eq!(a.format_duration(), "2.0s");
    }

    #[test]
    fn sequential_mode_says_running() {
        let mut board = TaskRunBoard::new();
        board.apply(&TaskEvent::started(0, "a", ts()));
        assert_eq!(board.status_bar(), "Running");
        assert!(board.render_text().contains("Running"));
        assert!(!board.render_text().contains("⚡"));
    }

    #[test]
    fn parallel_render_marks_running_tasks() {
        let list = TaskList::new(vec![
            Task::independent("Task 1"),
            Task::independent("Task 2"),
            Task::independent("Task 3"),
        ])
        .unwrap();
        let mut board = TaskRunBoard::for_tasks(&list);
        board.set_parallel_mode(true);
        board.apply(&TaskEvent::started(0, "Task 1", ts()));
        board.apply(&TaskEvent::started(1, "Task 2", ts()));

        let text = board.render_text();
        assert!(text.contains("⚡"));
        assert!(text.contains("2 in parallel"));
        assert!(text.contains("○ Task 3"));
    }

    #[test]
    fn output_tail_is_bounded() {
        let mut board = TaskRunBoard::new();
        for n in 0..(MAX_TAIL_LINES + 10) {
            board.apply(&TaskEvent::output_line(0, "a", format!("line {n}"), ts()));
        }
        let record = board.record(0).unwrap();
        assert_eq!(record.tail.len(), MAX_TAIL_LINES);
        assert_eq!(record.tail.front().map(String::as_str), Some("line 10"));
    }

    #[test]
    fn already_completed_tasks_show_as_done() {
        let list =
            TaskList::new(vec![Task::fundamental("a").already_completed(), Task::independent("b")])
                .unwrap();
        let board = TaskRunBoard::for_tasks(&list);
        assert_eq!(board.record(0).unwrap().status, TaskRunStatus::Success);
        assert_eq!(board.record(1).unwrap().status, TaskRunStatus::Pending);
    }

    #[test]
    fn run_finished_reports_failures() {
        let mut board = TaskRunBoard::new();
        board.apply(&TaskEvent::finished(
            0,
            "a",
            TaskOutcome::Failed,
            Duration::from_secs(1),
            None,
            ts(),
        ));
        board.apply(&TaskEvent::RunFinished {
            total: 1,
            succeeded: 0,
            failed: 1,
            skipped: 0,
            timestamp: ts(),
        });
        assert!(board.is_finished());
        assert_eq!(board.status_bar(), "Done (1 failed)");
    }
}
