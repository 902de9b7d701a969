//! Events - 実行中に発生する進捗イベント
//!
//! ワーカー（並列実行中のタスク）はこのイベントを channel に送るだけで、
//! 表示状態には一切触れません。表示側は制御ループ上でイベントを適用します。
//!
//! # イベント種類
//! - RunStarted: run 開始（対象タスク数）
//! - Started: タスク開始
//! - OutputLine: タスク出力 1 行
//! - Finished: タスク終了（outcome, duration, error）
//! - RunFinished: run 終了（集計）

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::outcome::TaskOutcome;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskEvent {
    RunStarted {
        total_tasks: usize,
        timestamp: DateTime<Utc>,
    },
    Started {
        task_index: usize,
        task_name: String,
        timestamp: DateTime<Utc>,
    },
    OutputLine {
        task_index: usize,
        task_name: String,
        line: String,
        timestamp: DateTime<Utc>,
    },
    Finished {
        task_index: usize,
        task_name: String,
        outcome: TaskOutcome,
        duration: Duration,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        timestamp: DateTime<Utc>,
    },
    RunFinished {
        total: usize,
        succeeded: usize,
        failed: usize,
        skipped: usize,
        timestamp: DateTime<Utc>,
    },
}

impl TaskEvent {
    pub fn started(task_index: usize, task_name: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        TaskEvent::Started {
            task_index,
            task_name: task_name.into(),
            timestamp,
        }
    }

    pub fn output_line(
        task_index: usize,
        task_name: impl Into<String>,
        line: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        TaskEvent::OutputLine {
            task_index,
            task_name: task_name.into(),
            line: line.into(),
            timestamp,
        }
    }

    pub fn finished(
        task_index: usize,
        task_name: impl Into<String>,
        outcome: TaskOutcome,
        duration: Duration,
        error: Option<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        TaskEvent::Finished {
            task_index,
            task_name: task_name.into(),
            outcome,
            duration,
            error,
            timestamp,
        }
    }

    /// Skipped tasks never ran: zero duration, no error.
    pub fn skipped(task_index: usize, task_name: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self::finished(
            task_index,
            task_name,
            TaskOutcome::Skipped,
            Duration::ZERO,
            None,
            timestamp,
        )
    }

    /// タスク単位のイベントなら index を返す（run 単位なら None）
    pub fn task_index(&self) -> Option<usize> {
        match self {
            TaskEvent::Started { task_index, .. }
            | TaskEvent::OutputLine { task_index, .. }
            | TaskEvent::Finished { task_index, .. } => Some(*task_index),
            TaskEvent::RunStarted { .. } | TaskEvent::RunFinished { .. } => None,
        }
    }

    pub fn task_name(&self) -> Option<&str> {
        match self {
            TaskEvent::Started { task_name, .. }
            | TaskEvent::OutputLine { task_name, .. }
            | TaskEvent::Finished { task_name, .. } => Some(task_name),
            TaskEvent::RunStarted { .. } | TaskEvent::RunFinished { .. } => None,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            TaskEvent::RunStarted { timestamp, .. }
            | TaskEvent::Started { timestamp, .. }
            | TaskEvent::OutputLine { timestamp, .. }
            | TaskEvent::Finished { timestamp, .. }
            | TaskEvent::RunFinished { timestamp, .. } => *timestamp,
        }
    }

    /// Finished イベントなら outcome を返す
    pub fn outcome(&self) -> Option<TaskOutcome> {
        match self {
            TaskEvent::Finished { outcome, .. } => Some(*outcome),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 45).unwrap()
    }

    #[test]
    fn task_accessors_cover_task_events_only() {
        let started = TaskEvent::started(3, "lint", ts());
        assert_eq!(started.task_index(), Some(3));
        assert_eq!(started.task_name(), Some("lint"));
        assert_eq!(started.outcome(), None);

        let run = TaskEvent::RunStarted {
            total_tasks: 4,
            timestamp: ts(),
        };
        assert_eq!(run.task_index(), None);
        assert_eq!(run.task_name(), None);
        assert_eq!(run.timestamp(), ts());
    }

    #[test]
    fn skipped_event_has_zero_duration_and_no_error() {
        let ev = TaskEvent::skipped(1, "docs", ts());
        match ev {
            TaskEvent::Finished {
                outcome,
                duration,
                error,
                ..
            } => {
                assert_eq!(outcome, TaskOutcome::Skipped);
                assert_eq!(duration, Duration::ZERO);
                assert!(error.is_none());
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let ev = TaskEvent::finished(
            0,
            "build",
            TaskOutcome::Failed,
            Duration::from_millis(1500),
            Some("exit 1".into()),
            ts(),
        );
        let value = serde_json::to_value(&ev).unwrap();
        assert_eq!(value["type"], "finished");
        assert_eq!(value["outcome"], "failed");
        assert_eq!(value["error"], "exit 1");
    }
}
