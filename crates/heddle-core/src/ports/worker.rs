//! Worker port - タスク 1 件を実行する外部処理
//!
//! Worker はタスク名を受け取り、出力を 1 行ずつ `OutputSink` に流しながら実行し、
//! 最後に成否と出力全体を返します。
//!
//! # エラーの扱い
//! - `Ok(WorkerOutput { success: false, .. })`: 普通のタスク失敗（リトライ判定の対象）
//! - `Err(WorkerError)`: ワーカー自体のクラッシュ（リトライしない）
//!
//! `run` は `&self` なので、呼び出しごとの状態は future の中に閉じ込めること。
//! 同じ Worker が複数タスクから同時に呼ばれる。

use async_trait::async_trait;

use crate::domain::errors::WorkerError;
use crate::domain::task::Task;
use crate::observer::OutputSink;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerOutput {
    pub success: bool,
    pub output: String,
}

impl WorkerOutput {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
        }
    }

    pub fn failure(output: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
        }
    }
}

#[async_trait]
pub trait Worker: Send + Sync {
    async fn run(&self, task: &Task, output: &OutputSink) -> Result<WorkerOutput, WorkerError>;
}
