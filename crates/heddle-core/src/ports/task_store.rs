//! TaskStore port - タスク一覧の永続化
//!
//! TaskStore は run の外側にある「タスクの正本」です。
//! - load: run 開始時にタスク一覧を読む（完了済みタスクは status=Completed で返す）
//! - mark_completed: 成功したタスクを 1 件ずつ記録（途中で止まっても再開できる）
//! - finish_run: run 全体の集計を 1 回だけ記録
//!
//! 呼び出しは制御ループからのみ。ワーカーからは触らない。

use crate::domain::errors::StoreError;
use crate::domain::result::RunResult;
use crate::domain::task::Task;

pub trait TaskStore: Send {
    fn load(&mut self) -> Result<Vec<Task>, StoreError>;

    fn mark_completed(&mut self, task: &Task) -> Result<(), StoreError>;

    fn finish_run(&mut self, result: &RunResult) -> Result<(), StoreError>;
}
