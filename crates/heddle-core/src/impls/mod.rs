//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **InMemoryTaskStore**: テスト用のタスク一覧
//! - **JsonTaskStore**: JSON ファイルのタスク一覧（CLI が使う）
//! - **CommandWorker**: 子プロセスでタスクを実行
//! - **FakeWorker**: スクリプト可能なテスト用ワーカー

pub mod command_worker;
pub mod fake_worker;
pub mod json_store;
pub mod memory_store;

pub use self::command_worker::CommandWorker;
pub use self::fake_worker::{FakeResponse, FakeWorker};
pub use self::json_store::JsonTaskStore;
pub use self::memory_store::InMemoryTaskStore;
