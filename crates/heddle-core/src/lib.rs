//! heddle-core
//!
//! Two-phase task scheduler: ordered fundamental tasks first, then independent
//! tasks on a bounded worker pool, with backoff-and-retry for rate-limited
//! workers and a progress event channel that keeps display state on the
//! control loop.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（task, ordering, outcome, events, result, config, errors）
//! - **ports**: 抽象化レイヤー（Worker, TaskStore, Clock, Sleeper, IdGenerator）
//! - **retry**: バックオフ計算・失敗分類・リトライ付き実行
//! - **observer**: イベント channel と observer（board, task log, tracing）
//! - **app**: 構築とフェーズ進行（builder, orchestrator, coordinator）
//! - **impls**: 実装（InMemoryTaskStore, JsonTaskStore, CommandWorker, FakeWorker）

pub mod app;
pub mod domain;
pub mod impls;
pub mod observer;
pub mod ports;
pub mod retry;

pub use app::{BuildError, PhaseOrchestrator, SchedulerBuilder};
pub use domain::{
    HeddleError, RetryConfig, RunConfig, RunReport, RunResult, Task, TaskCategory, TaskEvent, TaskList,
    TaskOutcome, TaskStatus,
};
