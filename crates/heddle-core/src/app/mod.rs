//! App - アプリケーション層
//!
//! ports を組み合わせて run を実行します。
//!
//! # 主要コンポーネント
//! - **SchedulerBuilder**: 構築とワイヤリング（起動時検証）
//! - **PhaseOrchestrator**: フェーズ進行（fundamental → independent → finalizing）
//! - **ConcurrencyCoordinator**: independent フェーズの並列実行
//! - **StatusCounts**: タスク一覧の集計

pub mod builder;
pub mod coordinator;
pub(crate) mod ledger;
pub mod orchestrator;
pub mod status;

pub use self::builder::{BuildError, SchedulerBuilder};
pub use self::coordinator::ConcurrencyCoordinator;
pub use self::orchestrator::PhaseOrchestrator;
pub use self::status::StatusCounts;
