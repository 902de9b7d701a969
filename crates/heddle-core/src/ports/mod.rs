//! Ports - 抽象化レイヤー
//!
//! スケジューラが外部に依存する箇所はすべて trait にしてあります。
//! - Worker: タスクの実行（子プロセス、テスト用 fake など）
//! - TaskStore: タスク一覧の読み込みと完了記録
//! - Clock / IdGenerator: 時刻と RunId
//! - Sleeper: リトライ間の待機

pub mod clock;
pub mod id_generator;
pub mod sleeper;
pub mod task_store;
pub mod worker;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::sleeper::{RecordingSleeper, Sleeper, TokioSleeper};
pub use self::task_store::TaskStore;
pub use self::worker::{Worker, WorkerOutput};
