//! Domain model (tasks, ordering, outcomes, events, results, config).

pub mod config;
pub mod errors;
pub mod events;
pub mod ids;
pub mod outcome;
pub mod result;
pub mod state;
pub mod task;

pub use config::{RetryConfig, RunConfig};
pub use errors::{ConfigError, FailureKind, HeddleError, StoreError, TaskError, WorkerError};
pub use events::TaskEvent;
pub use ids::RunId;
pub use outcome::TaskOutcome;
pub use result::{RunReport, RunResult, TaskResult};
pub use state::RunState;
pub use task::{order_fundamental, order_independent, Task, TaskCategory, TaskList, TaskStatus};
