//! Retrying executor: runs one task through the worker, retrying transient
//! failures with exponential backoff.
//!
//! Both phases go through [`RetryingExecutor::execute`], so retry behaviour is
//! identical for fundamental and independent tasks.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::domain::config::RetryConfig;
use crate::domain::errors::{FailureKind, WorkerError};
use crate::domain::outcome::TaskOutcome;
use crate::domain::result::TaskResult;
use crate::domain::task::Task;
use crate::observer::OutputSink;
use crate::ports::{Sleeper, TokioSleeper, Worker, WorkerOutput};

use super::backoff::compute_delay;
use super::classify::classify;

/// Result of running one task to completion (all attempts included).
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    /// `Success` or `Failed`. Skips never reach the executor.
    pub outcome: TaskOutcome,
    pub output: String,
    pub error: Option<String>,
    pub attempts: u32,
    pub failure: Option<FailureKind>,
}

impl Execution {
    fn from_attempt(
        result: Result<WorkerOutput, WorkerError>,
        failure: Option<FailureKind>,
        attempts: u32,
    ) -> Self {
        match result {
            Ok(out) if out.success => Self {
                outcome: TaskOutcome::Success,
                output: out.output,
                error: None,
                attempts,
                failure: None,
            },
            Ok(out) => Self {
                outcome: TaskOutcome::Failed,
                error: Some(failure_message(&out.output)),
                output: out.output,
                attempts,
                failure,
            },
            Err(err) => Self {
                outcome: TaskOutcome::Failed,
                output: String::new(),
                error: Some(err.to_string()),
                attempts,
                failure,
            },
        }
    }

    pub fn into_task_result(self, task_index: usize, task_name: &str, duration: Duration) -> TaskResult {
        TaskResult {
            task_index,
            task_name: task_name.to_string(),
            outcome: self.outcome,
            duration,
            error: self.error,
            attempts: self.attempts,
        }
    }
}

#[derive(Clone)]
pub struct RetryingExecutor {
    worker: Arc<dyn Worker>,
    config: RetryConfig,
    sleeper: Arc<dyn Sleeper>,
}

impl RetryingExecutor {
    pub fn new(worker: Arc<dyn Worker>, config: RetryConfig) -> Self {
        Self {
            worker,
            config,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run `task` until it succeeds, fails terminally, crashes, or runs out of retries.
    ///
    /// With `max_retries == 0` the worker is invoked exactly once and the
    /// sleeper is never touched.
    pub async fn execute(&self, task: &Task, sink: &OutputSink) -> Execution {
        let max_retries = self.config.max_retries();
        let mut attempt: u32 = 0;
        loop {
            let result = self.run_once(task, sink).await;
            let failure = classify(&result, &self.config);

            if failure == Some(FailureKind::Transient) && attempt < max_retries {
                let delay = compute_delay(attempt, &self.config);
                warn!(
                    task = task.name(),
                    attempt = attempt + 1,
                    max_retries,
                    delay_secs = delay.as_secs_f64(),
                    "transient failure, backing off"
                );
                self.sleeper.sleep(delay).await;
                attempt += 1;
                continue;
            }

            if failure == Some(FailureKind::Transient) && max_retries > 0 {
                warn!(task = task.name(), max_retries, "retries exhausted");
            }
            debug!(task = task.name(), attempts = attempt + 1, ?failure, "task attempts finished");
            return Execution::from_attempt(result, failure, attempt + 1);
        }
    }

    /// One worker invocation on its own tokio task, so a panicking worker
    /// becomes `WorkerError::Crashed` instead of tearing down the caller.
    async fn run_once(&self, task: &Task, sink: &OutputSink) -> Result<WorkerOutput, WorkerError> {
        let worker = Arc::clone(&self.worker);
        let task = task.clone();
        let sink = sink.clone();
        let handle = tokio::spawn(async move { worker.run(&task, &sink).await });
        match handle.await {
            Ok(result) => result,
            Err(join_err) if join_err.is_panic() => {
                Err(WorkerError::Crashed(panic_message(join_err.into_panic())))
            }
            Err(join_err) => Err(WorkerError::Crashed(join_err.to_string())),
        }
    }
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}

/// Last non-empty output line, or a generic message for silent failures.
fn failure_message(output: &str) -> String {
    output
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| "task failed".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::fake_worker::{FakeResponse, FakeWorker};
    use crate::observer::event_channel;
    use crate::ports::{RecordingSleeper, SystemClock};

    fn retry_config(max_retries: u32) -> RetryConfig {
        RetryConfig::new(max_retries, Duration::from_secs(1), Duration::from_secs(60), 0.0).unwrap()
    }

    fn sink() -> OutputSink {
        let (sender, _pump) = event_channel(Arc::new(SystemClock));
        sender.sink(0, "t")
    }

    #[tokio::test]
    async fn first_success_needs_no_retry() {
        let worker = Arc::new(FakeWorker::successful("done"));
        let sleeper = Arc::new(RecordingSleeper::new());
        let exec = RetryingExecutor::new(worker.clone(), retry_config(3)).with_sleeper(sleeper.clone());

        let result = exec.execute(&Task::independent("t"), &sink()).await;
        assert_eq!(result.outcome, TaskOutcome::Success);
        assert_eq!(result.output, "done");
        assert_eq!(result.attempts, 1);
        assert!(sleeper.delays().is_empty());
    }

    #[tokio::test]
    async fn transient_failures_back_off_then_succeed() {
        let worker = Arc::new(FakeWorker::scripted(vec![
            FakeResponse::failure("Error 429: rate limit hit"),
            FakeResponse::failure("Error 429: rate limit hit"),
            FakeResponse::success("ok"),
        ]));
        let sleeper = Arc::new(RecordingSleeper::new());
        let exec = RetryingExecutor::new(worker.clone(), retry_config(3)).with_sleeper(sleeper.clone());

        let result = exec.execute(&Task::independent("t"), &sink()).await;
        assert_eq!(result.outcome, TaskOutcome::Success);
        assert_eq!(result.attempts, 3);
        assert_eq!(worker.call_count(), 3);
        assert_eq!(
            sleeper.delays(),
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
    }

    #[tokio::test]
    async fn terminal_failure_is_not_retried() {
        let worker = Arc::new(FakeWorker::failing("Error: file not found"));
        let sleeper = Arc::new(RecordingSleeper::new());
        let exec = RetryingExecutor::new(worker.clone(), retry_config(3)).with_sleeper(sleeper.clone());

        let result = exec.execute(&Task::independent("t"), &sink()).await;
        assert_eq!(result.outcome, TaskOutcome::Failed);
        assert_eq!(result.failure, Some(FailureKind::Terminal));
        assert_eq!(result.error.as_deref(), Some("Error: file not found"));
        assert_eq!(worker.call_count(), 1);
        assert!(sleeper.delays().is_empty());
    }

    #[tokio::test]
    async fn exhausted_retries_report_the_last_failure() {
        let worker = Arc::new(FakeWorker::rate_limited());
        let sleeper = Arc::new(RecordingSleeper::new());
        let exec = RetryingExecutor::new(worker.clone(), retry_config(2)).with_sleeper(sleeper.clone());

        let result = exec.execute(&Task::independent("t"), &sink()).await;
        assert_eq!(result.outcome, TaskOutcome::Failed);
        assert_eq!(result.failure, Some(FailureKind::Transient));
        assert_eq!(result.attempts, 3);
        assert_eq!(worker.call_count(), 3);
        assert_eq!(sleeper.delays().len(), 2);
    }

    #[tokio::test]
    async fn zero_retries_invokes_the_worker_exactly_once() {
        let worker = Arc::new(FakeWorker::rate_limited());
        let sleeper = Arc::new(RecordingSleeper::new());
        let exec = RetryingExecutor::new(worker.clone(), RetryConfig::disabled())
            .with_sleeper(sleeper.clone());

        let result = exec.execute(&Task::independent("t"), &sink()).await;
        assert_eq!(result.outcome, TaskOutcome::Failed);
        assert_eq!(result.attempts, 1);
        assert_eq!(worker.call_count(), 1);
        assert!(sleeper.delays().is_empty());
    }

    #[tokio::test]
    async fn crashes_are_never_retried() {
        let worker = Arc::new(FakeWorker::scripted(vec![
            FakeResponse::crash("connection reset"),
            FakeResponse::success("unreachable"),
        ]));
        let sleeper = Arc::new(RecordingSleeper::new());
        let exec = RetryingExecutor::new(worker.clone(), retry_config(3)).with_sleeper(sleeper.clone());

        let result = exec.execute(&Task::independent("t"), &sink()).await;
        assert_eq!(result.outcome, TaskOutcome::Failed);
        assert_eq!(result.failure, Some(FailureKind::Crash));
        assert!(result.error.unwrap().contains("connection reset"));
        assert_eq!(worker.call_count(), 1);
    }

    #[tokio::test]
    async fn panicking_worker_becomes_a_crash() {
        let worker = Arc::new(FakeWorker::scripted(vec![FakeResponse::panic("kaboom")]));
        let exec = RetryingExecutor::new(worker, retry_config(3))
            .with_sleeper(Arc::new(RecordingSleeper::new()));

        let result = exec.execute(&Task::independent("t"), &sink()).await;
        assert_eq!(result.outcome, TaskOutcome::Failed);
        assert_eq!(result.failure, Some(FailureKind::Crash));
        assert!(result.error.unwrap().contains("kaboom"));
    }

    #[test]
    fn failure_message_prefers_last_non_empty_line() {
        assert_eq!(failure_message("a\nb\n\n  "), "b");
        assert_eq!(failure_message(""), "task failed");
    }
}
