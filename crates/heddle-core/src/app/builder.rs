//! SchedulerBuilder - スケジューラの構築とワイヤリング
//!
//! # 起動時検証（Fail-fast 設計）
//! - Worker が未設定なら BuildError::MissingWorker
//! - RunConfig（max_parallel, retry パラメータ）が不正なら BuildError::Config
//!
//! 実行時にはじめて設定ミスに気づく、ということがないようにする。

use std::sync::Arc;

use crate::domain::config::{RetryConfig, RunConfig};
use crate::domain::errors::ConfigError;
use crate::ports::{Clock, IdGenerator, Sleeper, SystemClock, TokioSleeper, UlidGenerator, Worker};
use crate::retry::RetryingExecutor;

use super::orchestrator::PhaseOrchestrator;

/// SchedulerBuilder はスケジューラを構築
///
/// # 使用例
/// ```ignore
/// let mut scheduler = SchedulerBuilder::new()
///     .worker(Arc::new(CommandWorker::new("make", ["-s"])))
///     .max_parallel(3)
///     .fail_fast(true)
///     .build()?;
/// let report = scheduler.run(&mut tasks, &mut store, &mut observer).await?;
/// ```
pub struct SchedulerBuilder {
    worker: Option<Arc<dyn Worker>>,
    config: RunConfig,
    sleeper: Arc<dyn Sleeper>,
    clock: Arc<dyn Clock>,
    ids: Option<Arc<dyn IdGenerator>>,
}

/// BuildError はスケジューラ構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("No worker configured. Call .worker(...) before build().")]
    MissingWorker,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SchedulerBuilder {
    pub fn new() -> Self {
        Self {
            worker: None,
            config: RunConfig::default(),
            sleeper: Arc::new(TokioSleeper),
            clock: Arc::new(SystemClock),
            ids: None,
        }
    }

    pub fn worker(mut self, worker: Arc<dyn Worker>) -> Self {
        self.worker = Some(worker);
        self
    }

    pub fn config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    pub fn max_parallel(mut self, max_parallel: usize) -> Self {
        self.config.max_parallel = max_parallel;
        self
    }

    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.config.fail_fast = fail_fast;
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.config.parallel = parallel;
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    /// リトライ間の待機（テストでは RecordingSleeper）
    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn build(self) -> Result<PhaseOrchestrator, BuildError> {
        let worker = self.worker.ok_or(BuildError::MissingWorker)?;
        self.config.validate()?;

        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(Arc::clone(&self.clock))));
        let executor = RetryingExecutor::new(worker, self.config.retry.clone()).with_sleeper(self.sleeper);
        Ok(PhaseOrchestrator::new(self.config, executor, self.clock, ids))
    }
}

impl Default for SchedulerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::state::RunState;
    use crate::impls::FakeWorker;

    #[test]
    fn test_build_success() {
        let scheduler = SchedulerBuilder::new()
            .worker(Arc::new(FakeWorker::successful("ok")))
            .build()
            .unwrap();
        assert_eq!(scheduler.state(), RunState::Idle);
        assert_eq!(scheduler.config().max_parallel, 3);
    }

    #[test]
    fn test_build_missing_worker() {
        let result = SchedulerBuilder::new().build();
        assert!(matches!(result, Err(BuildError::MissingWorker)));
    }

    #[test]
    fn test_build_rejects_out_of_range_parallelism() {
        let result = SchedulerBuilder::new()
            .worker(Arc::new(FakeWorker::successful("ok")))
            .max_parallel(6)
            .build();
        assert!(matches!(
            result,
            Err(BuildError::Config(ConfigError::MaxParallelOutOfRange { value: 6, .. }))
        ));
    }

    #[test]
    fn test_build_rejects_zero_parallelism() {
        let result = SchedulerBuilder::new()
            .worker(Arc::new(FakeWorker::successful("ok")))
            .max_parallel(0)
            .build();
        assert!(matches!(
            result,
            Err(BuildError::Config(ConfigError::MaxParallelOutOfRange { value: 0, .. }))
        ));
    }
}
