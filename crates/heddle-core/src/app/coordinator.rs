//! ConcurrencyCoordinator - independent フェーズの並列実行
//!
//! # 実行モデル
//! - 制御ループ（この async fn）だけがタスク状態・observer・store に触る
//! - ワーカー（JoinSet 上の WorkUnit）は EventSender にイベントを送るだけ
//! - 同時実行数は max_parallel で上限、空きが出たら次のタスクを投入
//! - ループは「完了待ち（pump_interval でタイムアウト）→ イベント適用 → 完了処理」の繰り返し
//!
//! # fail-fast
//! WorkUnit 間で共有する gate（Mutex<bool>）で順序を保証します。
//! - 開始側: gate を確認して Started を送る（ロック保持中）
//! - 失敗側: gate を立ててから Finished(Failed) を送る（ロック保持中）
//!
//! したがって channel 上で Finished(Failed) の後に Started が来ることはない。
//! 既に走っているタスクはそのまま最後まで実行され、本来の結果で終わる。

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::domain::errors::HeddleError;
use crate::domain::events::TaskEvent;
use crate::domain::outcome::TaskOutcome;
use crate::domain::result::{RunResult, TaskResult};
use crate::domain::task::Task;
use crate::observer::{EventPump, EventSender, ProgressObserver};
use crate::retry::executor::panic_message;
use crate::retry::RetryingExecutor;

use super::ledger::Ledger;

pub struct ConcurrencyCoordinator {
    executor: RetryingExecutor,
    max_parallel: usize,
    fail_fast: bool,
    pump_interval: Duration,
}

impl ConcurrencyCoordinator {
    pub fn new(
        executor: RetryingExecutor,
        max_parallel: usize,
        fail_fast: bool,
        pump_interval: Duration,
    ) -> Self {
        Self {
            executor,
            max_parallel,
            fail_fast,
            pump_interval,
        }
    }

    /// Run `pending` (task indices, in admission order) with at most
    /// `max_parallel` in flight. `max_parallel` is validated by
    /// `RunConfig::validate` before a coordinator is built. Returns once every task has a terminal result.
    pub(crate) async fn run(
        &self,
        pending: Vec<usize>,
        ledger: &mut Ledger<'_>,
        sender: &EventSender,
        pump: &mut EventPump,
        observer: &mut dyn ProgressObserver,
    ) -> Result<RunResult, HeddleError> {
        let gate = FailFastGate::new(self.fail_fast);
        let mut queue: VecDeque<usize> = pending.into();
        let mut join_set: JoinSet<TaskResult> = JoinSet::new();
        let mut in_flight: HashMap<tokio::task::Id, (usize, String)> = HashMap::new();
        let mut result = RunResult::default();
        let mut stopped = false;

        info!(
            tasks = queue.len(),
            max_parallel = self.max_parallel,
            fail_fast = self.fail_fast,
            "starting parallel phase"
        );

        loop {
            // admission
            while !stopped && join_set.len() < self.max_parallel {
                if gate.is_tripped() {
                    stopped = true;
                    break;
                }
                let Some(index) = queue.pop_front() else {
                    break;
                };
                let task = ledger.task(index)?.clone();
                let name = task.name().to_string();
                let unit = WorkUnit {
                    index,
                    task,
                    executor: self.executor.clone(),
                    sender: sender.clone(),
                    gate: gate.clone(),
                };
                let handle = join_set.spawn(unit.run());
                debug!(task_index = index, task = %name, in_flight = join_set.len(), "task admitted");
                in_flight.insert(handle.id(), (index, name));
            }

            if join_set.is_empty() {
                break;
            }

            let joined = tokio::time::timeout(self.pump_interval, join_set.join_next_with_id()).await;
            pump.pump(observer);

            let Ok(Some(joined)) = joined else {
                continue;
            };
            let task_result = match joined {
                Ok((id, task_result)) => {
                    in_flight.remove(&id);
                    task_result
                }
                Err(join_err) => {
                    let Some((index, name)) = in_flight.remove(&join_err.id()) else {
                        error!(error = %join_err, "unknown work unit failed");
                        continue;
                    };
                    let message = if join_err.is_panic() {
                        panic_message(join_err.into_panic())
                    } else {
                        join_err.to_string()
                    };
                    error!(task_index = index, task = %name, error = %message, "work unit crashed");
                    let crashed = crashed_unit(index, name, message, &gate, sender);
                    pump.pump(observer);
                    crashed
                }
            };

            if self.fail_fast && task_result.outcome.is_failure() && !stopped {
                info!(task = %task_result.task_name, "fail-fast: no further tasks will start");
                stopped = true;
            }
            ledger.record(task_result, &mut result)?;
        }

        // never started: either cancelled by fail-fast or refused by the gate
        for index in queue {
            let name = ledger.task(index)?.name().to_string();
            sender.post_event(TaskEvent::skipped(index, name.as_str(), sender.now()));
            ledger.record(TaskResult::skipped(index, name), &mut result)?;
        }
        pump.pump(observer);

        Ok(result)
    }
}

/// Terminal result for a unit whose own future died. Worker panics are caught
/// inside the executor, so this only covers failures of the unit itself.
fn crashed_unit(
    index: usize,
    name: String,
    message: String,
    gate: &FailFastGate,
    sender: &EventSender,
) -> TaskResult {
    gate.settle(TaskOutcome::Failed, || {
        sender.post_event(TaskEvent::finished(
            index,
            name.as_str(),
            TaskOutcome::Failed,
            Duration::ZERO,
            Some(message.clone()),
            sender.now(),
        ));
    });
    TaskResult {
        task_index: index,
        task_name: name,
        outcome: TaskOutcome::Failed,
        duration: Duration::ZERO,
        error: Some(message),
        attempts: 0,
    }
}

/// One task on the pool.
struct WorkUnit {
    index: usize,
    task: Task,
    executor: RetryingExecutor,
    sender: EventSender,
    gate: FailFastGate,
}

impl WorkUnit {
    async fn run(self) -> TaskResult {
        let name = self.task.name().to_string();
        let admitted = self.gate.admit(|| {
            self.sender
                .post_event(TaskEvent::started(self.index, name.as_str(), self.sender.now()));
        });
        if !admitted {
            self.sender
                .post_event(TaskEvent::skipped(self.index, name.as_str(), self.sender.now()));
            return TaskResult::skipped(self.index, name);
        }

        let started = Instant::now();
        let sink = self.sender.sink(self.index, name.as_str());
        let execution = self.executor.execute(&self.task, &sink).await;
        let duration = started.elapsed();

        let outcome = execution.outcome;
        let error = execution.error.clone();
        self.gate.settle(outcome, || {
            self.sender.post_event(TaskEvent::finished(
                self.index,
                name.as_str(),
                outcome,
                duration,
                error,
                self.sender.now(),
            ));
        });
        execution.into_task_result(self.index, &name, duration)
    }
}

#[derive(Clone)]
struct FailFastGate {
    enabled: bool,
    tripped: Arc<Mutex<bool>>,
}

impl FailFastGate {
    fn new(enabled: bool) -> Self {
        Self {
            enabled,
            tripped: Arc::new(Mutex::new(false)),
        }
    }

    /// Run `announce` and return true unless the gate is tripped.
    fn admit(&self, announce: impl FnOnce()) -> bool {
        let tripped = self.tripped.lock().unwrap_or_else(|e| e.into_inner());
        if *tripped {
            return false;
        }
        announce();
        true
    }

    /// Trip on failure (when enabled), then run `announce` under the same lock.
    fn settle(&self, outcome: TaskOutcome, announce: impl FnOnce()) {
        let mut tripped = self.tripped.lock().unwrap_or_else(|e| e.into_inner());
        if self.enabled && outcome.is_failure() {
            *tripped = true;
        }
        announce();
    }

    fn is_tripped(&self) -> bool {
        *self.tripped.lock().unwrap_or_else(|e| e.into_inner())
    }
}
