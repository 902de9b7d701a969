//! PhaseOrchestrator - run 全体の進行
//!
//! # フェーズ
//! 1. fundamental: 順序付きで 1 件ずつ、制御ループ上で実行
//! 2. independent: ConcurrencyCoordinator で並列実行（parallel=false なら 1 件ずつ）
//! 3. finalizing: 集計して RunFinished を送り、store に 1 回だけ記録
//!
//! fail-fast で fundamental が失敗した場合は independent フェーズを開始せず、
//! 残りのタスクをすべて Skipped にして finalizing に進みます。

use std::sync::Arc;
use std::time::Instant;

use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::domain::config::RunConfig;
use crate::domain::errors::HeddleError;
use crate::domain::events::TaskEvent;
use crate::domain::outcome::TaskOutcome;
use crate::domain::result::{RunReport, RunResult, TaskResult};
use crate::domain::state::RunState;
use crate::domain::task::TaskList;
use crate::observer::{event_channel, EventPump, EventSender, ProgressObserver};
use crate::ports::{Clock, IdGenerator, TaskStore};
use crate::retry::RetryingExecutor;

use super::coordinator::ConcurrencyCoordinator;
use super::ledger::Ledger;

pub struct PhaseOrchestrator {
    config: RunConfig,
    executor: RetryingExecutor,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    state: RunState,
}

impl PhaseOrchestrator {
    pub(crate) fn new(
        config: RunConfig,
        executor: RetryingExecutor,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            config,
            executor,
            clock,
            ids,
            state: RunState::Idle,
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Where the last (or current) run got to.
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Run every pending task in `tasks`.
    ///
    /// Task failures never make this return `Err`; they end up in the report.
    /// Errors are reserved for bookkeeping problems (`finish_run` failing, a
    /// task resolved twice).
    pub async fn run(
        &mut self,
        tasks: &mut TaskList,
        store: &mut dyn TaskStore,
        observer: &mut dyn ProgressObserver,
    ) -> Result<RunReport, HeddleError> {
        self.state = RunState::Idle;
        let run_id = self.ids.generate_run_id();
        let (sender, mut pump) = event_channel(Arc::clone(&self.clock));

        let fundamental = tasks.pending_fundamental();
        let independent = tasks.pending_independent();
        let already_done = tasks.len() - fundamental.len() - independent.len();
        info!(
            %run_id,
            fundamental = fundamental.len(),
            independent = independent.len(),
            already_done,
            "starting run"
        );
        sender.post_event(TaskEvent::RunStarted {
            total_tasks: fundamental.len() + independent.len(),
            timestamp: sender.now(),
        });

        let mut ledger = Ledger::new(tasks, store);

        self.advance(RunState::RunningFundamental)?;
        let (fundamental_result, halted) = self
            .run_sequential(&fundamental, &mut ledger, &sender, &mut pump, observer)
            .await?;

        let independent_result = if halted {
            info!(%run_id, "fail-fast: skipping independent phase");
            let mut skipped = RunResult::default();
            for &index in &independent {
                skip_task(index, &mut ledger, &sender, &mut skipped)?;
            }
            pump.pump(observer);
            skipped
        } else {
            self.advance(RunState::RunningIndependent)?;
            if self.config.parallel {
                let coordinator = ConcurrencyCoordinator::new(
                    self.executor.clone(),
                    self.config.max_parallel,
                    self.config.fail_fast,
                    self.config.pump_interval,
                );
                coordinator
                    .run(independent, &mut ledger, &sender, &mut pump, observer)
                    .await?
            } else {
                self.run_sequential(&independent, &mut ledger, &sender, &mut pump, observer)
                    .await?
                    .0
            }
        };

        self.advance(RunState::Finalizing)?;
        let overall = RunResult::merged(&[&fundamental_result, &independent_result]);
        sender.post_event(TaskEvent::RunFinished {
            total: overall.len(),
            succeeded: overall.count(TaskOutcome::Success),
            failed: overall.count(TaskOutcome::Failed),
            skipped: overall.count(TaskOutcome::Skipped),
            timestamp: sender.now(),
        });
        pump.pump(observer);
        ledger.finish_run(&overall)?;
        self.advance(RunState::Done)?;

        info!(%run_id, summary = %overall.summary(), "run finished");
        Ok(RunReport {
            run_id,
            fundamental: fundamental_result,
            independent: independent_result,
            overall,
        })
    }

    fn advance(&mut self, next: RunState) -> Result<(), HeddleError> {
        if !self.state.can_transition_to(next) {
            return Err(HeddleError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        debug!(from = ?self.state, to = ?next, "run state");
        self.state = next;
        Ok(())
    }

    /// One task at a time on the control loop. Returns the phase result and
    /// whether fail-fast halted the sequence.
    async fn run_sequential(
        &self,
        indices: &[usize],
        ledger: &mut Ledger<'_>,
        sender: &EventSender,
        pump: &mut EventPump,
        observer: &mut dyn ProgressObserver,
    ) -> Result<(RunResult, bool), HeddleError> {
        let mut result = RunResult::default();
        let mut halted = false;
        for &index in indices {
            if halted {
                skip_task(index, ledger, sender, &mut result)?;
                continue;
            }
            let task_result = self.run_inline(index, ledger, sender, pump, observer).await?;
            let failed = task_result.outcome.is_failure();
            if failed && self.config.fail_fast {
                info!(task = %task_result.task_name, "fail-fast: remaining tasks will be skipped");
                halted = true;
            }
            ledger.record(task_result, &mut result)?;
        }
        pump.pump(observer);
        Ok((result, halted))
    }

    /// Execute one task, pumping events every `pump_interval` while it runs.
    async fn run_inline(
        &self,
        index: usize,
        ledger: &Ledger<'_>,
        sender: &EventSender,
        pump: &mut EventPump,
        observer: &mut dyn ProgressObserver,
    ) -> Result<TaskResult, HeddleError> {
        let task = ledger.task(index)?.clone();
        let sink = sender.sink(index, task.name());
        sender.post_event(TaskEvent::started(index, task.name(), sender.now()));
        let started = Instant::now();

        let execution = {
            let execute = self.executor.execute(&task, &sink);
            tokio::pin!(execute);
            let mut ticker = tokio::time::interval(self.config.pump_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    execution = &mut execute => break execution,
                    _ = ticker.tick() => {
                        pump.pump(observer);
                    }
                }
            }
        };
        let duration = started.elapsed();

        sender.post_event(TaskEvent::finished(
            index,
            task.name(),
            execution.outcome,
            duration,
            execution.error.clone(),
            sender.now(),
        ));
        pump.pump(observer);
        Ok(execution.into_task_result(index, task.name(), duration))
    }
}

fn skip_task(
    index: usize,
    ledger: &mut Ledger<'_>,
    sender: &EventSender,
    phase: &mut RunResult,
) -> Result<(), HeddleError> {
    let name = ledger.task(index)?.name().to_string();
    sender.post_event(TaskEvent::skipped(index, name.as_str(), sender.now()));
    ledger.record(TaskResult::skipped(index, name), phase)
}
