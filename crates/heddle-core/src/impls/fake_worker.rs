//! FakeWorker - テスト用のスクリプト可能なワーカー
//!
//! # 応答の決まり方（上から順に最初に見つかったもの）
//! 1. タスク名ごとのスクリプト（with_task_script）
//! 2. 共通スクリプト（scripted）: 呼び出し順に消費
//! 3. fallback（successful / failing / rate_limited）
//! 4. どれもなければ Crash（スクリプト切れ）
//!
//! 呼び出し履歴と同時実行数のピークを記録するので、並列度の上限もテストできる。

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::errors::WorkerError;
use crate::domain::task::Task;
use crate::observer::OutputSink;
use crate::ports::{Worker, WorkerOutput};

pub const RATE_LIMIT_OUTPUT: &str = "Error 429: rate limit hit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeResponse {
    Output { success: bool, output: String },
    Crash(String),
    Panic(String),
}

impl FakeResponse {
    pub fn success(output: impl Into<String>) -> Self {
        FakeResponse::Output {
            success: true,
            output: output.into(),
        }
    }

    pub fn failure(output: impl Into<String>) -> Self {
        FakeResponse::Output {
            success: false,
            output: output.into(),
        }
    }

    pub fn crash(message: impl Into<String>) -> Self {
        FakeResponse::Crash(message.into())
    }

    pub fn panic(message: impl Into<String>) -> Self {
        FakeResponse::Panic(message.into())
    }
}

#[derive(Debug, Default)]
pub struct FakeWorker {
    script: Mutex<VecDeque<FakeResponse>>,
    per_task: Mutex<HashMap<String, VecDeque<FakeResponse>>>,
    fallback: Option<FakeResponse>,
    delays: HashMap<String, Duration>,
    default_delay: Duration,
    calls: Mutex<Vec<String>>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeWorker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 共通スクリプト: 呼び出し順に 1 件ずつ返す
    pub fn scripted(responses: Vec<FakeResponse>) -> Self {
        Self {
            script: Mutex::new(responses.into()),
            ..Self::default()
        }
    }

    pub fn successful(output: impl Into<String>) -> Self {
        Self::new().with_fallback(FakeResponse::success(output))
    }

    pub fn failing(output: impl Into<String>) -> Self {
        Self::new().with_fallback(FakeResponse::failure(output))
    }

    /// 毎回 429 で失敗する
    pub fn rate_limited() -> Self {
        Self::failing(RATE_LIMIT_OUTPUT)
    }

    pub fn with_fallback(mut self, response: FakeResponse) -> Self {
        self.fallback = Some(response);
        self
    }

    pub fn with_task_script(self, task_name: impl Into<String>, responses: Vec<FakeResponse>) -> Self {
        self.per_task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(task_name.into(), responses.into());
        self
    }

    pub fn with_delay(mut self, task_name: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(task_name.into(), delay);
        self
    }

    pub fn with_default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    /// 呼び出されたタスク名（呼び出し順）
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn calls_for(&self, task_name: &str) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|c| c.as_str() == task_name)
            .count()
    }

    /// 同時に run していた呼び出し数の最大値
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn next_response(&self, task_name: &str) -> Option<FakeResponse> {
        let from_task = self
            .per_task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get_mut(task_name)
            .and_then(VecDeque::pop_front);
        from_task
            .or_else(|| self.script.lock().unwrap_or_else(|e| e.into_inner()).pop_front())
            .or_else(|| self.fallback.clone())
    }
}

/// active カウンタを確実に戻す（panic 時も）
struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Worker for FakeWorker {
    async fn run(&self, task: &Task, output: &OutputSink) -> Result<WorkerOutput, WorkerError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(task.name().to_string());
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now_active, Ordering::SeqCst);
        let _guard = ActiveGuard(&self.active);

        let delay = self
            .delays
            .get(task.name())
            .copied()
            .unwrap_or(self.default_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match self.next_response(task.name()) {
            Some(FakeResponse::Output { success, output: text }) => {
                for line in text.lines() {
                    output.line(line);
                }
                Ok(WorkerOutput {
                    success,
                    output: text,
                })
            }
            Some(FakeResponse::Crash(message)) => Err(WorkerError::Crashed(message)),
            Some(FakeResponse::Panic(message)) => panic!("{message}"),
            None => Err(WorkerError::Crashed(format!(
                "no scripted response left for '{}'",
                task.name()
            ))),
        }
    }
}
