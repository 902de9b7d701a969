//! Sleeper port - バックオフ待機の抽象化
//!
//! リトライ間の待機は必ずここを通す。テストでは RecordingSleeper に差し替えて、
//! 実時間を使わずに「どれだけ待とうとしたか」を検証する。

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, delay: Duration);
}

/// 本番用: tokio のタイマーで待つ
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

/// テスト用: 待たずに要求された delay を記録する
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.delays
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, delay: Duration) {
        self.delays
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(delay);
        tokio::task::yield_now().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recording_sleeper_records_without_waiting() {
        let sleeper = RecordingSleeper::new();
        let started = std::time::Instant::now();
        sleeper.sleep(Duration::from_secs(30)).await;
        sleeper.sleep(Duration::from_secs(60)).await;

        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(
            sleeper.delays(),
            vec![Duration::from_secs(30), Duration::from_secs(60)]
        );
    }
}
