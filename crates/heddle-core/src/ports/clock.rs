//! Clock port - 時刻の抽象化
//!
//! # 実装
//! - **SystemClock**: 本番用
//! - **FixedClock**: テスト用（常に同じ時刻を返す）

use chrono::{DateTime, Utc};

/// Clock は現在時刻を提供
///
/// イベントのタイムスタンプ、ログのディレクトリ名、RunId の時刻部分はすべてここから取る。
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    at: DateTime<Utc>,
}

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self { at }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn fixed_clock_never_moves() {
        let at = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 45).unwrap();
        let clock = FixedClock::new(at);
        assert_eq!(clock.now(), at);
        assert_eq!(clock.now(), at);
    }
}
