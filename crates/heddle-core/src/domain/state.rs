//! State - run のフェーズ状態
//!
//! # 状態遷移
//! - Idle -> RunningFundamental
//! - RunningFundamental -> RunningIndependent
//! - RunningFundamental -> Finalizing（fail-fast で停止した場合）
//! - RunningIndependent -> Finalizing
//! - Finalizing -> Done

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Idle,
    RunningFundamental,
    RunningIndependent,
    Finalizing,
    Done,
}

impl RunState {
    pub fn can_transition_to(self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (Idle, RunningFundamental)
                | (RunningFundamental, RunningIndependent)
                | (RunningFundamental, Finalizing)
                | (RunningIndependent, Finalizing)
                | (Finalizing, Done)
        )
    }

    pub fn is_running(self) -> bool {
        matches!(self, RunState::RunningFundamental | RunState::RunningIndependent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(RunState::Idle, RunState::RunningFundamental)]
    #[case(RunState::RunningFundamental, RunState::RunningIndependent)]
    #[case(RunState::RunningFundamental, RunState::Finalizing)]
    #[case(RunState::RunningIndependent, RunState::Finalizing)]
    #[case(RunState::Finalizing, RunState::Done)]
    fn allowed_transitions(#[case] from: RunState, #[case] to: RunState) {
        assert!(from.can_transition_to(to));
    }

    #[rstest]
    #[case(RunState::Idle, RunState::RunningIndependent)]
    #[case(RunState::RunningIndependent, RunState::RunningFundamental)]
    #[case(RunState::Done, RunState::Idle)]
    #[case(RunState::Finalizing, RunState::RunningIndependent)]
    #[case(RunState::Idle, RunState::Done)]
    fn rejected_transitions(#[case] from: RunState, #[case] to: RunState) {
        assert!(!from.can_transition_to(to));
    }
}
