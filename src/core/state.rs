//! Agent 状态机
//!
//! 静态转移表 + 纯函数 transition：只返回新状态，不负责存储（由 MrdAgent 持有）。
//! Completed / Failed 只能回到 Idle，结束后的 Agent 必须显式 reset 才能复用。

use std::fmt;

use serde::Serialize;

use crate::core::OrchestrationError;

/// Agent 生命周期阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentState {
    #[default]
    Idle,
    Researching,
    Validating,
    Completed,
    Failed,
}

impl AgentState {
    /// 当前状态允许的后继状态
    pub fn allowed_transitions(self) -> &'static [AgentState] {
        use AgentState::{Completed, Failed, Idle, Researching, Validating};
        match self {
            Idle => &[Researching, Failed],
            Researching => &[Validating, Failed],
            Validating => &[Completed, Failed],
            Completed => &[Idle],
            Failed => &[Idle],
        }
    }

    pub fn can_transition_to(self, target: AgentState) -> bool {
        self.allowed_transitions().contains(&target)
    }

    pub fn is_finished(self) -> bool {
        matches!(self, AgentState::Completed | AgentState::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Researching => "RESEARCHING",
            Self::Validating => "VALIDATING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn can_transition(from: AgentState, to: AgentState) -> bool {
    from.can_transition_to(to)
}

/// 校验并返回新状态；非法转移返回 InvalidTransition
pub fn transition(current: AgentState, to: AgentState) -> Result<AgentState, OrchestrationError> {
    if !current.can_transition_to(to) {
        return Err(OrchestrationError::InvalidTransition { from: current, to });
    }
    Ok(to)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [AgentState; 5] = [
        AgentState::Idle,
        AgentState::Researching,
        AgentState::Validating,
        AgentState::Completed,
        AgentState::Failed,
    ];

    #[test]
    fn test_idle_to_researching() {
        assert_eq!(
            transition(AgentState::Idle, AgentState::Researching),
            Ok(AgentState::Researching)
        );
    }

    #[test]
    fn test_completed_cannot_reenter_researching() {
        let err = transition(AgentState::Completed, AgentState::Researching).unwrap_err();
        assert_eq!(
            err,
            OrchestrationError::InvalidTransition {
                from: AgentState::Completed,
                to: AgentState::Researching,
            }
        );
    }

    #[test]
    fn test_every_state_has_an_exit() {
        for state in ALL {
            assert!(!state.allowed_transitions().is_empty(), "{state} has no exit");
        }
    }

    #[test]
    fn test_finished_states_only_reset() {
        for state in [AgentState::Completed, AgentState::Failed] {
            for target in ALL {
                assert_eq!(can_transition(state, target), target == AgentState::Idle);
            }
        }
    }

    #[test]
    fn test_happy_path() {
        let mut state = AgentState::default();
        for next in [
            AgentState::Researching,
            AgentState::Validating,
            AgentState::Completed,
            AgentState::Idle,
        ] {
            state = transition(state, next).unwrap();
        }
        assert_eq!(state, AgentState::Idle);
    }

    #[test]
    fn test_serializes_as_name() {
        let json = serde_json::to_string(&AgentState::Failed).unwrap();
        assert_eq!(json, "\"FAILED\"");
        assert_eq!(AgentState::Researching.to_string(), "RESEARCHING");
    }
}
