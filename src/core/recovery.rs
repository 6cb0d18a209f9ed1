//! 错误恢复建议
//!
//! 根据 OrchestrationError 类型给出可读的恢复建议，写入 FailureReport 供调用方诊断。

use crate::core::OrchestrationError;

/// 将错误映射为恢复建议
#[derive(Debug, Default)]
pub struct RecoveryEngine;

impl RecoveryEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn suggest(&self, err: &OrchestrationError) -> String {
        match err {
            OrchestrationError::CriticalTaskFailed(id) => format!(
                "Critical research task '{id}' could not be completed. \
                 Check availability of the tools it depends on and retry later."
            ),
            OrchestrationError::CircuitOpen | OrchestrationError::RetriesExhausted(_) => {
                "Research tools are failing repeatedly. Wait for the circuit breaker cooldown \
                 and check tool availability."
                    .to_string()
            }
            OrchestrationError::InsufficientData {
                completed, total, ..
            } => format!(
                "Only {completed} of {total} research tasks completed. \
                 Try refining the research query or check tool availability."
            ),
            OrchestrationError::PlanRejected => {
                "Revise the prompt so the generated research plan can be approved.".to_string()
            }
            OrchestrationError::ValidationFailed { layer, rule } => {
                format!("Fix the synthesized draft ({layer}): {rule}")
            }
            OrchestrationError::Cancelled => "Generation was cancelled; run it again.".to_string(),
            OrchestrationError::InvalidTransition { .. } => {
                "Agent was reused without reset; create a new agent or reset it.".to_string()
            }
            OrchestrationError::Collaborator { stage, .. } => {
                format!("The {stage} step failed; check the vertical module configuration.")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ValidationLayer;

    #[test]
    fn test_critical_task_suggestion_names_task() {
        let engine = RecoveryEngine::new();
        let msg = engine.suggest(&OrchestrationError::CriticalTaskFailed("regulatory_check_eu".into()));
        assert!(msg.contains("regulatory_check_eu"));
    }

    #[test]
    fn test_insufficient_data_suggestion() {
        let engine = RecoveryEngine::new();
        let msg = engine.suggest(&OrchestrationError::InsufficientData {
            completed: 6,
            total: 10,
            critical_completed: true,
        });
        assert!(msg.contains("6 of 10"));
    }

    #[test]
    fn test_validation_suggestion_carries_rule() {
        let engine = RecoveryEngine::new();
        let msg = engine.suggest(&OrchestrationError::ValidationFailed {
            layer: ValidationLayer::BusinessRules,
            rule: "Insufficient competitor analysis".into(),
        });
        assert!(msg.contains("business_rules"));
        assert!(msg.contains("Insufficient competitor analysis"));
    }
}
