//! 编排错误类型
//!
//! 任务级错误（RetriesExhausted / CircuitOpen）由研究编排层吸收或升级；
//! 其余错误均为致命错误，只在流水线协调层（ProductAgent）被捕获一次并转为失败报告。

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::core::AgentState;

/// 编排过程中可能出现的错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrchestrationError {
    /// 状态机误用，属于编程错误，永不重试
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition { from: AgentState, to: AgentState },

    #[error("Max retries exceeded for task {0}")]
    RetriesExhausted(String),

    #[error("Circuit breaker open - too many failures")]
    CircuitOpen,

    #[error("Critical task failed: {0}")]
    CriticalTaskFailed(String),

    #[error(
        "Insufficient data collected for synthesis: {completed}/{total} tasks completed, \
         critical task completed: {critical_completed}"
    )]
    InsufficientData {
        completed: usize,
        total: usize,
        critical_completed: bool,
    },

    #[error("Research plan rejected by human validator")]
    PlanRejected,

    #[error("MRD validation failed [{layer}]: {rule}")]
    ValidationFailed { layer: ValidationLayer, rule: String },

    #[error("Operation cancelled")]
    Cancelled,

    /// 计划生成 / 综合等外部协作者自身失败
    #[error("{stage} failed: {message}")]
    Collaborator { stage: &'static str, message: String },
}

impl OrchestrationError {
    /// 稳定的错误种类标识，写入失败报告
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::RetriesExhausted(_) => "retries_exhausted",
            Self::CircuitOpen => "circuit_open",
            Self::CriticalTaskFailed(_) => "critical_task_failed",
            Self::InsufficientData { .. } => "insufficient_data",
            Self::PlanRejected => "plan_rejected",
            Self::ValidationFailed { .. } => "validation_failed",
            Self::Cancelled => "cancelled",
            Self::Collaborator { .. } => "collaborator_failed",
        }
    }

    /// 外层研究重试是否值得再跑一次
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::InvalidTransition { .. } | Self::PlanRejected | Self::Cancelled
        )
    }
}

/// 三层校验中出错的那一层
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationLayer {
    Schema,
    BusinessRules,
    DataQuality,
}

impl fmt::Display for ValidationLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Schema => "schema",
            Self::BusinessRules => "business_rules",
            Self::DataQuality => "data_quality",
        };
        f.write_str(s)
    }
}
