//! 失败路径产物：PartialResult 快照与 FailureReport
//!
//! 流水线中止时不抛错，而是返回 Generated::Failed(FailureReport)，调用方总能拿到一个值。

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::{AgentState, CircuitBreakerState};
use crate::document::MrdDocument;
use crate::research::ResearchData;

/// 中止时刻的诊断快照
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartialResult {
    pub state: AgentState,
    pub research_data: ResearchData,
    pub validation_errors: Vec<String>,
    pub circuit_breaker: CircuitBreakerState,
}

impl PartialResult {
    pub fn completed_tasks(&self) -> usize {
        self.research_data.len()
    }
}

/// 代替文档返回的失败报告
#[derive(Debug, Clone, Serialize)]
pub struct FailureReport {
    pub error: String,
    pub error_kind: &'static str,
    pub partial_data: PartialResult,
    pub completed_steps: Vec<String>,
    pub failed_step: String,
    pub recovery_suggestion: String,
    pub timestamp: DateTime<Utc>,
}

/// generate 的结果：完整文档或失败报告
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Generated {
    Document(Box<MrdDocument>),
    Failed(FailureReport),
}

impl Generated {
    pub fn is_document(&self) -> bool {
        matches!(self, Self::Document(_))
    }

    pub fn document(&self) -> Option<&MrdDocument> {
        match self {
            Self::Document(doc) => Some(doc),
            Self::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&FailureReport> {
        match self {
            Self::Document(_) => None,
            Self::Failed(report) => Some(report),
        }
    }
}
