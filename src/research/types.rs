//! 研究计划与任务
//!
//! ResearchPlan 由垂直模块生成，交给 MrdAgent 后只有任务 status 会被修改；
//! 任务终态保留用于审计，不删除。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 任务 id 中出现即视为关键任务（仅在未显式指定优先级时用于推断）
pub const CRITICAL_KEYWORDS: &[&str] = &["regulatory", "market_analysis"];

/// 成功任务的结果：task id -> 不透明 JSON 负载；不在表中即表示失败
pub type ResearchData = BTreeMap<String, Value>;

/// 任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
}

/// 任务优先级；只有 Critical 失败会中止整个计划
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Critical,
    High,
    #[default]
    Medium,
    Low,
}

impl TaskPriority {
    /// 由任务 id 推断默认优先级
    pub fn infer_from_id(id: &str) -> Self {
        if CRITICAL_KEYWORDS.iter().any(|k| id.contains(k)) {
            Self::Critical
        } else {
            Self::Medium
        }
    }

    pub fn is_critical(self) -> bool {
        self == Self::Critical
    }
}

/// 单个研究任务
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchTask {
    pub id: String,
    pub question: String,
    #[serde(default)]
    pub required_tools: Vec<String>,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub status: TaskStatus,
    /// 垂直领域特定参数（如关注指标、地区）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

impl ResearchTask {
    pub fn new(id: impl Into<String>, question: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            priority: TaskPriority::infer_from_id(&id),
            id,
            question: question.into(),
            required_tools: Vec::new(),
            status: TaskStatus::Pending,
            context: None,
        }
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_tools = tools.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }

    pub fn is_critical(&self) -> bool {
        self.priority.is_critical()
    }
}

/// 有序任务列表 + 计划元数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchPlan {
    pub id: String,
    pub original_prompt: String,
    pub vertical: String,
    pub target_region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_demographic: Option<Value>,
    #[serde(default)]
    pub tasks: Vec<ResearchTask>,
}

impl ResearchPlan {
    pub fn new(
        original_prompt: impl Into<String>,
        vertical: impl Into<String>,
        target_region: impl Into<String>,
    ) -> Self {
        let vertical = vertical.into();
        Self {
            id: format!("{}_{}", vertical, uuid::Uuid::new_v4().simple()),
            original_prompt: original_prompt.into(),
            vertical,
            target_region: target_region.into(),
            target_demographic: None,
            tasks: Vec::new(),
        }
    }

    pub fn with_task(mut self, task: ResearchTask) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn with_demographic(mut self, demographic: Value) -> Self {
        self.target_demographic = Some(demographic);
        self
    }

    pub fn task(&self, id: &str) -> Option<&ResearchTask> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn count_with_status(&self, status: TaskStatus) -> usize {
        self.tasks.iter().filter(|t| t.status == status).count()
    }
}
