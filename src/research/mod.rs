//! 研究模型：计划、任务、优先级、状态与结果表

pub mod types;

pub use types::{
    ResearchData, ResearchPlan, ResearchTask, TaskPriority, TaskStatus, CRITICAL_KEYWORDS,
};
