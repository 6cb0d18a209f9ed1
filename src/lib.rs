//! MRD Agent - 市场需求文档（MRD）生成智能体
//!
//! 模块划分：
//! - **agent**: 流水线协调器（计划、审批、研究、综合、校验），失败时产出 FailureReport
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 状态机、熔断器、重试执行器、研究编排器、错误与恢复建议
//! - **document**: MRD 文档结构、三层校验、失败报告
//! - **modules**: 垂直领域研究模块（gambling / saas）
//! - **observability**: tracing 初始化
//! - **research**: 研究计划与任务模型
//! - **tools**: 研究工具注册表、带超时的执行器、模拟工具

pub mod agent;
pub mod config;
pub mod core;
pub mod document;
pub mod modules;
pub mod observability;
pub mod research;
pub mod tools;

pub use agent::{create_product_agent, AutoApprove, PlanApprover, ProductAgent};
pub use document::{FailureReport, Generated, MrdDocument};
