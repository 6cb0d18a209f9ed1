//! 研究编排器：MrdAgent
//!
//! 持有状态机、熔断器与重试执行器，按计划顺序串行执行研究任务：
//! - 熔断打开时剩余任务直接以 CircuitOpen 失败，不再调用工具
//! - 关键任务失败立即中止整个计划（CriticalTaskFailed），非关键任务失败记录后继续
//! - 循环结束后检查数据充分性：完成数 / 计划任务总数 >= 0.7 且至少一个关键任务完成
//!
//! 每个实例独占自己的状态与熔断计数，不跨实例共享。

use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::config::AgentSection;
use crate::core::state;
use crate::core::{AgentState, CircuitBreaker, OrchestrationError, RetryExecutor, TaskInvoker};
use crate::document::{DocumentValidator, MrdDocument, PartialResult};
use crate::research::{ResearchData, ResearchPlan, TaskStatus};

/// 数据充分性评估
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SufficiencyReport {
    pub completed: usize,
    pub total: usize,
    pub critical_completed: bool,
}

impl SufficiencyReport {
    /// 分母为计划任务总数，只有成功任务占据结果表
    pub fn assess(plan: &ResearchPlan, data: &ResearchData) -> Self {
        let completed: Vec<_> = plan
            .tasks
            .iter()
            .filter(|t| data.contains_key(&t.id))
            .collect();
        Self {
            completed: completed.len(),
            total: plan.tasks.len(),
            critical_completed: completed.iter().any(|t| t.is_critical()),
        }
    }

    pub fn completion_ratio(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.completed as f64 / self.total as f64
    }

    /// 空计划永远不充分
    pub fn is_sufficient(&self, min_ratio: f64) -> bool {
        self.total > 0
            && self.completion_ratio() + f64::EPSILON >= min_ratio
            && self.critical_completed
    }
}

/// 研究编排 Agent（单线程控制流，任务严格串行）
pub struct MrdAgent {
    state: AgentState,
    config: AgentSection,
    breaker: CircuitBreaker,
    retry: RetryExecutor,
    invoker: Arc<dyn TaskInvoker>,
    research_data: ResearchData,
    validation_errors: Vec<String>,
    cancel_token: CancellationToken,
}

impl MrdAgent {
    pub fn new(config: AgentSection, invoker: Arc<dyn TaskInvoker>) -> Self {
        let breaker = CircuitBreaker::new(config.failure_threshold, config.cooldown())
            .with_enabled(config.circuit_breaker_enabled);
        let retry = RetryExecutor::new(config.retry_policy());
        Self {
            state: AgentState::Idle,
            config,
            breaker,
            retry,
            invoker,
            research_data: ResearchData::new(),
            validation_errors: Vec::new(),
            cancel_token: CancellationToken::new(),
        }
    }

    /// 使用外部取消令牌（如 Ctrl+C 处理器持有的令牌）
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = token;
        self
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn config(&self) -> &AgentSection {
        &self.config
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn research_data(&self) -> &ResearchData {
        &self.research_data
    }

    pub fn validation_errors(&self) -> &[String] {
        &self.validation_errors
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    fn transition(&mut self, to: AgentState) -> Result<(), OrchestrationError> {
        let next = state::transition(self.state, to)?;
        tracing::info!(from = %self.state, to = %next, "State transition");
        self.state = next;
        Ok(())
    }

    /// Completed / Failed -> Idle，复用前必须调用
    pub fn reset(&mut self) -> Result<(), OrchestrationError> {
        self.transition(AgentState::Idle)
    }

    /// 尽力转入 Failed；已处于 Failed 时无操作
    pub fn mark_failed(&mut self) {
        if self.state == AgentState::Failed {
            return;
        }
        if let Err(e) = self.transition(AgentState::Failed) {
            tracing::warn!(error = %e, "Could not mark agent as failed");
        }
    }

    pub(crate) fn clear_validation_errors(&mut self) {
        self.validation_errors.clear();
    }

    pub(crate) fn record_error(&mut self, message: impl Into<String>) {
        self.validation_errors.push(message.into());
    }

    fn abort(&mut self, err: OrchestrationError) -> OrchestrationError {
        self.mark_failed();
        err
    }

    /// 执行研究计划，返回 task id -> 结果
    ///
    /// 成功时状态停留在 Researching，由调用方推进；任何中止都会转入 Failed。
    pub async fn execute_research(
        &mut self,
        plan: &mut ResearchPlan,
    ) -> Result<ResearchData, OrchestrationError> {
        self.transition(AgentState::Researching)?;
        self.research_data.clear();

        tracing::info!(plan = %plan.id, tasks = plan.tasks.len(), "Executing research plan");

        for task in plan.tasks.iter_mut() {
            if self.cancel_token.is_cancelled() {
                return Err(self.abort(OrchestrationError::Cancelled));
            }

            task.status = TaskStatus::InProgress;
            let outcome = if self.breaker.is_open() {
                Err(OrchestrationError::CircuitOpen)
            } else {
                self.retry
                    .run_with_retry(task, self.invoker.as_ref(), &self.cancel_token)
                    .await
            };

            match outcome {
                Ok(result) => {
                    task.status = TaskStatus::Completed;
                    self.research_data.insert(task.id.clone(), result);
                    self.breaker.record_success();
                    tracing::info!(task = %task.id, "Task completed");
                }
                Err(OrchestrationError::Cancelled) => {
                    task.status = TaskStatus::Failed;
                    return Err(self.abort(OrchestrationError::Cancelled));
                }
                Err(e) => {
                    task.status = TaskStatus::Failed;
                    self.record_error(format!("Task {} failed: {}", task.id, e));

                    if task.is_critical() {
                        tracing::error!(task = %task.id, error = %e, "Critical task failed, aborting plan");
                        return Err(self.abort(OrchestrationError::CriticalTaskFailed(
                            task.id.clone(),
                        )));
                    }

                    tracing::warn!(task = %task.id, error = %e, "Non-critical task failed, continuing");
                    self.breaker.record_failure();
                }
            }
        }

        let report = SufficiencyReport::assess(plan, &self.research_data);
        tracing::info!(
            completed = report.completed,
            total = report.total,
            ratio = report.completion_ratio(),
            critical_completed = report.critical_completed,
            "Research sufficiency"
        );
        if !report.is_sufficient(self.config.min_completion_ratio) {
            return Err(self.abort(OrchestrationError::InsufficientData {
                completed: report.completed,
                total: report.total,
                critical_completed: report.critical_completed,
            }));
        }

        Ok(self.research_data.clone())
    }

    /// Researching -> Validating -> Completed；校验失败转入 Failed
    ///
    /// 数据质量告警追加到 validation_errors，但不阻止完成。
    pub fn validate_and_finalize(
        &mut self,
        draft: Value,
        validator: &dyn DocumentValidator,
    ) -> Result<MrdDocument, OrchestrationError> {
        self.transition(AgentState::Validating)?;

        match validator.validate(draft) {
            Ok(validated) => {
                self.validation_errors.extend(validated.warnings);
                self.transition(AgentState::Completed)?;
                Ok(validated.document)
            }
            Err(e) => {
                self.record_error(e.to_string());
                Err(self.abort(e))
            }
        }
    }

    /// 当前状态、已收集结果与错误信息的快照
    pub fn partial_results(&self) -> PartialResult {
        PartialResult {
            state: self.state,
            research_data: self.research_data.clone(),
            validation_errors: self.validation_errors.clone(),
            circuit_breaker: self.breaker.snapshot(),
        }
    }
}
