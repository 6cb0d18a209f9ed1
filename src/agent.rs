//! 流水线协调器 ProductAgent
//!
//! 串联 plan -> approval -> research -> synthesis -> validation 五步：
//! 研究阶段外层再包一层重试（每次重试前把编排器从 Failed 复位到 Idle），
//! 任何一步失败都不向外抛错，而是返回 Generated::Failed(FailureReport)。
//! create_product_agent 用模拟工具组装一套可直接运行的组件。

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::config::{AppConfig, PipelineSection};
use crate::core::retry::backoff;
use crate::core::{AgentState, MrdAgent, OrchestrationError, RecoveryEngine, TaskInvoker};
use crate::document::{
    DocumentValidator, FailureReport, Generated, MrdDocument, MrdValidator, PartialResult,
};
use crate::modules::ResearchModule;
use crate::research::{ResearchData, ResearchPlan, TaskStatus};
use crate::tools::{
    CompetitorLookupTool, SimulatedTool, ToolExecutor, ToolRegistry, TransientFaults,
};

/// 计划审批（人工复核的接入点）
#[async_trait]
pub trait PlanApprover: Send + Sync {
    async fn approve(&self, plan: &ResearchPlan) -> bool;
}

/// 默认审批：记录日志后直接通过
#[derive(Debug, Default)]
pub struct AutoApprove;

#[async_trait]
impl PlanApprover for AutoApprove {
    async fn approve(&self, plan: &ResearchPlan) -> bool {
        tracing::info!(
            plan = %plan.id,
            tasks = plan.tasks.len(),
            region = %plan.target_region,
            "Research plan ready for review"
        );
        true
    }
}

/// 失败的步骤名 + 错误
type StepFailure = (&'static str, OrchestrationError);

/// MRD 生成流水线
pub struct ProductAgent {
    agent: MrdAgent,
    module: Arc<dyn ResearchModule>,
    approver: Arc<dyn PlanApprover>,
    validator: Arc<dyn DocumentValidator>,
    recovery: RecoveryEngine,
    pipeline: PipelineSection,
    /// 模拟工具共享的故障注入，每次生成前清零
    faults: Option<Arc<TransientFaults>>,
}

impl ProductAgent {
    pub fn new(
        config: &AppConfig,
        module: Arc<dyn ResearchModule>,
        invoker: Arc<dyn TaskInvoker>,
    ) -> Self {
        Self {
            agent: MrdAgent::new(config.agent.clone(), invoker),
            module,
            approver: Arc::new(AutoApprove),
            validator: Arc::new(MrdValidator::from_config(&config.agent, &config.pipeline)),
            recovery: RecoveryEngine::new(),
            pipeline: config.pipeline.clone(),
            faults: None,
        }
    }

    pub fn with_faults(mut self, faults: Arc<TransientFaults>) -> Self {
        self.faults = Some(faults);
        self
    }

    pub fn with_approver(mut self, approver: Arc<dyn PlanApprover>) -> Self {
        self.approver = approver;
        self
    }

    pub fn with_validator(mut self, validator: Arc<dyn DocumentValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.agent = self.agent.with_cancel_token(token);
        self
    }

    pub fn state(&self) -> AgentState {
        self.agent.state()
    }

    pub fn vertical(&self) -> &str {
        self.module.vertical()
    }

    /// 外部诊断用快照
    pub fn partial_results(&self) -> PartialResult {
        self.agent.partial_results()
    }

    /// 生成 MRD；永不返回 Err
    pub async fn generate(&mut self, prompt: &str) -> Generated {
        let start = Instant::now();
        let mut completed_steps = Vec::new();

        match self.run(prompt, &mut completed_steps).await {
            Ok(mut document) => {
                let elapsed = start.elapsed().as_secs_f64();
                document.processing_time_seconds = Some(elapsed);
                tracing::info!(
                    id = %document.id,
                    confidence = document.confidence_score,
                    seconds = elapsed,
                    "MRD generated"
                );
                Generated::Document(Box::new(document))
            }
            Err((step, err)) => Generated::Failed(self.failure_report(step, err, completed_steps)),
        }
    }

    async fn run(
        &mut self,
        prompt: &str,
        completed_steps: &mut Vec<String>,
    ) -> Result<MrdDocument, StepFailure> {
        if self.agent.state().is_finished() {
            self.agent.reset().map_err(|e| ("plan", e))?;
        }
        self.agent.clear_validation_errors();
        if let Some(faults) = &self.faults {
            faults.reset();
        }

        let mut plan = self
            .module
            .create_plan(prompt)
            .await
            .map_err(|message| ("plan", collaborator("plan", message)))?;
        tracing::info!(plan = %plan.id, tasks = plan.tasks.len(), "Research plan created");
        completed_steps.push("plan".to_string());

        if self.pipeline.enable_human_validation {
            if !self.approver.approve(&plan).await {
                return Err(("approval", OrchestrationError::PlanRejected));
            }
            completed_steps.push("approval".to_string());
        }

        let data = self
            .research_with_retry(&mut plan)
            .await
            .map_err(|e| ("research", e))?;
        completed_steps.push("research".to_string());

        let draft = self
            .module
            .synthesize(&plan, &data)
            .await
            .map_err(|message| ("synthesis", collaborator("synthesis", message)))?;
        completed_steps.push("synthesis".to_string());

        let document = self
            .agent
            .validate_and_finalize(draft, self.validator.as_ref())
            .map_err(|e| ("validation", e))?;
        completed_steps.push("validation".to_string());

        Ok(document)
    }

    /// 外层重试：尝试之间等待 2、4…个退避单位，最后一次失败后不等待
    async fn research_with_retry(
        &mut self,
        plan: &mut ResearchPlan,
    ) -> Result<ResearchData, OrchestrationError> {
        let attempts = self.pipeline.research_attempts.max(1);
        let policy = self.agent.config().retry_policy();
        let token = self.agent.cancel_token();

        let mut attempt = 0;
        loop {
            if self.agent.state() == AgentState::Failed {
                self.agent.reset()?;
            }
            for task in plan.tasks.iter_mut() {
                task.status = TaskStatus::Pending;
            }

            match self.agent.execute_research(plan).await {
                Ok(data) => return Ok(data),
                Err(e) if !e.is_retryable() || attempt + 1 >= attempts => return Err(e),
                Err(e) => {
                    // 下一轮会把任务状态重置为 Pending，先留下本轮的结果
                    let statuses = plan
                        .tasks
                        .iter()
                        .map(|t| format!("{}={:?}", t.id, t.status))
                        .collect::<Vec<_>>()
                        .join(", ");
                    tracing::info!(attempt = attempt + 1, %statuses, "Research attempt task statuses");
                    self.agent.record_error(format!(
                        "Research attempt {} task statuses: {statuses}",
                        attempt + 1
                    ));

                    let delay = policy.delay_for(attempt);
                    tracing::warn!(
                        attempt = attempt + 1,
                        max = attempts,
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "Research attempt failed, retrying"
                    );
                    backoff(delay, &token).await?;
                    attempt += 1;
                }
            }
        }
    }

    fn failure_report(
        &mut self,
        step: &'static str,
        err: OrchestrationError,
        completed_steps: Vec<String>,
    ) -> FailureReport {
        self.agent.mark_failed();
        tracing::error!(step, kind = err.kind(), error = %err, "MRD generation failed");

        FailureReport {
            error: err.to_string(),
            error_kind: err.kind(),
            partial_data: self.agent.partial_results(),
            completed_steps,
            failed_step: step.to_string(),
            recovery_suggestion: self.recovery.suggest(&err),
            timestamp: Utc::now(),
        }
    }
}

fn collaborator(stage: &'static str, message: String) -> OrchestrationError {
    OrchestrationError::Collaborator { stage, message }
}

/// 用模拟工具组装 ProductAgent：模块声明的每个工具都注册一个模拟实现，
/// 每个任务的前 transient_failures 次工具调用失败
pub fn create_product_agent(
    config: &AppConfig,
    module: Arc<dyn ResearchModule>,
    transient_failures: u32,
) -> ProductAgent {
    let faults = Arc::new(TransientFaults::new(transient_failures));
    let mut tools = ToolRegistry::new();
    for (name, description) in module.required_tools() {
        if name == "search_sensor_tower" {
            tools.register(CompetitorLookupTool::new());
        } else {
            tools.register(SimulatedTool::new(name, description).with_faults(faults.clone()));
        }
    }
    for (name, description) in tools.tool_descriptions() {
        tracing::debug!(tool = %name, %description, "Registered research tool");
    }

    let executor = ToolExecutor::new(tools, config.agent.tool_timeout());
    ProductAgent::new(config, module, Arc::new(executor)).with_faults(faults)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use serde_json::{json, Value};

    use super::*;
    use crate::config::AgentSection;
    use crate::modules::SaasModule;
    use crate::research::ResearchTask;

    /// 前 n 次调用全部失败，之后全部成功
    struct FailFirst {
        remaining: AtomicU32,
        calls: AtomicU32,
    }

    impl FailFirst {
        fn new(n: u32) -> Self {
            Self {
                remaining: AtomicU32::new(n),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl TaskInvoker for FailFirst {
        async fn invoke(&self, task: &ResearchTask) -> Result<Value, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let left = self.remaining.load(Ordering::SeqCst);
            if left > 0 {
                self.remaining.store(left - 1, Ordering::SeqCst);
                return Err(format!("{} unavailable", task.id));
            }
            Ok(json!({ "data": task.question }))
        }
    }

    struct Reject;

    #[async_trait]
    impl PlanApprover for Reject {
        async fn approve(&self, _plan: &ResearchPlan) -> bool {
            false
        }
    }

    fn config() -> AppConfig {
        AppConfig {
            agent: AgentSection {
                backoff_unit_ms: 1000,
                ..AgentSection::default()
            },
            ..AppConfig::default()
        }
    }

    fn product_agent(invoker: Arc<FailFirst>) -> ProductAgent {
        ProductAgent::new(&config(), Arc::new(SaasModule::new()), invoker)
    }

    #[tokio::test(start_paused = true)]
    async fn test_generate_document() {
        let mut agent = product_agent(Arc::new(FailFirst::new(0)));
        let result = agent.generate("CRM for dentists").await;

        let doc = result.document().expect("document");
        assert_eq!(doc.vertical, "saas");
        assert!(doc.processing_time_seconds.is_some());
        assert_eq!(agent.state(), AgentState::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_outer_retry_resets_and_waits() {
        // 第一轮研究中关键任务耗尽 3 次重试，第二轮成功
        let invoker = Arc::new(FailFirst::new(3));
        let mut agent = product_agent(invoker.clone());

        let start = tokio::time::Instant::now();
        let result = agent.generate("CRM for dentists").await;

        assert!(result.is_document(), "{result:?}");
        assert_eq!(invoker.calls.load(Ordering::SeqCst), 5);
        // 内层 2 + 4 + 8，外层 2
        assert_eq!(start.elapsed(), std::time::Duration::from_secs(16));

        // 第一轮的任务状态保留在审计记录里，计划本身只反映最后一轮
        let errors = agent.partial_results().validation_errors;
        assert!(errors.iter().any(|e| e
            == "Research attempt 1 task statuses: market_analysis_saas=Failed, competitor_landscape_saas=Pending"));
        assert!(errors.iter().all(|e| !e.starts_with("Research attempt 2")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_plan_rejected_is_not_retried() {
        let invoker = Arc::new(FailFirst::new(0));
        let mut agent = product_agent(invoker.clone()).with_approver(Arc::new(Reject));

        let report = agent.generate("CRM for dentists").await;
        let report = report.failure().expect("failure report");
        assert_eq!(report.error_kind, "plan_rejected");
        assert_eq!(report.failed_step, "approval");
        assert_eq!(report.completed_steps, vec!["plan".to_string()]);
        assert_eq!(invoker.calls.load(Ordering::SeqCst), 0);
        assert_eq!(agent.state(), AgentState::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_approval_skipped_when_disabled() {
        let mut cfg = config();
        cfg.pipeline.enable_human_validation = false;
        let mut agent = ProductAgent::new(
            &cfg,
            Arc::new(SaasModule::new()),
            Arc::new(FailFirst::new(0)),
        )
        .with_approver(Arc::new(Reject));

        assert!(agent.generate("CRM for dentists").await.is_document());
    }

    #[tokio::test(start_paused = true)]
    async fn test_agent_is_reusable() {
        let mut agent = product_agent(Arc::new(FailFirst::new(0)));
        assert!(agent.generate("first").await.is_document());
        let second = agent.generate("second").await;
        assert_eq!(second.document().unwrap().original_prompt, "second");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_yields_report() {
        let token = CancellationToken::new();
        token.cancel();
        let mut agent = product_agent(Arc::new(FailFirst::new(0))).with_cancel_token(token);

        let result = agent.generate("CRM for dentists").await;
        let report = result.failure().unwrap();
        assert_eq!(report.error_kind, "cancelled");
        assert_eq!(report.failed_step, "research");
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulated_components_recover_from_transient_failures() {
        let mut cfg = config();
        cfg.agent.backoff_unit_ms = 10;
        let mut agent = create_product_agent(&cfg, Arc::new(SaasModule::new()), 1);

        let result = agent.generate("CRM for dentists").await;
        assert!(result.is_document(), "{result:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_apply_to_every_generation() {
        let mut agent = create_product_agent(&config(), Arc::new(SaasModule::new()), 1);

        // 两个任务各自的首次工具调用失败，各等待 2 个退避单位
        for prompt in ["CRM for dentists", "CRM for vets"] {
            let start = tokio::time::Instant::now();
            let result = agent.generate(prompt).await;
            assert!(result.is_document(), "{result:?}");
            assert_eq!(start.elapsed(), std::time::Duration::from_secs(4));
        }
    }
}
