//! 任务重试执行器
//!
//! 单个任务的有界重试：第 attempt 次（从 0 开始）失败后等待 2^(attempt+1) 个退避单位
//! （默认单位 1s，即 2s / 4s / 8s），attempt >= max_attempts 时返回 RetriesExhausted。
//! 退避等待可被 CancellationToken 打断。

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::core::OrchestrationError;
use crate::research::ResearchTask;

/// 任务调用能力（工具层）：任何失败都被统一对待
#[async_trait]
pub trait TaskInvoker: Send + Sync {
    async fn invoke(&self, task: &ResearchTask) -> Result<Value, String>;
}

/// 指数退避策略（底数 2）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_unit: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_unit: Duration) -> Self {
        Self {
            max_attempts,
            backoff_unit,
        }
    }

    /// 第 attempt 次失败后的等待时长：attempt 0 -> 2 单位，1 -> 4，2 -> 8
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_add(1));
        self.backoff_unit.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

/// 可取消的退避等待；取消时返回 Cancelled
pub(crate) async fn backoff(delay: Duration, cancel: &CancellationToken) -> Result<(), OrchestrationError> {
    if cancel.is_cancelled() {
        return Err(OrchestrationError::Cancelled);
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(OrchestrationError::Cancelled),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}

/// 重试执行器：只阻塞当前任务的重试序列
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// 执行任务直到成功或用尽次数
    pub async fn run_with_retry(
        &self,
        task: &ResearchTask,
        invoker: &dyn TaskInvoker,
        cancel: &CancellationToken,
    ) -> Result<Value, OrchestrationError> {
        let mut attempt = 0;
        loop {
            if attempt >= self.policy.max_attempts {
                return Err(OrchestrationError::RetriesExhausted(task.id.clone()));
            }

            match invoker.invoke(task).await {
                Ok(result) => {
                    if attempt > 0 {
                        tracing::info!(task = %task.id, attempt, "Task succeeded after retry");
                    }
                    return Ok(result);
                }
                Err(e) => {
                    let delay = self.policy.delay_for(attempt);
                    tracing::warn!(
                        task = %task.id,
                        attempt,
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "Task attempt failed, backing off"
                    );
                    backoff(delay, cancel).await?;
                    attempt += 1;
                }
            }
        }
    }
}
