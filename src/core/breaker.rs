//! 熔断器
//!
//! 连续任务失败超过阈值（默认 3，即第 4 次）后打开，本批次剩余任务直接以 CircuitOpen 失败；
//! 打开时安排一次冷却后的自动复位（后台 tokio 任务），复位任务由熔断器持有句柄，
//! 提前成功、重新安排或熔断器被丢弃时都会 abort。
//!
//! 计数器只在失败时递增，成功或冷却复位时归零；批次结束不会清零。

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;

/// 熔断器开闭状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BreakerState {
    #[default]
    Closed,
    Open,
}

/// 熔断器快照（写入 PartialResult 供诊断）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CircuitBreakerState {
    pub state: BreakerState,
    pub consecutive_failures: u32,
}

#[derive(Debug, Default)]
struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
    /// 每次安排复位递增；过期的复位任务不生效
    reset_epoch: u64,
    reset_task: Option<JoinHandle<()>>,
}

/// 连续失败计数 + 冷却自动复位
///
/// 需要在 tokio 运行时内使用（打开时会 spawn 复位任务）。
#[derive(Debug)]
pub struct CircuitBreaker {
    inner: Arc<Mutex<Inner>>,
    threshold: u32,
    cooldown: Duration,
    enabled: bool,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            threshold,
            cooldown,
            enabled: true,
        }
    }

    /// 关闭时仍计数，但永不打开
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_open(&self) -> bool {
        self.lock().state == BreakerState::Open
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    pub fn snapshot(&self) -> CircuitBreakerState {
        let inner = self.lock();
        CircuitBreakerState {
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
        }
    }

    /// 任务成功：计数归零、闭合，并取消尚未触发的复位
    pub fn record_success(&self) {
        let mut inner = self.lock();
        inner.consecutive_failures = 0;
        inner.state = BreakerState::Closed;
        // 已醒来、正在等锁的复位任务 abort 不掉，靠 epoch 让它作废
        inner.reset_epoch = inner.reset_epoch.wrapping_add(1);
        if let Some(handle) = inner.reset_task.take() {
            handle.abort();
            tracing::debug!("Pending circuit breaker reset cancelled by success");
        }
    }

    /// 记录一次失败；返回本次是否刚刚打开熔断器
    pub fn record_failure(&self) -> bool {
        let mut inner = self.lock();
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
        if !self.enabled
            || inner.state == BreakerState::Open
            || inner.consecutive_failures <= self.threshold
        {
            return false;
        }
        inner.state = BreakerState::Open;
        tracing::warn!(
            failures = inner.consecutive_failures,
            cooldown_secs = self.cooldown.as_secs_f64(),
            "Circuit breaker opened"
        );
        self.schedule_reset_locked(&mut inner, self.cooldown);
        true
    }

    /// 在 after 之后复位为 closed / 0，不阻塞调用方
    pub fn schedule_reset(&self, after: Duration) {
        let mut inner = self.lock();
        self.schedule_reset_locked(&mut inner, after);
    }

    fn schedule_reset_locked(&self, inner: &mut Inner, after: Duration) {
        inner.reset_epoch = inner.reset_epoch.wrapping_add(1);
        let epoch = inner.reset_epoch;
        let shared = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let mut inner = shared.lock().unwrap_or_else(PoisonError::into_inner);
            if inner.reset_epoch != epoch {
                return;
            }
            inner.state = BreakerState::Closed;
            inner.consecutive_failures = 0;
            inner.reset_task = None;
            tracing::info!("Circuit breaker reset after cooldown");
        });
        if let Some(previous) = inner.reset_task.replace(handle) {
            previous.abort();
        }
    }
}

impl Drop for CircuitBreaker {
    fn drop(&mut self) {
        if let Some(handle) = self.lock().reset_task.take() {
            handle.abort();
        }
    }
}
