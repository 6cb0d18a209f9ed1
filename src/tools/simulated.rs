//! 模拟研究工具
//!
//! 没有接入真实数据源时使用：SimulatedTool 回答任意问题；CompetitorLookupTool 返回固定的竞品下载与收入数据。
//! 多个模拟工具可共享一个 TransientFaults，使每个任务的前 N 次工具调用返回
//! "temporarily unavailable"，用于演练重试。

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::tools::Tool;

/// 模拟结果的来源置信度
const SIMULATED_CONFIDENCE: f64 = 0.8;

/// 按任务计数的瞬时故障注入
#[derive(Debug, Default)]
pub struct TransientFaults {
    failures_per_task: u32,
    /// task_id -> 已调用次数
    calls: Mutex<HashMap<String, u32>>,
}

impl TransientFaults {
    pub fn new(failures_per_task: u32) -> Self {
        Self {
            failures_per_task,
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// 记一次调用；该任务仍处于故障期时返回 true
    pub fn should_fail(&self, task_id: &str) -> bool {
        let mut calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);
        let count = calls.entry(task_id.to_string()).or_insert(0);
        *count += 1;
        *count <= self.failures_per_task
    }

    /// 清空调用计数；每次生成开始时调用，使故障期重新生效
    pub fn reset(&self) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// 通用模拟工具
pub struct SimulatedTool {
    name: String,
    description: String,
    faults: Option<Arc<TransientFaults>>,
}

impl SimulatedTool {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            faults: None,
        }
    }

    pub fn with_faults(mut self, faults: Arc<TransientFaults>) -> Self {
        self.faults = Some(faults);
        self
    }
}

#[async_trait]
impl Tool for SimulatedTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn execute(&self, args: Value) -> Result<Value, String> {
        let task_id = args["task_id"].as_str().unwrap_or("adhoc");
        let question = args["question"].as_str().unwrap_or_default();

        if self.faults.as_ref().is_some_and(|f| f.should_fail(task_id)) {
            return Err(format!("Tool {} temporarily unavailable", self.name));
        }

        Ok(json!({
            "answer": format!("Result for {question}"),
            "source_name": self.name,
            "confidence": SIMULATED_CONFIDENCE,
        }))
    }
}

/// 竞品应用商店数据（下载量、收入），对应 search_sensor_tower
pub struct CompetitorLookupTool {
    competitors: Vec<(&'static str, u64, u64)>,
}

impl Default for CompetitorLookupTool {
    fn default() -> Self {
        Self {
            competitors: vec![
                ("Skillz", 4_200_000, 151_000_000),
                ("Triumph", 1_800_000, 38_000_000),
                ("Papaya Gaming", 2_600_000, 92_000_000),
            ],
        }
    }
}

impl CompetitorLookupTool {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Tool for CompetitorLookupTool {
    fn name(&self) -> &str {
        "search_sensor_tower"
    }

    fn description(&self) -> &str {
        "App store downloads and revenue estimates per competitor"
    }

    async fn execute(&self, _args: Value) -> Result<Value, String> {
        let competitors: Vec<Value> = self
            .competitors
            .iter()
            .map(|(name, downloads, revenue)| {
                json!({
                    "name": name,
                    "quarterly_downloads": downloads,
                    "quarterly_revenue_usd": revenue,
                })
            })
            .collect();
        Ok(json!({
            "competitors": competitors,
            "period": "Q3 2024",
            "source_name": "Sensor Tower Q3 2024",
            "confidence": SIMULATED_CONFIDENCE,
        }))
    }
}
