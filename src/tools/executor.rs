//! 工具执行器
//!
//! 持有 ToolRegistry 与全局超时，execute(tool_name, args) 在超时内调用 registry.execute，
//! 每次调用输出结构化审计日志（JSON）。同时作为编排器的 TaskInvoker：
//! 依次调用任务的全部 required_tools，任一失败即整个任务本次尝试失败。

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map, Value};
use tokio::time::timeout;

use crate::core::TaskInvoker;
use crate::research::ResearchTask;
use crate::tools::ToolRegistry;

/// 工具执行器：对每次调用施加超时
pub struct ToolExecutor {
    registry: ToolRegistry,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    /// 执行指定工具；超时或工具返回 Err 都转为错误字符串；输出 JSON 审计日志
    pub async fn execute(&self, tool_name: &str, args: Value) -> Result<Value, String> {
        let start = Instant::now();
        let args_preview = args_preview(&args);
        let result = timeout(self.timeout, self.registry.execute(tool_name, args)).await;

        let (ok, outcome): (bool, &str) = match &result {
            Ok(Ok(_)) => (true, "ok"),
            Ok(Err(_)) => (false, "error"),
            Err(_) => (false, "timeout"),
        };
        let duration_ms = start.elapsed().as_millis() as u64;
        let audit = json!({
            "event": "tool_audit",
            "tool": tool_name,
            "ok": ok,
            "outcome": outcome,
            "duration_ms": duration_ms,
            "args_preview": args_preview,
        });
        tracing::info!(audit = %audit.to_string(), "tool");

        match result {
            Ok(r) => r,
            Err(_) => Err(format!(
                "Tool {tool_name} timed out after {}s",
                self.timeout.as_secs_f64()
            )),
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.registry.tool_names()
    }
}

#[async_trait]
impl TaskInvoker for ToolExecutor {
    async fn invoke(&self, task: &ResearchTask) -> Result<Value, String> {
        if task.required_tools.is_empty() {
            return Err(format!("Task {} has no tools to run", task.id));
        }

        let args = json!({
            "task_id": task.id,
            "question": task.question,
            "context": task.context,
        });
        let mut data = Map::new();
        for tool in &task.required_tools {
            let output = self.execute(tool, args.clone()).await?;
            data.insert(tool.clone(), output);
        }

        Ok(json!({
            "data": data,
            "sources": task.required_tools,
            "timestamp": Utc::now().to_rfc3339(),
        }))
    }
}

fn args_preview(args: &Value) -> String {
    let s = args.to_string();
    if s.len() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}
