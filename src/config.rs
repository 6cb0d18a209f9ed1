//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `MRD__*` 覆盖（双下划线表示嵌套，如 `MRD__AGENT__MAX_RETRIES=5`）。
//! 构造后不可变，按段传给 MrdAgent / ProductAgent。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::core::RetryPolicy;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub agent: AgentSection,
    pub pipeline: PipelineSection,
}

/// [agent] 段：研究编排（重试、超时、熔断、数据充分性）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    /// 单任务最大尝试次数
    pub max_retries: u32,
    /// 单次工具调用超时（秒）
    pub timeout_seconds: u64,
    /// 高影响力结论是否要求多个独立来源（数据质量层告警）
    pub require_multiple_sources: bool,
    pub circuit_breaker_enabled: bool,
    /// 退避单位（毫秒），第 n 次失败等待 2^(n+1) 个单位
    pub backoff_unit_ms: u64,
    /// 连续失败超过该值即熔断
    pub failure_threshold: u32,
    /// 熔断冷却（秒）
    pub cooldown_secs: u64,
    /// 完成任务占计划任务总数的最低比例
    pub min_completion_ratio: f64,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            max_retries: 3,
            timeout_seconds: 30,
            require_multiple_sources: true,
            circuit_breaker_enabled: true,
            backoff_unit_ms: 1000,
            failure_threshold: 3,
            cooldown_secs: 60,
            min_completion_ratio: 0.7,
        }
    }
}

impl AgentSection {
    pub fn backoff_unit(&self) -> Duration {
        Duration::from_millis(self.backoff_unit_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.backoff_unit())
    }
}

/// [pipeline] 段：人工审批、外层研究重试、垂直领域、置信度阈值
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    pub enable_human_validation: bool,
    /// 整个研究阶段的最大尝试次数
    pub research_attempts: u32,
    /// gambling / saas
    pub vertical: String,
    /// 低于该置信度时记录告警
    pub min_confidence: f64,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            enable_human_validation: true,
            research_attempts: 3,
            vertical: "gambling".to_string(),
            min_confidence: 0.6,
        }
    }
}

/// 从 config 目录加载配置，环境变量 MRD__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 MRD__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    for name in ["config/default", "../config/default"] {
        if std::path::Path::new(&format!("{name}.toml")).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("MRD")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.agent.max_retries, 3);
        assert_eq!(cfg.agent.timeout_seconds, 30);
        assert!(cfg.agent.require_multiple_sources);
        assert!(cfg.agent.circuit_breaker_enabled);
        assert_eq!(cfg.agent.cooldown(), Duration::from_secs(60));
        assert_eq!(cfg.agent.retry_policy().delay_for(0), Duration::from_secs(2));
        assert_eq!(cfg.pipeline.research_attempts, 3);
        assert_eq!(cfg.pipeline.vertical, "gambling");
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[agent]\nmax_retries = 5\ncircuit_breaker_enabled = false\n\n[pipeline]\nvertical = \"saas\""
        )
        .unwrap();

        let cfg = load_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.agent.max_retries, 5);
        assert!(!cfg.agent.circuit_breaker_enabled);
        // 未写的键保留默认值
        assert_eq!(cfg.agent.failure_threshold, 3);
        assert_eq!(cfg.pipeline.vertical, "saas");
        assert!(cfg.pipeline.enable_human_validation);
    }

    #[test]
    fn test_missing_file_is_ignored() {
        let cfg = load_config(Some(PathBuf::from("does/not/exist.toml"))).unwrap();
        assert_eq!(cfg.agent.min_completion_ratio, 0.7);
    }
}
