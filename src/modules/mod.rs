//! 垂直领域研究模块
//!
//! 每个模块负责两件事：把用户 prompt 拆成研究计划；把研究结果综合成 MRD 草稿（JSON）。
//! 编排器不关心领域细节，换一个模块即可切换垂直领域。

pub mod gambling;
pub mod saas;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::research::{ResearchData, ResearchPlan};

pub use gambling::GamblingModule;
pub use saas::SaasModule;

/// 研究模块：计划生产者 + 综合器
#[async_trait]
pub trait ResearchModule: Send + Sync {
    /// 写入计划与文档的垂直领域名
    fn vertical(&self) -> &str;

    async fn create_plan(&self, prompt: &str) -> Result<ResearchPlan, String>;

    /// data 只包含成功任务的结果
    async fn synthesize(&self, plan: &ResearchPlan, data: &ResearchData) -> Result<Value, String>;

    /// 计划中可能用到的全部工具 (name, description)
    fn required_tools(&self) -> Vec<(&'static str, &'static str)>;
}

/// 按名称选择模块：gambling | saas
pub fn by_name(name: &str) -> Option<Arc<dyn ResearchModule>> {
    match name.to_ascii_lowercase().as_str() {
        "gambling" | "real_money_gaming" => Some(Arc::new(GamblingModule::new())),
        "saas" => Some(Arc::new(SaasModule::new())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_by_name() {
        assert_eq!(by_name("gambling").unwrap().vertical(), "real_money_gaming");
        assert_eq!(by_name("SaaS").unwrap().vertical(), "saas");
        assert!(by_name("fintech").is_none());
    }
}
