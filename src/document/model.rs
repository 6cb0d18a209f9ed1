//! MRD 文档结构
//!
//! 综合器产出 JSON 草稿，校验器反序列化为 MrdDocument（第一层：结构校验）。
//! 每条结论（Claim）都必须附带至少一个数据来源，用于审计追溯。

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 数据来源：记录每条结论的出处
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DataSource {
    /// 工具或 API 类型
    pub source_type: String,
    pub source_name: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default = "default_confidence")]
    pub confidence_score: f64,
    /// 原始数据（审计用）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_data: Option<Value>,
}

fn default_confidence() -> f64 {
    1.0
}

impl DataSource {
    pub fn new(source_type: impl Into<String>, source_name: impl Into<String>, confidence: f64) -> Self {
        Self {
            source_type: source_type.into(),
            source_name: source_name.into(),
            timestamp: Utc::now(),
            confidence_score: confidence,
            raw_data: None,
        }
    }
}

/// 一条有出处的结论
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Claim {
    pub statement: String,
    pub data_sources: Vec<DataSource>,
    /// market | audience | regulation | competitor | gap
    pub category: String,
}

impl Claim {
    pub fn new(statement: impl Into<String>, category: impl Into<String>, source: DataSource) -> Self {
        Self {
            statement: statement.into(),
            data_sources: vec![source],
            category: category.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MarketMetric {
    pub metric_name: String,
    pub value: Value,
    pub unit: String,
    pub period: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trend: Option<String>,
    pub source: DataSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ThreatLevel {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CompetitorAnalysis {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_share: Option<MarketMetric>,
    pub strengths: Vec<Claim>,
    pub weaknesses: Vec<Claim>,
    pub key_differentiators: Vec<String>,
    pub threat_level: ThreatLevel,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SwotCategory {
    #[serde(default)]
    pub items: Vec<Claim>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SwotAnalysis {
    pub strengths: SwotCategory,
    pub weaknesses: SwotCategory,
    pub opportunities: SwotCategory,
    pub threats: SwotCategory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
pub enum FeaturePriority {
    P0,
    P1,
    P2,
    P3,
}

/// 开发工作量（T 恤尺码）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum DevelopmentEffort {
    Xs,
    S,
    M,
    L,
    Xl,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FeatureRecommendation {
    pub name: String,
    pub description: String,
    /// 缺失时由业务规则层报错
    #[serde(default)]
    pub priority: Option<FeaturePriority>,
    /// 0.0 ~ 1.0
    pub estimated_impact: f64,
    pub development_effort: DevelopmentEffort,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_gap_source: Option<Claim>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub competitor_reference: Option<Vec<String>>,
}

/// 完整的市场需求文档
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MrdDocument {
    #[serde(default = "default_document_id")]
    pub id: String,
    #[serde(default = "Utc::now")]
    pub generated_at: DateTime<Utc>,
    pub original_prompt: String,
    pub vertical: String,
    pub executive_summary: String,
    pub market_analysis: Vec<MarketMetric>,
    pub competitor_analysis: Vec<CompetitorAnalysis>,
    pub swot_analysis: SwotAnalysis,
    pub feature_recommendations: Vec<FeatureRecommendation>,
    pub regulatory_analysis: Vec<Claim>,
    pub target_audience: Vec<Claim>,
    /// 全部结论（审计追溯）
    pub all_claims: Vec<Claim>,
    /// 各来源类型的结论数
    pub data_sources_summary: BTreeMap<String, usize>,
    pub confidence_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time_seconds: Option<f64>,
    #[serde(default = "default_agent_version")]
    pub agent_version: String,
}

fn default_document_id() -> String {
    format!("MRD_{}", Utc::now().format("%Y%m%d_%H%M%S"))
}

fn default_agent_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

impl MrdDocument {
    /// 遍历文档中出现的所有结论（含竞品优劣势、SWOT、功能缺口来源）
    pub fn claims(&self) -> impl Iterator<Item = &Claim> {
        let competitor_claims = self
            .competitor_analysis
            .iter()
            .flat_map(|c| c.strengths.iter().chain(c.weaknesses.iter()));
        let swot = &self.swot_analysis;
        let swot_claims = swot
            .strengths
            .items
            .iter()
            .chain(swot.weaknesses.items.iter())
            .chain(swot.opportunities.items.iter())
            .chain(swot.threats.items.iter());
        let gap_claims = self
            .feature_recommendations
            .iter()
            .filter_map(|f| f.market_gap_source.as_ref());

        self.all_claims
            .iter()
            .chain(self.regulatory_analysis.iter())
            .chain(self.target_audience.iter())
            .chain(competitor_claims)
            .chain(swot_claims)
            .chain(gap_claims)
    }

    /// 所有数据来源（结论来源 + 市场指标来源）
    pub fn data_sources(&self) -> impl Iterator<Item = &DataSource> {
        self.claims()
            .flat_map(|c| c.data_sources.iter())
            .chain(self.market_analysis.iter().map(|m| &m.source))
    }

    /// 按 all_claims 的来源平均置信度计算文档置信度；无结论时返回 None
    pub fn mean_claim_confidence(&self) -> Option<f64> {
        let (sum, count) = self
            .all_claims
            .iter()
            .flat_map(|c| c.data_sources.iter())
            .fold((0.0, 0usize), |(sum, n), s| (sum + s.confidence_score, n + 1));
        (count > 0).then(|| sum / count as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_claim_confidence() {
        let mut doc: MrdDocument = serde_json::from_value(serde_json::json!({
            "original_prompt": "p",
            "vertical": "saas",
            "executive_summary": "s",
            "market_analysis": [],
            "competitor_analysis": [],
            "swot_analysis": {
                "strengths": {"items": []},
                "weaknesses": {"items": []},
                "opportunities": {"items": []},
                "threats": {"items": []}
            },
            "feature_recommendations": [],
            "regulatory_analysis": [],
            "target_audience": [],
            "all_claims": [],
            "data_sources_summary": {},
            "confidence_score": 0.9
        }))
        .unwrap();
        assert!(doc.id.starts_with("MRD_"));
        assert_eq!(doc.mean_claim_confidence(), None);

        doc.all_claims.push(Claim::new("a", "market", DataSource::new("x", "x", 0.8)));
        doc.all_claims.push(Claim::new("b", "market", DataSource::new("y", "y", 0.6)));
        let mean = doc.mean_claim_confidence().unwrap();
        assert!((mean - 0.7).abs() < 1e-9);
    }
}
