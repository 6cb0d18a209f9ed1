//! 三层 MRD 校验
//!
//! 1. 结构校验：反序列化为 MrdDocument 并检查字段约束（置信度范围、来源存在等）
//! 2. 业务规则：竞品数量、受监管行业的合规分析、功能优先级，所有违例一并报告
//! 3. 数据质量：低置信度、高影响力功能来源不足，只产生告警，不致命

use serde_json::Value;

use crate::config::{AgentSection, PipelineSection};
use crate::core::{OrchestrationError, ValidationLayer};
use crate::document::{DataSource, MrdDocument};

/// 数据来源置信度低于该值需要人工复核，结构层直接拒绝
const MIN_SOURCE_CONFIDENCE: f64 = 0.5;
/// 至少分析的竞品数
const MIN_COMPETITORS: usize = 2;
/// 高于该预估影响力的功能需要多个独立来源
const HIGH_IMPACT_THRESHOLD: f64 = 0.8;
/// 垂直领域名包含以下任一词即视为受监管行业
const REGULATED_VERTICALS: &[&str] = &["gambling", "real_money"];

/// 校验通过的文档及非致命告警
#[derive(Debug, Clone)]
pub struct Validated {
    pub document: MrdDocument,
    pub warnings: Vec<String>,
}

/// 校验协作者：失败时返回 ValidationFailed（含层与规则）
pub trait DocumentValidator: Send + Sync {
    fn validate(&self, draft: Value) -> Result<Validated, OrchestrationError>;
}

/// 默认 MRD 校验器
#[derive(Debug, Clone)]
pub struct MrdValidator {
    min_confidence: f64,
    require_multiple_sources: bool,
}

impl Default for MrdValidator {
    fn default() -> Self {
        Self {
            min_confidence: 0.6,
            require_multiple_sources: true,
        }
    }
}

fn failed(layer: ValidationLayer, rule: impl Into<String>) -> OrchestrationError {
    OrchestrationError::ValidationFailed {
        layer,
        rule: rule.into(),
    }
}

fn in_unit_range(v: f64) -> bool {
    (0.0..=1.0).contains(&v)
}

impl MrdValidator {
    pub fn new(min_confidence: f64, require_multiple_sources: bool) -> Self {
        Self {
            min_confidence,
            require_multiple_sources,
        }
    }

    pub fn from_config(agent: &AgentSection, pipeline: &PipelineSection) -> Self {
        Self::new(pipeline.min_confidence, agent.require_multiple_sources)
    }

    /// 第一层：结构与字段约束；通过后按结论来源重算置信度
    fn check_schema(&self, draft: Value) -> Result<MrdDocument, OrchestrationError> {
        let mut doc: MrdDocument = serde_json::from_value(draft)
            .map_err(|e| failed(ValidationLayer::Schema, e.to_string()))?;

        if !in_unit_range(doc.confidence_score) {
            return Err(failed(
                ValidationLayer::Schema,
                format!("confidence_score {} out of range [0, 1]", doc.confidence_score),
            ));
        }
        if let Some(claim) = doc.claims().find(|c| c.data_sources.is_empty()) {
            return Err(failed(
                ValidationLayer::Schema,
                format!("Claim '{}' must have at least one data source", claim.statement),
            ));
        }
        if let Some(source) = doc.data_sources().find(|s| !in_unit_range(s.confidence_score)) {
            return Err(failed(
                ValidationLayer::Schema,
                format!(
                    "Source '{}' confidence {} out of range [0, 1]",
                    source.source_name, source.confidence_score
                ),
            ));
        }
        if let Some(source) = doc
            .data_sources()
            .find(|s| s.confidence_score < MIN_SOURCE_CONFIDENCE)
        {
            return Err(failed(
                ValidationLayer::Schema,
                format!(
                    "Low confidence data requires human review: '{}' ({})",
                    source.source_name, source.confidence_score
                ),
            ));
        }
        if let Some(feature) = doc
            .feature_recommendations
            .iter()
            .find(|f| !in_unit_range(f.estimated_impact))
        {
            return Err(failed(
                ValidationLayer::Schema,
                format!(
                    "Feature {} estimated_impact {} out of range [0, 1]",
                    feature.name, feature.estimated_impact
                ),
            ));
        }

        if let Some(mean) = doc.mean_claim_confidence() {
            doc.confidence_score = mean;
        }
        Ok(doc)
    }

    /// 第二层：业务规则
    fn check_business_rules(&self, doc: &MrdDocument) -> Result<(), OrchestrationError> {
        let mut broken = Vec::new();

        if doc.competitor_analysis.len() < MIN_COMPETITORS {
            broken.push(format!(
                "Insufficient competitor analysis ({} < {MIN_COMPETITORS})",
                doc.competitor_analysis.len()
            ));
        }

        let vertical = doc.vertical.to_lowercase();
        if REGULATED_VERTICALS.iter().any(|v| vertical.contains(v))
            && doc.regulatory_analysis.is_empty()
        {
            broken.push(format!(
                "Missing regulatory analysis for {} vertical",
                doc.vertical
            ));
        }

        for feature in doc
            .feature_recommendations
            .iter()
            .filter(|f| f.priority.is_none())
        {
            broken.push(format!("Feature {} missing priority", feature.name));
        }

        if broken.is_empty() {
            Ok(())
        } else {
            Err(failed(ValidationLayer::BusinessRules, broken.join("; ")))
        }
    }

    /// 第三层：数据质量告警
    fn check_data_quality(&self, doc: &MrdDocument) -> Vec<String> {
        let mut warnings = Vec::new();
        if doc.confidence_score < self.min_confidence {
            warnings.push(format!("Low confidence score: {:.2}", doc.confidence_score));
        }
        if self.require_multiple_sources {
            for feature in doc
                .feature_recommendations
                .iter()
                .filter(|f| f.estimated_impact > HIGH_IMPACT_THRESHOLD)
            {
                let sources = feature
                    .market_gap_source
                    .as_ref()
                    .map_or(0, |c| distinct_sources(&c.data_sources));
                if sources < 2 {
                    warnings.push(format!(
                        "High-impact feature {} backed by {sources} independent source(s)",
                        feature.name
                    ));
                }
            }
        }
        warnings
    }
}

fn distinct_sources(sources: &[DataSource]) -> usize {
    let mut names: Vec<&str> = sources.iter().map(|s| s.source_name.as_str()).collect();
    names.sort_unstable();
    names.dedup();
    names.len()
}

impl DocumentValidator for MrdValidator {
    fn validate(&self, draft: Value) -> Result<Validated, OrchestrationError> {
        let document = self.check_schema(draft)?;
        self.check_business_rules(&document)?;
        let warnings = self.check_data_quality(&document);
        for w in &warnings {
            tracing::warn!(warning = %w, "MRD data quality");
        }
        Ok(Validated { document, warnings })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn source(confidence: f64) -> Value {
        json!({
            "source_type": "market_research",
            "source_name": "Statista 2024",
            "confidence_score": confidence
        })
    }

    fn competitor(name: &str) -> Value {
        json!({
            "name": name,
            "strengths": [{"statement": "Strong brand", "data_sources": [source(0.9)], "category": "competitor"}],
            "weaknesses": [],
            "key_differentiators": ["Tournaments"],
            "threat_level": "medium"
        })
    }

    fn draft() -> Value {
        json!({
            "original_prompt": "Build skill-based gambling app for Europe",
            "vertical": "real_money_gaming",
            "executive_summary": "summary",
            "market_analysis": [],
            "competitor_analysis": [competitor("Skillz"), competitor("Triumph")],
            "swot_analysis": {
                "strengths": {"items": []},
                "weaknesses": {"items": []},
                "opportunities": {"items": []},
                "threats": {"items": []}
            },
            "feature_recommendations": [{
                "name": "TikTok Live Integration",
                "description": "Stream gameplay",
                "priority": "P0",
                "estimated_impact": 0.5,
                "development_effort": "m"
            }],
            "regulatory_analysis": [{"statement": "Licensed in Malta", "data_sources": [source(0.8)], "category": "regulation"}],
            "target_audience": [],
            "all_claims": [],
            "data_sources_summary": {"market_research": 1},
            "confidence_score": 0.8
        })
    }

    fn layer_of(err: OrchestrationError) -> (ValidationLayer, String) {
        match err {
            OrchestrationError::ValidationFailed { layer, rule } => (layer, rule),
            other => panic!("Expected ValidationFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_draft_passes() {
        let validated = MrdValidator::default().validate(draft()).unwrap();
        assert_eq!(validated.document.competitor_analysis.len(), 2);
        assert!(validated.warnings.is_empty());
    }

    #[test]
    fn test_schema_rejects_missing_field() {
        let mut d = draft();
        d.as_object_mut().unwrap().remove("executive_summary");
        let (layer, rule) = layer_of(MrdValidator::default().validate(d).unwrap_err());
        assert_eq!(layer, ValidationLayer::Schema);
        assert!(rule.contains("executive_summary"));
    }

    #[test]
    fn test_schema_rejects_bad_threat_level() {
        let mut d = draft();
        d["competitor_analysis"][0]["threat_level"] = json!("extreme");
        let (layer, _) = layer_of(MrdValidator::default().validate(d).unwrap_err());
        assert_eq!(layer, ValidationLayer::Schema);
    }

    #[test]
    fn test_schema_rejects_low_confidence_source() {
        let mut d = draft();
        d["regulatory_analysis"][0]["data_sources"][0]["confidence_score"] = json!(0.3);
        let (layer, rule) = layer_of(MrdValidator::default().validate(d).unwrap_err());
        assert_eq!(layer, ValidationLayer::Schema);
        assert!(rule.contains("human review"));
    }

    #[test]
    fn test_schema_rejects_claim_without_source() {
        let mut d = draft();
        d["target_audience"] = json!([{"statement": "Young men", "data_sources": [], "category": "audience"}]);
        let (layer, rule) = layer_of(MrdValidator::default().validate(d).unwrap_err());
        assert_eq!(layer, ValidationLayer::Schema);
        assert!(rule.contains("Young men"));
    }

    #[test]
    fn test_business_rules_collects_all_violations() {
        let mut d = draft();
        d["competitor_analysis"] = json!([competitor("Skillz")]);
        d["regulatory_analysis"] = json!([]);
        d["feature_recommendations"][0]
            .as_object_mut()
            .unwrap()
            .remove("priority");

        let (layer, rule) = layer_of(MrdValidator::default().validate(d).unwrap_err());
        assert_eq!(layer, ValidationLayer::BusinessRules);
        assert!(rule.contains("Insufficient competitor analysis"));
        assert!(rule.contains("Missing regulatory analysis"));
        assert!(rule.contains("TikTok Live Integration missing priority"));
    }

    #[test]
    fn test_unregulated_vertical_needs_no_regulatory_analysis() {
        let mut d = draft();
        d["vertical"] = json!("saas");
        d["regulatory_analysis"] = json!([]);
        assert!(MrdValidator::default().validate(d).is_ok());
    }

    #[test]
    fn test_confidence_recomputed_and_flagged() {
        let mut d = draft();
        d["all_claims"] = json!([
            {"statement": "a", "data_sources": [source(0.5)], "category": "market"},
            {"statement": "b", "data_sources": [source(0.6)], "category": "market"}
        ]);
        let validated = MrdValidator::default().validate(d).unwrap();
        assert!((validated.document.confidence_score - 0.55).abs() < 1e-9);
        assert!(validated.warnings.iter().any(|w| w.contains("Low confidence")));
    }

    #[test]
    fn test_high_impact_feature_needs_multiple_sources() {
        let mut d = draft();
        d["feature_recommendations"][0]["estimated_impact"] = json!(0.85);
        let validated = MrdValidator::default().validate(d.clone()).unwrap();
        assert_eq!(validated.warnings.len(), 1);
        assert!(validated.warnings[0].contains("TikTok Live Integration"));

        let relaxed = MrdValidator::new(0.6, false).validate(d).unwrap();
        assert!(relaxed.warnings.is_empty());
    }
}
