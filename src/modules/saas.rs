//! SaaS 垂直模块（轻量）：市场规模 + 竞品格局两个任务

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::document::{
    Claim, CompetitorAnalysis, DataSource, DevelopmentEffort, FeaturePriority,
    FeatureRecommendation, MarketMetric, MrdDocument, SwotAnalysis, ThreatLevel,
};
use crate::modules::gambling::summarize_sources;
use crate::modules::ResearchModule;
use crate::research::{ResearchData, ResearchPlan, ResearchTask, TaskPriority};

const VERTICAL: &str = "saas";
const MARKET_TASK: &str = "market_analysis_saas";
const COMPETITOR_TASK: &str = "competitor_landscape_saas";

#[derive(Debug, Default)]
pub struct SaasModule;

impl SaasModule {
    pub fn new() -> Self {
        Self
    }
}

fn competitor(name: &str, strength: &str, threat_level: ThreatLevel) -> CompetitorAnalysis {
    CompetitorAnalysis {
        name: name.to_string(),
        market_share: None,
        strengths: vec![Claim::new(
            strength,
            "competitor",
            DataSource::new("review_sites", "G2 Reviews", 0.75),
        )],
        weaknesses: Vec::new(),
        key_differentiators: Vec::new(),
        threat_level,
    }
}

#[async_trait]
impl ResearchModule for SaasModule {
    fn vertical(&self) -> &str {
        VERTICAL
    }

    async fn create_plan(&self, prompt: &str) -> Result<ResearchPlan, String> {
        Ok(ResearchPlan::new(prompt, VERTICAL, "global")
            .with_task(
                ResearchTask::new(MARKET_TASK, "SaaS TAM assessment")
                    .with_priority(TaskPriority::Critical)
                    .with_tools(["search_web", "analyze_trends"]),
            )
            .with_task(
                ResearchTask::new(COMPETITOR_TASK, "Who are the leading vendors and how do they price?")
                    .with_priority(TaskPriority::High)
                    .with_tools(["search_web", "search_competitor_features"]),
            ))
    }

    async fn synthesize(&self, plan: &ResearchPlan, data: &ResearchData) -> Result<Value, String> {
        let mut all_claims = vec![Claim::new(
            "Mid-market buyers consolidate tools around platforms with open APIs",
            "market",
            DataSource::new("market_research", "Gartner 2024", 0.8),
        )];
        if data.contains_key(COMPETITOR_TASK) {
            all_claims.push(Claim::new(
                "Per-seat pricing dominates the category",
                "competitor",
                DataSource::new("pricing_pages", "Vendor Pricing Pages", 0.85),
            ));
        }

        let document = MrdDocument {
            id: format!("MRD_{}", chrono::Utc::now().format("%Y%m%d_%H%M%S")),
            generated_at: chrono::Utc::now(),
            original_prompt: plan.original_prompt.clone(),
            vertical: VERTICAL.to_string(),
            executive_summary: "Buyers favour integrated platforms; differentiation comes from \
                                workflow automation rather than price."
                .to_string(),
            market_analysis: vec![MarketMetric {
                metric_name: "Total Addressable Market".to_string(),
                value: json!("$195B"),
                unit: "USD".to_string(),
                period: "2024".to_string(),
                trend: Some("up".to_string()),
                source: DataSource::new("market_research", "Gartner 2024", 0.8),
            }],
            competitor_analysis: vec![
                competitor("Notion", "Broad adoption in small teams", ThreatLevel::High),
                competitor("Airtable", "Strong no-code database features", ThreatLevel::Medium),
            ],
            swot_analysis: SwotAnalysis::default(),
            feature_recommendations: vec![FeatureRecommendation {
                name: "Workflow Automation".to_string(),
                description: "Trigger-based automations across connected apps".to_string(),
                priority: Some(FeaturePriority::P1),
                estimated_impact: 0.6,
                development_effort: DevelopmentEffort::L,
                market_gap_source: None,
                competitor_reference: Some(vec!["Airtable".into()]),
            }],
            regulatory_analysis: Vec::new(),
            target_audience: Vec::new(),
            data_sources_summary: summarize_sources(&all_claims),
            all_claims,
            confidence_score: 0.8,
            processing_time_seconds: None,
            agent_version: env!("CARGO_PKG_VERSION").to_string(),
        };
        serde_json::to_value(document).map_err(|e| e.to_string())
    }

    fn required_tools(&self) -> Vec<(&'static str, &'static str)> {
        vec![
            ("search_web", "General web search"),
            ("analyze_trends", "Search and adoption trends"),
            ("search_competitor_features", "Competitor feature catalogues"),
        ]
    }
}
