//! MRD 文档：结构定义、三层校验、失败报告

pub mod model;
pub mod report;
pub mod validator;

pub use model::{
    Claim, CompetitorAnalysis, DataSource, DevelopmentEffort, FeaturePriority,
    FeatureRecommendation, MarketMetric, MrdDocument, SwotAnalysis, SwotCategory, ThreatLevel,
};
pub use report::{FailureReport, Generated, PartialResult};
pub use validator::{DocumentValidator, MrdValidator, Validated};
