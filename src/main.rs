//! mrd - 市场需求文档生成命令行
//!
//! 入口：初始化日志、加载配置、组装 ProductAgent（模拟工具），生成 MRD 或失败报告并写入 JSON 文件。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use mrd_agent::config::{load_config, AppConfig};
use mrd_agent::core::cancel_on_ctrl_c;
use mrd_agent::modules::{self, ResearchModule};
use mrd_agent::{create_product_agent, Generated, MrdDocument};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Vertical {
    Gambling,
    Saas,
}

impl Vertical {
    fn as_str(self) -> &'static str {
        match self {
            Self::Gambling => "gambling",
            Self::Saas => "saas",
        }
    }
}

/// Generate a market requirements document from a product idea
#[derive(Parser, Debug)]
#[command(name = "mrd", version, about)]
struct Cli {
    /// Product idea, e.g. "Build a skill-based gambling app for Europe"
    #[arg(required_unless_present = "schema")]
    prompt: Option<String>,

    /// Output file for the document or failure report
    #[arg(short, long, value_name = "FILE", default_value = "mrd_output.json")]
    output: PathBuf,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Research vertical (defaults to [pipeline].vertical)
    #[arg(long, value_enum)]
    vertical: Option<Vertical>,

    /// Failing tool calls injected per task into the simulated tools
    #[arg(long, value_name = "N", default_value_t = 1)]
    transient_failures: u32,

    /// Print the JSON schema of the MRD document and exit
    #[arg(long)]
    schema: bool,
}

/// 命令行优先，否则使用 [pipeline].vertical
fn resolve_module(
    vertical: Option<Vertical>,
    cfg: &AppConfig,
) -> anyhow::Result<Arc<dyn ResearchModule>> {
    let name = vertical.map_or(cfg.pipeline.vertical.as_str(), |v| v.as_str());
    modules::by_name(name).with_context(|| format!("Unknown vertical: {name}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    mrd_agent::observability::init();
    let cli = Cli::parse();

    if cli.schema {
        let schema = schemars::schema_for!(MrdDocument);
        println!(
            "{}",
            serde_json::to_string_pretty(&schema).context("Failed to render schema")?
        );
        return Ok(());
    }

    let cfg = load_config(cli.config.clone()).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    let module = resolve_module(cli.vertical, &cfg)?;

    let token = CancellationToken::new();
    cancel_on_ctrl_c(token.clone());

    let mut agent = create_product_agent(&cfg, module, cli.transient_failures)
        .with_cancel_token(token);
    let prompt = cli.prompt.unwrap_or_default();
    let result = agent.generate(&prompt).await;

    let json = serde_json::to_string_pretty(&result).context("Failed to serialize result")?;
    std::fs::write(&cli.output, json)
        .with_context(|| format!("Failed to write {}", cli.output.display()))?;

    match &result {
        Generated::Document(doc) => println!(
            "MRD {} generated (confidence {:.2}, {} competitors) -> {}",
            doc.id,
            doc.confidence_score,
            doc.competitor_analysis.len(),
            cli.output.display()
        ),
        Generated::Failed(report) => println!(
            "MRD generation failed at {} ({}): {} -> {}",
            report.failed_step,
            report.error_kind,
            report.recovery_suggestion,
            cli.output.display()
        ),
    }

    Ok(())
}
