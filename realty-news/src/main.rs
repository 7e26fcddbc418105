use anyhow::Context;
use chrono::Utc;
use clap::{Parser, ValueEnum};
use realty_news::{compose_digest, Config, NewsAggregator, SourceRegistry};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Html,
}

/// Collect real-estate news from RSS feeds and the list API.
#[derive(Debug, Parser)]
#[command(name = "realty-news", version)]
struct Cli {
    /// Category to aggregate (repeatable); all categories when omitted
    #[arg(short, long = "category")]
    categories: Vec<String>,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,

    /// Write to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        // a missing .env is normal
        if !e.not_found() {
            eprintln!("Failed to load .env: {}", e);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    info!("Starting realty-news aggregation");

    let config = Config::from_env();
    let registry = Arc::new(SourceRegistry::from_config(&config).context("building source registry")?);
    let aggregator = NewsAggregator::new(registry.clone());

    let items = if cli.categories.is_empty() {
        aggregator.aggregate_all().await
    } else {
        for key in &cli.categories {
            if registry.get(key).is_none() {
                warn!("Category {} is not registered", key);
            }
        }
        let keys: Vec<&str> = cli.categories.iter().map(String::as_str).collect();
        aggregator.aggregate_categories(&keys).await
    };

    let total: usize = items.values().map(Vec::len).sum();
    info!("Aggregated {} items across {} categories", total, items.len());

    let rendered = match cli.format {
        OutputFormat::Json => serde_json::to_string_pretty(&items).context("serializing items")?,
        OutputFormat::Html => compose_digest(&registry, &items, Utc::now()),
    };

    match cli.output {
        Some(path) => {
            std::fs::write(&path, rendered).with_context(|| format!("writing {}", path.display()))?;
            info!("Wrote output to {}", path.display());
        }
        None => println!("{}", rendered),
    }

    Ok(())
}
