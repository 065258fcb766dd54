use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use catalog_search::config;
use catalog_search::search::{CatalogSearch, SearchRequest};

/// Search a data catalog from the command line / 命令行目录搜索
#[derive(Parser, Debug)]
#[command(name = "catalog-search", version, about = "Unified catalog search")]
struct Args {
    /// Free-text query; `*` matches everything
    query: String,
    /// global, packages, bucket or file
    #[arg(long, default_value = "global")]
    scope: String,
    /// Bucket name or URI (required for --scope bucket)
    #[arg(long, default_value = "")]
    location: String,
    /// Maximum number of results
    #[arg(long)]
    limit: Option<usize>,
    /// Only report the total number of matches
    #[arg(long)]
    count_only: bool,
    /// Include the generated query and recovery steps
    #[arg(long)]
    explain: bool,
    /// Omit per-result metadata
    #[arg(long)]
    no_metadata: bool,
    /// Include content previews for files
    #[arg(long)]
    preview: bool,
    /// JSON configuration file
    #[arg(long, default_value = "catalog-search.json")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays valid JSON / 日志输出到 stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "catalog_search=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    // Load configuration / 加载配置
    let mut app_config = config::load_config(&args.config)?;
    app_config.apply_env_overrides();

    let search = CatalogSearch::from_config(app_config)?;

    let request = SearchRequest {
        query: args.query,
        scope: args.scope,
        location: args.location,
        limit: args.limit,
        count_only: args.count_only,
        include_metadata: !args.no_metadata,
        explain: args.explain,
        include_content_preview: args.preview,
    };

    let response = search.search(request).await;
    let output = serde_json::to_string_pretty(&response).context("Failed to serialize response")?;
    println!("{}", output);

    if !response.is_success() {
        std::process::exit(1);
    }
    Ok(())
}
