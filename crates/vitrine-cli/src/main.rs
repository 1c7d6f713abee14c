use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use vitrine_client::{CatalogSearch, HtmdCleaner, OpenAiExtractor, ReqwestFetcher};
use vitrine_core::models::ProductRecord;
use vitrine_core::throttle::PoliteFetcher;
use vitrine_core::{EnrichmentResolver, StagingService, SyncEngine};
use vitrine_db::{Database, DatabaseConfig, ExportRecordRepository};
use vitrine_shop::RestShopClient;

#[derive(Parser)]
#[command(name = "vitrine", version, about = "Product listing enrichment & marketplace sync")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve attributes, compose listings, and stage them for upload
    Stage {
        /// JSON file of consolidated product records
        #[arg(short, long)]
        input: PathBuf,

        /// Skip the external lookup and AI layers (local extraction only)
        #[arg(long, default_value_t = false)]
        no_lookup: bool,

        /// LLM model for the AI extraction layer
        #[arg(short, long, env = "VITRINE_MODEL", default_value = "gpt-4o-mini")]
        model: String,

        /// OpenAI-compatible API base URL
        #[arg(
            long,
            env = "VITRINE_LLM_BASE_URL",
            default_value = "https://api.openai.com/v1"
        )]
        llm_base_url: String,

        /// API key for the AI layer (required unless --no-lookup)
        #[arg(long, env = "VITRINE_LLM_API_KEY", default_value = "")]
        api_key: String,
    },

    /// Upload eligible export records to the commerce platform
    Sync {
        /// Platform admin API base URL
        #[arg(long, env = "SHOP_BASE_URL")]
        shop_url: String,

        /// Platform access token
        #[arg(long, env = "SHOP_ACCESS_TOKEN")]
        shop_token: String,
    },

    /// Show sync state counts, optionally exporting a CSV report
    Status {
        /// Write a per-record CSV report to this path
        #[arg(long)]
        csv: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("vitrine=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Stage {
            input,
            no_lookup,
            model,
            llm_base_url,
            api_key,
        } => {
            if !no_lookup && api_key.is_empty() {
                bail!("An API key is required for the AI layer. Set VITRINE_LLM_API_KEY or pass --no-lookup.");
            }
            let repo = connect_db().await?;
            cmd_stage(&input, no_lookup, &model, &llm_base_url, &api_key, repo).await?;
        }
        Commands::Sync {
            shop_url,
            shop_token,
        } => {
            let repo = connect_db().await?;
            cmd_sync(&shop_url, &shop_token, repo).await?;
        }
        Commands::Status { csv } => {
            let repo = connect_db().await?;
            cmd_status(csv.as_deref(), repo).await?;
        }
    }

    Ok(())
}

/// Connect to PostgreSQL using DATABASE_URL and run migrations.
async fn connect_db() -> Result<ExportRecordRepository> {
    let config = DatabaseConfig::from_env().map_err(|e| anyhow::anyhow!(e))?;
    let database = Database::connect(&config)
        .await
        .context("Failed to connect to database")?;
    database.migrate().await.map_err(|e| anyhow::anyhow!(e))?;
    Ok(database.export_repo())
}

async fn cmd_stage(
    input: &Path,
    no_lookup: bool,
    model: &str,
    llm_base_url: &str,
    api_key: &str,
    repo: ExportRecordRepository,
) -> Result<()> {
    let raw = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read product file: {}", input.display()))?;
    let products: Vec<ProductRecord> =
        serde_json::from_str(&raw).context("Invalid JSON in product file")?;

    tracing::info!("Staging {} products", products.len());

    let fetcher = PoliteFetcher::new(
        ReqwestFetcher::new().map_err(|e| anyhow::anyhow!(e))?,
        Duration::from_secs(1),
    );
    let search = CatalogSearch::new(fetcher.clone());
    let extractor =
        OpenAiExtractor::with_base_url(api_key, model, llm_base_url).map_err(|e| anyhow::anyhow!(e))?;

    let mut resolver = EnrichmentResolver::new(fetcher, HtmdCleaner::new(), search, extractor);
    if no_lookup {
        // No sites to query: the resolver degrades to Layer 1 only.
        resolver = resolver.with_sites(Vec::new());
    }
    let service = StagingService::new(resolver, repo);

    let mut staged = 0usize;
    let mut changed = 0usize;
    let mut failed = 0usize;
    for product in &products {
        match service.stage(product).await {
            Ok(result) => {
                staged += 1;
                if result.changed {
                    changed += 1;
                }
            }
            Err(e) if matches!(e, vitrine_core::AppError::DatabaseError(_)) => {
                // Persistence failure aborts the whole run.
                return Err(anyhow::anyhow!(e));
            }
            Err(e) => {
                failed += 1;
                tracing::warn!(ean = %product.ean, error = %e, "Staging failed");
            }
        }
    }

    println!("Staged {staged} of {} products ({changed} changed, {failed} failed)", products.len());
    Ok(())
}

async fn cmd_sync(shop_url: &str, shop_token: &str, repo: ExportRecordRepository) -> Result<()> {
    let client = RestShopClient::new(shop_url, shop_token).map_err(|e| anyhow::anyhow!(e))?;
    let engine = SyncEngine::new(client, repo);

    let report = engine.run().await.map_err(|e| anyhow::anyhow!(e))?;
    println!(
        "Sync finished: {} uploaded, {} failed, {} total",
        report.uploaded, report.failed, report.total
    );
    Ok(())
}

async fn cmd_status(csv_path: Option<&Path>, repo: ExportRecordRepository) -> Result<()> {
    let counts = repo.counts_by_state().await.map_err(|e| anyhow::anyhow!(e))?;

    if counts.is_empty() {
        println!("No export records staged yet.");
    } else {
        for (state, count) in &counts {
            println!("{state:>10}: {count}");
        }
    }

    if let Some(path) = csv_path {
        let records = repo.all().await.map_err(|e| anyhow::anyhow!(e))?;
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        writer.write_record(["ean", "state", "platform_id", "last_error", "updated_at"])?;
        for record in &records {
            let platform_id = record
                .platform_id
                .map(|id| id.to_string())
                .unwrap_or_default();
            let updated_at = record.updated_at.to_rfc3339();
            writer.write_record([
                record.ean.as_str(),
                record.state.as_str(),
                platform_id.as_str(),
                record.last_error.as_deref().unwrap_or(""),
                updated_at.as_str(),
            ])?;
        }
        writer.flush()?;
        println!("Wrote {} records to {}", records.len(), path.display());
    }

    Ok(())
}
