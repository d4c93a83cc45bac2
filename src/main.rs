use clap::Parser;
use laptop_price_etl::{run_pipeline, Config};
use tracing::{error, info};
use tracing_error::ErrorLayer;
use tracing_subscriber::prelude::*;

/// Batch ETL: crawl laptop listings from one retail site and load them into
/// the star-schema warehouse.
#[derive(Debug, Parser)]
#[command(name = "laptop-price-etl", version)]
struct Args {
    /// Site key, also used as the record source tag.
    #[arg(long)]
    site: Option<String>,

    /// Cap on discovered URLs per run.
    #[arg(long)]
    max_urls: Option<usize>,

    /// Extraction worker-pool size.
    #[arg(long)]
    workers: Option<usize>,

    /// Warehouse SQLite file (or sqlite: URL).
    #[arg(long)]
    db: Option<String>,

    /// Discover and extract only; do not touch the warehouse.
    #[arg(long)]
    skip_load: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| {
                "info,html5ever=error,selectors=error,hyper=warn,reqwest=info,sqlx=warn".into()
            }),
        )
        .with(ErrorLayer::default())
        .init();

    let args = Args::parse();
    let mut config = Config::from_env()?;
    if let Some(site) = args.site {
        config.site.key = site;
    }
    if let Some(max_urls) = args.max_urls {
        config.site.max_urls = max_urls;
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if let Some(db) = args.db {
        config.warehouse_db = db;
    }

    info!("=== PIPELINE START ===");
    match run_pipeline(&config, args.skip_load).await {
        Ok(summary) => {
            info!(
                "=== PIPELINE FINISHED: {} URLs discovered, {} records extracted, {} fact rows written, {} skipped ===",
                summary.urls_discovered,
                summary.records_extracted,
                summary.rows_written,
                summary.rows_skipped
            );
            if summary.records_extracted == 0 {
                error!("no valid records extracted");
                std::process::exit(1);
            }
            if !args.skip_load && summary.rows_written == 0 {
                error!("load wrote 0 fact rows");
                std::process::exit(3);
            }
            Ok(())
        }
        Err(e) => {
            error!("pipeline failed: {e}");
            std::process::exit(2);
        }
    }
}
