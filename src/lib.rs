pub mod config;
pub mod discover;
pub mod extract;
pub mod fetch;
pub mod harvest;
pub mod record;
pub mod warehouse;

mod error;

pub use config::{Config, SiteConfig};
pub use error::EtlError;
pub use fetch::Fetcher;
pub use record::ProductRecord;
pub use warehouse::{LoadReport, Warehouse};

/// End-of-run counters, enough to spot partial data loss without digging
/// through the logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct RunSummary {
    pub urls_discovered: usize,
    pub records_extracted: usize,
    pub rows_written: u64,
    pub rows_skipped: u64,
}

/// Discover, extract and load one site end to end.
pub async fn run_pipeline(config: &Config, skip_load: bool) -> Result<RunSummary, EtlError> {
    let fetcher = Fetcher::new();

    let urls = discover::discover_site(&fetcher, &config.site).await;
    tracing::info!("[{}] discovered {} candidate URLs", config.site.key, urls.len());

    let records = harvest::run_extraction(
        &fetcher,
        &urls,
        &config.site.key,
        config.workers,
        harvest::RetryPolicy::new(config.max_retries),
    )
    .await;
    tracing::info!("[{}] extracted {} valid records", config.site.key, records.len());

    let mut summary = RunSummary {
        urls_discovered: urls.len(),
        records_extracted: records.len(),
        ..Default::default()
    };

    if skip_load {
        tracing::info!("load skipped by request");
        return Ok(summary);
    }

    let warehouse = Warehouse::connect(&config.warehouse_db).await?;
    let report = warehouse.load(&records).await?;
    summary.rows_written = report.rows_written;
    summary.rows_skipped = report.rows_skipped;
    Ok(summary)
}
