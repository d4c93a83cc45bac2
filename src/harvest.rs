use crate::extract::extract;
use crate::fetch::Fetcher;
use crate::record::ProductRecord;
use futures::{stream, Future, StreamExt};
use std::collections::HashSet;
use tokio::time::Duration;
use tracing::{info, warn};

/// Retry wrapper around a whole extraction run, not individual URLs. An
/// attempt that yields nothing at all is usually the site blocking us, so
/// back off and re-run; individual page failures are already tolerated
/// inside the run.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            delay: Duration::from_secs(30),
        }
    }

    pub fn no_delay(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            delay: Duration::ZERO,
        }
    }
}

/// Fan page extraction out over a bounded worker pool and collect the
/// records that made it. Output order is whatever the pool produces.
/// Split out from `run_extraction_with` so tests can drive the pool with a
/// stub extractor.
pub async fn harvest_with<F, Fut>(urls: &[String], workers: usize, extract_one: F) -> Vec<ProductRecord>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Option<ProductRecord>>,
{
    stream::iter(urls.iter().cloned())
        .map(|url| extract_one(url))
        .buffer_unordered(workers.max(1))
        .filter_map(|record| async move { record })
        .collect()
        .await
}

/// Full extraction run: harvest under the retry policy, then dedup the batch
/// on its natural per-run identity, the page URL.
pub async fn run_extraction(
    fetcher: &Fetcher,
    urls: &[String],
    source: &str,
    workers: usize,
    retry: RetryPolicy,
) -> Vec<ProductRecord> {
    run_extraction_with(urls, workers, retry, |url| async move {
        extract(fetcher, &url, source).await
    })
    .await
}

pub async fn run_extraction_with<F, Fut>(
    urls: &[String],
    workers: usize,
    retry: RetryPolicy,
    extract_one: F,
) -> Vec<ProductRecord>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Option<ProductRecord>>,
{
    for attempt in 1..=retry.max_attempts.max(1) {
        let records = harvest_with(urls, workers, &extract_one).await;
        if !records.is_empty() {
            info!(
                "harvest: {}/{} pages yielded records",
                records.len(),
                urls.len()
            );
            return dedup_by_url(records);
        }
        warn!(
            "extraction attempt {}/{} produced no records",
            attempt, retry.max_attempts
        );
        if attempt < retry.max_attempts {
            tokio::time::sleep(retry.delay).await;
        }
    }
    Vec::new()
}

pub fn dedup_by_url(records: Vec<ProductRecord>) -> Vec<ProductRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|r| seen.insert(r.url.clone()))
        .collect()
}
