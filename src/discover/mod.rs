mod api;
mod category;
mod sitemap;

pub use api::ApiStrategy;
pub use category::CategoryStrategy;
pub use sitemap::SitemapStrategy;

use crate::config::SiteConfig;
use crate::fetch::Fetcher;
use std::collections::HashSet;
use tracing::info;

/// Path tokens that mark a URL as non-product (news, promotions, search, Q&A).
pub(crate) const EXCLUDE_TOKENS: &[&str] = &[
    "tin-tuc",
    "news",
    "khuyen-mai",
    "khuyenmai",
    "tag",
    "search",
    "tim-kiem",
    "hoi-dap",
];

/// Path tokens that mark a link as a likely product page.
pub(crate) const PRODUCT_TOKENS: &[&str] = &["laptop", "macbook", "product", "collection"];

/// One way of enumerating candidate product URLs for a site. Strategies never
/// fail the overall discovery: a broken fetch or parse contributes nothing.
#[async_trait::async_trait]
pub trait DiscoverStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    async fn discover(&self, fetcher: &Fetcher, site: &SiteConfig) -> Vec<String>;
}

/// Run every applicable strategy in order (sitemap, category crawl, API),
/// merging results into a deduplicated list capped at the site ceiling.
pub async fn discover_site(fetcher: &Fetcher, site: &SiteConfig) -> Vec<String> {
    let strategies: Vec<Box<dyn DiscoverStrategy>> = vec![
        Box::new(SitemapStrategy),
        Box::new(CategoryStrategy),
        Box::new(ApiStrategy),
    ];

    let mut seen = HashSet::new();
    let mut urls = Vec::new();

    for strategy in &strategies {
        if urls.len() >= site.max_urls {
            break;
        }
        let found = strategy.discover(fetcher, site).await;
        let before = urls.len();
        merge_capped(&mut urls, &mut seen, found, site.max_urls);
        info!(
            "[{}] {} strategy: +{} URLs (total {})",
            site.key,
            strategy.name(),
            urls.len() - before,
            urls.len()
        );
    }

    urls
}

pub(crate) fn merge_capped(
    urls: &mut Vec<String>,
    seen: &mut HashSet<String>,
    found: Vec<String>,
    cap: usize,
) {
    for url in found {
        if urls.len() >= cap {
            break;
        }
        if seen.insert(url.clone()) {
            urls.push(url);
        }
    }
}

/// Drop the query string (and fragment) from a discovered URL.
pub(crate) fn strip_query(url: &str) -> &str {
    let url = url.split('?').next().unwrap_or(url);
    url.split('#').next().unwrap_or(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_merge_dedups_across_strategies() {
        let mut urls = Vec::new();
        let mut seen = HashSet::new();
        merge_capped(
            &mut urls,
            &mut seen,
            vec!["https://a/1".into(), "https://a/2".into()],
            10,
        );
        merge_capped(
            &mut urls,
            &mut seen,
            vec!["https://a/2".into(), "https://a/3".into(), "https://a/2".into()],
            10,
        );
        assert_eq!(urls, vec!["https://a/1", "https://a/2", "https://a/3"]);
    }

    #[test]
    fn test_merge_respects_cap() {
        let mut urls = Vec::new();
        let mut seen = HashSet::new();
        let found = (0..100).map(|i| format!("https://a/{i}")).collect();
        merge_capped(&mut urls, &mut seen, found, 7);
        assert_eq!(urls.len(), 7);
    }

    #[test]
    fn test_strip_query_and_fragment() {
        assert_eq!(
            strip_query("https://a/laptop/x?p=2#c=44&o=13&pi=3"),
            "https://a/laptop/x"
        );
        assert_eq!(strip_query("https://a/laptop/x"), "https://a/laptop/x");
    }
}
