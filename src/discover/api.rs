use super::DiscoverStrategy;
use crate::config::SiteConfig;
use crate::fetch::Fetcher;
use serde::Deserialize;
use tracing::warn;

/// Enumerate products through a JSON listing endpoint, building canonical
/// product URLs from each item's slug.
pub struct ApiStrategy;

#[derive(Debug, Deserialize)]
struct ApiListing {
    #[serde(alias = "items")]
    products: Vec<ApiProduct>,
}

#[derive(Debug, Deserialize)]
struct ApiProduct {
    slug: String,
}

#[async_trait::async_trait]
impl DiscoverStrategy for ApiStrategy {
    fn name(&self) -> &'static str {
        "api"
    }

    async fn discover(&self, fetcher: &Fetcher, site: &SiteConfig) -> Vec<String> {
        let Some(api_url) = site.api_url.as_deref() else {
            return Vec::new();
        };
        let Some(body) = fetcher.get(api_url).await else {
            warn!("[{}] API fetch failed: {}", site.key, api_url);
            return Vec::new();
        };

        match serde_json::from_str::<ApiListing>(&body) {
            Ok(listing) => listing
                .products
                .iter()
                .map(|p| product_url(&site.base_url, &p.slug))
                .collect(),
            Err(e) => {
                warn!("[{}] API payload parse failed: {}", site.key, e);
                Vec::new()
            }
        }
    }
}

pub(crate) fn product_url(base_url: &str, slug: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        slug.trim_start_matches('/')
    )
}
