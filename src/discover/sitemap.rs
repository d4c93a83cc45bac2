use super::{strip_query, DiscoverStrategy, EXCLUDE_TOKENS};
use crate::config::SiteConfig;
use crate::fetch::Fetcher;
use itertools::Itertools;
use lazy_static::lazy_static;
use scraper::{Html, Selector};
use tracing::{debug, warn};

const E: &str = "Invalid selector";
lazy_static! {
    static ref LOC: Selector = Selector::parse("loc").expect(E);
}

/// Server-authoritative discovery: harvest every `<loc>` from the product
/// sitemap and keep the ones that look like product pages on this site.
pub struct SitemapStrategy;

#[async_trait::async_trait]
impl DiscoverStrategy for SitemapStrategy {
    fn name(&self) -> &'static str {
        "sitemap"
    }

    async fn discover(&self, fetcher: &Fetcher, site: &SiteConfig) -> Vec<String> {
        let Some(sitemap_url) = site.sitemap_url.as_deref() else {
            return Vec::new();
        };
        let Some(body) = fetcher.get(sitemap_url).await else {
            warn!("[{}] sitemap fetch failed: {}", site.key, sitemap_url);
            return Vec::new();
        };

        let locs = sitemap_locs(&body);
        debug!("[{}] sitemap contains {} loc entries", site.key, locs.len());
        filter_product_locs(locs, site)
    }
}

/// All `<loc>` text values from a sitemap document. The XML parses fine as a
/// foreign-element HTML tree, so the usual selector machinery applies.
pub(crate) fn sitemap_locs(body: &str) -> Vec<String> {
    let doc = Html::parse_document(body);
    doc.select(&LOC)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

pub(crate) fn filter_product_locs(locs: Vec<String>, site: &SiteConfig) -> Vec<String> {
    let domain = site.domain().to_lowercase();
    locs.into_iter()
        .filter(|u| {
            let lu = u.to_lowercase();
            lu.contains(&domain) && !EXCLUDE_TOKENS.iter().any(|t| lu.contains(t))
        })
        .map(|u| strip_query(&u).to_string())
        .unique()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn site() -> SiteConfig {
        SiteConfig {
            key: "tgdd".into(),
            base_url: "https://www.thegioididong.com".into(),
            seed_categories: vec![],
            sitemap_url: Some("https://www.thegioididong.com/newsitemap/sitemap-product".into()),
            api_url: None,
            max_urls: 1000,
            pagination_limit: 60,
        }
    }

    const SITEMAP: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>https://www.thegioididong.com/laptop/dell-inspiron-15?src=osp</loc></url>
  <url><loc>https://www.thegioididong.com/tin-tuc/bai-viet-moi</loc></url>
  <url><loc>https://www.thegioididong.com/laptop/macbook-air-m2</loc></url>
  <url><loc>https://other-shop.example/laptop/x</loc></url>
  <url><loc>https://www.thegioididong.com/khuyen-mai/sale-lon</loc></url>
</urlset>"#;

    #[test]
    fn test_sitemap_loc_harvest_and_filtering() {
        let locs = sitemap_locs(SITEMAP);
        assert_eq!(locs.len(), 5);

        let urls = filter_product_locs(locs, &site());
        assert_eq!(
            urls,
            vec![
                "https://www.thegioididong.com/laptop/dell-inspiron-15",
                "https://www.thegioididong.com/laptop/macbook-air-m2",
            ]
        );
    }
}
