use super::{strip_query, DiscoverStrategy, PRODUCT_TOKENS};
use crate::config::SiteConfig;
use crate::fetch::Fetcher;
use futures::Future;
use lazy_static::lazy_static;
use scraper::{Html, Selector};
use std::collections::HashSet;
use tracing::{debug, info};

const E: &str = "Invalid selector";
lazy_static! {
    static ref A: Selector = Selector::parse("a[href]").expect(E);
    static ref DATA_LINK: Selector = Selector::parse("[data-href], [data-link]").expect(E);
}

/// Crawl seed category pages, following server-side `?p=` pagination and the
/// client-side `#c=44&o=13&pi=` filter variants some routes use instead.
/// The two spellings run as separate sequences, each with its own
/// no-new-URLs stop: fragments are not transmitted over HTTP, so a fragment
/// page serving stale content must never cut the `?p=` walk short.
pub struct CategoryStrategy;

#[async_trait::async_trait]
impl DiscoverStrategy for CategoryStrategy {
    fn name(&self) -> &'static str {
        "category"
    }

    async fn discover(&self, fetcher: &Fetcher, site: &SiteConfig) -> Vec<String> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut urls = Vec::new();

        for seed in &site.seed_categories {
            for pages in [
                server_pages(seed, site.pagination_limit),
                fragment_pages(seed, site.pagination_limit),
            ] {
                if urls.len() >= site.max_urls {
                    break;
                }
                crawl_pages(&pages, seed, site.max_urls, &mut seen, &mut urls, |page| async move {
                    fetcher.get(&page).await
                })
                .await;
            }
        }

        urls
    }
}

/// Walk one pagination sequence, harvesting product links until the cap is
/// reached or a non-seed page contributes nothing new.
pub(crate) async fn crawl_pages<F, Fut>(
    pages: &[String],
    seed: &str,
    cap: usize,
    seen: &mut HashSet<String>,
    urls: &mut Vec<String>,
    fetch_page: F,
) where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Option<String>>,
{
    for page_url in pages {
        if urls.len() >= cap {
            break;
        }
        let Some(body) = fetch_page(page_url.clone()).await else {
            debug!("skipping category page (fetch failed): {}", page_url);
            continue;
        };

        let mut fresh = 0;
        for link in product_links(&body, page_url) {
            if urls.len() >= cap {
                break;
            }
            if seen.insert(link.clone()) {
                urls.push(link);
                fresh += 1;
            }
        }
        debug!("{}: +{} URLs (total {})", page_url, fresh, urls.len());

        // A page with nothing new means this sequence ran off the end.
        if fresh == 0 && page_url != seed {
            info!("no new URLs at {}, stopping pagination", page_url);
            break;
        }
    }
}

/// The seed itself plus its server-side `?p=` pages.
pub(crate) fn server_pages(seed: &str, pagination_limit: u32) -> Vec<String> {
    let mut pages = vec![seed.to_string()];
    for p in 2..=pagination_limit {
        pages.push(format!("{seed}?p={p}"));
    }
    pages
}

/// The client-side fragment spelling of the same pagination.
pub(crate) fn fragment_pages(seed: &str, pagination_limit: u32) -> Vec<String> {
    (2..=pagination_limit)
        .map(|p| format!("{seed}#c=44&o=13&pi={p}"))
        .collect()
}

/// Product links on a listing page: every anchor href resolved against the
/// page URL, falling back to `data-href`/`data-link` attributes for layouts
/// that render cards without anchors. Query strings and fragments stripped,
/// product-token filter applied.
pub(crate) fn product_links(body: &str, page_url: &str) -> Vec<String> {
    let doc = Html::parse_document(body);
    let base = reqwest::Url::parse(page_url).ok();

    let mut links: Vec<String> = doc
        .select(&A)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| resolve(base.as_ref(), href))
        .filter(|full| is_product_link(full))
        .collect();

    if links.is_empty() {
        links = doc
            .select(&DATA_LINK)
            .filter_map(|el| {
                el.value()
                    .attr("data-href")
                    .or_else(|| el.value().attr("data-link"))
            })
            .filter_map(|href| resolve(base.as_ref(), href))
            .filter(|full| is_product_link(full))
            .collect();
    }

    links
}

fn resolve(base: Option<&reqwest::Url>, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    let absolute = match base {
        Some(base) => base.join(href).ok()?.to_string(),
        None => href.to_string(),
    };
    Some(strip_query(&absolute).trim_end_matches('/').to_string())
}

fn is_product_link(url: &str) -> bool {
    let lu = url.to_lowercase();
    PRODUCT_TOKENS.iter().any(|t| lu.contains(t))
}
