use crate::error::EtlError;
use std::env;

/// Discovery endpoints and ceilings for one retail site.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    /// Short site key, used as the record `source` (normalized lowercase).
    pub key: String,
    /// Scheme + host, e.g. `https://www.thegioididong.com`.
    pub base_url: String,
    pub seed_categories: Vec<String>,
    pub sitemap_url: Option<String>,
    /// JSON product-listing endpoint, when the site exposes one.
    pub api_url: Option<String>,
    pub max_urls: usize,
    pub pagination_limit: u32,
}

impl SiteConfig {
    pub fn domain(&self) -> &str {
        self.base_url
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_start_matches("www.")
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub site: SiteConfig,
    pub workers: usize,
    pub max_retries: u32,
    pub warehouse_db: String,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Read configuration from the environment, with the production crawl
    /// target as defaults.
    pub fn from_env() -> Result<Config, EtlError> {
        let base_url = env_or("SITE_BASE_URL", "https://www.thegioididong.com");
        let site = SiteConfig {
            key: env_or("SITE_KEY", "thegioididong"),
            seed_categories: env_or("SITE_CATEGORIES", &format!("{base_url}/laptop"))
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            sitemap_url: env::var("SITE_SITEMAP_URL")
                .ok()
                .or_else(|| Some(format!("{base_url}/newsitemap/sitemap-product"))),
            api_url: env::var("SITE_API_URL").ok(),
            max_urls: env_parse("MAX_URLS_PER_SITE", 1000),
            pagination_limit: env_parse("PAGINATION_LIMIT", 60),
            base_url,
        };

        if site.seed_categories.is_empty() && site.sitemap_url.is_none() && site.api_url.is_none()
        {
            return Err(EtlError::Config(format!(
                "no discovery endpoints configured for site {}",
                site.key
            )));
        }

        Ok(Config {
            site,
            workers: env_parse("MAX_WORKERS", 12),
            max_retries: env_parse("EXTRACT_MAX_RETRIES", 3),
            warehouse_db: env_or("WAREHOUSE_DB", "warehouse.sqlite3"),
        })
    }
}
