use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::header::{ACCEPT_LANGUAGE, USER_AGENT};
use tokio::time::Duration;
use tracing::warn;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const BASE_DELAY_MS: u64 = 1500;
const JITTER_MS: u64 = 500;

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 13_4) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119 Safari/537.36",
];

const ACCEPT_LANGUAGES: &[&str] = &[
    "vi-VN,vi;q=0.9,en;q=0.8",
    "vi-VN,vi;q=0.9,en-US;q=0.8,en;q=0.7",
];

/// Polite HTTP client: randomized browser headers per request, hard timeout,
/// and a throttling sleep after every successful fetch.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
}

impl Default for Fetcher {
    fn default() -> Self {
        Fetcher::new()
    }
}

impl Fetcher {
    pub fn new() -> Fetcher {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Invalid HTTP client configuration");
        Fetcher { client }
    }

    /// GET a page body. Any failure (network error, timeout, non-200) is
    /// logged and collapses to `None`; callers skip and continue.
    pub async fn get(&self, url: &str) -> Option<String> {
        let (ua, lang) = {
            let mut rng = rand::thread_rng();
            (
                *USER_AGENTS.choose(&mut rng).unwrap_or(&USER_AGENTS[0]),
                *ACCEPT_LANGUAGES
                    .choose(&mut rng)
                    .unwrap_or(&ACCEPT_LANGUAGES[0]),
            )
        };

        let response = match self
            .client
            .get(url)
            .header(USER_AGENT, ua)
            .header(ACCEPT_LANGUAGE, lang)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!("GET {} failed: {}", url, e);
                return None;
            }
        };

        if response.status() != reqwest::StatusCode::OK {
            warn!("GET {} returned {}", url, response.status());
            return None;
        }

        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => {
                warn!("GET {} body read failed: {}", url, e);
                return None;
            }
        };

        // Throttle against the origin after every successful hit.
        let jitter = rand::thread_rng().gen_range(0..JITTER_MS);
        tokio::time::sleep(Duration::from_millis(BASE_DELAY_MS + jitter)).await;

        Some(body)
    }
}
