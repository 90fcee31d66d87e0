//! Async page fetcher wrapping reqwest, fronted by the shared page cache.
//!
//! Not a browser. Plain HTTP requests with browser-like headers, since the
//! storefront serves different markup (or nothing) to obvious bots.

use crate::cache::{Clock, SystemClock, TtlCache};
use crate::types::{FetchError, FetchResult};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Chrome-like user agent sent with every request.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
                                      AppleWebKit/537.36 (KHTML, like Gecko) \
                                      Chrome/124.0 Safari/537.36";

/// Anything that can hand back page HTML for a URL.
///
/// The harvester and document index only see this trait, so tests can drive
/// them with an in-memory source.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch a page body, serving from cache while younger than `ttl`.
    async fn get(&self, url: &str, ttl: Duration) -> FetchResult<String>;

    /// Whether a HEAD request to `url` succeeds with a 2xx status.
    async fn head_ok(&self, url: &str) -> bool;
}

/// Fetcher tuning.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub timeout_ms: u64,
    /// Extra attempts after a 5xx or transport error.
    pub max_retries: u32,
    /// TTL used when the page cache is asked without an explicit one.
    pub default_page_ttl: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 15_000,
            max_retries: 1,
            default_page_ttl: Duration::from_secs(600),
        }
    }
}

/// HTTP fetcher with a shared page cache.
///
/// One `reqwest::Client` is kept for the process so pooled keep-alive
/// connections to the storefront are reused.
pub struct HttpFetcher {
    client: reqwest::Client,
    pages: TtlCache<String>,
    config: FetcherConfig,
}

impl HttpFetcher {
    pub fn new(config: FetcherConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a fetcher whose page cache runs on the given clock.
    pub fn with_clock(config: FetcherConfig, clock: Arc<dyn Clock>) -> Self {
        let client = browser_client(&config).unwrap_or_else(|e| {
            warn!(
                error = %e,
                "browser http client unavailable, falling back to reqwest defaults without browser headers"
            );
            reqwest::Client::default()
        });

        Self {
            client,
            pages: TtlCache::with_clock(config.default_page_ttl, clock),
            config,
        }
    }

    /// Number of page bodies currently held.
    pub fn cached_pages(&self) -> usize {
        self.pages.len()
    }

    async fn fetch_uncached(&self, url: &str) -> FetchResult<String> {
        let mut retries = 0u32;

        loop {
            let resp = self.client.get(url).send().await;

            match resp {
                Ok(r) => {
                    let status = r.status().as_u16();

                    if status >= 500 && retries < self.config.max_retries {
                        retries += 1;
                        let delay = Duration::from_millis(250 * 2u64.pow(retries - 1));
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    if !r.status().is_success() {
                        return Err(FetchError::Status {
                            url: url.to_string(),
                            status,
                        });
                    }

                    return r.text().await.map_err(|source| FetchError::Transport {
                        url: url.to_string(),
                        source,
                    });
                }
                Err(e) => {
                    if e.is_builder() {
                        return Err(FetchError::InvalidUrl(url.to_string()));
                    }
                    if retries < self.config.max_retries {
                        retries += 1;
                        let delay = Duration::from_millis(250 * 2u64.pow(retries - 1));
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(FetchError::Transport {
                        url: url.to_string(),
                        source: e,
                    });
                }
            }
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(FetcherConfig::default())
    }
}

#[async_trait]
impl PageSource for HttpFetcher {
    async fn get(&self, url: &str, ttl: Duration) -> FetchResult<String> {
        if let Some(body) = self.pages.get_within(url, ttl) {
            debug!(url, "page cache hit");
            return Ok(body);
        }

        let body = self.fetch_uncached(url).await?;
        // Only successes are cached; failures retry on the next call.
        self.pages.insert(url, body.clone());
        Ok(body)
    }

    async fn head_ok(&self, url: &str) -> bool {
        match self.client.head(url).send().await {
            Ok(r) => r.status().is_success(),
            Err(e) => {
                debug!(url, error = %e, "HEAD failed");
                false
            }
        }
    }
}

/// Client with the browser user agent, Accept headers, timeout, and a
/// limited redirect policy.
pub fn browser_client(config: &FetcherConfig) -> reqwest::Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

    reqwest::Client::builder()
        .timeout(Duration::from_millis(config.timeout_ms))
        .redirect(reqwest::redirect::Policy::limited(5))
        .user_agent(BROWSER_USER_AGENT)
        .default_headers(headers)
        .build()
}
