use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 2000;
const REQUEST_TIMEOUT_SECS: u64 = 30;
const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/120.0 Safari/537.36";

/// A fetched listing page: the source URL plus its raw HTML.
#[derive(Debug, Clone)]
pub struct Page {
    pub url: String,
    pub html: String,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request for {url} failed: {detail}")]
    Transport { url: String, detail: String },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
}

/// Fetches one listing page. Implementations own their session state;
/// the pipelines never look past this seam.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Page, FetchError>;
}

/// Plain HTTP fetcher with a bounded retry loop. Rate-limit and server
/// errors back off exponentially before the next attempt; anything else
/// fails immediately.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self { client }
    }

    async fn fetch_once(&self, url: &str) -> Result<Page, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Transport {
                url: url.to_string(),
                detail: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let html = response.text().await.map_err(|e| FetchError::Transport {
            url: url.to_string(),
            detail: e.to_string(),
        })?;

        Ok(Page {
            url: url.to_string(),
            html,
        })
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

fn retryable(err: &FetchError) -> bool {
    matches!(
        err,
        FetchError::Status {
            status: 429 | 500 | 502 | 503,
            ..
        }
    )
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Page, FetchError> {
        for attempt in 0..=MAX_RETRIES {
            match self.fetch_once(url).await {
                Ok(page) => return Ok(page),
                Err(e) if retryable(&e) && attempt < MAX_RETRIES => {
                    let backoff = Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt));
                    warn!(
                        "{} (attempt {}/{}), backing off {:.1}s",
                        e,
                        attempt + 1,
                        MAX_RETRIES,
                        backoff.as_secs_f64()
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
        unreachable!("retry loop always returns")
    }
}
