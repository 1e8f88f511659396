use super::FeedClient;
use crate::error::FetchError;
use crate::model::Entry;
use crate::normalize::strip_html;
use std::time::Duration;
use tracing::warn;

const MINIMUM_RESULTS: u32 = 1;
const MAXIMUM_RESULTS: u32 = 100;

/// Concrete `FeedClient` over an RSSHub-shaped `/twitter/user/<account>` endpoint,
/// grounded on `rpc/client.rs`'s retry/backoff loop for the 5xx/timeout path.
pub struct HttpFeedClient {
    http: reqwest::Client,
    base_url: String,
    refresh_seconds: Option<u64>,
}

impl HttpFeedClient {
    pub fn new(base_url: impl Into<String>, refresh_seconds: Option<u64>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("x2discord/1.0")
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            refresh_seconds,
        })
    }

    async fn get_feed_xml(&self, account: &str) -> Result<String, FetchError> {
        let url = format!("{}/twitter/user/{account}", self.base_url);
        let mut attempt: u32 = 0;
        let mut backoff = Duration::from_millis(250);
        let max_attempts = 4;

        loop {
            attempt += 1;
            let mut req = self.http.get(&url);
            if let Some(refresh) = self.refresh_seconds {
                req = req.query(&[("refresh", refresh)]);
            }

            let resp = req.send().await;
            match resp {
                Ok(resp) => {
                    let status = resp.status();

                    if status.as_u16() == 429 {
                        let retry_after = resp
                            .headers()
                            .get(reqwest::header::RETRY_AFTER)
                            .and_then(|v| v.to_str().ok())
                            .and_then(|s| s.parse::<u64>().ok());
                        return Err(FetchError::RateLimited { retry_after });
                    }

                    if status.as_u16() == 403 {
                        return Err(FetchError::Forbidden);
                    }

                    if status.is_server_error() {
                        if attempt >= max_attempts {
                            return Err(FetchError::UpstreamOther(format!(
                                "server error {status} from {url}"
                            )));
                        }
                        tokio::time::sleep(backoff).await;
                        backoff = std::cmp::min(backoff * 2, Duration::from_secs(5));
                        continue;
                    }

                    if !status.is_success() {
                        return Err(FetchError::UpstreamOther(format!(
                            "unexpected status {status} from {url}"
                        )));
                    }

                    return resp
                        .text()
                        .await
                        .map_err(|e| FetchError::UpstreamOther(e.to_string()));
                }
                Err(e) => {
                    if e.is_timeout() {
                        return Err(FetchError::Timeout);
                    }
                    let retryable = e.is_connect() || e.is_request();
                    if !retryable || attempt >= max_attempts {
                        return Err(FetchError::UpstreamOther(e.to_string()));
                    }
                    warn!(account, attempt, max_attempts, error = %e, "feed fetch failed, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff = std::cmp::min(backoff * 2, Duration::from_secs(5));
                }
            }
        }
    }
}

impl FeedClient for HttpFeedClient {
    async fn fetch(&self, account: &str, max_results: u32) -> Result<Vec<Entry>, FetchError> {
        let normalized = account.trim().trim_start_matches('@');
        let limit = max_results.clamp(MINIMUM_RESULTS, MAXIMUM_RESULTS) as usize;

        let xml = self.get_feed_xml(normalized).await?;
        let channel = rss::Channel::read_from(xml.as_bytes())
            .map_err(|e| FetchError::UpstreamOther(format!("malformed rss: {e}")))?;

        let entries = channel
            .items()
            .iter()
            .take(limit)
            .enumerate()
            .map(|(idx, item)| {
                let raw_text = item
                    .description()
                    .or_else(|| item.title())
                    .unwrap_or_default()
                    .to_string();
                let id = item
                    .guid()
                    .map(|g| g.value().to_string())
                    .or_else(|| item.link().map(|l| l.to_string()))
                    .unwrap_or_else(|| format!("{normalized}-{idx}"));
                let link = item
                    .link()
                    .map(|l| l.to_string())
                    .unwrap_or_else(|| format!("https://x.com/{normalized}"));
                Entry {
                    id,
                    link,
                    text: strip_html(&raw_text),
                    raw_text,
                }
            })
            .collect();

        Ok(entries)
    }
}
