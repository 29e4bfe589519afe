//! The network seam: an object-safe `Fetcher` trait plus the default
//! reqwest-backed implementation.
//!
//! The crawler only ever talks to `dyn Fetcher`, so tests drive the whole
//! scheduler against deterministic in-memory fetchers and the robot
//! exclusion layer reuses whatever fetcher the crawl uses.

pub mod robots;

use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use log::debug;
use url::Url;

use crate::model::{DownloadParameters, PageMeta};

/// Why a fetch failed. Every variant surfaces as one ERROR link event; none
/// of them is fatal to the crawl.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    /// Any HTTP status >= 300 is a hard fetch error.
    #[error("http status {0}")]
    Status(u16),

    /// The body exceeded the configured page size cap.
    #[error("page exceeds {limit_kb} KB limit")]
    TooLarge { limit_kb: usize },

    /// The response content type failed the MIME accept list.
    #[error("content type {0:?} not accepted")]
    NotAccepted(String),

    /// Transport-level failure (DNS, connect, read).
    #[error("network error: {0}")]
    Network(String),

    /// The per-page download timeout elapsed; the fetch future was
    /// cancelled and awaited, not killed.
    #[error("download timed out after {0:?}")]
    Timeout(Duration),

    /// robots.txt disallows this URL for our user agent.
    #[error("disallowed by robot exclusion")]
    RobotsDisallowed,
}

/// A completed download.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub last_modified: Option<DateTime<Utc>>,
    pub expiration: Option<DateTime<Utc>>,
    pub body: String,
}

impl FetchResponse {
    /// The metadata a `Page` keeps after the body is discarded.
    #[must_use]
    pub fn meta(&self) -> PageMeta {
        PageMeta {
            content_type: self.content_type.clone(),
            content_length: self.content_length,
            last_modified: self.last_modified,
            expiration: self.expiration,
        }
    }
}

/// Downloads one URL under a fetch policy.
pub trait Fetcher: Send + Sync {
    fn fetch<'a>(
        &'a self,
        url: &'a Url,
        params: &'a DownloadParameters,
    ) -> BoxFuture<'a, Result<FetchResponse, FetchError>>;
}

/// Default fetcher on a shared `reqwest` client.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    async fn fetch_inner(
        &self,
        url: &Url,
        params: &DownloadParameters,
    ) -> Result<FetchResponse, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .header(reqwest::header::USER_AGENT, params.user_agent())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout(params.download_timeout())
                } else {
                    FetchError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if status >= 300 {
            return Err(FetchError::Status(status));
        }

        let headers = response.headers();
        let content_type = headers
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let last_modified = http_date(headers.get(reqwest::header::LAST_MODIFIED));
        let expiration = http_date(headers.get(reqwest::header::EXPIRES));
        let content_length = response.content_length();

        if let Some(ct) = &content_type
            && !params.accepts_mime_type(ct)
        {
            return Err(FetchError::NotAccepted(ct.clone()));
        }

        let cap = params.max_page_size_bytes();
        if let (Some(cap), Some(len)) = (cap, content_length)
            && len as usize > cap
        {
            return Err(FetchError::TooLarge {
                limit_kb: params.max_page_size_kb().unwrap_or_default(),
            });
        }

        // stream the body so an oversize page aborts mid-transfer instead
        // of buffering to completion first
        use futures::StreamExt;
        let mut stream = response.bytes_stream();
        let mut buf: Vec<u8> = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| FetchError::Network(e.to_string()))?;
            buf.extend_from_slice(&chunk);
            if let Some(cap) = cap
                && buf.len() > cap
            {
                debug!(target: "crawlkit::fetch", "aborting oversize download of {url}");
                return Err(FetchError::TooLarge {
                    limit_kb: params.max_page_size_kb().unwrap_or_default(),
                });
            }
        }

        Ok(FetchResponse {
            status,
            content_type,
            content_length,
            last_modified,
            expiration,
            body: String::from_utf8_lossy(&buf).into_owned(),
        })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch<'a>(
        &'a self,
        url: &'a Url,
        params: &'a DownloadParameters,
    ) -> BoxFuture<'a, Result<FetchResponse, FetchError>> {
        Box::pin(self.fetch_inner(url, params))
    }
}

fn http_date(value: Option<&reqwest::header::HeaderValue>) -> Option<DateTime<Utc>> {
    let raw = value?.to_str().ok()?;
    DateTime::parse_from_rfc2822(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
