//! Shared test fixtures: an in-memory site served through the `Fetcher`
//! seam, so scheduler tests are deterministic and network-free.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::future::BoxFuture;
use url::Url;

use crawlkit::{
    CrawlEvent, DownloadParameters, FetchError, FetchResponse, Fetcher, LinkStatus,
};

/// Opt into `RUST_LOG`-controlled output for a test.
#[allow(dead_code)]
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Serves a fixed set of pages. Unknown URLs 404. Honors the page size cap
/// the way the HTTP fetcher would, and can delay responses per URL to
/// exercise scheduling races.
pub struct SiteFetcher {
    pages: HashMap<String, String>,
    delays: HashMap<String, Duration>,
    default_delay: Option<Duration>,
    pub fetch_count: AtomicUsize,
}

impl SiteFetcher {
    pub fn new(pages: &[(&str, &str)]) -> Self {
        Self {
            pages: pages
                .iter()
                .map(|(u, b)| (u.to_string(), b.to_string()))
                .collect(),
            delays: HashMap::new(),
            default_delay: None,
            fetch_count: AtomicUsize::new(0),
        }
    }

    pub fn with_default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = Some(delay);
        self
    }

    pub fn with_delay(mut self, url: &str, delay: Duration) -> Self {
        self.delays.insert(url.to_string(), delay);
        self
    }

    pub fn fetches(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }
}

impl Fetcher for SiteFetcher {
    fn fetch<'a>(
        &'a self,
        url: &'a Url,
        params: &'a DownloadParameters,
    ) -> BoxFuture<'a, Result<FetchResponse, FetchError>> {
        Box::pin(async move {
            self.fetch_count.fetch_add(1, Ordering::SeqCst);
            let delay = self
                .delays
                .get(url.as_str())
                .copied()
                .or(self.default_delay);
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let Some(body) = self.pages.get(url.as_str()) else {
                return Err(FetchError::Status(404));
            };
            if let Some(cap) = params.max_page_size_bytes()
                && body.len() > cap
            {
                return Err(FetchError::TooLarge {
                    limit_kb: params.max_page_size_kb().unwrap_or_default(),
                });
            }
            Ok(FetchResponse {
                status: 200,
                content_type: Some("text/html".to_string()),
                content_length: Some(body.len() as u64),
                last_modified: None,
                expiration: None,
                body: body.clone(),
            })
        })
    }
}

/// Drain everything currently buffered on an event receiver.
pub fn drain_events(
    receiver: &mut tokio::sync::broadcast::Receiver<CrawlEvent>,
) -> Vec<CrawlEvent> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}

/// URLs of link events with the given status, in publication order.
pub fn urls_with_status(events: &[CrawlEvent], status: LinkStatus) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            CrawlEvent::Link(link) if link.status == status => Some(link.url.clone()),
            _ => None,
        })
        .collect()
}
