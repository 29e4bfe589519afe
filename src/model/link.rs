//! The scheduling unit of a crawl: a URL plus crawl metadata.
//!
//! A `Link` is shared as `Arc<Link>` between the scheduler, the worker
//! holding it, and the page that discovered it, so its mutable parts
//! (status, priority, the downloaded page, labels) sit behind short
//! `parking_lot` locks. Priority is meaningful to mutate only before the
//! link is enqueued; the scheduler reads it once at submission.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use url::Url;

use super::download_params::DownloadParameters;
use super::page::Page;
use crate::html::{LabelValue, LinkKind};

/// Lifecycle states of a link as it moves through the crawl.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkStatus {
    /// Created but not yet considered.
    None,
    /// Rejected by a filter or predicate.
    Skipped,
    /// Rejected because its URL was already visited.
    AlreadyVisited,
    /// Rejected for exceeding the depth limit.
    TooDeep,
    /// Accepted and waiting in the fetch queue.
    Queued,
    /// A worker is downloading it.
    Retrieving,
    /// The fetch or processing failed; the link was evicted.
    Error,
    /// Downloaded, awaiting processing.
    Downloaded,
    /// Fully processed.
    Visited,
}

/// A URL to fetch, its crawl metadata, and (after download) its page.
#[derive(Debug)]
pub struct Link {
    url: Url,
    /// De-anchored URL string used for visited-set identity.
    normalized: String,
    depth: u32,
    kind: LinkKind,
    text: String,
    params: Option<DownloadParameters>,
    priority: Mutex<f64>,
    status: Mutex<LinkStatus>,
    page: Mutex<Option<Arc<Page>>>,
    labels: Mutex<HashMap<String, LabelValue>>,
}

/// Strip the fragment: `#foo` is client-side navigation, not a different
/// HTTP resource, and must not defeat visited-set deduplication.
#[must_use]
pub fn de_anchor(url: &Url) -> String {
    let mut u = url.clone();
    u.set_fragment(None);
    u.into()
}

impl Link {
    /// Create a root link supplied directly by a caller.
    #[must_use]
    pub fn new(url: Url) -> Self {
        Self::with_depth(url, LinkKind::Hyperlink, String::new(), 0)
    }

    /// Create a link discovered on a page.
    #[must_use]
    pub fn with_depth(url: Url, kind: LinkKind, text: String, depth: u32) -> Self {
        let normalized = de_anchor(&url);
        Self {
            url,
            normalized,
            depth,
            kind,
            text,
            params: None,
            priority: Mutex::new(0.0),
            status: Mutex::new(LinkStatus::None),
            page: Mutex::new(None),
            labels: Mutex::new(HashMap::new()),
        }
    }

    /// Attach a per-link fetch policy override.
    #[must_use]
    pub fn with_params(mut self, params: DownloadParameters) -> Self {
        self.params = Some(params);
        self
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// De-anchored URL string, the identity used by the visited set.
    #[must_use]
    pub fn normalized_url(&self) -> &str {
        &self.normalized
    }

    #[must_use]
    pub fn depth(&self) -> u32 {
        self.depth
    }

    #[must_use]
    pub fn kind(&self) -> LinkKind {
        self.kind
    }

    /// Anchor text accumulated while the element was open.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Per-link fetch policy override, if any.
    #[must_use]
    pub fn params(&self) -> Option<&DownloadParameters> {
        self.params.as_ref()
    }

    #[must_use]
    pub fn priority(&self) -> f64 {
        *self.priority.lock()
    }

    /// Set the scheduling priority. Only takes effect before the link is
    /// submitted; the queue snapshots the value at insertion.
    pub fn set_priority(&self, priority: f64) {
        *self.priority.lock() = priority;
    }

    #[must_use]
    pub fn status(&self) -> LinkStatus {
        *self.status.lock()
    }

    pub fn set_status(&self, status: LinkStatus) {
        *self.status.lock() = status;
    }

    #[must_use]
    pub fn page(&self) -> Option<Arc<Page>> {
        self.page.lock().clone()
    }

    pub fn set_page(&self, page: Arc<Page>) {
        *self.page.lock() = Some(page);
    }

    /// Drop the downloaded page, severing this link's hold on its parse
    /// tree. Called when the crawler evicts a processed link.
    pub fn discard_page(&self) {
        if let Some(page) = self.page.lock().take() {
            page.discard_content();
        }
    }

    pub fn set_label(&self, name: impl Into<String>, value: LabelValue) {
        self.labels.lock().insert(name.into(), value);
    }

    #[must_use]
    pub fn label(&self, name: &str) -> Option<LabelValue> {
        self.labels.lock().get(name).cloned()
    }

    #[must_use]
    pub fn has_label(&self, name: &str) -> bool {
        self.labels.lock().contains_key(name)
    }
}
