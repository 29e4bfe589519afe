//! A downloaded page and its discardable parsed content.
//!
//! Parsed content (raw text + element tree) is the bulk of a crawl's memory
//! footprint, so it is reference-counted separately from the page object:
//! `retain_content` / `discard_content` drive a refcount, and when it hits
//! zero the content and parse arrays are dropped while the extracted links
//! survive. A page is downloaded at most once; re-parsing the same page
//! object is not supported.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicIsize, Ordering};

use chrono::{DateTime, Utc};
use log::debug;
use parking_lot::Mutex;
use url::Url;

use super::link::Link;
use crate::html::{self, Document, LabelValue, LinkKind};

/// HTTP response metadata the crawler keeps after the body is gone.
#[derive(Debug, Clone, Default)]
pub struct PageMeta {
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub last_modified: Option<DateTime<Utc>>,
    pub expiration: Option<DateTime<Utc>>,
}

/// One fetched URL: its content, parse results, and outgoing links.
#[derive(Debug)]
pub struct Page {
    url: Url,
    base: Url,
    depth: u32,
    title: Option<String>,
    meta: PageMeta,
    /// Outgoing links in document order. Survive content discard.
    links: Vec<Arc<Link>>,
    content: Mutex<Option<Arc<str>>>,
    doc: Mutex<Option<Arc<Document>>>,
    /// Holders of the parsed content. Starts at 1 for the creator;
    /// `discard_content` frees at zero.
    content_lock: AtomicIsize,
    labels: Mutex<HashMap<String, LabelValue>>,
}

impl Page {
    /// Build a page from a downloaded body, parsing it if it looks like
    /// HTML. Never fails: non-HTML content simply yields no parse and no
    /// links.
    #[must_use]
    pub fn new(url: Url, depth: u32, content: String, meta: PageMeta) -> Self {
        let declared_html = meta
            .content_type
            .as_deref()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("html"));
        let doc = html::parse(&content, &url, declared_html);
        let (base, title, links) = match &doc {
            Some(d) => {
                let links = d
                    .links
                    .iter()
                    .filter_map(|&idx| {
                        let element = &d.elements[idx];
                        let info = element.link.as_ref()?;
                        Some(Arc::new(Link::with_depth(
                            info.url.clone(),
                            info.kind,
                            element.text.clone().unwrap_or_default(),
                            depth + 1,
                        )))
                    })
                    .collect();
                (d.base.clone(), d.title.clone(), links)
            }
            None => (url.clone(), None, Vec::new()),
        };
        Self {
            url,
            base,
            depth,
            title,
            meta,
            links,
            content: Mutex::new(Some(content.into())),
            doc: Mutex::new(doc.map(Arc::new)),
            content_lock: AtomicIsize::new(1),
            labels: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Base URL for relative resolution, after any `<base href>` rewriting.
    #[must_use]
    pub fn base(&self) -> &Url {
        &self.base
    }

    #[must_use]
    pub fn depth(&self) -> u32 {
        self.depth
    }

    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    #[must_use]
    pub fn meta(&self) -> &PageMeta {
        &self.meta
    }

    /// Raw content, unless it has been discarded.
    #[must_use]
    pub fn content(&self) -> Option<Arc<str>> {
        self.content.lock().clone()
    }

    /// Parsed element tree; `None` for non-HTML pages or after discard.
    #[must_use]
    pub fn document(&self) -> Option<Arc<Document>> {
        self.doc.lock().clone()
    }

    #[must_use]
    pub fn is_html(&self) -> bool {
        self.doc.lock().is_some()
    }

    /// Outgoing links in document order. These survive content discard.
    #[must_use]
    pub fn links(&self) -> &[Arc<Link>] {
        &self.links
    }

    /// Outgoing links restricted to a kind.
    pub fn links_of_kind(&self, kind: LinkKind) -> impl Iterator<Item = &Arc<Link>> {
        self.links.iter().filter(move |l| l.kind() == kind)
    }

    /// Take another hold on the parsed content, deferring discard.
    pub fn retain_content(&self) {
        self.content_lock.fetch_add(1, Ordering::SeqCst);
    }

    /// Release one hold on the parsed content. At zero holds the raw text
    /// and parse arrays are dropped; links and metadata survive.
    pub fn discard_content(&self) {
        let remaining = self.content_lock.fetch_sub(1, Ordering::SeqCst) - 1;
        if remaining > 0 {
            return;
        }
        let dropped = self.content.lock().take().is_some();
        *self.doc.lock() = None;
        if dropped {
            debug!(target: "crawlkit::page", "discarded content of {}", self.url);
        }
    }

    /// Whether the parse arrays have been reclaimed.
    #[must_use]
    pub fn is_discarded(&self) -> bool {
        self.content.lock().is_none()
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
