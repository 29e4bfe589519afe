//! Crawl-wide configuration.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::html::LinkKind;
use crate::model::DownloadParameters;

/// Which part of the web the crawl may wander into, relative to its roots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrawlDomain {
    /// Only URLs on the same scheme/host/port as some root.
    Server,
    /// Only URLs under some root's directory.
    Subtree,
    /// Anywhere.
    Web,
}

/// Which kinds of discovered links are eligible, before any per-link
/// predicate runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkFilter {
    /// `a`/`area`/`link`/frame links only.
    Hyperlinks,
    /// Hyperlinks plus images and other media references.
    HyperlinksAndMedia,
    /// Everything, including forms and their buttons.
    AllLinks,
}

impl LinkFilter {
    #[must_use]
    pub fn accepts(self, kind: LinkKind) -> bool {
        match self {
            Self::Hyperlinks => kind == LinkKind::Hyperlink,
            Self::HyperlinksAndMedia => {
                matches!(kind, LinkKind::Hyperlink | LinkKind::Media)
            }
            Self::AllLinks => true,
        }
    }
}

/// Configuration for one crawler.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub(crate) roots: Vec<Url>,
    pub(crate) domain: CrawlDomain,
    pub(crate) link_filter: LinkFilter,
    pub(crate) max_depth: u32,
    pub(crate) depth_first: bool,
    pub(crate) synchronous: bool,
    pub(crate) ignore_visited_links: bool,
    pub(crate) params: DownloadParameters,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            domain: CrawlDomain::Subtree,
            link_filter: LinkFilter::Hyperlinks,
            max_depth: 5,
            depth_first: true,
            synchronous: false,
            ignore_visited_links: true,
            params: DownloadParameters::default(),
        }
    }
}

impl CrawlConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_roots(mut self, roots: Vec<Url>) -> Self {
        self.roots = roots;
        self
    }

    #[must_use]
    pub fn with_root(mut self, root: Url) -> Self {
        self.roots.push(root);
        self
    }

    #[must_use]
    pub fn with_domain(mut self, domain: CrawlDomain) -> Self {
        self.domain = domain;
        self
    }

    #[must_use]
    pub fn with_link_filter(mut self, filter: LinkFilter) -> Self {
        self.link_filter = filter;
        self
    }

    /// Links at this depth are rejected as too deep; roots are depth 0.
    #[must_use]
    pub fn with_max_depth(mut self, depth: u32) -> Self {
        self.max_depth = depth;
        self
    }

    #[must_use]
    pub fn with_depth_first(mut self, depth_first: bool) -> Self {
        self.depth_first = depth_first;
        self
    }

    /// In synchronous mode the `run()` caller processes downloaded pages
    /// in strict priority order; workers only download.
    #[must_use]
    pub fn with_synchronous(mut self, synchronous: bool) -> Self {
        self.synchronous = synchronous;
        self
    }

    #[must_use]
    pub fn with_ignore_visited_links(mut self, ignore: bool) -> Self {
        self.ignore_visited_links = ignore;
        self
    }

    /// Default fetch policy for links without their own override.
    #[must_use]
    pub fn with_download_params(mut self, params: DownloadParameters) -> Self {
        self.params = params;
        self
    }

    #[must_use]
    pub fn roots(&self) -> &[Url] {
        &self.roots
    }

    #[must_use]
    pub fn params(&self) -> &DownloadParameters {
        &self.params
    }

    /// Whether `url` falls inside the configured crawl domain.
    #[must_use]
    pub fn in_domain(&self, url: &Url) -> bool {
        match self.domain {
            CrawlDomain::Web => true,
            CrawlDomain::Server => self.roots.iter().any(|r| {
                r.scheme() == url.scheme() && r.host() == url.host() && r.port() == url.port()
            }),
            CrawlDomain::Subtree => self.roots.iter().any(|r| {
                subtree_prefix(r).is_some_and(|prefix| url.as_str().starts_with(prefix.as_str()))
            }),
        }
    }
}

/// Directory a root URL lives in: `http://h/a/index.html` -> `http://h/a/`.
fn subtree_prefix(root: &Url) -> Option<Url> {
    root.join(".").ok()
}
