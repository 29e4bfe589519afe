//! Pluggable crawl behavior: classifiers, predicates, and actions.
//!
//! All four traits are object-safe and shared as `Arc<dyn _>` so the same
//! instance can be consulted from every worker. Plain closures work as
//! predicates; richer implementations get `connected`/`disconnected`
//! lifecycle hooks when they are attached to or detached from a crawler.

use std::sync::Arc;

use crate::error::CrawlResult;
use crate::model::{Link, Page};

use super::Crawler;

/// Annotates pages (and their links) with labels right after download,
/// before any predicate or action sees them. Classifiers run in ascending
/// [`priority`](Classifier::priority) order so later ones can read labels
/// written by earlier ones.
pub trait Classifier: Send + Sync {
    /// Inspect the page and attach labels via `Page::set_label` /
    /// `Link::set_label`.
    ///
    /// # Errors
    /// An error evicts the link as a processing failure.
    fn classify(&self, page: &Page) -> CrawlResult<()>;

    /// Ordering key among classifiers; lower runs earlier.
    fn priority(&self) -> f64 {
        0.0
    }
}

/// Decides whether a discovered link should be followed.
pub trait LinkPredicate: Send + Sync {
    fn should_visit(&self, link: &Link) -> bool;

    /// Called when attached to a crawler.
    fn connected(&self, _crawler: &Crawler) {}

    /// Called when detached (replaced or removed).
    fn disconnected(&self, _crawler: &Crawler) {}
}

impl<F> LinkPredicate for F
where
    F: Fn(&Link) -> bool + Send + Sync,
{
    fn should_visit(&self, link: &Link) -> bool {
        self(link)
    }
}

/// Decides whether the crawl action runs on a downloaded page.
pub trait PagePredicate: Send + Sync {
    fn should_act_on(&self, page: &Page) -> bool;

    fn connected(&self, _crawler: &Crawler) {}

    fn disconnected(&self, _crawler: &Crawler) {}
}

impl<F> PagePredicate for F
where
    F: Fn(&Page) -> bool + Send + Sync,
{
    fn should_act_on(&self, page: &Page) -> bool {
        self(page)
    }
}

/// What the crawl does with a page that passed the page predicate.
pub trait Action: Send + Sync {
    /// # Errors
    /// An error evicts the link as a processing failure.
    fn visit(&self, page: &Page) -> CrawlResult<()>;

    fn connected(&self, _crawler: &Crawler) {}

    fn disconnected(&self, _crawler: &Crawler) {}
}

impl<F> Action for F
where
    F: Fn(&Page) -> CrawlResult<()> + Send + Sync,
{
    fn visit(&self, page: &Page) -> CrawlResult<()> {
        self(page)
    }
}

/// Both operands must accept the link.
pub fn link_and(a: Arc<dyn LinkPredicate>, b: Arc<dyn LinkPredicate>) -> Arc<dyn LinkPredicate> {
    struct And(Arc<dyn LinkPredicate>, Arc<dyn LinkPredicate>);
    impl LinkPredicate for And {
        fn should_visit(&self, link: &Link) -> bool {
            self.0.should_visit(link) && self.1.should_visit(link)
        }
        fn connected(&self, crawler: &Crawler) {
            self.0.connected(crawler);
            self.1.connected(crawler);
        }
        fn disconnected(&self, crawler: &Crawler) {
            self.0.disconnected(crawler);
            self.1.disconnected(crawler);
        }
    }
    Arc::new(And(a, b))
}

/// Either operand may accept the link.
pub fn link_or(a: Arc<dyn LinkPredicate>, b: Arc<dyn LinkPredicate>) -> Arc<dyn LinkPredicate> {
    struct Or(Arc<dyn LinkPredicate>, Arc<dyn LinkPredicate>);
    impl LinkPredicate for Or {
        fn should_visit(&self, link: &Link) -> bool {
            self.0.should_visit(link) || self.1.should_visit(link)
        }
        fn connected(&self, crawler: &Crawler) {
            self.0.connected(crawler);
            self.1.connected(crawler);
        }
        fn disconnected(&self, crawler: &Crawler) {
            self.0.disconnected(crawler);
            self.1.disconnected(crawler);
        }
    }
    Arc::new(Or(a, b))
}

/// Inverts a link predicate.
pub fn link_not(inner: Arc<dyn LinkPredicate>) -> Arc<dyn LinkPredicate> {
    struct Not(Arc<dyn LinkPredicate>);
    impl LinkPredicate for Not {
        fn should_visit(&self, link: &Link) -> bool {
            !self.0.should_visit(link)
        }
        fn connected(&self, crawler: &Crawler) {
            self.0.connected(crawler);
        }
        fn disconnected(&self, crawler: &Crawler) {
            self.0.disconnected(crawler);
        }
    }
    Arc::new(Not(inner))
}

/// Both operands must accept the page.
pub fn page_and(a: Arc<dyn PagePredicate>, b: Arc<dyn PagePredicate>) -> Arc<dyn PagePredicate> {
    struct And(Arc<dyn PagePredicate>, Arc<dyn PagePredicate>);
    impl PagePredicate for And {
        fn should_act_on(&self, page: &Page) -> bool {
            self.0.should_act_on(page) && self.1.should_act_on(page)
        }
        fn connected(&self, crawler: &Crawler) {
            self.0.connected(crawler);
            self.1.connected(crawler);
        }
        fn disconnected(&self, crawler: &Crawler) {
            self.0.disconnected(crawler);
            self.1.disconnected(crawler);
        }
    }
    Arc::new(And(a, b))
}

/// Either operand may accept the page.
pub fn page_or(a: Arc<dyn PagePredicate>, b: Arc<dyn PagePredicate>) -> Arc<dyn PagePredicate> {
    struct Or(Arc<dyn PagePredicate>, Arc<dyn PagePredicate>);
    impl PagePredicate for Or {
        fn should_act_on(&self, page: &Page) -> bool {
            self.0.should_act_on(page) || self.1.should_act_on(page)
        }
        fn connected(&self, crawler: &Crawler) {
            self.0.connected(crawler);
            self.1.connected(crawler);
        }
        fn disconnected(&self, crawler: &Crawler) {
            self.0.disconnected(crawler);
            self.1.disconnected(crawler);
        }
    }
    Arc::new(Or(a, b))
}

/// Inverts a page predicate.
pub fn page_not(inner: Arc<dyn PagePredicate>) -> Arc<dyn PagePredicate> {
    struct Not(Arc<dyn PagePredicate>);
    impl PagePredicate for Not {
        fn should_act_on(&self, page: &Page) -> bool {
            !self.0.should_act_on(page)
        }
        fn connected(&self, crawler: &Crawler) {
            self.0.connected(crawler);
        }
        fn disconnected(&self, crawler: &Crawler) {
            self.0.disconnected(crawler);
        }
    }
    Arc::new(Not(inner))
}
