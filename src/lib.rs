//! crawlkit: a concurrent crawling core with a permissive HTML parser.
//!
//! The engine schedules links through a priority queue, downloads them
//! with a bounded worker pool, parses whatever HTML comes back (however
//! broken), and expands the discovered links back into the queue. Crawls
//! are observed through a broadcast event bus and steered with pluggable
//! predicates, classifiers, and actions.
//!
//! ```no_run
//! use std::sync::Arc;
//! use crawlkit::{CrawlConfig, CrawlDomain, Crawler};
//!
//! # async fn demo() -> crawlkit::CrawlResult<()> {
//! let config = CrawlConfig::new()
//!     .with_root(url::Url::parse("https://example.com/docs/").unwrap())
//!     .with_domain(CrawlDomain::Subtree)
//!     .with_max_depth(3);
//! let crawler = Crawler::new(config);
//! crawler.set_action(Some(Arc::new(
//!     |page: &crawlkit::Page| -> crawlkit::CrawlResult<()> {
//!         println!("{}", page.url());
//!         Ok(())
//!     },
//! )));
//! let mut events = crawler.events().subscribe();
//! tokio::spawn(async move { while events.recv().await.is_ok() {} });
//! crawler.run().await
//! # }
//! ```

pub mod crawler;
pub mod error;
pub mod events;
pub mod fetch;
pub mod html;
pub mod model;
pub mod queue;

pub use crawler::{
    Action, Classifier, CrawlConfig, CrawlDomain, CrawlState, Crawler, LinkFilter, LinkPredicate,
    PagePredicate,
};
pub use error::{CrawlError, CrawlResult};
pub use events::{CrawlEvent, EventBus, LinkEvent};
pub use fetch::{FetchError, FetchResponse, Fetcher, HttpFetcher};
pub use html::{Document, Element, LinkKind, Region, TagName};
pub use model::{DownloadParameters, Link, LinkStatus, Page, PageMeta};
pub use queue::PriorityQueue;
