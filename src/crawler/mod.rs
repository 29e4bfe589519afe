//! The crawl engine: scheduling, worker pool, and lifecycle.
//!
//! A [`Crawler`] is a cheap clone over shared state. [`Crawler::run`]
//! seeds the root links, spawns one worker task per configured thread, and
//! returns when the crawl stops, times out, or is paused. Pausing keeps
//! queues and the visited set intact, so calling `run` again resumes;
//! stopping discards the queues, and a later `run` starts over from the
//! roots.
//!
//! Two priority heaps sit behind a single lock: the fetch queue (links not
//! yet downloaded) and the crawl queue (every link still in flight, in
//! priority order). The second exists for synchronous mode, where the run
//! loop processes pages in strict priority order no matter which worker
//! finished downloading first.

pub mod config;
pub mod traits;

mod pipeline;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashSet;
use log::{debug, info, warn};
use parking_lot::RwLock;
use tokio::sync::{Mutex as AsyncMutex, Notify, watch};
use tokio::task::JoinSet;
use tokio::time::Instant;
use url::Url;

use crate::error::CrawlResult;
use crate::events::{CrawlEvent, EventBus};
use crate::fetch::robots::RobotExclusion;
use crate::fetch::{Fetcher, HttpFetcher};
use crate::model::{Link, LinkStatus};
use crate::queue::PriorityQueue;

pub use config::{CrawlConfig, CrawlDomain, LinkFilter};
pub use traits::{
    Action, Classifier, LinkPredicate, PagePredicate, link_and, link_not, link_or, page_and,
    page_not, page_or,
};

/// Lifecycle states of a crawl.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlState {
    /// Fresh, or reset by [`Crawler::clear`].
    Cleared,
    /// Workers are running.
    Started,
    /// Suspended with queues and visited set intact.
    Paused,
    /// Finished or stopped; queues discarded.
    Stopped,
    /// The crawl-level timeout elapsed; queues discarded.
    TimedOut,
}

/// Both heaps plus the in-flight count, guarded together so a priority
/// snapshot is always coherent across them.
struct Scheduler {
    /// Links accepted but not yet downloaded.
    fetch: PriorityQueue<Arc<Link>>,
    /// Every accepted link not yet processed or evicted, in priority order.
    crawl: PriorityQueue<Arc<Link>>,
    /// Accepted links not yet processed or evicted. Zero means done.
    pages_left: usize,
}

struct Inner {
    config: CrawlConfig,
    fetcher: Arc<dyn Fetcher>,
    robots: RobotExclusion,
    bus: EventBus,
    state: watch::Sender<CrawlState>,
    visited: DashSet<String>,
    sched: AsyncMutex<Scheduler>,
    /// Wakes workers: new fetchable work or a state change.
    work: Notify,
    /// Wakes the run loop: a link completed, downloaded (sync mode), or a
    /// state change.
    progress: Notify,
    classifiers: RwLock<Vec<Arc<dyn Classifier>>>,
    link_predicate: RwLock<Option<Arc<dyn LinkPredicate>>>,
    page_predicate: RwLock<Option<Arc<dyn PagePredicate>>>,
    action: RwLock<Option<Arc<dyn Action>>>,
    pages_visited: AtomicUsize,
    /// Counts processed pages; drives expansion priorities.
    expansion_rank: AtomicUsize,
}

/// A shareable handle to one crawl. All clones observe the same state.
#[derive(Clone)]
pub struct Crawler {
    inner: Arc<Inner>,
}

impl Crawler {
    /// A crawler downloading over HTTP with the default fetcher.
    #[must_use]
    pub fn new(config: CrawlConfig) -> Self {
        Self::with_fetcher(config, Arc::new(HttpFetcher::new()))
    }

    /// A crawler downloading through a caller-supplied fetcher. Robot
    /// exclusion checks go through the same fetcher.
    #[must_use]
    pub fn with_fetcher(config: CrawlConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        let robots = RobotExclusion::new(Arc::clone(&fetcher), config.params.clone());
        let (state, _) = watch::channel(CrawlState::Cleared);
        Self {
            inner: Arc::new(Inner {
                config,
                fetcher,
                robots,
                bus: EventBus::default(),
                state,
                visited: DashSet::new(),
                sched: AsyncMutex::new(Scheduler {
                    fetch: PriorityQueue::new(),
                    crawl: PriorityQueue::new(),
                    pages_left: 0,
                }),
                work: Notify::new(),
                progress: Notify::new(),
                classifiers: RwLock::new(Vec::new()),
                link_predicate: RwLock::new(None),
                page_predicate: RwLock::new(None),
                action: RwLock::new(None),
                pages_visited: AtomicUsize::new(0),
                expansion_rank: AtomicUsize::new(0),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &CrawlConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn state(&self) -> CrawlState {
        *self.inner.state.borrow()
    }

    /// Watch lifecycle transitions without polling.
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<CrawlState> {
        self.inner.state.subscribe()
    }

    /// The event bus; subscribe before `run` to observe the whole crawl.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.inner.bus
    }

    /// Pages fully processed so far.
    #[must_use]
    pub fn pages_visited(&self) -> usize {
        self.inner.pages_visited.load(Ordering::SeqCst)
    }

    /// Whether a URL (fragment ignored) has been submitted this crawl.
    #[must_use]
    pub fn was_visited(&self, url: &Url) -> bool {
        self.inner.visited.contains(&crate::model::de_anchor(url))
    }

    /// Register a classifier; classifiers run in ascending priority order.
    pub fn add_classifier(&self, classifier: Arc<dyn Classifier>) {
        let mut classifiers = self.inner.classifiers.write();
        classifiers.push(classifier);
        classifiers.sort_by(|a, b| {
            a.priority()
                .partial_cmp(&b.priority())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }

    pub fn clear_classifiers(&self) {
        self.inner.classifiers.write().clear();
    }

    /// Install (or remove, with `None`) the link predicate, firing the
    /// lifecycle hooks on the old and new predicate.
    pub fn set_link_predicate(&self, predicate: Option<Arc<dyn LinkPredicate>>) {
        let old = self.inner.link_predicate.write().take();
        if let Some(old) = old {
            old.disconnected(self);
        }
        if let Some(new) = &predicate {
            new.connected(self);
        }
        *self.inner.link_predicate.write() = predicate;
    }

    pub fn set_page_predicate(&self, predicate: Option<Arc<dyn PagePredicate>>) {
        let old = self.inner.page_predicate.write().take();
        if let Some(old) = old {
            old.disconnected(self);
        }
        if let Some(new) = &predicate {
            new.connected(self);
        }
        *self.inner.page_predicate.write() = predicate;
    }

    pub fn set_action(&self, action: Option<Arc<dyn Action>>) {
        let old = self.inner.action.write().take();
        if let Some(old) = old {
            old.disconnected(self);
        }
        if let Some(new) = &action {
            new.connected(self);
        }
        *self.inner.action.write() = action;
    }

    /// Run the crawl to completion, timeout, or pause.
    ///
    /// From `Cleared`, roots are submitted with ascending priorities; with
    /// no roots the crawl stops immediately. From `Stopped`/`TimedOut` the
    /// crawler clears first and starts over. From `Paused` it resumes with
    /// queues intact.
    ///
    /// # Errors
    /// Currently infallible; the `Result` reserves room for startup
    /// failures. Per-link failures surface as `Error` link events.
    pub async fn run(&self) -> CrawlResult<()> {
        match self.state() {
            CrawlState::Started => return Ok(()),
            CrawlState::Stopped | CrawlState::TimedOut => self.clear().await,
            CrawlState::Cleared | CrawlState::Paused => {}
        }

        if self.state() == CrawlState::Cleared {
            if self.inner.config.roots.is_empty() {
                self.transition(CrawlState::Stopped);
                self.publish(CrawlEvent::stopped(0));
                return Ok(());
            }
            for (rank, root) in self.inner.config.roots.iter().enumerate() {
                let link = Arc::new(Link::new(root.clone()));
                link.set_priority(rank as f64);
                self.submit(link).await;
            }
        }

        self.transition(CrawlState::Started);
        let roots = self
            .inner
            .config
            .roots
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        info!(target: "crawlkit::crawl", "crawl started with {} root(s)", roots.len());
        self.publish(CrawlEvent::started(roots));

        let worker_count = self.inner.config.params.max_threads().max(1);
        let mut workers = JoinSet::new();
        for id in 0..worker_count {
            let crawler = self.clone();
            workers.spawn(async move { crawler.worker_loop(id).await });
        }

        let deadline = self
            .inner
            .config
            .params
            .crawl_timeout()
            .map(|t| Instant::now() + t);
        if self.inner.config.synchronous {
            self.coordinate_sync(deadline).await;
        } else {
            self.wait_async(deadline).await;
        }

        // wake any parked worker so it can observe the final state
        self.inner.work.notify_waiters();
        while workers.join_next().await.is_some() {}
        Ok(())
    }

    /// Suspend the crawl. Queues and the visited set stay intact; links
    /// being downloaded are returned to the fetch queue. `run` returns
    /// once the workers have wound down; call it again to resume.
    pub fn pause(&self) {
        if self.state() != CrawlState::Started {
            return;
        }
        info!(target: "crawlkit::crawl", "crawl paused");
        self.transition(CrawlState::Paused);
        self.publish(CrawlEvent::paused());
    }

    /// Stop the crawl and discard its queues. The visited set survives
    /// until [`clear`](Self::clear).
    pub async fn stop(&self) {
        if !matches!(self.state(), CrawlState::Started | CrawlState::Paused) {
            return;
        }
        self.discard_queues().await;
        info!(
            target: "crawlkit::crawl",
            "crawl stopped after {} page(s)",
            self.pages_visited()
        );
        self.transition(CrawlState::Stopped);
        self.publish(CrawlEvent::stopped(self.pages_visited()));
    }

    /// Reset all crawl state: queues, visited set, and counters.
    pub async fn clear(&self) {
        self.discard_queues().await;
        self.inner.visited.clear();
        self.inner.pages_visited.store(0, Ordering::SeqCst);
        self.inner.expansion_rank.store(0, Ordering::SeqCst);
        self.transition(CrawlState::Cleared);
        self.publish(CrawlEvent::cleared());
    }

    fn transition(&self, state: CrawlState) {
        self.inner.state.send_replace(state);
        self.inner.work.notify_waiters();
        self.inner.progress.notify_waiters();
    }

    /// Publishing is best-effort; an unobserved crawl runs the same.
    fn publish(&self, event: CrawlEvent) {
        let _ = self.inner.bus.publish(event);
    }

    fn publish_link(&self, link: &Link, status: LinkStatus) {
        self.publish(CrawlEvent::link(link.url(), link.depth(), status));
    }

    async fn discard_queues(&self) {
        let mut sched = self.inner.sched.lock().await;
        sched.fetch.clear();
        sched.crawl.clear();
        sched.pages_left = 0;
    }

    /// Async mode: wait for exhaustion, timeout, or an external transition.
    async fn wait_async(&self, deadline: Option<Instant>) {
        loop {
            let notified = self.inner.progress.notified();
            if self.state() != CrawlState::Started {
                return;
            }
            if self.inner.sched.lock().await.pages_left == 0 {
                self.finish_stopped();
                return;
            }
            if !self.wait_progress(notified, deadline).await {
                return;
            }
        }
    }

    /// Synchronous mode: this loop is the only caller of `process`, and it
    /// takes downloaded links strictly in priority order.
    async fn coordinate_sync(&self, deadline: Option<Instant>) {
        loop {
            let notified = self.inner.progress.notified();
            if self.state() != CrawlState::Started {
                return;
            }
            let next = {
                let mut sched = self.inner.sched.lock().await;
                if sched.pages_left == 0 {
                    drop(sched);
                    self.finish_stopped();
                    return;
                }
                match sched.crawl.peek_min() {
                    Some((link, _)) if link.status() == LinkStatus::Downloaded => {
                        sched.crawl.delete_min().map(|(link, _)| link)
                    }
                    // the highest-priority link is still in flight; wait
                    _ => None,
                }
            };
            match next {
                Some(link) => {
                    if let Err(e) = self.process(&link).await {
                        self.evict_error(&link, &e.to_string()).await;
                    }
                }
                None => {
                    if !self.wait_progress(notified, deadline).await {
                        return;
                    }
                }
            }
        }
    }

    /// Await progress, honoring the crawl deadline. Returns `false` when
    /// the deadline fired and the crawl was timed out.
    async fn wait_progress(
        &self,
        notified: tokio::sync::futures::Notified<'_>,
        deadline: Option<Instant>,
    ) -> bool {
        match deadline {
            Some(deadline) => {
                if tokio::time::timeout_at(deadline, notified).await.is_err() {
                    self.finish_timed_out().await;
                    return false;
                }
                true
            }
            None => {
                notified.await;
                true
            }
        }
    }

    fn finish_stopped(&self) {
        info!(
            target: "crawlkit::crawl",
            "crawl finished after {} page(s)",
            self.pages_visited()
        );
        self.transition(CrawlState::Stopped);
        self.publish(CrawlEvent::stopped(self.pages_visited()));
    }

    async fn finish_timed_out(&self) {
        self.discard_queues().await;
        warn!(
            target: "crawlkit::crawl",
            "crawl timed out after {} page(s)",
            self.pages_visited()
        );
        self.transition(CrawlState::TimedOut);
        self.publish(CrawlEvent::timed_out(self.pages_visited()));
    }

    /// Submit a link for crawling. The visited set is the single admission
    /// gate: an atomic insert decides between acceptance and rejection, so
    /// two workers discovering the same URL cannot both enqueue it.
    ///
    /// Returns whether the link was accepted.
    pub async fn submit(&self, link: Arc<Link>) -> bool {
        let first_visit = self.inner.visited.insert(link.normalized_url().to_string());
        if !first_visit && self.inner.config.ignore_visited_links {
            link.set_status(LinkStatus::AlreadyVisited);
            self.publish_link(&link, LinkStatus::AlreadyVisited);
            return false;
        }
        link.set_status(LinkStatus::Queued);
        debug!(target: "crawlkit::links", "queued {} at depth {}", link.url(), link.depth());
        self.publish_link(&link, LinkStatus::Queued);
        let priority = link.priority();
        {
            let mut sched = self.inner.sched.lock().await;
            sched.fetch.put(Arc::clone(&link), priority);
            sched.crawl.put(link, priority);
            sched.pages_left += 1;
        }
        self.inner.work.notify_waiters();
        true
    }
}
