//! The per-link pipeline: download, classify, act, expand, evict.
//!
//! Workers pull the minimum-priority link from the fetch queue, download
//! it under the per-page timeout, and (in async mode) process it inline.
//! Timeouts cancel the fetch future and await its teardown; nothing is
//! killed mid-write. Every terminal outcome funnels through
//! [`Crawler::complete`], which keeps `pages_left` and the crawl queue in
//! step.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use log::{debug, warn};

use crate::error::{CrawlError, CrawlResult};
use crate::fetch::FetchError;
use crate::model::{Link, LinkStatus, Page};

use super::{Crawler, CrawlState};

impl Crawler {
    pub(super) async fn worker_loop(&self, id: usize) {
        debug!(target: "crawlkit::worker", "worker {id} up");
        loop {
            // arm the wakeup before checking state or the queue, so a
            // notify between the check and the await is not lost
            let notified = self.inner.work.notified();
            if self.state() != CrawlState::Started {
                break;
            }
            let next = { self.inner.sched.lock().await.fetch.delete_min() };
            match next {
                Some((link, _)) => self.fetch_one(link).await,
                None => notified.await,
            }
        }
        debug!(target: "crawlkit::worker", "worker {id} down");
    }

    /// Download one link and, in async mode, process it.
    async fn fetch_one(&self, link: Arc<Link>) {
        let params = link
            .params()
            .cloned()
            .unwrap_or_else(|| self.inner.config.params.clone());

        link.set_status(LinkStatus::Retrieving);
        self.publish_link(&link, LinkStatus::Retrieving);
        debug!(target: "crawlkit::worker", "retrieving {}", link.url());

        if params.obey_robot_exclusion() && self.inner.robots.disallowed(link.url()).await {
            self.evict_error(&link, &FetchError::RobotsDisallowed.to_string())
                .await;
            return;
        }

        let fetched = tokio::time::timeout(
            params.download_timeout(),
            self.inner.fetcher.fetch(link.url(), &params),
        )
        .await
        .unwrap_or(Err(FetchError::Timeout(params.download_timeout())));

        // the crawl may have been paused or stopped during the download
        match self.state() {
            CrawlState::Started => {}
            CrawlState::Paused => {
                self.requeue(link).await;
                return;
            }
            // stopping discarded the queues; drop the link silently
            _ => return,
        }

        match fetched {
            Err(e) => self.evict_error(&link, &e.to_string()).await,
            Ok(response) => {
                let meta = response.meta();
                let page = Arc::new(Page::new(
                    link.url().clone(),
                    link.depth(),
                    response.body,
                    meta,
                ));
                link.set_page(page);
                link.set_status(LinkStatus::Downloaded);
                self.publish_link(&link, LinkStatus::Downloaded);
                if self.inner.config.synchronous {
                    // hand off to the run loop, which processes in order
                    self.inner.progress.notify_waiters();
                } else if let Err(e) = self.process(&link).await {
                    self.evict_error(&link, &e.to_string()).await;
                }
            }
        }
    }

    /// Return an in-flight link to the fetch queue after a pause. It never
    /// left the crawl queue, so `pages_left` is untouched.
    async fn requeue(&self, link: Arc<Link>) {
        debug!(target: "crawlkit::worker", "requeueing {} after pause", link.url());
        link.set_status(LinkStatus::Queued);
        let priority = link.priority();
        self.inner.sched.lock().await.fetch.put(link, priority);
    }

    /// Run classifiers, the page action, and link expansion on a
    /// downloaded link, then mark it visited and evict its content.
    ///
    /// # Errors
    /// Classifier or action failures; the caller evicts the link.
    pub(super) async fn process(&self, link: &Arc<Link>) -> CrawlResult<()> {
        let page = link.page().ok_or_else(|| {
            CrawlError::Other(format!("{} has no downloaded page", link.url()))
        })?;

        let classifiers = self.inner.classifiers.read().clone();
        for classifier in &classifiers {
            classifier.classify(&page)?;
        }

        let should_act = {
            let predicate = self.inner.page_predicate.read().clone();
            predicate.is_none_or(|p| p.should_act_on(&page))
        };
        if should_act {
            let action = self.inner.action.read().clone();
            if let Some(action) = action {
                action.visit(&page)?;
            }
        }

        self.expand(&page).await;

        link.set_status(LinkStatus::Visited);
        self.publish_link(link, LinkStatus::Visited);
        self.inner.pages_visited.fetch_add(1, Ordering::SeqCst);
        debug!(target: "crawlkit::crawl", "visited {}", link.url());

        self.complete(link).await;
        link.discard_page();
        Ok(())
    }

    /// Consider every link discovered on a page for submission.
    ///
    /// Priorities come from a per-page base rank plus the link's position
    /// in the document, so depth-first crawls (decreasing base) serve the
    /// newest page's links first while breadth-first crawls (increasing
    /// base) serve older pages first. Rejections are checked in order:
    /// visited, kind/domain filter, predicate, depth.
    async fn expand(&self, page: &Page) {
        let rank = self.inner.expansion_rank.fetch_add(1, Ordering::SeqCst) + 1;
        let base = if self.inner.config.depth_first {
            -(rank as f64)
        } else {
            rank as f64
        };
        let count = page.links().len();
        let predicate = self.inner.link_predicate.read().clone();

        for (position, link) in page.links().iter().enumerate() {
            link.set_priority(base + position as f64 / (count as f64 + 1.0));

            if self.inner.config.ignore_visited_links
                && self.inner.visited.contains(link.normalized_url())
            {
                link.set_status(LinkStatus::AlreadyVisited);
                self.publish_link(link, LinkStatus::AlreadyVisited);
                continue;
            }
            if !self.inner.config.link_filter.accepts(link.kind())
                || !self.inner.config.in_domain(link.url())
            {
                link.set_status(LinkStatus::Skipped);
                self.publish_link(link, LinkStatus::Skipped);
                continue;
            }
            if let Some(predicate) = &predicate
                && !predicate.should_visit(link)
            {
                link.set_status(LinkStatus::Skipped);
                self.publish_link(link, LinkStatus::Skipped);
                continue;
            }
            if link.depth() >= self.inner.config.max_depth {
                link.set_status(LinkStatus::TooDeep);
                self.publish_link(link, LinkStatus::TooDeep);
                debug!(
                    target: "crawlkit::links",
                    "too deep at {}: {}", link.depth(), link.url()
                );
                continue;
            }
            self.submit(Arc::clone(link)).await;
        }
    }

    /// Evict a link that failed to download or process.
    pub(super) async fn evict_error(&self, link: &Arc<Link>, cause: &str) {
        warn!(target: "crawlkit::links", "evicting {}: {cause}", link.url());
        link.set_status(LinkStatus::Error);
        self.publish(crate::events::CrawlEvent::link_error(
            link.url(),
            link.depth(),
            cause.to_string(),
        ));
        self.complete(link).await;
        link.discard_page();
    }

    /// Account for a link leaving the crawl, successfully or not. Called
    /// exactly once per accepted link.
    async fn complete(&self, link: &Arc<Link>) {
        {
            let mut sched = self.inner.sched.lock().await;
            // absent when the sync run loop already popped it
            sched.crawl.delete(|l| Arc::ptr_eq(l, link));
            sched.pages_left = sched.pages_left.saturating_sub(1);
        }
        self.inner.progress.notify_waiters();
    }
}
