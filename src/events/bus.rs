//! Broadcast bus for crawl events.
//!
//! Listener-pattern observation without callbacks: subscribers hold a
//! `broadcast::Receiver` and drain it at their own pace. Publishing is
//! best-effort; a crawl with no observers runs exactly the same, the
//! events just count as dropped.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::broadcast;

use super::metrics::EventBusMetrics;
use super::types::CrawlEvent;

/// Error types for event bus operations.
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    /// No active subscribers when publishing.
    #[error("no active subscribers")]
    NoSubscribers,
    /// The bus was shut down.
    #[error("event bus is shut down")]
    ShutDown,
}

/// Event bus for publishing and subscribing to crawl events.
#[derive(Debug)]
pub struct EventBus {
    sender: broadcast::Sender<CrawlEvent>,
    metrics: EventBusMetrics,
    shutdown: AtomicBool,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber. Slow
    /// subscribers that fall further behind lose the oldest events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            metrics: EventBusMetrics::new(),
            shutdown: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CrawlEvent> {
        let receiver = self.sender.subscribe();
        self.metrics.observe_subscribers(self.sender.receiver_count());
        receiver
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    #[must_use]
    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }

    /// Stop accepting events. Already-buffered events stay readable by
    /// subscribers.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Publish an event, returning how many subscribers received it.
    ///
    /// # Errors
    /// `NoSubscribers` when nobody is listening; the event is dropped and
    /// counted, which is fine for an unobserved crawl. `ShutDown` after
    /// [`shutdown`](Self::shutdown).
    pub fn publish(&self, event: CrawlEvent) -> Result<usize, EventBusError> {
        if self.is_shutdown() {
            self.metrics.increment_dropped();
            return Err(EventBusError::ShutDown);
        }
        match self.sender.send(event) {
            Ok(received_by) => {
                self.metrics.increment_published();
                Ok(received_by)
            }
            Err(_) => {
                self.metrics.increment_dropped();
                Err(EventBusError::NoSubscribers)
            }
        }
    }

    #[must_use]
    pub fn metrics(&self) -> &EventBusMetrics {
        &self.metrics
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
