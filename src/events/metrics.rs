//! Lock-free counters for event bus activity.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Metrics for event bus operations using atomic counters.
#[derive(Debug, Clone, Default)]
pub struct EventBusMetrics {
    events_published: Arc<AtomicU64>,
    events_dropped: Arc<AtomicU64>,
    peak_subscribers: Arc<AtomicUsize>,
}

impl EventBusMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_published(&self) {
        self.events_published.fetch_add(1, Ordering::SeqCst);
    }

    pub fn increment_dropped(&self) {
        self.events_dropped.fetch_add(1, Ordering::SeqCst);
    }

    pub fn observe_subscribers(&self, count: usize) {
        let _ = self.peak_subscribers.fetch_max(count, Ordering::SeqCst);
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            events_published: self.events_published.load(Ordering::SeqCst),
            events_dropped: self.events_dropped.load(Ordering::SeqCst),
            peak_subscribers: self.peak_subscribers.load(Ordering::SeqCst),
        }
    }
}

/// A coherent point-in-time read of all counters.
#[derive(Debug, Clone, Copy)]
pub struct MetricsSnapshot {
    /// Events delivered to at least one subscriber.
    pub events_published: u64,
    /// Events published while nobody was listening.
    pub events_dropped: u64,
    pub peak_subscribers: usize,
}

impl MetricsSnapshot {
    #[must_use]
    pub fn total_events(&self) -> u64 {
        self.events_published + self.events_dropped
    }
}
