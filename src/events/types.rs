//! Event type definitions for the crawl event system.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::LinkStatus;

/// A state change of one link, pushed to subscribers as it happens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkEvent {
    pub url: String,
    pub depth: u32,
    pub status: LinkStatus,
    /// Present only for `Error` events.
    pub cause: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Events emitted during the crawl process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CrawlEvent {
    /// The crawl transitioned to `Started`.
    Started {
        roots: Vec<String>,
        timestamp: DateTime<Utc>,
    },
    /// The crawl ran out of work or was stopped.
    Stopped {
        pages_visited: usize,
        timestamp: DateTime<Utc>,
    },
    /// All crawl state was reset.
    Cleared { timestamp: DateTime<Utc> },
    /// The crawl-level timeout elapsed. Terminal like `Stopped`, kept
    /// distinct purely for observability.
    TimedOut {
        pages_visited: usize,
        timestamp: DateTime<Utc>,
    },
    /// The crawl was paused with its queues intact.
    Paused { timestamp: DateTime<Utc> },
    /// One link changed state.
    Link(LinkEvent),
}

impl CrawlEvent {
    #[must_use]
    pub fn started(roots: Vec<String>) -> Self {
        Self::Started {
            roots,
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn stopped(pages_visited: usize) -> Self {
        Self::Stopped {
            pages_visited,
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn cleared() -> Self {
        Self::Cleared {
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn timed_out(pages_visited: usize) -> Self {
        Self::TimedOut {
            pages_visited,
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn paused() -> Self {
        Self::Paused {
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn link(url: &url::Url, depth: u32, status: LinkStatus) -> Self {
        Self::Link(LinkEvent {
            url: url.to_string(),
            depth,
            status,
            cause: None,
            timestamp: Utc::now(),
        })
    }

    #[must_use]
    pub fn link_error(url: &url::Url, depth: u32, cause: String) -> Self {
        Self::Link(LinkEvent {
            url: url.to_string(),
            depth,
            status: LinkStatus::Error,
            cause: Some(cause),
            timestamp: Utc::now(),
        })
    }
}
