//! Crate-level error types.
//!
//! Nothing in the crawling core is fatal to the whole process: per-link
//! failures surface as `Error` link events and cost exactly one link,
//! malformed HTML degrades to a best-effort parse, and scheduler misuse
//! (running with no roots) is an empty crawl rather than an error.

use crate::fetch::FetchError;

/// Error type for crawl operations.
#[derive(Debug, thiserror::Error)]
pub enum CrawlError {
    /// A fetch failed (network, HTTP status, size cap, robots, timeout).
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// A classifier rejected or failed on a downloaded page.
    #[error("classifier error: {0}")]
    Classifier(String),

    /// A visit action failed on a downloaded page.
    #[error("visit action error: {0}")]
    Action(String),

    /// Other errors.
    #[error("crawl error: {0}")]
    Other(String),
}

impl From<anyhow::Error> for CrawlError {
    fn from(err: anyhow::Error) -> Self {
        // {:#} preserves the full context chain
        Self::Other(format!("{err:#}"))
    }
}

/// Convenience alias for Result with `CrawlError`.
pub type CrawlResult<T> = Result<T, CrawlError>;
