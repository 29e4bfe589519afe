//! Fetch policy values.
//!
//! `DownloadParameters` is an immutable value: instances are shared as
//! process-wide defaults, so "changing" a field returns a new instance
//! rather than mutating the shared one.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Limits and policy for downloading one page (or a whole crawl, when used
/// as the crawler's default).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadParameters {
    max_threads: usize,
    /// Pages larger than this many kilobytes fail the fetch. `None` means
    /// unlimited.
    max_page_size_kb: Option<usize>,
    download_timeout: Duration,
    /// Whole-crawl deadline; `None` means the crawl runs to exhaustion.
    crawl_timeout: Option<Duration>,
    obey_robot_exclusion: bool,
    interactive: bool,
    use_caches: bool,
    /// Accepted MIME types; `None` accepts anything.
    accepted_mime_types: Option<Vec<String>>,
    user_agent: String,
}

impl Default for DownloadParameters {
    fn default() -> Self {
        Self {
            max_threads: 4,
            max_page_size_kb: Some(1024),
            download_timeout: Duration::from_secs(60),
            crawl_timeout: None,
            obey_robot_exclusion: false,
            interactive: false,
            use_caches: false,
            accepted_mime_types: None,
            user_agent: concat!("crawlkit/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl DownloadParameters {
    #[must_use]
    pub fn max_threads(&self) -> usize {
        self.max_threads
    }

    #[must_use]
    pub fn max_page_size_kb(&self) -> Option<usize> {
        self.max_page_size_kb
    }

    /// Size cap in bytes, if any.
    #[must_use]
    pub fn max_page_size_bytes(&self) -> Option<usize> {
        self.max_page_size_kb.map(|kb| kb * 1024)
    }

    #[must_use]
    pub fn download_timeout(&self) -> Duration {
        self.download_timeout
    }

    #[must_use]
    pub fn crawl_timeout(&self) -> Option<Duration> {
        self.crawl_timeout
    }

    #[must_use]
    pub fn obey_robot_exclusion(&self) -> bool {
        self.obey_robot_exclusion
    }

    #[must_use]
    pub fn interactive(&self) -> bool {
        self.interactive
    }

    #[must_use]
    pub fn use_caches(&self) -> bool {
        self.use_caches
    }

    #[must_use]
    pub fn accepted_mime_types(&self) -> Option<&[String]> {
        self.accepted_mime_types.as_deref()
    }

    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Whether a response content type passes the MIME gate.
    #[must_use]
    pub fn accepts_mime_type(&self, content_type: &str) -> bool {
        let Some(accepted) = &self.accepted_mime_types else {
            return true;
        };
        // compare the media type only, not charset parameters
        let media = content_type
            .split(';')
            .next()
            .unwrap_or(content_type)
            .trim();
        accepted.iter().any(|a| a.eq_ignore_ascii_case(media))
    }

    #[must_use]
    pub fn with_max_threads(mut self, n: usize) -> Self {
        self.max_threads = n;
        self
    }

    #[must_use]
    pub fn with_max_page_size_kb(mut self, kb: Option<usize>) -> Self {
        self.max_page_size_kb = kb;
        self
    }

    #[must_use]
    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_crawl_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.crawl_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_obey_robot_exclusion(mut self, obey: bool) -> Self {
        self.obey_robot_exclusion = obey;
        self
    }

    #[must_use]
    pub fn with_interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    #[must_use]
    pub fn with_use_caches(mut self, use_caches: bool) -> Self {
        self.use_caches = use_caches;
        self
    }

    #[must_use]
    pub fn with_accepted_mime_types(mut self, types: Option<Vec<String>>) -> Self {
        self.accepted_mime_types = types;
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }
}
