//! Robot exclusion with a per-site rule cache.
//!
//! Rules are fetched once per site through the crawl's own fetcher and
//! cached for the life of the crawler. Failure to fetch or parse
//! `robots.txt` means "no rules" (the permissive default) and never
//! fails the fetch that asked.

use std::sync::Arc;

use dashmap::DashMap;
use log::debug;
use url::Url;

use super::Fetcher;
use crate::model::DownloadParameters;

/// Parsed rule set for one site.
#[derive(Debug, Default)]
struct RobotRules {
    /// Path prefixes disallowed for our user agent.
    disallow: Vec<String>,
}

impl RobotRules {
    /// Parse the subset of robots.txt that matters here: `User-agent`
    /// groups and their `Disallow` lines. `agent_token` is matched
    /// case-insensitively as a substring, `*` matches everyone.
    fn parse(body: &str, agent_token: &str) -> Self {
        let token = agent_token.to_ascii_lowercase();
        let mut rules = Self::default();
        let mut group_applies = false;
        let mut in_agent_lines = false;
        for line in body.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let Some((field, value)) = line.split_once(':') else {
                continue;
            };
            let field = field.trim().to_ascii_lowercase();
            let value = value.trim();
            match field.as_str() {
                "user-agent" => {
                    // a new block of agent lines resets applicability
                    if !in_agent_lines {
                        group_applies = false;
                    }
                    in_agent_lines = true;
                    let pattern = value.to_ascii_lowercase();
                    if pattern == "*" || token.contains(&pattern) {
                        group_applies = true;
                    }
                }
                "disallow" => {
                    in_agent_lines = false;
                    if group_applies && !value.is_empty() {
                        rules.disallow.push(value.to_string());
                    }
                }
                _ => {
                    in_agent_lines = false;
                }
            }
        }
        rules
    }

    fn disallows(&self, path: &str) -> bool {
        self.disallow.iter().any(|prefix| path.starts_with(prefix))
    }
}

/// Cached robot-exclusion checks, one rule set per site.
pub struct RobotExclusion {
    fetcher: Arc<dyn Fetcher>,
    params: DownloadParameters,
    cache: DashMap<String, Arc<RobotRules>>,
}

impl RobotExclusion {
    #[must_use]
    pub fn new(fetcher: Arc<dyn Fetcher>, params: DownloadParameters) -> Self {
        Self {
            fetcher,
            params,
            cache: DashMap::new(),
        }
    }

    /// Whether robots.txt forbids fetching `url` for our user agent.
    pub async fn disallowed(&self, url: &Url) -> bool {
        let Some(site) = site_key(url) else {
            return false;
        };
        let rules = match self.cache.get(&site) {
            Some(cached) => Arc::clone(&cached),
            None => {
                let fetched = Arc::new(self.fetch_rules(url).await);
                // a racing fetch of the same site wins harmlessly
                self.cache.entry(site).or_insert(fetched).clone()
            }
        };
        rules.disallows(url.path())
    }

    async fn fetch_rules(&self, url: &Url) -> RobotRules {
        let Ok(robots_url) = url.join("/robots.txt") else {
            return RobotRules::default();
        };
        match self.fetcher.fetch(&robots_url, &self.params).await {
            Ok(response) => {
                let agent = agent_token(self.params.user_agent());
                RobotRules::parse(&response.body, agent)
            }
            Err(e) => {
                debug!(target: "crawlkit::robots", "no rules for {robots_url}: {e}");
                RobotRules::default()
            }
        }
    }
}

fn site_key(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}://{host}:{port}", url.scheme()),
        None => format!("{}://{host}", url.scheme()),
    })
}

/// First product token of the user agent, e.g. `crawlkit` of
/// `crawlkit/0.3 (+http://...)`.
fn agent_token(user_agent: &str) -> &str {
    user_agent
        .split(['/', ' '])
        .next()
        .filter(|t| !t.is_empty())
        .unwrap_or(user_agent)
}
