//! End-to-end scheduler tests over an in-memory site.

mod common;

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use common::{SiteFetcher, drain_events, urls_with_status};
use crawlkit::{
    Classifier, CrawlConfig, CrawlDomain, CrawlEvent, CrawlResult, CrawlState, Crawler,
    DownloadParameters, LinkStatus, Page,
};
use crawlkit::html::LabelValue;
use tokio::time::timeout;

fn config_for(root: &str) -> CrawlConfig {
    CrawlConfig::new()
        .with_root(url::Url::parse(root).unwrap())
        .with_domain(CrawlDomain::Server)
}

#[tokio::test]
async fn test_cycle_visited_once() {
    let fetcher = Arc::new(SiteFetcher::new(&[
        ("http://site.test/a", r#"<a href="/b">b</a>"#),
        ("http://site.test/b", r#"<a href="/a">back</a>"#),
    ]));
    let crawler = Crawler::with_fetcher(config_for("http://site.test/a"), fetcher.clone());
    let mut events = crawler.events().subscribe();

    crawler.run().await.unwrap();

    assert_eq!(crawler.state(), CrawlState::Stopped);
    assert_eq!(crawler.pages_visited(), 2);
    assert_eq!(fetcher.fetches(), 2);

    let events = drain_events(&mut events);
    let queued = urls_with_status(&events, LinkStatus::Queued);
    assert_eq!(queued.len(), 2);
    let revisits = urls_with_status(&events, LinkStatus::AlreadyVisited);
    assert_eq!(revisits, vec!["http://site.test/a".to_string()]);
}

#[tokio::test]
async fn test_fragment_does_not_defeat_dedup() {
    let fetcher = Arc::new(SiteFetcher::new(&[(
        "http://site.test/a",
        r#"<a href="/a#top">top</a><a href="/a#bottom">bottom</a>"#,
    )]));
    let crawler = Crawler::with_fetcher(config_for("http://site.test/a"), fetcher.clone());

    crawler.run().await.unwrap();

    // both fragment variants collapse onto the already-visited page
    assert_eq!(crawler.pages_visited(), 1);
    assert_eq!(fetcher.fetches(), 1);
}

#[tokio::test]
async fn test_depth_cutoff() {
    let fetcher = Arc::new(SiteFetcher::new(&[
        ("http://site.test/0", r#"<a href="/1">1</a>"#),
        ("http://site.test/1", r#"<a href="/2">2</a>"#),
        ("http://site.test/2", r#"<a href="/3">3</a>"#),
    ]));
    let config = config_for("http://site.test/0").with_max_depth(2);
    let crawler = Crawler::with_fetcher(config, fetcher.clone());
    let mut events = crawler.events().subscribe();

    crawler.run().await.unwrap();

    // depths 0 and 1 are visited; the link at depth 2 is rejected unfetched
    assert_eq!(crawler.pages_visited(), 2);
    assert_eq!(fetcher.fetches(), 2);
    let events = drain_events(&mut events);
    assert_eq!(
        urls_with_status(&events, LinkStatus::TooDeep),
        vec!["http://site.test/2".to_string()]
    );
}

#[tokio::test]
async fn test_no_roots_stops_immediately() {
    let crawler = Crawler::with_fetcher(CrawlConfig::new(), Arc::new(SiteFetcher::new(&[])));
    let mut events = crawler.events().subscribe();

    crawler.run().await.unwrap();

    assert_eq!(crawler.state(), CrawlState::Stopped);
    assert_eq!(crawler.pages_visited(), 0);
    let events = drain_events(&mut events);
    assert!(matches!(
        events.as_slice(),
        [CrawlEvent::Stopped {
            pages_visited: 0,
            ..
        }]
    ));
}

#[tokio::test]
async fn test_link_predicate_skips() {
    let fetcher = Arc::new(SiteFetcher::new(&[
        (
            "http://site.test/",
            r#"<a href="/keep">k</a><a href="/skip">s</a>"#,
        ),
        ("http://site.test/keep", "kept"),
        ("http://site.test/skip", "skipped"),
    ]));
    let crawler = Crawler::with_fetcher(config_for("http://site.test/"), fetcher.clone());
    crawler.set_link_predicate(Some(Arc::new(|link: &crawlkit::Link| {
        !link.url().path().starts_with("/skip")
    })));
    let mut events = crawler.events().subscribe();

    crawler.run().await.unwrap();

    assert_eq!(crawler.pages_visited(), 2);
    let events = drain_events(&mut events);
    assert_eq!(
        urls_with_status(&events, LinkStatus::Skipped),
        vec!["http://site.test/skip".to_string()]
    );
}

#[tokio::test]
async fn test_server_domain_rejects_other_hosts() {
    let fetcher = Arc::new(SiteFetcher::new(&[(
        "http://site.test/",
        r#"<a href="http://elsewhere.test/x">away</a>"#,
    )]));
    let crawler = Crawler::with_fetcher(config_for("http://site.test/"), fetcher.clone());
    let mut events = crawler.events().subscribe();

    crawler.run().await.unwrap();

    assert_eq!(crawler.pages_visited(), 1);
    let events = drain_events(&mut events);
    assert_eq!(
        urls_with_status(&events, LinkStatus::Skipped),
        vec!["http://elsewhere.test/x".to_string()]
    );
}

#[tokio::test]
async fn test_oversize_page_is_evicted_without_a_page() {
    let big = "x".repeat(4096);
    let fetcher = Arc::new(SiteFetcher::new(&[("http://site.test/big", big.as_str())]));
    let config = config_for("http://site.test/big").with_download_params(
        DownloadParameters::default().with_max_page_size_kb(Some(2)),
    );
    let crawler = Crawler::with_fetcher(config, fetcher);
    let mut events = crawler.events().subscribe();

    crawler.run().await.unwrap();

    assert_eq!(crawler.state(), CrawlState::Stopped);
    assert_eq!(crawler.pages_visited(), 0);
    let events = drain_events(&mut events);
    let errors: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            CrawlEvent::Link(l) if l.status == LinkStatus::Error => Some(l.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].cause.as_deref().unwrap().contains("2 KB"));
}

#[tokio::test]
async fn test_fetch_failure_costs_exactly_one_link() {
    let fetcher = Arc::new(SiteFetcher::new(&[(
        "http://site.test/",
        r#"<a href="/missing">gone</a><a href="/also-missing">gone</a>"#,
    )]));
    let crawler = Crawler::with_fetcher(config_for("http://site.test/"), fetcher);
    let mut events = crawler.events().subscribe();

    crawler.run().await.unwrap();

    assert_eq!(crawler.state(), CrawlState::Stopped);
    assert_eq!(crawler.pages_visited(), 1);
    let events = drain_events(&mut events);
    let errors = urls_with_status(&events, LinkStatus::Error);
    assert_eq!(errors.len(), 2);
}

#[tokio::test]
async fn test_pause_then_resume_finishes_the_site() {
    common::init_logging();
    let fetcher = Arc::new(
        SiteFetcher::new(&[
            ("http://site.test/1", r#"<a href="/2">n</a>"#),
            ("http://site.test/2", r#"<a href="/3">n</a>"#),
            ("http://site.test/3", r#"<a href="/4">n</a>"#),
            ("http://site.test/4", "end"),
        ])
        .with_default_delay(Duration::from_millis(50)),
    );
    let config = config_for("http://site.test/1")
        .with_download_params(DownloadParameters::default().with_max_threads(1));
    let crawler = Crawler::with_fetcher(config, fetcher);
    let mut events = crawler.events().subscribe();

    let runner = crawler.clone();
    let handle = tokio::spawn(async move { runner.run().await });

    // pause as soon as the first page has been processed
    loop {
        let event = timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("crawl made no progress")
            .unwrap();
        if matches!(event, CrawlEvent::Link(ref l) if l.status == LinkStatus::Visited) {
            break;
        }
    }
    crawler.pause();
    handle.await.unwrap().unwrap();
    assert!(crawler.pages_visited() < 4);

    crawler.run().await.unwrap();
    assert_eq!(crawler.state(), CrawlState::Stopped);
    assert_eq!(crawler.pages_visited(), 4);
}

#[tokio::test]
async fn test_stop_discards_remaining_work() {
    let fetcher = Arc::new(
        SiteFetcher::new(&[
            ("http://site.test/1", r#"<a href="/2">n</a>"#),
            ("http://site.test/2", r#"<a href="/3">n</a>"#),
            ("http://site.test/3", "end"),
        ])
        .with_default_delay(Duration::from_millis(50)),
    );
    let config = config_for("http://site.test/1")
        .with_download_params(DownloadParameters::default().with_max_threads(1));
    let crawler = Crawler::with_fetcher(config, fetcher);
    let mut events = crawler.events().subscribe();

    let runner = crawler.clone();
    let handle = tokio::spawn(async move { runner.run().await });
    loop {
        let event = timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("crawl made no progress")
            .unwrap();
        if matches!(event, CrawlEvent::Link(ref l) if l.status == LinkStatus::Visited) {
            break;
        }
    }
    crawler.stop().await;
    handle.await.unwrap().unwrap();

    assert_eq!(crawler.state(), CrawlState::Stopped);
    assert!(crawler.pages_visited() < 3);
}

#[tokio::test]
async fn test_crawl_timeout_transitions_to_timed_out() {
    let fetcher = Arc::new(
        SiteFetcher::new(&[("http://site.test/", "slow")])
            .with_default_delay(Duration::from_secs(10)),
    );
    let params = DownloadParameters::default()
        .with_download_timeout(Duration::from_millis(200))
        .with_crawl_timeout(Some(Duration::from_millis(100)));
    let config = config_for("http://site.test/").with_download_params(params);
    let crawler = Crawler::with_fetcher(config, fetcher);
    let mut events = crawler.events().subscribe();

    crawler.run().await.unwrap();

    assert_eq!(crawler.state(), CrawlState::TimedOut);
    let events = drain_events(&mut events);
    assert!(
        events
            .iter()
            .any(|e| matches!(e, CrawlEvent::TimedOut { .. }))
    );
}

#[tokio::test]
async fn test_synchronous_mode_processes_in_priority_order() {
    // b and c finish downloading before a, but processing must still
    // follow document order because a has the better priority
    let fetcher = Arc::new(
        SiteFetcher::new(&[
            (
                "http://site.test/",
                r#"<a href="/a">a</a><a href="/b">b</a><a href="/c">c</a>"#,
            ),
            ("http://site.test/a", "a"),
            ("http://site.test/b", "b"),
            ("http://site.test/c", "c"),
        ])
        .with_delay("http://site.test/a", Duration::from_millis(80))
        .with_delay("http://site.test/b", Duration::from_millis(10))
        .with_delay("http://site.test/c", Duration::from_millis(40)),
    );
    let config = config_for("http://site.test/").with_synchronous(true);
    let crawler = Crawler::with_fetcher(config, fetcher);
    let mut events = crawler.events().subscribe();

    crawler.run().await.unwrap();

    let events = drain_events(&mut events);
    assert_eq!(
        urls_with_status(&events, LinkStatus::Visited),
        vec![
            "http://site.test/".to_string(),
            "http://site.test/a".to_string(),
            "http://site.test/b".to_string(),
            "http://site.test/c".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_robot_exclusion_blocks_disallowed_paths() {
    let fetcher = Arc::new(SiteFetcher::new(&[
        (
            "http://site.test/robots.txt",
            "User-agent: *\nDisallow: /private",
        ),
        (
            "http://site.test/",
            r#"<a href="/private/x">p</a><a href="/public/x">q</a>"#,
        ),
        ("http://site.test/private/x", "secret"),
        ("http://site.test/public/x", "open"),
    ]));
    let config = config_for("http://site.test/").with_download_params(
        DownloadParameters::default().with_obey_robot_exclusion(true),
    );
    let crawler = Crawler::with_fetcher(config, fetcher);
    let mut events = crawler.events().subscribe();

    crawler.run().await.unwrap();

    let events = drain_events(&mut events);
    assert_eq!(
        urls_with_status(&events, LinkStatus::Error),
        vec!["http://site.test/private/x".to_string()]
    );
    assert!(
        urls_with_status(&events, LinkStatus::Visited)
            .contains(&"http://site.test/public/x".to_string())
    );
}

#[tokio::test]
async fn test_classifiers_run_in_priority_order_before_the_action() {
    struct Tagger;
    impl Classifier for Tagger {
        fn classify(&self, page: &Page) -> CrawlResult<()> {
            page.set_label("stage", LabelValue::Str("tagged".into()));
            Ok(())
        }
        fn priority(&self) -> f64 {
            0.0
        }
    }

    struct Checker {
        seen: Arc<Mutex<Vec<String>>>,
    }
    impl Classifier for Checker {
        fn classify(&self, page: &Page) -> CrawlResult<()> {
            // runs after Tagger, so the label must already be present
            if let Some(LabelValue::Str(v)) = page.label("stage") {
                self.seen.lock().unwrap().push(v);
            }
            Ok(())
        }
        fn priority(&self) -> f64 {
            1.0
        }
    }

    let seen = Arc::new(Mutex::new(Vec::new()));
    let fetcher = Arc::new(SiteFetcher::new(&[("http://site.test/", "hello")]));
    let crawler = Crawler::with_fetcher(config_for("http://site.test/"), fetcher);
    // registered out of order on purpose
    crawler.add_classifier(Arc::new(Checker {
        seen: Arc::clone(&seen),
    }));
    crawler.add_classifier(Arc::new(Tagger));

    let visited = Arc::new(Mutex::new(Vec::new()));
    let visited_by_action = Arc::clone(&visited);
    crawler.set_action(Some(Arc::new(move |page: &Page| -> CrawlResult<()> {
        visited_by_action
            .lock()
            .unwrap()
            .push(page.url().to_string());
        Ok(())
    })));

    crawler.run().await.unwrap();

    assert_eq!(*seen.lock().unwrap(), vec!["tagged".to_string()]);
    assert_eq!(
        *visited.lock().unwrap(),
        vec!["http://site.test/".to_string()]
    );
}

#[tokio::test]
async fn test_clear_resets_everything() {
    let fetcher = Arc::new(SiteFetcher::new(&[(
        "http://site.test/",
        r#"<a href="/gone">x</a>"#,
    )]));
    let crawler = Crawler::with_fetcher(config_for("http://site.test/"), fetcher.clone());

    crawler.run().await.unwrap();
    assert_eq!(crawler.pages_visited(), 1);
    assert!(crawler.was_visited(&url::Url::parse("http://site.test/").unwrap()));

    crawler.clear().await;
    assert_eq!(crawler.state(), CrawlState::Cleared);
    assert_eq!(crawler.pages_visited(), 0);
    assert!(!crawler.was_visited(&url::Url::parse("http://site.test/").unwrap()));

    // a second run starts over from the roots
    crawler.run().await.unwrap();
    assert_eq!(crawler.pages_visited(), 1);
}

#[tokio::test]
async fn test_event_stream_brackets_the_crawl() {
    let fetcher = Arc::new(SiteFetcher::new(&[("http://site.test/", "hi")]));
    let crawler = Crawler::with_fetcher(config_for("http://site.test/"), fetcher);
    let mut events = crawler.events().subscribe();

    crawler.run().await.unwrap();

    let events = drain_events(&mut events);
    // roots are queued before the crawl is announced as started
    assert!(
        events
            .iter()
            .any(|e| matches!(e, CrawlEvent::Started { roots, .. } if roots.len() == 1))
    );
    assert!(matches!(
        events.last(),
        Some(CrawlEvent::Stopped {
            pages_visited: 1,
            ..
        })
    ));
}
