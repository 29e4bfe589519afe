//! Event bus behavior in isolation.

use std::time::Duration;

use crawlkit::events::{CrawlEvent, EventBus, EventBusError};
use crawlkit::LinkStatus;
use tokio::time::timeout;

#[tokio::test]
async fn test_bus_starts_with_no_subscribers() {
    let bus = EventBus::new(16);
    assert_eq!(bus.subscriber_count(), 0);
    assert!(!bus.has_subscribers());
}

#[tokio::test]
async fn test_publish_with_no_subscribers_is_counted_dropped() {
    let bus = EventBus::new(16);
    let result = bus.publish(CrawlEvent::cleared());
    assert!(matches!(result, Err(EventBusError::NoSubscribers)));
    let snapshot = bus.metrics().snapshot();
    assert_eq!(snapshot.events_published, 0);
    assert_eq!(snapshot.events_dropped, 1);
    assert_eq!(snapshot.total_events(), 1);
}

#[tokio::test]
async fn test_subscribe_and_receive() {
    let bus = EventBus::new(16);
    let mut receiver = bus.subscribe();
    assert_eq!(bus.subscriber_count(), 1);

    let url = url::Url::parse("http://example.com/a").unwrap();
    let delivered = bus
        .publish(CrawlEvent::link(&url, 2, LinkStatus::Queued))
        .unwrap();
    assert_eq!(delivered, 1);

    let received = timeout(Duration::from_millis(100), receiver.recv())
        .await
        .expect("no event arrived")
        .unwrap();
    match received {
        CrawlEvent::Link(link) => {
            assert_eq!(link.url, "http://example.com/a");
            assert_eq!(link.depth, 2);
            assert_eq!(link.status, LinkStatus::Queued);
            assert!(link.cause.is_none());
        }
        other => panic!("expected link event, got {other:?}"),
    }

    let snapshot = bus.metrics().snapshot();
    assert_eq!(snapshot.events_published, 1);
    assert_eq!(snapshot.peak_subscribers, 1);
}

#[tokio::test]
async fn test_shutdown_rejects_further_events() {
    let bus = EventBus::new(16);
    let mut receiver = bus.subscribe();
    bus.publish(CrawlEvent::cleared()).unwrap();
    bus.shutdown();
    assert!(bus.is_shutdown());
    assert!(matches!(
        bus.publish(CrawlEvent::cleared()),
        Err(EventBusError::ShutDown)
    ));
    // the pre-shutdown event is still readable
    assert!(receiver.try_recv().is_ok());
}

#[tokio::test]
async fn test_events_serialize_for_external_consumers() {
    let url = url::Url::parse("http://example.com/x").unwrap();
    let event = CrawlEvent::link_error(&url, 1, "http status 404".to_string());
    let json = serde_json::to_string(&event).unwrap();
    let back: CrawlEvent = serde_json::from_str(&json).unwrap();
    match back {
        CrawlEvent::Link(link) => {
            assert_eq!(link.status, LinkStatus::Error);
            assert_eq!(link.cause.as_deref(), Some("http status 404"));
        }
        other => panic!("expected link event, got {other:?}"),
    }
}
