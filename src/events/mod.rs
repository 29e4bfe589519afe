//! Observable crawl events: types, broadcast bus, and metrics.

pub mod bus;
pub mod metrics;
pub mod types;

pub use bus::{EventBus, EventBusError};
pub use metrics::{EventBusMetrics, MetricsSnapshot};
pub use types::{CrawlEvent, LinkEvent};
