//! Value objects of a crawl: links, pages, and fetch policy.

pub mod download_params;
pub mod link;
pub mod page;

pub use download_params::DownloadParameters;
pub use link::{Link, LinkStatus, de_anchor};
pub use page::{Page, PageMeta};
