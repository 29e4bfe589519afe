//! Permissive HTML parsing: tokenizer, tree builder, and the span/label
//! model underneath them.
//!
//! The pipeline is `tokenize` (raw content to a flat tag/text stream) then
//! `build` (stream to an element arena with links and title extracted).
//! Neither stage can fail; malformed input degrades to a best-effort
//! result because web HTML is assumed dirty.

pub mod entities;
pub mod region;
pub mod tags;
pub mod tokenizer;
pub mod tree;

pub use region::{LabelValue, Region};
pub use tags::TagName;
pub use tokenizer::{Attr, Tag, TextRun, Token, tokenize};
pub use tree::{Document, Element, LinkInfo, LinkKind, build};

use url::Url;

/// Tokenize and build in one step.
///
/// Returns `None` when the content fails the non-HTML sniff (no tag in the
/// first 10k characters and no HTML content type); the page then stays
/// unparsed.
#[must_use]
pub fn parse(content: &str, base: &Url, declared_html: bool) -> Option<Document> {
    let tokens = tokenize(content, declared_html)?;
    Some(build(&tokens, base, content.len()))
}
