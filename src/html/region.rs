//! Offset-addressed regions of page content.
//!
//! A [`Region`] is the base addressing unit for everything the parser
//! produces: a `[start, end)` byte span into the owning page's content plus
//! a label map that classifiers and filters mutate after the fact. Offsets
//! are fixed at construction; only labels change later.

use std::collections::HashMap;
use std::ops::Range;

use serde::{Deserialize, Serialize};

/// A value attached to a region under a label name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LabelValue {
    /// A plain string label.
    Str(String),
    /// A sub-span of the same page's content.
    Span(Range<usize>),
    /// Several sub-spans, in document order.
    Spans(Vec<Range<usize>>),
}

/// An offset-addressed span of a page's content with a mutable label map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Region {
    start: usize,
    end: usize,
    labels: HashMap<String, LabelValue>,
}

impl Region {
    /// Create a region over `[start, end)`.
    ///
    /// # Panics
    /// Panics if `start > end`; spans are constructed by the tokenizer from
    /// monotonically advancing offsets, so an inverted span is a logic bug.
    #[must_use]
    pub fn new(start: usize, end: usize) -> Self {
        assert!(start <= end, "inverted region {start}..{end}");
        Self {
            start,
            end,
            labels: HashMap::new(),
        }
    }

    /// Seal the end offset. Used by the tree builder, which knows a span's
    /// start when the element opens but its end only at closure; offsets are
    /// immutable once the region is closed.
    pub(crate) fn close_at(&mut self, end: usize) {
        assert!(self.start <= end, "inverted region {}..{end}", self.start);
        self.end = end;
    }

    #[must_use]
    pub fn start(&self) -> usize {
        self.start
    }

    #[must_use]
    pub fn end(&self) -> usize {
        self.end
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Slice the owning page's content down to this region.
    ///
    /// Returns `None` when the span falls outside `content` or off a char
    /// boundary, which only happens if the region is paired with content it
    /// was not built from.
    #[must_use]
    pub fn text<'a>(&self, content: &'a str) -> Option<&'a str> {
        content.get(self.start..self.end)
    }

    /// Attach or replace a label.
    pub fn set_label(&mut self, name: impl Into<String>, value: LabelValue) {
        self.labels.insert(name.into(), value);
    }

    /// Attach a bare marker label with no payload.
    pub fn mark(&mut self, name: impl Into<String>) {
        self.labels
            .insert(name.into(), LabelValue::Str(String::new()));
    }

    #[must_use]
    pub fn label(&self, name: &str) -> Option<&LabelValue> {
        self.labels.get(name)
    }

    #[must_use]
    pub fn has_label(&self, name: &str) -> bool {
        self.labels.contains_key(name)
    }

    /// String payload of a label, if the label exists and is a string.
    #[must_use]
    pub fn label_str(&self, name: &str) -> Option<&str> {
        match self.labels.get(name) {
            Some(LabelValue::Str(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    #[must_use]
    pub fn labels(&self) -> &HashMap<String, LabelValue> {
        &self.labels
    }
}
