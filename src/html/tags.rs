//! Tag identity and the static tag tables driving the tree builder.
//!
//! Known tag names are an enum so comparisons are integer equality; anything
//! unrecognized falls back to [`TagName::Other`] with the case-folded
//! original string. The tables here encode real-world HTML repair rules:
//! which elements never have content, which start tags force an open
//! element closed first, which tags carry URLs, and which accumulate their
//! inner text.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Case-folded HTML tag name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TagName {
    A,
    Area,
    B,
    Base,
    Blockquote,
    Body,
    Br,
    Button,
    Col,
    Dd,
    Dir,
    Div,
    Dl,
    Dt,
    Em,
    Embed,
    Form,
    Frame,
    H1,
    H2,
    H3,
    H4,
    H5,
    H6,
    Head,
    Hr,
    Html,
    I,
    Iframe,
    Img,
    Input,
    Li,
    Link,
    Menu,
    Meta,
    Ol,
    Option,
    P,
    Param,
    Pre,
    Script,
    Select,
    Source,
    Span,
    Strong,
    Style,
    Table,
    Tbody,
    Td,
    Textarea,
    Tfoot,
    Th,
    Thead,
    Title,
    Tr,
    Track,
    Ul,
    Wbr,
    /// Comment / bang-directive pseudo-tag, spelled `!`.
    Bang,
    /// Any tag not in the known set, case-folded.
    Other(String),
}

impl TagName {
    /// Parse a raw tag name, folding ASCII case.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let lower = raw.to_ascii_lowercase();
        match lower.as_str() {
            "a" => Self::A,
            "area" => Self::Area,
            "b" => Self::B,
            "base" => Self::Base,
            "blockquote" => Self::Blockquote,
            "body" => Self::Body,
            "br" => Self::Br,
            "button" => Self::Button,
            "col" => Self::Col,
            "dd" => Self::Dd,
            "dir" => Self::Dir,
            "div" => Self::Div,
            "dl" => Self::Dl,
            "dt" => Self::Dt,
            "em" => Self::Em,
            "embed" => Self::Embed,
            "form" => Self::Form,
            "frame" => Self::Frame,
            "h1" => Self::H1,
            "h2" => Self::H2,
            "h3" => Self::H3,
            "h4" => Self::H4,
            "h5" => Self::H5,
            "h6" => Self::H6,
            "head" => Self::Head,
            "hr" => Self::Hr,
            "html" => Self::Html,
            "i" => Self::I,
            "iframe" => Self::Iframe,
            "img" => Self::Img,
            "input" => Self::Input,
            "li" => Self::Li,
            "link" => Self::Link,
            "menu" => Self::Menu,
            "meta" => Self::Meta,
            "ol" => Self::Ol,
            "option" => Self::Option,
            "p" => Self::P,
            "param" => Self::Param,
            "pre" => Self::Pre,
            "script" => Self::Script,
            "select" => Self::Select,
            "source" => Self::Source,
            "span" => Self::Span,
            "strong" => Self::Strong,
            "style" => Self::Style,
            "table" => Self::Table,
            "tbody" => Self::Tbody,
            "td" => Self::Td,
            "textarea" => Self::Textarea,
            "tfoot" => Self::Tfoot,
            "th" => Self::Th,
            "thead" => Self::Thead,
            "title" => Self::Title,
            "tr" => Self::Tr,
            "track" => Self::Track,
            "ul" => Self::Ul,
            "wbr" => Self::Wbr,
            "!" => Self::Bang,
            _ => Self::Other(lower),
        }
    }

    /// Canonical lowercase spelling.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::A => "a",
            Self::Area => "area",
            Self::B => "b",
            Self::Base => "base",
            Self::Blockquote => "blockquote",
            Self::Body => "body",
            Self::Br => "br",
            Self::Button => "button",
            Self::Col => "col",
            Self::Dd => "dd",
            Self::Dir => "dir",
            Self::Div => "div",
            Self::Dl => "dl",
            Self::Dt => "dt",
            Self::Em => "em",
            Self::Embed => "embed",
            Self::Form => "form",
            Self::Frame => "frame",
            Self::H1 => "h1",
            Self::H2 => "h2",
            Self::H3 => "h3",
            Self::H4 => "h4",
            Self::H5 => "h5",
            Self::H6 => "h6",
            Self::Head => "head",
            Self::Hr => "hr",
            Self::Html => "html",
            Self::I => "i",
            Self::Iframe => "iframe",
            Self::Img => "img",
            Self::Input => "input",
            Self::Li => "li",
            Self::Link => "link",
            Self::Menu => "menu",
            Self::Meta => "meta",
            Self::Ol => "ol",
            Self::Option => "option",
            Self::P => "p",
            Self::Param => "param",
            Self::Pre => "pre",
            Self::Script => "script",
            Self::Select => "select",
            Self::Source => "source",
            Self::Span => "span",
            Self::Strong => "strong",
            Self::Style => "style",
            Self::Table => "table",
            Self::Tbody => "tbody",
            Self::Td => "td",
            Self::Textarea => "textarea",
            Self::Tfoot => "tfoot",
            Self::Th => "th",
            Self::Thead => "thead",
            Self::Title => "title",
            Self::Tr => "tr",
            Self::Track => "track",
            Self::Ul => "ul",
            Self::Wbr => "wbr",
            Self::Bang => "!",
            Self::Other(s) => s.as_str(),
        }
    }

    /// Elements that never have content; their start tag closes immediately.
    #[must_use]
    pub fn is_empty_element(&self) -> bool {
        matches!(
            self,
            Self::Area
                | Self::Base
                | Self::Br
                | Self::Col
                | Self::Embed
                | Self::Frame
                | Self::Hr
                | Self::Img
                | Self::Input
                | Self::Link
                | Self::Meta
                | Self::Param
                | Self::Source
                | Self::Track
                | Self::Wbr
                | Self::Bang
        )
    }

    /// Tags whose raw content is not tokenized; scanning resumes at the
    /// matching close tag.
    #[must_use]
    pub fn is_raw_text(&self) -> bool {
        matches!(self, Self::Script | Self::Style | Self::Textarea)
    }

    /// Block-level tags, every one of which forces an open `p` closed.
    #[must_use]
    pub fn is_block(&self) -> bool {
        matches!(
            self,
            Self::Blockquote
                | Self::Div
                | Self::Dl
                | Self::Form
                | Self::H1
                | Self::H2
                | Self::H3
                | Self::H4
                | Self::H5
                | Self::H6
                | Self::Hr
                | Self::Menu
                | Self::Ol
                | Self::P
                | Self::Pre
                | Self::Table
                | Self::Ul
                | Self::Dir
        )
    }

    /// Tags whose inner tagless text is accumulated onto the element.
    #[must_use]
    pub fn saves_text(&self) -> bool {
        matches!(self, Self::A | Self::Title | Self::Button | Self::Option)
    }

    /// Attribute carrying this tag's URL, if the tag bears links.
    #[must_use]
    pub fn url_attribute(&self) -> Option<&'static str> {
        match self {
            Self::A | Self::Area | Self::Link => Some("href"),
            Self::Img | Self::Frame | Self::Iframe | Self::Script | Self::Embed => Some("src"),
            Self::Form => Some("action"),
            _ => None,
        }
    }
}

impl fmt::Display for TagName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A forced-closure rule: a start tag of the keyed kind closes the nearest
/// open element in `closes`, but only if it is found before any element in
/// `context` while walking up the open-element stack. The context bound is
/// what keeps a nested list's `li` from closing an ancestor list's `li`.
pub struct ForceClose {
    pub closes: &'static [TagName],
    pub context: &'static [TagName],
}

/// Forced-closure rule for a start tag, if it has one.
#[must_use]
pub fn force_close_rule(tag: &TagName) -> Option<ForceClose> {
    use TagName as T;
    const LI: ForceClose = ForceClose {
        closes: &[T::Li],
        context: &[T::Ol, T::Ul, T::Menu, T::Dir],
    };
    const DEF: ForceClose = ForceClose {
        closes: &[T::Dt, T::Dd],
        context: &[T::Dl],
    };
    const ROW: ForceClose = ForceClose {
        closes: &[T::Tr, T::Td, T::Th],
        context: &[T::Table, T::Thead, T::Tbody, T::Tfoot],
    };
    const CELL: ForceClose = ForceClose {
        closes: &[T::Td, T::Th],
        context: &[T::Tr, T::Table],
    };
    const OPT: ForceClose = ForceClose {
        closes: &[T::Option],
        context: &[T::Select],
    };
    const PARA: ForceClose = ForceClose {
        closes: &[T::P],
        context: &[T::Td, T::Th, T::Table, T::Body, T::Html],
    };
    match tag {
        T::Li => Some(LI),
        T::Dt | T::Dd => Some(DEF),
        T::Tr => Some(ROW),
        T::Td | T::Th => Some(CELL),
        T::Option => Some(OPT),
        t if t.is_block() => Some(PARA),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_folds_case() {
        assert_eq!(TagName::parse("IMG"), TagName::Img);
        assert_eq!(TagName::parse("TiTlE"), TagName::Title);
        assert_eq!(
            TagName::parse("CustomTag"),
            TagName::Other("customtag".into())
        );
    }

    #[test]
    fn empty_elements_are_flagged() {
        assert!(TagName::Br.is_empty_element());
        assert!(TagName::Meta.is_empty_element());
        assert!(!TagName::P.is_empty_element());
    }

    #[test]
    fn li_rule_is_context_bounded() {
        let rule = force_close_rule(&TagName::Li).unwrap();
        assert!(rule.closes.contains(&TagName::Li));
        assert!(rule.context.contains(&TagName::Ul));
        assert!(!rule.context.contains(&TagName::Li));
    }

    #[test]
    fn block_tags_close_paragraphs() {
        let rule = force_close_rule(&TagName::Div).unwrap();
        assert_eq!(rule.closes, &[TagName::P]);
        assert!(force_close_rule(&TagName::B).is_none());
    }

    #[test]
    fn url_attributes() {
        assert_eq!(TagName::A.url_attribute(), Some("href"));
        assert_eq!(TagName::Img.url_attribute(), Some("src"));
        assert_eq!(TagName::Form.url_attribute(), Some("action"));
        assert_eq!(TagName::P.url_attribute(), None);
    }
}
