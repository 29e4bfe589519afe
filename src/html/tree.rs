//! Tree builder: token stream in, element tree + links + title out.
//!
//! An explicit stack of open elements drives construction instead of
//! recursion, because real-world HTML needs forced closure: `<li>` closes a
//! previous `<li>`, block tags close an open `<p>`, a new table cell closes
//! the previous one. The stack search for a closable element is bounded by
//! each rule's context set, so a nested list's `li` never reaches up and
//! closes an ancestor list's `li`.
//!
//! Elements live in an arena addressed by index; parent/child/sibling are
//! indices into it. Building is a pure function of the token stream and the
//! tag tables, so parsing the same tokens twice yields identical trees.

use log::debug;
use url::Url;

use super::region::Region;
use super::tags::{TagName, force_close_rule};
use super::tokenizer::{Attr, Tag, Token};

/// What kind of URL-bearing element a link came from. Doubles as the
/// vocabulary of the crawler's link-type filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum LinkKind {
    /// `a`, `area`, `link`, `frame`, `iframe`.
    Hyperlink,
    /// `img`, `embed`, `script src`.
    Media,
    /// `form action`.
    Form,
    /// Submit input or button, resolving to its enclosing form's action.
    FormButton,
}

/// Resolved URL capability on an element.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkInfo {
    pub kind: LinkKind,
    pub url: Url,
}

/// One node of the element arena.
#[derive(Debug, Clone)]
pub struct Element {
    pub name: TagName,
    /// Span from the start tag's first byte to the end tag's last (or the
    /// position the element was force-closed at).
    pub region: Region,
    pub attrs: Vec<Attr>,
    pub parent: Option<usize>,
    pub first_child: Option<usize>,
    pub next_sibling: Option<usize>,
    /// Present when the element resolves to a URL; a malformed URL leaves
    /// this `None` and the element degrades to a plain element.
    pub link: Option<LinkInfo>,
    /// Accumulated inner tagless text for text-saving tags (`a`, `title`,
    /// `button`, `option`).
    pub text: Option<String>,
}

impl Element {
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
            .map(|a| a.value.as_deref().unwrap_or(""))
    }
}

/// The parsed form of one page.
#[derive(Debug, Clone)]
pub struct Document {
    /// Element arena in preorder.
    pub elements: Vec<Element>,
    /// Indices of URL-bearing elements, in document order.
    pub links: Vec<usize>,
    /// Inner text of the first `<title>`, if any.
    pub title: Option<String>,
    /// Base URL after any `<base href>` rewriting.
    pub base: Url,
}

impl Document {
    /// Iterate root elements (those with no parent).
    pub fn roots(&self) -> impl Iterator<Item = usize> + '_ {
        self.elements
            .iter()
            .enumerate()
            .filter(|(_, e)| e.parent.is_none())
            .map(|(i, _)| i)
    }

    /// Iterate the direct children of an element.
    pub fn children(&self, idx: usize) -> ChildIter<'_> {
        ChildIter {
            doc: self,
            next: self.elements[idx].first_child,
        }
    }
}

pub struct ChildIter<'a> {
    doc: &'a Document,
    next: Option<usize>,
}

impl Iterator for ChildIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let cur = self.next?;
        self.next = self.doc.elements[cur].next_sibling;
        Some(cur)
    }
}

struct Builder {
    elements: Vec<Element>,
    links: Vec<usize>,
    /// Indices of currently-open elements, outermost first.
    stack: Vec<usize>,
    /// Last child appended to each element, parallel to `elements`.
    last_child: Vec<Option<usize>>,
    base: Url,
    title: Option<String>,
}

/// Build the element tree for one page.
///
/// `base` is the page's own URL (or a server-supplied base); `<base href>`
/// tags update it for elements parsed afterwards. This function cannot
/// fail: unmatched end tags are ignored and elements still open at EOF are
/// force-closed at `content_len`.
#[must_use]
pub fn build(tokens: &[Token], base: &Url, content_len: usize) -> Document {
    let mut b = Builder {
        elements: Vec::new(),
        links: Vec::new(),
        stack: Vec::new(),
        last_child: Vec::new(),
        base: base.clone(),
        title: None,
    };
    for token in tokens {
        match token {
            Token::Tag(tag) if tag.is_start => b.open(tag),
            Token::Tag(tag) => b.close_named(tag),
            Token::Text(run) => b.text(&run.text),
        }
    }
    // no dangling open elements
    b.close_down_to(0, content_len);
    debug!(
        target: "crawlkit::tree",
        "built {} elements, {} links", b.elements.len(), b.links.len()
    );
    Document {
        elements: b.elements,
        links: b.links,
        title: b.title,
        base: b.base,
    }
}

impl Builder {
    fn open(&mut self, tag: &Tag) {
        self.force_close(&tag.name, tag.region.start());

        if tag.name == TagName::Base
            && let Some(href) = tag.attr("href")
            && let Ok(new_base) = self.base.join(href)
        {
            // scoped to the remainder of the document
            self.base = new_base;
        }

        let link = self.resolve_link(tag);
        let idx = self.elements.len();
        let parent = self.stack.last().copied();
        self.elements.push(Element {
            name: tag.name.clone(),
            region: Region::new(tag.region.start(), tag.region.start()),
            attrs: tag.attrs.clone(),
            parent,
            first_child: None,
            next_sibling: None,
            link: link.clone(),
            text: tag.name.saves_text().then(String::new),
        });
        self.last_child.push(None);
        if let Some(p) = parent {
            match self.last_child[p] {
                Some(prev) => self.elements[prev].next_sibling = Some(idx),
                None => self.elements[p].first_child = Some(idx),
            }
            self.last_child[p] = Some(idx);
        }
        if link.is_some() {
            self.links.push(idx);
        }

        if tag.name.is_empty_element() || tag.self_closing {
            self.elements[idx].region.close_at(tag.region.end());
        } else {
            self.stack.push(idx);
        }
    }

    /// Apply the forced-closure rule for an incoming start tag, if any.
    ///
    /// Repeats until no closable element remains above the context: a new
    /// `tr` first closes the open `td`, then the previous `tr` underneath.
    fn force_close(&mut self, incoming: &TagName, at: usize) {
        let Some(rule) = force_close_rule(incoming) else {
            return;
        };
        loop {
            let mut closed = false;
            for pos in (0..self.stack.len()).rev() {
                let open = &self.elements[self.stack[pos]].name;
                if rule.closes.contains(open) {
                    self.close_down_to(pos, at);
                    closed = true;
                    break;
                }
                if rule.context.contains(open) {
                    return;
                }
            }
            if !closed {
                return;
            }
        }
    }

    /// Pop the stack down to and including `pos`, closing every popped
    /// element at `at`.
    fn close_down_to(&mut self, pos: usize, at: usize) {
        while self.stack.len() > pos {
            let idx = self.stack.pop().unwrap_or_default();
            self.seal(idx, at);
        }
    }

    fn seal(&mut self, idx: usize, at: usize) {
        self.elements[idx].region.close_at(at);
        if self.elements[idx].name == TagName::Title && self.title.is_none() {
            self.title = self.elements[idx].text.clone().map(|t| t.trim().to_string());
        }
    }

    /// An end tag pops to the matching open element by name; unmatched end
    /// tags are ignored.
    fn close_named(&mut self, tag: &Tag) {
        let Some(pos) = self
            .stack
            .iter()
            .rposition(|&idx| self.elements[idx].name == tag.name)
        else {
            return;
        };
        // elements implicitly closed above the match end where the end tag
        // begins; the matched element spans through it
        while self.stack.len() > pos + 1 {
            let idx = self.stack.pop().unwrap_or_default();
            self.seal(idx, tag.region.start());
        }
        if let Some(idx) = self.stack.pop() {
            self.seal(idx, tag.region.end());
        }
    }

    /// Tagless text accrues to the innermost open text-saving element.
    fn text(&mut self, text: &str) {
        let Some(&idx) = self
            .stack
            .iter()
            .rev()
            .find(|&&idx| self.elements[idx].name.saves_text())
        else {
            return;
        };
        let buf = self.elements[idx].text.get_or_insert_with(String::new);
        if !buf.is_empty() {
            buf.push(' ');
        }
        buf.push_str(text);
    }

    /// Resolve a URL-bearing tag to a `LinkInfo`. Buttons and submit inputs
    /// borrow the action URL of their nearest enclosing form. Malformed
    /// URLs degrade the element to a plain element, never fail the parse.
    fn resolve_link(&self, tag: &Tag) -> Option<LinkInfo> {
        let kind = match &tag.name {
            TagName::A | TagName::Area | TagName::Link | TagName::Frame | TagName::Iframe => {
                LinkKind::Hyperlink
            }
            TagName::Img | TagName::Embed | TagName::Script => LinkKind::Media,
            TagName::Form => LinkKind::Form,
            TagName::Button => LinkKind::FormButton,
            TagName::Input => {
                let ty = tag.attr("type").unwrap_or("");
                if ty.eq_ignore_ascii_case("submit") || ty.eq_ignore_ascii_case("image") {
                    LinkKind::FormButton
                } else {
                    return None;
                }
            }
            _ => return None,
        };
        if kind == LinkKind::FormButton {
            let form_url = self
                .stack
                .iter()
                .rev()
                .map(|&idx| &self.elements[idx])
                .find(|e| e.name == TagName::Form)
                .and_then(|e| e.link.as_ref())
                .map(|l| l.url.clone())?;
            return Some(LinkInfo {
                kind,
                url: form_url,
            });
        }
        let raw = tag.attr(tag.name.url_attribute()?)?;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        match self.base.join(trimmed) {
            Ok(url) => Some(LinkInfo { kind, url }),
            Err(e) => {
                debug!(target: "crawlkit::tree", "bad url {trimmed:?}: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html::tokenizer::tokenize;

    fn parse(input: &str) -> Document {
        let tokens = tokenize(input, true).unwrap();
        let base = Url::parse("http://example.com/dir/page.html").unwrap();
        build(&tokens, &base, input.len())
    }

    fn named<'d>(doc: &'d Document, name: &TagName) -> Vec<&'d Element> {
        doc.elements.iter().filter(|e| &e.name == name).collect()
    }

    #[test]
    fn forced_closure_makes_siblings() {
        let doc = parse("<ul><li>a<li>b</ul>");
        let lis = named(&doc, &TagName::Li);
        assert_eq!(lis.len(), 2);
        let ul = named(&doc, &TagName::Ul)[0];
        // both li are children of ul, second is sibling of first
        assert_eq!(lis[0].parent, Some(0));
        assert_eq!(lis[1].parent, Some(0));
        assert_eq!(doc.elements[1].next_sibling, Some(2));
        assert!(lis[0].region.end() <= lis[1].region.start());
        assert!(lis[1].region.end() <= ul.region.end());
    }

    #[test]
    fn nested_list_li_stays_nested() {
        let doc = parse("<ul><li>outer<ul><li>inner</ul></ul>");
        let lis = named(&doc, &TagName::Li);
        assert_eq!(lis.len(), 2);
        // inner li's parent is the inner ul, which is a child of outer li
        let inner_li = &doc.elements[3];
        assert_eq!(inner_li.name, TagName::Li);
        assert_eq!(inner_li.parent, Some(2));
        assert_eq!(doc.elements[2].parent, Some(1));
    }

    #[test]
    fn block_tag_closes_open_paragraph() {
        let doc = parse("<p>one<div>two</div>");
        let p = named(&doc, &TagName::P)[0];
        let div = named(&doc, &TagName::Div)[0];
        assert!(p.region.end() <= div.region.start());
        assert_eq!(div.parent, None);
    }

    #[test]
    fn empty_elements_close_immediately() {
        let doc = parse("<p>a<br>b</p>");
        let br = named(&doc, &TagName::Br)[0];
        assert!(!br.region.is_empty());
        assert_eq!(br.parent, Some(0));
        // p stays open across the br
        assert_eq!(doc.elements[0].region.end(), "<p>a<br>b</p>".len());
    }

    #[test]
    fn eof_force_closes_everything() {
        let input = "<html><body><p>dangling";
        let doc = parse(input);
        for e in &doc.elements {
            assert_eq!(e.region.end(), input.len(), "unclosed {}", e.name);
        }
    }

    #[test]
    fn links_resolve_against_base() {
        let doc = parse(r#"<a href="other.html">x</a><img src="/pic.png">"#);
        let urls: Vec<_> = doc
            .links
            .iter()
            .map(|&i| doc.elements[i].link.as_ref().unwrap())
            .collect();
        assert_eq!(urls.len(), 2);
        assert_eq!(urls[0].kind, LinkKind::Hyperlink);
        assert_eq!(urls[0].url.as_str(), "http://example.com/dir/other.html");
        assert_eq!(urls[1].kind, LinkKind::Media);
        assert_eq!(urls[1].url.as_str(), "http://example.com/pic.png");
    }

    #[test]
    fn base_tag_rebases_later_links_only() {
        let doc = parse(concat!(
            r#"<a href="a.html">1</a>"#,
            r#"<base href="http://cdn.example.net/assets/">"#,
            r#"<a href="b.html">2</a>"#,
        ));
        let urls: Vec<_> = doc
            .links
            .iter()
            .map(|&i| doc.elements[i].link.as_ref().unwrap().url.as_str())
            .collect();
        assert_eq!(urls[0], "http://example.com/dir/a.html");
        assert_eq!(urls[1], "http://cdn.example.net/assets/b.html");
        assert_eq!(doc.base.as_str(), "http://cdn.example.net/assets/");
    }

    #[test]
    fn malformed_url_degrades_to_plain_element() {
        let doc = parse(r#"<a href="http://">broken</a><a href="ok.html">fine</a>"#);
        assert_eq!(doc.links.len(), 1);
        let a = named(&doc, &TagName::A);
        assert!(a[0].link.is_none());
        // anchor text still accumulates on the degraded element
        assert_eq!(a[0].text.as_deref(), Some("broken"));
        assert!(a[1].link.is_some());
    }

    #[test]
    fn anchor_text_and_title() {
        let doc = parse("<title>My  Page</title><a href=x.html>read <b>this</b> now</a>");
        assert_eq!(doc.title.as_deref(), Some("My Page"));
        let a = named(&doc, &TagName::A)[0];
        assert_eq!(a.text.as_deref(), Some("read this now"));
    }

    #[test]
    fn form_and_buttons() {
        let doc = parse(concat!(
            r#"<form action="/search" method=get>"#,
            r#"<input type=text name=q>"#,
            r#"<input type=submit value=Go>"#,
            r#"</form>"#,
        ));
        let kinds: Vec<_> = doc
            .links
            .iter()
            .map(|&i| doc.elements[i].link.as_ref().unwrap().kind)
            .collect();
        assert_eq!(kinds, [LinkKind::Form, LinkKind::FormButton]);
        let button_url = &doc.elements[doc.links[1]].link.as_ref().unwrap().url;
        assert_eq!(button_url.as_str(), "http://example.com/search");
        // the text input is not a link
        assert!(named(&doc, &TagName::Input)[0].link.is_none());
    }

    #[test]
    fn table_cells_force_close() {
        let doc = parse("<table><tr><td>a<td>b<tr><td>c</table>");
        assert_eq!(named(&doc, &TagName::Td).len(), 3);
        assert_eq!(named(&doc, &TagName::Tr).len(), 2);
        let tds: Vec<_> = doc
            .elements
            .iter()
            .enumerate()
            .filter(|(_, e)| e.name == TagName::Td)
            .collect();
        // first two cells share the first row as parent
        assert_eq!(doc.elements[tds[0].0].parent, doc.elements[tds[1].0].parent);
        assert_ne!(doc.elements[tds[2].0].parent, doc.elements[tds[0].0].parent);
    }

    #[test]
    fn unmatched_end_tag_is_ignored() {
        let doc = parse("<p>a</b>b</p>");
        assert_eq!(named(&doc, &TagName::P).len(), 1);
        assert_eq!(doc.elements[0].region.end(), "<p>a</b>b</p>".len());
    }

    #[test]
    fn preorder_and_children_iteration() {
        let doc = parse("<div><p>a</p><p>b</p></div>");
        assert_eq!(doc.elements[0].name, TagName::Div);
        let kids: Vec<_> = doc.children(0).collect();
        assert_eq!(kids, [1, 2]);
        assert_eq!(doc.roots().collect::<Vec<_>>(), [0]);
    }

    #[test]
    fn idempotent_over_tokens() {
        let input = "<ul><li><a href=a.html>a<li><a href=b.html>b</ul>";
        let tokens = tokenize(input, true).unwrap();
        let base = Url::parse("http://example.com/").unwrap();
        let d1 = build(&tokens, &base, input.len());
        let d2 = build(&tokens, &base, input.len());
        assert_eq!(d1.elements.len(), d2.elements.len());
        assert_eq!(d1.links, d2.links);
        for (a, b) in d1.elements.iter().zip(&d2.elements) {
            assert_eq!(a.name, b.name);
            assert_eq!(a.parent, b.parent);
            assert_eq!((a.region.start(), a.region.end()), (b.region.start(), b.region.end()));
        }
    }
}
