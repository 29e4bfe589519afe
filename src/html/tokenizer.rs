//! Character-level HTML tokenizer.
//!
//! A single forward pass over the content drives an explicit state machine
//! that emits a flat stream of [`Token`]s: tags with their attribute lists
//! and whitespace-separated text runs with entities decoded. Every token
//! carries its `[start, end)` byte span into the original content.
//!
//! The machine cannot fail. Malformed input degrades to a best-effort token
//! stream: an unterminated tag at EOF is dropped silently, a stray `<` in
//! prose is text, and unknown entities keep their `&`. Web HTML is assumed
//! dirty.

use log::trace;

use super::entities;
use super::region::Region;
use super::tags::TagName;

/// How far to scan before concluding that undeclared content is not HTML.
const HTML_SNIFF_LIMIT: usize = 10_000;

/// One HTML attribute: name plus optional value, in source order.
#[derive(Debug, Clone, PartialEq)]
pub struct Attr {
    pub name: String,
    pub value: Option<String>,
}

/// A start or end tag with its attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub region: Region,
    pub name: TagName,
    pub is_start: bool,
    /// XHTML-style `<br/>` spelling; the tree builder closes these on sight.
    pub self_closing: bool,
    pub attrs: Vec<Attr>,
}

impl Tag {
    /// Value of the named attribute, case-insensitively. Valueless
    /// attributes yield the empty string.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
            .map(|a| a.value.as_deref().unwrap_or(""))
    }
}

/// A run of non-whitespace text with entities decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub region: Region,
    pub text: String,
}

/// One unit of the flat token stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Tag(Tag),
    Text(TextRun),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    /// Between tokens, skipping whitespace.
    Start,
    /// Accumulating a text word.
    Word,
    /// Saw `&`; deciding numeric vs named.
    Entity,
    /// Inside `&#...`.
    EntityNumeric,
    /// Inside `&name...`.
    EntityNamed,
    /// Saw `<`; deciding tag kind.
    TagOpen,
    /// Saw `<!`; maybe a comment.
    Bang,
    /// Saw `<!-`.
    BangDash,
    /// Inside `<!-- ...`.
    Comment,
    /// Saw `-` inside a comment.
    CommentDash,
    /// Saw `--` inside a comment, awaiting `>`.
    CommentDashDash,
    /// Inside a non-comment `<!...>` directive.
    Directive,
    /// Reading a start tag name.
    StartTagName,
    /// Saw `</`; reading an end tag name.
    EndTagName,
    /// Skipping to `>` after an end tag name.
    EndTagRest,
    /// Inside a start tag, between attributes.
    InTag,
    /// Reading an attribute name.
    AttrName,
    /// After an attribute name, awaiting `=` or the next attribute.
    AfterAttrName,
    /// After `=`, awaiting the value.
    BeforeAttrValue,
    /// Inside a double-quoted value.
    AttrValueDq,
    /// Inside a single-quoted value.
    AttrValueSq,
    /// Inside an unquoted value.
    AttrValueUnq,
    /// Saw `/` inside a start tag.
    TagSlash,
}

struct Tokenizer<'a> {
    content: &'a str,
    chars: Vec<(usize, char)>,
    tokens: Vec<Token>,
    state: State,
    /// Start offset of the token being built.
    token_start: usize,
    /// Decoded text of the word being built.
    word: String,
    /// Raw accumulator for the entity being decoded.
    entity: String,
    /// State to return to after an entity resolves (always `Word` today).
    entity_return: State,
    /// Offset where the pending entity's `&` sits.
    entity_start: usize,
    // current tag under construction
    tag_name: String,
    tag_is_start: bool,
    tag_self_closing: bool,
    attrs: Vec<Attr>,
    attr_name: String,
    attr_value: String,
    saw_tag: bool,
}

/// Tokenize raw page content.
///
/// Returns `None` when the content shows no tag within the first
/// [`HTML_SNIFF_LIMIT`] characters and nothing declared it HTML; the page
/// is then treated as unparsed non-HTML and any collected tokens are
/// discarded.
#[must_use]
pub fn tokenize(content: &str, declared_html: bool) -> Option<Vec<Token>> {
    let mut t = Tokenizer {
        content,
        chars: content.char_indices().collect(),
        tokens: Vec::new(),
        state: State::Start,
        token_start: 0,
        word: String::new(),
        entity: String::new(),
        entity_return: State::Word,
        entity_start: 0,
        tag_name: String::new(),
        tag_is_start: true,
        tag_self_closing: false,
        attrs: Vec::new(),
        attr_name: String::new(),
        attr_value: String::new(),
        saw_tag: false,
    };
    if t.run(declared_html) {
        trace!(target: "crawlkit::tokenizer", "{} tokens from {} bytes", t.tokens.len(), content.len());
        Some(t.tokens)
    } else {
        None
    }
}

impl Tokenizer<'_> {
    /// Drive the machine to EOF. Returns false on the non-HTML early abort.
    fn run(&mut self, declared_html: bool) -> bool {
        let mut i = 0;
        while i < self.chars.len() {
            let (off, c) = self.chars[i];
            if !declared_html && !self.saw_tag && off >= HTML_SNIFF_LIMIT {
                return false;
            }
            match self.step(i, off, c) {
                Step::Next => i += 1,
                Step::Redo => {}
                Step::Jump(to) => i = to,
            }
        }
        self.finish();
        true
    }

    fn step(&mut self, i: usize, off: usize, c: char) -> Step {
        match self.state {
            State::Start => {
                if c == '<' {
                    self.token_start = off;
                    self.state = State::TagOpen;
                } else if !c.is_whitespace() {
                    self.token_start = off;
                    self.word.clear();
                    self.state = State::Word;
                    return Step::Redo;
                }
                Step::Next
            }
            State::Word => {
                if c == '<' || c.is_whitespace() {
                    self.flush_word(off);
                    self.state = State::Start;
                    return Step::Redo;
                }
                if c == '&' {
                    self.entity.clear();
                    self.entity_start = off;
                    self.entity_return = State::Word;
                    self.state = State::Entity;
                } else {
                    self.word.push(c);
                }
                Step::Next
            }
            State::Entity => {
                if c == '#' {
                    self.state = State::EntityNumeric;
                    Step::Next
                } else if c.is_ascii_alphanumeric() {
                    self.state = State::EntityNamed;
                    Step::Redo
                } else {
                    // bare ampersand, kept literally
                    self.word.push('&');
                    self.state = self.entity_return;
                    Step::Redo
                }
            }
            State::EntityNumeric => {
                if c == ';' {
                    match entities::numeric_entity(&self.entity) {
                        Some(decoded) => self.word.push(decoded),
                        None => {
                            self.push_entity_literally(true);
                            self.word.push(';');
                        }
                    }
                    self.entity.clear();
                    self.state = self.entity_return;
                    Step::Next
                } else if c.is_ascii_alphanumeric() && self.entity.len() < 8 {
                    self.entity.push(c);
                    Step::Next
                } else {
                    self.push_entity_literally(true);
                    self.entity.clear();
                    self.state = self.entity_return;
                    Step::Redo
                }
            }
            State::EntityNamed => {
                if c == ';' {
                    match entities::named_entity(&self.entity) {
                        Some(decoded) => self.word.push(decoded),
                        None => {
                            self.push_entity_literally(false);
                            self.word.push(';');
                        }
                    }
                    self.entity.clear();
                    self.state = self.entity_return;
                    Step::Next
                } else if c.is_ascii_alphanumeric() && self.entity.len() < 10 {
                    self.entity.push(c);
                    Step::Next
                } else {
                    self.push_entity_literally(false);
                    self.entity.clear();
                    self.state = self.entity_return;
                    Step::Redo
                }
            }
            State::TagOpen => {
                if c == '/' {
                    self.begin_tag(false);
                    self.state = State::EndTagName;
                    Step::Next
                } else if c == '!' || c == '?' {
                    self.begin_tag(true);
                    self.state = State::Bang;
                    Step::Next
                } else if c.is_ascii_alphabetic() {
                    self.begin_tag(true);
                    self.state = State::StartTagName;
                    Step::Redo
                } else {
                    // stray '<' in prose
                    self.word.clear();
                    self.word.push('<');
                    self.state = State::Word;
                    Step::Redo
                }
            }
            State::Bang => {
                if c == '-' {
                    self.state = State::BangDash;
                } else if c == '>' {
                    self.emit_bang(off + c.len_utf8());
                    self.state = State::Start;
                } else {
                    self.state = State::Directive;
                }
                Step::Next
            }
            State::BangDash => {
                self.state = if c == '-' {
                    State::Comment
                } else if c == '>' {
                    self.emit_bang(off + c.len_utf8());
                    State::Start
                } else {
                    State::Directive
                };
                Step::Next
            }
            State::Comment => {
                if c == '-' {
                    self.state = State::CommentDash;
                }
                Step::Next
            }
            State::CommentDash => {
                self.state = if c == '-' {
                    State::CommentDashDash
                } else {
                    State::Comment
                };
                Step::Next
            }
            State::CommentDashDash => {
                match c {
                    '>' => {
                        self.emit_bang(off + c.len_utf8());
                        self.state = State::Start;
                    }
                    '-' => {}
                    _ => self.state = State::Comment,
                }
                Step::Next
            }
            State::Directive => {
                if c == '>' {
                    self.emit_bang(off + c.len_utf8());
                    self.state = State::Start;
                }
                Step::Next
            }
            State::StartTagName => {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ':' {
                    self.tag_name.push(c);
                    Step::Next
                } else {
                    self.state = State::InTag;
                    Step::Redo
                }
            }
            State::EndTagName => {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ':' {
                    self.tag_name.push(c);
                    Step::Next
                } else {
                    self.state = State::EndTagRest;
                    Step::Redo
                }
            }
            State::EndTagRest => {
                if c == '>' {
                    self.emit_tag(off + c.len_utf8());
                    self.state = State::Start;
                }
                Step::Next
            }
            State::InTag => {
                if c == '>' {
                    let end = off + c.len_utf8();
                    self.emit_tag(end);
                    self.state = State::Start;
                    return self.maybe_skip_raw_text(i, end);
                }
                if c == '/' {
                    self.state = State::TagSlash;
                } else if !c.is_whitespace() {
                    self.attr_name.clear();
                    self.attr_value.clear();
                    self.state = State::AttrName;
                    return Step::Redo;
                }
                Step::Next
            }
            State::TagSlash => {
                if c == '>' {
                    self.tag_self_closing = true;
                    self.state = State::InTag;
                } else {
                    // stray slash, back to attribute scanning
                    self.state = State::InTag;
                }
                Step::Redo
            }
            State::AttrName => {
                if c == '=' || c == '>' || c == '/' || c.is_whitespace() {
                    self.state = State::AfterAttrName;
                    Step::Redo
                } else {
                    self.attr_name.push(c.to_ascii_lowercase());
                    Step::Next
                }
            }
            State::AfterAttrName => {
                if c == '=' {
                    self.state = State::BeforeAttrValue;
                    Step::Next
                } else if c.is_whitespace() {
                    Step::Next
                } else {
                    // valueless attribute
                    self.push_attr(false);
                    self.state = State::InTag;
                    Step::Redo
                }
            }
            State::BeforeAttrValue => {
                if c.is_whitespace() {
                    Step::Next
                } else if c == '"' {
                    self.state = State::AttrValueDq;
                    Step::Next
                } else if c == '\'' {
                    self.state = State::AttrValueSq;
                    Step::Next
                } else if c == '>' {
                    self.push_attr(false);
                    self.state = State::InTag;
                    Step::Redo
                } else {
                    self.state = State::AttrValueUnq;
                    Step::Redo
                }
            }
            State::AttrValueDq => {
                if c == '"' {
                    self.push_attr(true);
                    self.state = State::InTag;
                } else {
                    self.attr_value.push(c);
                }
                Step::Next
            }
            State::AttrValueSq => {
                if c == '\'' {
                    self.push_attr(true);
                    self.state = State::InTag;
                } else {
                    self.attr_value.push(c);
                }
                Step::Next
            }
            State::AttrValueUnq => {
                if c == '>' || c.is_whitespace() {
                    self.push_attr(true);
                    self.state = State::InTag;
                    Step::Redo
                } else {
                    self.attr_value.push(c);
                    Step::Next
                }
            }
        }
    }

    /// EOF handling: a pending text run is flushed; a partially-read tag or
    /// comment is truncated silently.
    fn finish(&mut self) {
        match self.state {
            State::Word => self.flush_word(self.content.len()),
            State::Entity | State::EntityNumeric | State::EntityNamed => {
                self.word.push('&');
                if self.state == State::EntityNumeric {
                    self.word.push('#');
                }
                self.word.push_str(&self.entity.clone());
                self.flush_word(self.content.len());
            }
            _ => {}
        }
    }

    fn begin_tag(&mut self, is_start: bool) {
        self.tag_name.clear();
        self.tag_is_start = is_start;
        self.tag_self_closing = false;
        self.attrs.clear();
    }

    fn push_attr(&mut self, with_value: bool) {
        if self.attr_name.is_empty() {
            return;
        }
        let value = with_value.then(|| entities::decode(&self.attr_value));
        self.attrs.push(Attr {
            name: std::mem::take(&mut self.attr_name),
            value,
        });
        self.attr_value.clear();
    }

    fn push_entity_literally(&mut self, numeric: bool) {
        self.word.push('&');
        if numeric {
            self.word.push('#');
        }
        let raw = std::mem::take(&mut self.entity);
        self.word.push_str(&raw);
        self.entity = raw;
    }

    fn flush_word(&mut self, end: usize) {
        if self.word.is_empty() {
            return;
        }
        self.tokens.push(Token::Text(TextRun {
            region: Region::new(self.token_start, end),
            text: std::mem::take(&mut self.word),
        }));
    }

    fn emit_tag(&mut self, end: usize) {
        self.saw_tag = true;
        let name = TagName::parse(&self.tag_name);
        self.tokens.push(Token::Tag(Tag {
            region: Region::new(self.token_start, end),
            name,
            is_start: self.tag_is_start,
            self_closing: self.tag_self_closing,
            attrs: std::mem::take(&mut self.attrs),
        }));
    }

    /// Comments and `<!...>` directives become an opaque start tag named `!`.
    fn emit_bang(&mut self, end: usize) {
        self.saw_tag = true;
        self.tokens.push(Token::Tag(Tag {
            region: Region::new(self.token_start, end),
            name: TagName::Bang,
            is_start: true,
            self_closing: false,
            attrs: Vec::new(),
        }));
    }

    /// After a raw-text start tag (`script`, `style`, `textarea`), the
    /// contents are a single undecoded text run ending at the matching close
    /// tag. An unterminated raw element swallows the rest of the document.
    fn maybe_skip_raw_text(&mut self, i: usize, content_start: usize) -> Step {
        let raw_tag = match self.tokens.last() {
            Some(Token::Tag(t)) if t.is_start && !t.self_closing && t.name.is_raw_text() => {
                t.name.clone()
            }
            _ => return Step::Next,
        };
        let close = format!("</{}", raw_tag.as_str());
        let rest = &self.content[content_start..];
        let close_at = find_ignore_ascii_case(rest, &close);
        match close_at {
            Some(rel) => {
                let text_end = content_start + rel;
                if text_end > content_start {
                    self.tokens.push(Token::Text(TextRun {
                        region: Region::new(content_start, text_end),
                        text: self.content[content_start..text_end].to_string(),
                    }));
                }
                // resume normal scanning at the close tag's '<'
                let resume = self.chars.partition_point(|&(off, _)| off < text_end);
                self.state = State::Start;
                Step::Jump(resume)
            }
            None => {
                if !rest.is_empty() {
                    self.tokens.push(Token::Text(TextRun {
                        region: Region::new(content_start, self.content.len()),
                        text: rest.to_string(),
                    }));
                }
                self.state = State::Start;
                Step::Jump(self.chars.len().max(i + 1))
            }
        }
    }
}

enum Step {
    Next,
    Redo,
    Jump(usize),
}

/// Byte-wise case-insensitive substring search; `needle` must be ASCII.
fn find_ignore_ascii_case(haystack: &str, needle: &str) -> Option<usize> {
    let hay = haystack.as_bytes();
    let nee = needle.as_bytes();
    if nee.is_empty() || hay.len() < nee.len() {
        return None;
    }
    (0..=hay.len() - nee.len()).find(|&i| hay[i..i + nee.len()].eq_ignore_ascii_case(nee))
}
