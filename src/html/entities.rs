//! HTML character entity decoding.
//!
//! Covers the XML five plus the Latin-1 named entities and numeric
//! references. Anything unterminated or unrecognized passes through
//! literally with the `&` preserved; real-world HTML is full of bare
//! ampersands and treating them as errors would reject half the web.

use once_cell::sync::Lazy;
use std::collections::HashMap;

static NAMED: Lazy<HashMap<&'static str, char>> = Lazy::new(|| {
    let pairs: &[(&str, u32)] = &[
        ("quot", 34),
        ("amp", 38),
        ("apos", 39),
        ("lt", 60),
        ("gt", 62),
        ("nbsp", 160),
        ("iexcl", 161),
        ("cent", 162),
        ("pound", 163),
        ("curren", 164),
        ("yen", 165),
        ("brvbar", 166),
        ("sect", 167),
        ("uml", 168),
        ("copy", 169),
        ("ordf", 170),
        ("laquo", 171),
        ("not", 172),
        ("shy", 173),
        ("reg", 174),
        ("macr", 175),
        ("deg", 176),
        ("plusmn", 177),
        ("sup2", 178),
        ("sup3", 179),
        ("acute", 180),
        ("micro", 181),
        ("para", 182),
        ("middot", 183),
        ("cedil", 184),
        ("sup1", 185),
        ("ordm", 186),
        ("raquo", 187),
        ("frac14", 188),
        ("frac12", 189),
        ("frac34", 190),
        ("iquest", 191),
        ("Agrave", 192),
        ("Aacute", 193),
        ("Acirc", 194),
        ("Atilde", 195),
        ("Auml", 196),
        ("Aring", 197),
        ("AElig", 198),
        ("Ccedil", 199),
        ("Egrave", 200),
        ("Eacute", 201),
        ("Ecirc", 202),
        ("Euml", 203),
        ("Igrave", 204),
        ("Iacute", 205),
        ("Icirc", 206),
        ("Iuml", 207),
        ("ETH", 208),
        ("Ntilde", 209),
        ("Ograve", 210),
        ("Oacute", 211),
        ("Ocirc", 212),
        ("Otilde", 213),
        ("Ouml", 214),
        ("times", 215),
        ("Oslash", 216),
        ("Ugrave", 217),
        ("Uacute", 218),
        ("Ucirc", 219),
        ("Uuml", 220),
        ("Yacute", 221),
        ("THORN", 222),
        ("szlig", 223),
        ("agrave", 224),
        ("aacute", 225),
        ("acirc", 226),
        ("atilde", 227),
        ("auml", 228),
        ("aring", 229),
        ("aelig", 230),
        ("ccedil", 231),
        ("egrave", 232),
        ("eacute", 233),
        ("ecirc", 234),
        ("euml", 235),
        ("igrave", 236),
        ("iacute", 237),
        ("icirc", 238),
        ("iuml", 239),
        ("eth", 240),
        ("ntilde", 241),
        ("ograve", 242),
        ("oacute", 243),
        ("ocirc", 244),
        ("otilde", 245),
        ("ouml", 246),
        ("divide", 247),
        ("oslash", 248),
        ("ugrave", 249),
        ("uacute", 250),
        ("ucirc", 251),
        ("uuml", 252),
        ("yacute", 253),
        ("thorn", 254),
        ("yuml", 255),
    ];
    pairs
        .iter()
        .filter_map(|&(name, cp)| char::from_u32(cp).map(|c| (name, c)))
        .collect()
});

/// Look up a named entity (without `&`/`;` delimiters). Case-sensitive, as
/// the Latin-1 set distinguishes `Auml` from `auml`.
#[must_use]
pub fn named_entity(name: &str) -> Option<char> {
    NAMED.get(name).copied()
}

/// Decode a numeric reference body: `NNN` or `xNNN`/`XNNN`.
#[must_use]
pub fn numeric_entity(body: &str) -> Option<char> {
    let cp = if let Some(hex) = body.strip_prefix(['x', 'X']) {
        u32::from_str_radix(hex, 16).ok()?
    } else {
        body.parse::<u32>().ok()?
    };
    char::from_u32(cp)
}

/// Decode all entities in `text`, passing unknown ones through literally.
///
/// Used for attribute values and saved text, where the tokenizer hands over
/// a raw slice rather than decoding char by char.
#[must_use]
pub fn decode(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp + 1..];
        // entity body runs to the first ';' within a short window
        let semi = tail
            .char_indices()
            .take(10)
            .find(|&(_, c)| c == ';')
            .map(|(i, _)| i);
        match semi {
            Some(end) => {
                let body = &tail[..end];
                let decoded = if let Some(num) = body.strip_prefix('#') {
                    numeric_entity(num)
                } else {
                    named_entity(body)
                };
                match decoded {
                    Some(c) => {
                        out.push(c);
                        rest = &tail[end + 1..];
                    }
                    None => {
                        out.push('&');
                        rest = tail;
                    }
                }
            }
            None => {
                out.push('&');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}
