// ABOUTME: Parses the inside of a `<...>` tag into a TagToken.
// ABOUTME: Extracts name, closing/self-closing flags and attribute name/value pairs.

use once_cell::sync::Lazy;
use regex::Regex;

static END_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^/([a-z0-9]+)").unwrap());
static START_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)^([a-z0-9]+)(.*?)(/?)$").unwrap());
// name, then optionally `=` and a double-quoted, single-quoted or bare value
static ATTRIBUTE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)([A-Za-z0-9_:-]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"']+)))?"#).unwrap()
});

/// One tag occurrence. Names are lowercase; attributes keep source order and
/// the first occurrence of a repeated name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagToken {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub is_closing: bool,
    pub is_self_closing: bool,
}

#[cfg(test)]
impl TagToken {
    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Parses a tag body (the text between `<` and `>`). Returns `None` for
/// bodies that are not a tag: empty, leading whitespace, or no name.
pub fn parse_tag(body: &str) -> Option<TagToken> {
    if let Some(caps) = END_TAG_RE.captures(body) {
        return Some(TagToken {
            name: caps[1].to_ascii_lowercase(),
            attributes: Vec::new(),
            is_closing: true,
            is_self_closing: false,
        });
    }

    let caps = START_TAG_RE.captures(body)?;
    let name = caps[1].to_ascii_lowercase();
    let attrs = caps.get(2).map_or("", |m| m.as_str());
    let self_closing = caps.get(3).is_some_and(|m| !m.as_str().is_empty());

    Some(TagToken {
        name,
        attributes: parse_attributes(attrs),
        is_closing: false,
        is_self_closing: self_closing,
    })
}

/// Collects `name=value`, `name="value"` and `name='value'` pairs. Bare
/// names without a value are discarded, as is an attribute whose quoted
/// value is never closed.
pub fn parse_attributes(text: &str) -> Vec<(String, String)> {
    let mut attributes: Vec<(String, String)> = Vec::new();
    for caps in ATTRIBUTE_RE.captures_iter(text) {
        let value = caps.get(2).or_else(|| caps.get(3)).or_else(|| caps.get(4));
        let Some(value) = value else {
            continue;
        };
        let name = caps[1].to_ascii_lowercase();
        if attributes.iter().any(|(n, _)| *n == name) {
            continue;
        }
        attributes.push((name, value.as_str().to_string()));
    }
    attributes
}
