// ABOUTME: URL scheme validation for URL-valued attributes such as href and src.
// ABOUTME: Neutralises denied or unlisted schemes, seeing through whitespace and character-reference obfuscation.

use std::borrow::Cow;

use crate::config::{is_scheme, FilterConfig};

/// Checks the scheme of a URL attribute value and rewrites it if rejected.
///
/// A rejected value becomes `#` followed by everything after the first `:`
/// of the value with whitespace and control characters removed, so
/// `javascript:foo` turns into `#foo`. References in that tail stay encoded
/// and are escaped later like any other text. When the separator itself was
/// a reference (`javascript&colon;foo`) the decoded tail is used instead.
/// Values without a recognisable scheme are relative and pass through
/// untouched.
pub fn validate_protocol<'a>(value: &'a str, config: &FilterConfig) -> Cow<'a, str> {
    let normalized = normalize(value);
    let Some((scheme, rest)) = normalized.split_once(':') else {
        return Cow::Borrowed(value);
    };
    if !is_scheme(scheme) {
        return Cow::Borrowed(value);
    }

    let scheme = scheme.to_ascii_lowercase();
    let denied = config.denied_protocols().contains(&scheme);
    let unlisted =
        !config.allowed_protocols().is_empty() && !config.allowed_protocols().contains(&scheme);

    if denied || unlisted {
        tracing::debug!(%scheme, denied, "rewrote URL with rejected scheme");
        let stripped = strip_blanks(value);
        let tail = stripped.split_once(':').map_or(rest, |(_, tail)| tail);
        Cow::Owned(format!("#{tail}"))
    } else {
        Cow::Borrowed(value)
    }
}

/// Decodes character references a browser would resolve inside an attribute
/// and drops whitespace and control characters.
fn normalize(value: &str) -> String {
    strip_blanks(&decode_references(value))
}

fn strip_blanks(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect()
}

/// Decodes `&#NN;`, `&#xHH;` (terminator optional) and the named references
/// that can spell a scheme separator or whitespace.
fn decode_references(value: &str) -> Cow<'_, str> {
    if !value.contains('&') {
        return Cow::Borrowed(value);
    }

    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        match decode_one(after) {
            Some((c, consumed)) => {
                out.push(c);
                rest = &after[consumed..];
            }
            None => {
                out.push('&');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

fn decode_one(after: &str) -> Option<(char, usize)> {
    for (name, c) in [("colon;", ':'), ("Tab;", '\t'), ("NewLine;", '\n')] {
        if after.starts_with(name) {
            return Some((c, name.len()));
        }
    }

    let num = after.strip_prefix('#')?;
    let (radix, digits_start) = match num.as_bytes().first() {
        Some(b'x' | b'X') => (16, 2),
        _ => (10, 1),
    };
    let digits: &str = &after[digits_start..];
    let len = digits
        .bytes()
        .take_while(|b| (radix == 16 && b.is_ascii_hexdigit()) || b.is_ascii_digit())
        .count();
    if len == 0 {
        return None;
    }
    let code = u32::from_str_radix(&digits[..len], radix).ok()?;
    let c = char::from_u32(code).unwrap_or('\u{FFFD}');
    let mut consumed = digits_start + len;
    if digits[len..].starts_with(';') {
        consumed += 1;
    }
    Some((c, consumed))
}
