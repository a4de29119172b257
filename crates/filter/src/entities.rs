// ABOUTME: Ampersand escaping for literal text and attribute values.
// ABOUTME: Keeps whitelisted entity references intact and escapes every other bare '&'.

use crate::config::FilterConfig;

/// References the filter itself produces; they always survive escaping.
const MARKUP_ENTITIES: &[&str] = &["amp", "lt", "gt", "quot"];

/// Escapes each `&` that does not start an allowed `&name;` reference.
///
/// The candidate name is the run of characters up to the next `&`, `;` or end
/// of input. Only a run closed by `;` whose name is allowed passes through;
/// otherwise just the `&` becomes `&amp;` and scanning resumes right after it.
pub fn escape_entities(text: &str, config: &FilterConfig) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len() + 16);
    let mut rest = text;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let run_end = after.find(['&', ';']).unwrap_or(after.len());
        let name = &after[..run_end];
        let terminated = after[run_end..].starts_with(';');

        if terminated && is_allowed(name, config) {
            out.push('&');
            out.push_str(name);
            out.push(';');
            rest = &after[run_end + 1..];
        } else {
            out.push_str("&amp;");
            rest = after;
        }
    }
    out.push_str(rest);
    out
}

fn is_allowed(name: &str, config: &FilterConfig) -> bool {
    !name.is_empty() && (MARKUP_ENTITIES.contains(&name) || config.allows_entity(name))
}

/// Escapes `<`, `>` and `"` for use inside a double-quoted attribute value.
/// Ampersands must already have gone through [`escape_entities`].
pub fn escape_markup(text: &str, quotes: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if quotes => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
