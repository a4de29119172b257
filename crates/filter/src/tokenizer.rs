// ABOUTME: Splits raw markup into literal text, tag and comment tokens.
// ABOUTME: Repairs or escapes unmatched angle brackets depending on the always_make_tags switch.

//! Tokenizer.
//!
//! Comments (`<!--` up to the first `-->`) are cut out first; each stretch of
//! text between them is scanned once for `<` and `>` delimiters:
//!
//! * `<` whose next delimiter is `>` opens a tag ending at that `>`;
//! * `<` whose next delimiter is another `<` (or the end) is *dangling*;
//! * `>` whose previous delimiter is not a `<` is *stray*.
//!
//! With `always_make_tags` a dangling `<` is closed just before the next
//! delimiter and a stray `>` gets a `<` after the previous delimiter, so
//! `foo<b` reads as `foo<b>` and `b>foo` as `<b>foo`. A `>` at the very start
//! of the input is dropped. Without it, dangling and stray brackets become
//! the literal text `&lt;` and `&gt;`.

use crate::attributes::{parse_tag, TagToken};

const COMMENT_OPEN: &str = "<!--";
const COMMENT_CLOSE: &str = "-->";

/// One piece of the input, in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Literal text, not yet entity-escaped.
    Text(String),
    /// A well-formed tag.
    Tag(TagToken),
    /// The body of a `<!-- ... -->` comment.
    Comment(String),
}

/// Tokenizes `input`. Tag bodies that do not parse as a tag are dropped.
pub fn tokenize(input: &str, always_make_tags: bool) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut rest = input;
    let mut at_input_start = true;

    while let Some((before, comment, after)) = split_comment(rest) {
        scan_segment(before, always_make_tags, at_input_start, &mut tokens);
        tokens.push(Token::Comment(comment.to_string()));
        rest = after;
        at_input_start = false;
    }
    scan_segment(rest, always_make_tags, at_input_start, &mut tokens);
    tokens
}

fn split_comment(text: &str) -> Option<(&str, &str, &str)> {
    let open = text.find(COMMENT_OPEN)?;
    let body_start = open + COMMENT_OPEN.len();
    let close = text[body_start..].find(COMMENT_CLOSE)? + body_start;
    Some((
        &text[..open],
        &text[body_start..close],
        &text[close + COMMENT_CLOSE.len()..],
    ))
}

fn next_delimiter(text: &str, from: usize) -> Option<usize> {
    text[from..].find(['<', '>']).map(|i| from + i)
}

fn scan_segment(segment: &str, lenient: bool, at_input_start: bool, tokens: &mut Vec<Token>) {
    let bytes = segment.as_bytes();
    let mut text = String::new();
    let mut pos = 0;
    if lenient && at_input_start && segment.starts_with('>') {
        pos = 1;
    }

    while let Some(at) = next_delimiter(segment, pos) {
        if bytes[at] == b'<' {
            let end = next_delimiter(segment, at + 1);
            match end {
                Some(close) if bytes[close] == b'>' => {
                    text.push_str(&segment[pos..at]);
                    push_tag(&segment[at + 1..close], &mut text, tokens);
                    pos = close + 1;
                }
                _ => {
                    let stop = end.unwrap_or(segment.len());
                    text.push_str(&segment[pos..at]);
                    if lenient {
                        push_tag(&segment[at + 1..stop], &mut text, tokens);
                    } else {
                        text.push_str("&lt;");
                        text.push_str(&segment[at + 1..stop]);
                    }
                    pos = stop;
                }
            }
        } else if lenient {
            // stray `>`: everything since the previous delimiter is the tag
            push_tag(&segment[pos..at], &mut text, tokens);
            pos = at + 1;
        } else {
            text.push_str(&segment[pos..at]);
            text.push_str("&gt;");
            pos = at + 1;
        }
    }

    text.push_str(&segment[pos..]);
    flush_text(&mut text, tokens);
}

fn push_tag(body: &str, text: &mut String, tokens: &mut Vec<Token>) {
    flush_text(text, tokens);
    match parse_tag(body) {
        Some(tag) => tokens.push(Token::Tag(tag)),
        None => tracing::trace!(body, "dropped unparseable tag"),
    }
}

fn flush_text(text: &mut String, tokens: &mut Vec<Token>) {
    if !text.is_empty() {
        tokens.push(Token::Text(std::mem::take(text)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Token {
        Token::Text(s.to_string())
    }

    fn names(tokens: &[Token]) -> Vec<String> {
        tokens
            .iter()
            .map(|t| match t {
                Token::Text(s) => format!("text:{s}"),
                Token::Tag(tag) if tag.is_closing => format!("/{}", tag.name),
                Token::Tag(tag) => tag.name.clone(),
                Token::Comment(c) => format!("comment:{c}"),
            })
            .collect()
    }

    #[test]
    fn plain_text() {
        assert_eq!(tokenize("hello", true), vec![text("hello")]);
        assert!(tokenize("", true).is_empty());
    }

    #[test]
    fn well_formed_tags() {
        let tokens = tokenize("<b>hi</b>", true);
        assert_eq!(names(&tokens), vec!["b", "text:hi", "/b"]);
        assert_eq!(tokenize("<b>hi</b>", false), tokens);
    }

    #[test]
    fn lenient_repairs_dangling_open() {
        assert_eq!(names(&tokenize("foo<b", true)), vec!["text:foo", "b"]);
        assert_eq!(names(&tokenize("<b<i>x", true)), vec!["b", "i", "text:x"]);
    }

    #[test]
    fn lenient_repairs_stray_close() {
        assert_eq!(names(&tokenize("b>foo", true)), vec!["b", "text:foo"]);
        assert_eq!(names(&tokenize("<b>x>y", true)), vec!["b", "x", "text:y"]);
    }

    #[test]
    fn lenient_drops_leading_close() {
        assert!(tokenize(">", true).is_empty());
        assert_eq!(names(&tokenize("><b>", true)), vec!["b"]);
    }

    #[test]
    fn strict_escapes_unmatched_brackets() {
        assert_eq!(tokenize("foo<b", false), vec![text("foo&lt;b")]);
        assert_eq!(tokenize("b>foo", false), vec![text("b&gt;foo")]);
        assert_eq!(tokenize("><b", false), vec![text("&gt;&lt;b")]);
        assert_eq!(tokenize("b><", false), vec![text("b&gt;&lt;")]);
        assert_eq!(names(&tokenize("><b>", false)), vec!["text:&gt;", "b"]);
    }

    #[test]
    fn empty_brackets_vanish() {
        assert_eq!(tokenize("a<>b", true), vec![text("a"), text("b")]);
        assert_eq!(tokenize("a<>b", false), vec![text("a"), text("b")]);
    }

    #[test]
    fn comments_are_cut_out_first() {
        assert_eq!(
            names(&tokenize("x<!-- a<b --->y", true)),
            vec!["text:x", "comment: a<b -", "text:y"]
        );
    }

    #[test]
    fn unterminated_comment_is_ordinary_markup() {
        assert_eq!(tokenize("<!-- open", false), vec![text("&lt;!-- open")]);
    }

    #[test]
    fn leading_close_after_comment_is_not_input_start() {
        assert_eq!(
            names(&tokenize("<!--c-->>b", true)),
            vec!["comment:c", "text:b"]
        );
    }

    #[test]
    fn nested_script_brackets() {
        assert_eq!(
            names(&tokenize("<<script>script<script>>", true)),
            vec!["script", "text:script", "script"]
        );
    }
}
