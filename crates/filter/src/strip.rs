// ABOUTME: Removes disallowed tags together with everything they enclose.
// ABOUTME: A single forward scan tracks open disallowed tags and re-checks splice points for rejoined names.

use std::borrow::Cow;

use aho_corasick::{AhoCorasick, Input, MatchKind};

use crate::error::ConfigError;

/// Case-insensitive matcher for the opening and closing forms of every
/// disallowed tag. Pattern `2n` is `<name`, pattern `2n + 1` is `</name`.
#[derive(Debug, Clone)]
pub struct DisallowedStripper {
    matcher: AhoCorasick,
    /// Byte length of the longest pattern.
    longest: usize,
}

/// A disallowed tag found during the scan.
#[derive(Debug, Clone, Copy)]
struct Hit {
    /// Where the tag starts in the output buffer once preceding text is kept.
    out_at: usize,
    /// Input offset just past the tag name.
    name_end: usize,
    closing: bool,
}

impl DisallowedStripper {
    /// Returns `None` when there is nothing to strip.
    pub fn new<'a, I>(tags: I) -> Result<Option<Self>, ConfigError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut tags: Vec<&str> = tags.into_iter().collect();
        if tags.is_empty() {
            return Ok(None);
        }
        tags.sort_unstable();

        let patterns: Vec<String> = tags
            .iter()
            .flat_map(|t| [format!("<{t}"), format!("</{t}")])
            .collect();
        let longest = patterns.iter().map(String::len).max().unwrap_or(0);
        let matcher = AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .match_kind(MatchKind::LeftmostLongest)
            .build(&patterns)
            .map_err(|e| ConfigError::Matcher(e.to_string()))?;
        Ok(Some(Self { matcher, longest }))
    }

    /// Strips in one left-to-right scan.
    ///
    /// Text after an open disallowed tag stays in the output buffer until its
    /// closing tag arrives and the buffer is cut back to where the open tag
    /// began; an open tag never closed cuts everything after it. Removing a
    /// tag joins the text on either side, so after every removal the end of
    /// the buffer is matched again together with the upcoming input, which
    /// catches names spliced around the removed tag (`<scr<script/>ipt>`).
    /// Each step either consumes input or shortens the buffer, so the scan
    /// is linear in the input length.
    pub fn strip<'a>(&self, input: &'a str) -> Cow<'a, str> {
        let mut out = String::with_capacity(input.len());
        let mut opens: Vec<usize> = Vec::new();
        let mut pos = 0;
        let mut removed = false;

        loop {
            let hit = match self.find_spliced(&out, input, pos) {
                Some(hit) => {
                    out.truncate(hit.out_at);
                    hit
                }
                None => match self.find_in(input, pos) {
                    Some((start, hit)) => {
                        out.push_str(&input[pos..start]);
                        Hit {
                            out_at: out.len(),
                            ..hit
                        }
                    }
                    None => break,
                },
            };

            let tag_end = input[hit.name_end..]
                .find('>')
                .map_or(input.len(), |i| hit.name_end + i + 1);
            if hit.closing {
                if let Some(open_at) = opens.pop() {
                    out.truncate(open_at);
                }
            } else if !input[..tag_end].ends_with("/>") {
                opens.push(hit.out_at);
            }
            pos = tag_end;
            removed = true;
        }

        if !removed {
            return Cow::Borrowed(input);
        }
        match opens.first() {
            Some(&open_at) => {
                tracing::trace!(
                    depth = opens.len(),
                    "unclosed disallowed tag swallowed the rest of the input"
                );
                out.truncate(open_at);
            }
            None => out.push_str(&input[pos..]),
        }
        tracing::debug!(
            before = input.len(),
            after = out.len(),
            "stripped disallowed content"
        );
        Cow::Owned(out)
    }

    /// Next disallowed tag lying wholly in `input[pos..]`, with its start.
    fn find_in(&self, input: &str, pos: usize) -> Option<(usize, Hit)> {
        let mut search_from = pos;
        while let Some(m) = self
            .matcher
            .find(Input::new(input).span(search_from..input.len()))
        {
            if continues_name(input, m.end()) {
                // longer, unrelated tag name
                search_from = m.start() + 1;
                continue;
            }
            let hit = Hit {
                out_at: 0,
                name_end: m.end(),
                closing: is_closing(m.pattern().as_usize()),
            };
            return Some((m.start(), hit));
        }
        None
    }

    /// A disallowed tag starting in the tail of `out` and finishing in
    /// `input[pos..]`, formed by joining the two at a removal point.
    fn find_spliced(&self, out: &str, input: &str, pos: usize) -> Option<Hit> {
        if out.is_empty() || pos >= input.len() {
            return None;
        }
        let mut tail_start = out.len().saturating_sub(self.longest - 1);
        while !out.is_char_boundary(tail_start) {
            tail_start += 1;
        }
        let mut ahead = (pos + self.longest).min(input.len());
        while !input.is_char_boundary(ahead) {
            ahead += 1;
        }

        let tail_len = out.len() - tail_start;
        let mut window = String::with_capacity(tail_len + ahead - pos);
        window.push_str(&out[tail_start..]);
        window.push_str(&input[pos..ahead]);

        let mut from = 0;
        while from < tail_len {
            let m = self
                .matcher
                .find(Input::new(&window).span(from..window.len()))?;
            if m.start() >= tail_len {
                return None;
            }
            if m.end() >= tail_len {
                let name_end = pos + (m.end() - tail_len);
                if !continues_name(input, name_end) {
                    return Some(Hit {
                        out_at: tail_start + m.start(),
                        name_end,
                        closing: is_closing(m.pattern().as_usize()),
                    });
                }
            }
            from = m.start() + 1;
        }
        None
    }
}

fn is_closing(pattern: usize) -> bool {
    pattern % 2 == 1
}

fn continues_name(text: &str, at: usize) -> bool {
    text.as_bytes()
        .get(at)
        .is_some_and(|b| b.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip(tags: &[&str], input: &str) -> String {
        DisallowedStripper::new(tags.iter().copied())
            .unwrap()
            .unwrap()
            .strip(input)
            .into_owned()
    }

    #[test]
    fn no_tags_means_no_stripper() {
        assert!(DisallowedStripper::new(std::iter::empty()).unwrap().is_none());
    }

    #[test]
    fn removes_element_and_content() {
        assert_eq!(strip(&["script"], "a<script>alert(1)</script>b"), "ab");
        assert_eq!(
            strip(&["script"], "a<SCRIPT type=\"x\">alert(1)</ScRiPt >b"),
            "ab"
        );
    }

    #[test]
    fn unclosed_open_swallows_rest() {
        assert_eq!(strip(&["script"], "keep<script woo=yay>gone"), "keep");
        assert_eq!(strip(&["script"], "keep<script"), "keep");
    }

    #[test]
    fn stray_close_is_removed() {
        assert_eq!(strip(&["script"], "a</script>b"), "ab");
    }

    #[test]
    fn self_closed_open_has_no_content() {
        assert_eq!(strip(&["script"], "a<script/>b"), "ab");
    }

    #[test]
    fn nested_occurrences_track_depth() {
        assert_eq!(
            strip(&["script"], "a<script><script>x</script>y</script>b"),
            "ab"
        );
    }

    #[test]
    fn longer_names_are_not_matched() {
        assert_eq!(strip(&["b"], "<bold>x</bold>"), "<bold>x</bold>");
        assert_eq!(strip(&["b"], "<b>x</b><br>"), "<br>");
    }

    #[test]
    fn spliced_names_are_stripped_again() {
        assert_eq!(
            strip(
                &["script"],
                "<scr<script></script>ipt>alert(1)</scr<script></script>ipt>ok"
            ),
            "ok"
        );
        assert_eq!(
            strip(&["script"], "<scr<script></script>ipt>alert(1)</script>ok"),
            "ok"
        );
        assert_eq!(strip(&["script"], "<scr<script/>ipt>x"), "");
        assert_eq!(strip(&["script"], "<s<script/>cr<script/>ipt>x</script>y"), "y");
    }

    #[test]
    fn splice_inside_removed_content_closes_it() {
        assert_eq!(
            strip(&["script"], "a<script>x</scr<script/>ipt>b"),
            "ab"
        );
    }

    #[test]
    fn deeply_spliced_names_are_linear() {
        let depth = 20_000;
        let input = format!("{}<script/>{}ok", "<scr".repeat(depth), "ipt/>".repeat(depth));
        assert_eq!(strip(&["script"], &input), "ok");

        let input = format!("keep{}<script/>{}", "<scr".repeat(depth), "ipt>".repeat(depth));
        assert_eq!(strip(&["script"], &input), "keep");
    }

    #[test]
    fn multibyte_text_around_splices() {
        assert_eq!(strip(&["script"], "é<script/>ü"), "éü");
        assert_eq!(strip(&["script"], "日本<scr<script/>ipt>語</script>本"), "日本本");
    }

    #[test]
    fn untouched_input_is_borrowed() {
        let stripper = DisallowedStripper::new(["script"]).unwrap().unwrap();
        assert!(matches!(stripper.strip("<b>x</b>"), Cow::Borrowed(_)));
    }

    #[test]
    fn several_tags() {
        assert_eq!(
            strip(&["script", "style"], "<style>p{}</style>x<script>y</script>z"),
            "xz"
        );
    }
}
