// ABOUTME: Stack machine that enforces the tag whitelist and balances open/close tags.
// ABOUTME: Auto-closes unclosed tags in LIFO order, drops stray closers and elides empty remove-blank tags.

use std::collections::HashMap;

use crate::attributes::TagToken;
use crate::config::FilterConfig;
use crate::entities::{escape_entities, escape_markup};
use crate::protocol::validate_protocol;

/// A whitelisted tag awaiting its closing tag.
#[derive(Debug)]
struct Frame {
    name: String,
    /// Offset in the output where this frame's opening tag was written.
    open_at: usize,
    is_empty: bool,
}

/// Consumes tokens in order and writes balanced markup.
///
/// Opening tags of frames are written immediately; a remove-blank frame that
/// closes without content is cut back out of the output, opening tag
/// included. Any emitted output marks the innermost frame non-empty.
///
/// Whitelisted tags in neither closing set get no frame; only a count of
/// their open tags is kept so that a closer is emitted only when it pairs
/// with an earlier opener.
#[derive(Debug)]
pub struct Balancer<'c> {
    config: &'c FilterConfig,
    stack: Vec<Frame>,
    /// Number of frames on the stack per tag name.
    framed: HashMap<String, usize>,
    unframed: HashMap<String, usize>,
    out: String,
}

impl<'c> Balancer<'c> {
    pub fn new(config: &'c FilterConfig) -> Self {
        Self {
            config,
            stack: Vec::new(),
            framed: HashMap::new(),
            unframed: HashMap::new(),
            out: String::new(),
        }
    }

    /// Appends already-escaped text or markup. Empty strings are not content.
    pub fn push_text(&mut self, text: &str) {
        self.emit(text);
    }

    pub fn push_tag(&mut self, tag: &TagToken) {
        let name = tag.name.as_str();
        if !self.config.is_whitelisted(name) {
            tracing::trace!(tag = name, "dropped tag outside the whitelist");
            return;
        }
        if tag.is_closing {
            self.close(name);
            return;
        }

        if self.config.is_self_closing(name) {
            let markup = render_open(tag, self.config, " /");
            self.emit(&markup);
        } else if self.config.needs_closing(name) {
            let markup = render_open(tag, self.config, "");
            self.stack.push(Frame {
                name: name.to_string(),
                open_at: self.out.len(),
                is_empty: true,
            });
            *self.framed.entry(name.to_string()).or_insert(0) += 1;
            self.out.push_str(&markup);
        } else {
            let suffix = if tag.is_self_closing { " /" } else { "" };
            let markup = render_open(tag, self.config, suffix);
            if !tag.is_self_closing {
                *self.unframed.entry(name.to_string()).or_insert(0) += 1;
            }
            self.emit(&markup);
        }
    }

    /// Closes every frame still open and returns the output.
    pub fn finish(mut self) -> String {
        while !self.stack.is_empty() {
            self.pop_frame();
        }
        self.out
    }

    #[cfg(test)]
    fn depth(&self) -> usize {
        self.stack.len()
    }

    fn close(&mut self, name: &str) {
        if self.config.is_self_closing(name) {
            tracing::trace!(tag = name, "dropped closing tag of self-closing tag");
            return;
        }
        let framed = self.framed.get(name).is_some_and(|&n| n > 0);
        let frame_at = if framed {
            self.stack.iter().rposition(|f| f.name == name)
        } else {
            None
        };
        match frame_at {
            Some(idx) => {
                while self.stack.len() > idx {
                    self.pop_frame();
                }
            }
            None => match self.unframed.get_mut(name) {
                Some(open) if *open > 0 => {
                    *open -= 1;
                    let markup = format!("</{name}>");
                    self.emit(&markup);
                }
                _ => tracing::debug!(tag = name, "dropped stray closing tag"),
            },
        }
    }

    fn pop_frame(&mut self) {
        let Some(frame) = self.stack.pop() else {
            return;
        };
        if let Some(n) = self.framed.get_mut(&frame.name) {
            *n = n.saturating_sub(1);
        }
        if frame.is_empty && self.config.removes_blank(&frame.name) {
            tracing::trace!(tag = %frame.name, "elided empty tag");
            self.out.truncate(frame.open_at);
            return;
        }
        self.out.push_str("</");
        self.out.push_str(&frame.name);
        self.out.push('>');
        if let Some(parent) = self.stack.last_mut() {
            parent.is_empty = false;
        }
    }

    fn emit(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.out.push_str(text);
        if let Some(top) = self.stack.last_mut() {
            top.is_empty = false;
        }
    }
}

/// Renders `<name attr="value"...suffix>` keeping only whitelisted attributes.
fn render_open(tag: &TagToken, config: &FilterConfig, suffix: &str) -> String {
    let mut markup = String::with_capacity(tag.name.len() + 2 + suffix.len());
    markup.push('<');
    markup.push_str(&tag.name);
    for (name, value) in &tag.attributes {
        if !config.allows_attribute(&tag.name, name) {
            continue;
        }
        let value = if config.is_protocol_attribute(name) {
            validate_protocol(value, config)
        } else {
            value.as_str().into()
        };
        let escaped = escape_markup(&escape_entities(&value, config), true);
        markup.push(' ');
        markup.push_str(name);
        markup.push_str("=\"");
        markup.push_str(&escaped);
        markup.push('"');
    }
    markup.push_str(suffix);
    markup.push('>');
    markup
}
