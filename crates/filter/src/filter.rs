// ABOUTME: The HtmlFilter facade that runs every sanitizing pass in order.
// ABOUTME: Strip disallowed content, tokenize, balance whitelisted tags, escape entities.

use std::borrow::Cow;
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::balancer::Balancer;
use crate::config::FilterConfig;
use crate::entities::{escape_entities, escape_markup};
use crate::error::ConfigError;
use crate::tokenizer::{tokenize, Token};

static DEFAULT_FILTER: Lazy<HtmlFilter> = Lazy::new(HtmlFilter::default);

/// Sanitizes user-supplied markup against a whitelist.
///
/// Cloning is cheap; clones share the same immutable configuration and may be
/// used from different threads at once.
///
/// ```
/// use htmlfilter::HtmlFilter;
///
/// let filter = HtmlFilter::new(true);
/// assert_eq!(filter.filter("<b>hello"), "<b>hello</b>");
/// assert_eq!(filter.filter(r#"<a href="javascript:foo">bar</a>"#), r##"<a href="#foo">bar</a>"##);
/// ```
#[derive(Debug, Clone)]
pub struct HtmlFilter {
    config: Arc<FilterConfig>,
}

impl HtmlFilter {
    /// A filter using the default whitelist.
    pub fn new(always_make_tags: bool) -> Self {
        Self::with_config(FilterConfig::with_defaults(always_make_tags))
    }

    pub fn with_config(config: FilterConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Build a filter from a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        FilterConfig::from_json(json).map(Self::with_config)
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    pub fn is_always_make_tags(&self) -> bool {
        self.config.always_make_tags()
    }

    pub fn is_strip_comments(&self) -> bool {
        self.config.strip_comments()
    }

    /// Sanitizes `input`. Never fails: malformed markup is repaired or
    /// escaped, never rejected.
    pub fn filter(&self, input: &str) -> String {
        let config = self.config.as_ref();
        let stripped = match config.stripper() {
            Some(stripper) => stripper.strip(input),
            None => Cow::Borrowed(input),
        };

        let mut balancer = Balancer::new(config);
        for token in tokenize(&stripped, config.always_make_tags()) {
            match token {
                Token::Text(text) => balancer.push_text(&escape_entities(&text, config)),
                Token::Tag(tag) => balancer.push_tag(&tag),
                Token::Comment(body) if !config.strip_comments() => {
                    balancer.push_text(&render_comment(&body, config));
                }
                Token::Comment(_) => {}
            }
        }
        balancer.finish()
    }

    /// Sanitizes each input in turn.
    pub fn filter_all<I, S>(&self, inputs: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        inputs
            .into_iter()
            .map(|input| self.filter(input.as_ref()))
            .collect()
    }
}

impl Default for HtmlFilter {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Sanitizes `input` with the default whitelist and lenient tag repair.
pub fn clean(input: &str) -> String {
    DEFAULT_FILTER.filter(input)
}

fn render_comment(body: &str, config: &FilterConfig) -> String {
    let body = escape_markup(&escape_entities(body, config), false);
    format!("<!--{body}-->")
}
