// ABOUTME: Whitelist configuration for the filter: FilterConfig, ConfigBuilder and RawConfig.
// ABOUTME: Configurations are validated once at build time and immutable afterwards.

//! Filter configuration.
//!
//! A [`FilterConfig`] is the complete policy a filter enforces: which tags may
//! appear and with which attributes, how tags are balanced, which URL schemes
//! and entity references survive. It is built through [`ConfigBuilder`] (or
//! decoded from JSON via [`RawConfig`]) and never changes afterwards, so one
//! instance can be shared by any number of threads.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Deserialize;

use crate::error::ConfigError;
use crate::strip::DisallowedStripper;

const DEFAULT_ALLOWED: &[(&str, &[&str])] = &[
    ("a", &["href", "target"]),
    ("img", &["src", "width", "height", "alt"]),
    ("b", &[]),
    ("strong", &[]),
    ("i", &[]),
    ("em", &[]),
];
const DEFAULT_SELF_CLOSING: &[&str] = &["img"];
const DEFAULT_NEED_CLOSING: &[&str] = &["a", "b", "strong", "i", "em"];
const DEFAULT_PROTOCOL_ATTRIBUTES: &[&str] = &["src", "href"];
const DEFAULT_ALLOWED_PROTOCOLS: &[&str] = &["http", "mailto", "https"];
const DEFAULT_DENIED_PROTOCOLS: &[&str] = &["javascript", "jscript", "vbscript", "view-source"];
const DEFAULT_REMOVE_BLANKS: &[&str] = &["a", "b", "strong", "i", "em"];
const DEFAULT_ENTITIES: &[&str] = &["amp", "gt", "lt", "quot"];

/// Immutable whitelist and switches consulted by every filter pass.
#[derive(Debug, Clone)]
pub struct FilterConfig {
    allowed: HashMap<String, HashSet<String>>,
    self_closing: HashSet<String>,
    need_closing: HashSet<String>,
    disallowed: HashSet<String>,
    protocol_attributes: HashSet<String>,
    allowed_protocols: HashSet<String>,
    denied_protocols: HashSet<String>,
    remove_blanks: HashSet<String>,
    allowed_entities: HashSet<String>,
    strip_comments: bool,
    always_make_tags: bool,
    stripper: Option<DisallowedStripper>,
}

impl FilterConfig {
    /// Start an empty configuration: nothing whitelisted, comments stripped,
    /// lenient tag repair on.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// The convenience preset: a small inline-formatting whitelist.
    pub fn with_defaults(always_make_tags: bool) -> Self {
        ConfigBuilder::with_defaults(always_make_tags).assemble(None)
    }

    /// Decode a JSON configuration document (see [`RawConfig`]).
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_json::from_str(json)?;
        raw.into_config()
    }

    /// True if `tag` may appear in the output at all.
    pub fn is_whitelisted(&self, tag: &str) -> bool {
        self.allowed.contains_key(tag) && !self.disallowed.contains(tag)
    }

    /// True if `attribute` may be rendered on `tag`.
    pub fn allows_attribute(&self, tag: &str, attribute: &str) -> bool {
        self.is_whitelisted(tag)
            && self
                .allowed
                .get(tag)
                .is_some_and(|attrs| attrs.contains(attribute))
    }

    pub fn is_self_closing(&self, tag: &str) -> bool {
        self.self_closing.contains(tag)
    }

    pub fn needs_closing(&self, tag: &str) -> bool {
        self.need_closing.contains(tag)
    }

    pub fn is_disallowed(&self, tag: &str) -> bool {
        self.disallowed.contains(tag)
    }

    /// Disallowed tag names, in no particular order.
    pub fn disallowed_tags(&self) -> impl Iterator<Item = &str> {
        self.disallowed.iter().map(String::as_str)
    }

    /// True if values of `attribute` are URLs subject to scheme checks.
    pub fn is_protocol_attribute(&self, attribute: &str) -> bool {
        self.protocol_attributes.contains(attribute)
    }

    pub fn allowed_protocols(&self) -> &HashSet<String> {
        &self.allowed_protocols
    }

    pub fn denied_protocols(&self) -> &HashSet<String> {
        &self.denied_protocols
    }

    /// True if an empty instance of `tag` is dropped from the output.
    pub fn removes_blank(&self, tag: &str) -> bool {
        self.remove_blanks.contains(tag)
    }

    /// True if `&name;` may pass through unescaped. Case-sensitive.
    pub fn allows_entity(&self, name: &str) -> bool {
        self.allowed_entities.contains(name)
    }

    pub fn strip_comments(&self) -> bool {
        self.strip_comments
    }

    pub fn always_make_tags(&self) -> bool {
        self.always_make_tags
    }

    pub(crate) fn stripper(&self) -> Option<&DisallowedStripper> {
        self.stripper.as_ref()
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self::with_defaults(true)
    }
}

/// Fluent builder for [`FilterConfig`].
///
/// Set-valued setters replace the whole set. Entries are trimmed and empty
/// entries ignored; tag, attribute and protocol names are lowercased.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    allowed: HashMap<String, HashSet<String>>,
    extra_attributes: Vec<(String, String)>,
    self_closing: HashSet<String>,
    need_closing: HashSet<String>,
    disallowed: HashSet<String>,
    protocol_attributes: HashSet<String>,
    allowed_protocols: HashSet<String>,
    denied_protocols: HashSet<String>,
    remove_blanks: HashSet<String>,
    allowed_entities: HashSet<String>,
    strip_comments: bool,
    always_make_tags: bool,
}

impl ConfigBuilder {
    /// Create a builder with nothing whitelisted.
    pub fn new() -> Self {
        Self {
            allowed: HashMap::new(),
            extra_attributes: Vec::new(),
            self_closing: HashSet::new(),
            need_closing: HashSet::new(),
            disallowed: HashSet::new(),
            protocol_attributes: HashSet::new(),
            allowed_protocols: HashSet::new(),
            denied_protocols: HashSet::new(),
            remove_blanks: HashSet::new(),
            allowed_entities: HashSet::new(),
            strip_comments: true,
            always_make_tags: true,
        }
    }

    /// Create a builder seeded with the default preset.
    pub fn with_defaults(always_make_tags: bool) -> Self {
        let mut builder = Self::new();
        for (tag, attrs) in DEFAULT_ALLOWED {
            builder = builder.allow_tag(tag, attrs.iter().copied());
        }
        builder
            .self_closing(DEFAULT_SELF_CLOSING.iter().copied())
            .need_closing(DEFAULT_NEED_CLOSING.iter().copied())
            .protocol_attributes(DEFAULT_PROTOCOL_ATTRIBUTES.iter().copied())
            .allowed_protocols(DEFAULT_ALLOWED_PROTOCOLS.iter().copied())
            .denied_protocols(DEFAULT_DENIED_PROTOCOLS.iter().copied())
            .remove_blanks(DEFAULT_REMOVE_BLANKS.iter().copied())
            .allowed_entities(DEFAULT_ENTITIES.iter().copied())
            .always_make_tags(always_make_tags)
    }

    /// Whitelist `tag` with exactly the given attributes.
    pub fn allow_tag<I, S>(mut self, tag: &str, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tag = tag.trim().to_ascii_lowercase();
        if !tag.is_empty() {
            self.allowed.insert(tag, lowered(attributes));
        }
        self
    }

    /// Add attributes to a tag. The tag must be whitelisted by the time
    /// [`build`](Self::build) runs.
    pub fn allow_attributes<I, S>(mut self, tag: &str, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tag = tag.trim().to_ascii_lowercase();
        for attr in lowered(attributes) {
            self.extra_attributes.push((tag.clone(), attr));
        }
        self
    }

    /// Replace the whole tag whitelist.
    pub fn allowed_tags<I, S, A>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = (S, A)>,
        S: AsRef<str>,
        A: IntoIterator,
        A::Item: AsRef<str>,
    {
        self.allowed.clear();
        for (tag, attrs) in tags {
            self = self.allow_tag(tag.as_ref(), attrs);
        }
        self
    }

    pub fn self_closing<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.self_closing = lowered(tags);
        self
    }

    pub fn need_closing<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.need_closing = lowered(tags);
        self
    }

    /// Tags removed together with everything they enclose.
    pub fn disallow<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.disallowed = lowered(tags);
        self
    }

    /// Attributes whose values are URLs.
    pub fn protocol_attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.protocol_attributes = lowered(attributes);
        self
    }

    /// Schemes accepted in URL attributes. An empty set accepts every scheme
    /// that is not denied.
    pub fn allowed_protocols<I, S>(mut self, protocols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed_protocols = lowered(protocols);
        self
    }

    /// Schemes always rejected in URL attributes.
    pub fn denied_protocols<I, S>(mut self, protocols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.denied_protocols = lowered(protocols);
        self
    }

    pub fn remove_blanks<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.remove_blanks = lowered(tags);
        self
    }

    /// Entity names (`amp`, `#160`) that may pass through unescaped.
    pub fn allowed_entities<I, S>(mut self, entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed_entities = entities
            .into_iter()
            .map(|e| e.as_ref().trim().to_string())
            .filter(|e| !e.is_empty())
            .collect();
        self
    }

    pub fn strip_comments(mut self, strip: bool) -> Self {
        self.strip_comments = strip;
        self
    }

    pub fn always_make_tags(mut self, always: bool) -> Self {
        self.always_make_tags = always;
        self
    }

    /// Validate and freeze the configuration.
    pub fn build(mut self) -> Result<FilterConfig, ConfigError> {
        for (tag, attribute) in std::mem::take(&mut self.extra_attributes) {
            match self.allowed.get_mut(&tag) {
                Some(attrs) => {
                    attrs.insert(attribute);
                }
                None => return Err(ConfigError::UnknownTag { tag, attribute }),
            }
        }

        for (tag, attrs) in &self.allowed {
            check_names("tag", std::iter::once(tag), is_tag_name)?;
            check_names("attribute", attrs, is_attribute_name)?;
        }
        for set in [
            &self.self_closing,
            &self.need_closing,
            &self.disallowed,
            &self.remove_blanks,
        ] {
            check_names("tag", set, is_tag_name)?;
        }
        check_names("attribute", &self.protocol_attributes, is_attribute_name)?;
        check_names("protocol", &self.allowed_protocols, is_scheme)?;
        check_names("protocol", &self.denied_protocols, is_scheme)?;
        check_names("entity", &self.allowed_entities, is_entity_name)?;

        let mut conflicts: Vec<&String> = self.self_closing.intersection(&self.need_closing).collect();
        conflicts.sort();
        if let Some(tag) = conflicts.first() {
            return Err(ConfigError::ClosingConflict((*tag).clone()));
        }

        let stripper = DisallowedStripper::new(self.disallowed.iter().map(String::as_str))?;
        let config = self.assemble(stripper);
        tracing::debug!(
            tags = config.allowed.len(),
            disallowed = config.disallowed.len(),
            always_make_tags = config.always_make_tags,
            "filter configuration built"
        );
        Ok(config)
    }

    fn assemble(self, stripper: Option<DisallowedStripper>) -> FilterConfig {
        FilterConfig {
            allowed: self.allowed,
            self_closing: self.self_closing,
            need_closing: self.need_closing,
            disallowed: self.disallowed,
            protocol_attributes: self.protocol_attributes,
            allowed_protocols: self.allowed_protocols,
            denied_protocols: self.denied_protocols,
            remove_blanks: self.remove_blanks,
            allowed_entities: self.allowed_entities,
            strip_comments: self.strip_comments,
            always_make_tags: self.always_make_tags,
            stripper,
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn lowered<I, S>(items: I) -> HashSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items
        .into_iter()
        .map(|s| s.as_ref().trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn check_names<'a, I>(kind: &'static str, names: I, valid: fn(&str) -> bool) -> Result<(), ConfigError>
where
    I: IntoIterator<Item = &'a String>,
{
    match names.into_iter().find(|n| !valid(n)) {
        Some(bad) => Err(ConfigError::invalid_name(kind, bad.as_str())),
        None => Ok(()),
    }
}

pub(crate) fn is_tag_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric())
}

fn is_attribute_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b':')
}

fn is_attribute_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(is_attribute_name_byte)
}

/// `ALPHA *( ALPHA / DIGIT / "+" / "-" / "." )`
pub(crate) fn is_scheme(name: &str) -> bool {
    let mut bytes = name.bytes();
    match bytes.next() {
        Some(first) if first.is_ascii_alphabetic() => {
            bytes.all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'-' | b'.'))
        }
        _ => false,
    }
}

fn is_entity_name(name: &str) -> bool {
    match name.strip_prefix('#') {
        Some(rest) => match rest.strip_prefix(['x', 'X']) {
            Some(hex) => !hex.is_empty() && hex.bytes().all(|b| b.is_ascii_hexdigit()),
            None => !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()),
        },
        None => !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric()),
    }
}

// ----------------------------------------------------------------------------
// String-list syntax
// ----------------------------------------------------------------------------

/// Splits a comma-separated list, trimming entries and dropping empty ones.
pub fn parse_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parses the compact whitelist syntax `span;br;a:href,target`.
///
/// Entries are separated by `;`. Each entry is a tag name optionally followed
/// by `:` and a comma-separated attribute list.
pub fn parse_allowed_tags(spec: &str) -> BTreeMap<String, Vec<String>> {
    let mut tags = BTreeMap::new();
    for entry in spec.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        let (tag, attrs) = match entry.split_once(':') {
            Some((tag, attrs)) => (tag.trim(), parse_list(attrs)),
            None => (entry, Vec::new()),
        };
        if !tag.is_empty() {
            tags.insert(tag.to_ascii_lowercase(), attrs);
        }
    }
    tags
}

// ----------------------------------------------------------------------------
// Serde form
// ----------------------------------------------------------------------------

/// A list given either as a JSON array or as a comma-separated string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ListValue {
    List(Vec<String>),
    Csv(String),
}

impl ListValue {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            ListValue::List(items) => items,
            ListValue::Csv(csv) => parse_list(&csv),
        }
    }
}

/// The tag whitelist given as a map of tag to attributes, or in the compact
/// `tag:attr,attr;tag` syntax.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TagsValue {
    Map(BTreeMap<String, ListValue>),
    Compact(String),
}

impl TagsValue {
    pub fn into_map(self) -> BTreeMap<String, Vec<String>> {
        match self {
            TagsValue::Map(map) => map.into_iter().map(|(k, v)| (k, v.into_vec())).collect(),
            TagsValue::Compact(spec) => parse_allowed_tags(&spec),
        }
    }
}

/// Deserializable configuration document. Absent fields keep the default
/// preset's value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawConfig {
    pub allowed: Option<TagsValue>,
    pub self_closing: Option<ListValue>,
    pub need_closing: Option<ListValue>,
    pub disallowed: Option<ListValue>,
    pub protocol_attributes: Option<ListValue>,
    pub allowed_protocols: Option<ListValue>,
    pub denied_protocols: Option<ListValue>,
    pub remove_blanks: Option<ListValue>,
    pub allowed_entities: Option<ListValue>,
    pub strip_comments: Option<bool>,
    pub always_make_tags: Option<bool>,
}

impl RawConfig {
    /// Layer this document over the default preset and validate it.
    pub fn into_config(self) -> Result<FilterConfig, ConfigError> {
        self.into_builder().build()
    }

    /// Layer this document over the default preset without validating.
    pub fn into_builder(self) -> ConfigBuilder {
        let mut b = ConfigBuilder::with_defaults(self.always_make_tags.unwrap_or(true));
        if let Some(tags) = self.allowed {
            b = b.allowed_tags(tags.into_map());
        }
        if let Some(v) = self.self_closing {
            b = b.self_closing(v.into_vec());
        }
        if let Some(v) = self.need_closing {
            b = b.need_closing(v.into_vec());
        }
        if let Some(v) = self.disallowed {
            b = b.disallow(v.into_vec());
        }
        if let Some(v) = self.protocol_attributes {
            b = b.protocol_attributes(v.into_vec());
        }
        if let Some(v) = self.allowed_protocols {
            b = b.allowed_protocols(v.into_vec());
        }
        if let Some(v) = self.denied_protocols {
            b = b.denied_protocols(v.into_vec());
        }
        if let Some(v) = self.remove_blanks {
            b = b.remove_blanks(v.into_vec());
        }
        if let Some(v) = self.allowed_entities {
            b = b.allowed_entities(v.into_vec());
        }
        if let Some(strip) = self.strip_comments {
            b = b.strip_comments(strip);
        }
        b
    }
}
