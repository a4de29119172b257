// ABOUTME: Error types for building a filter configuration.
// ABOUTME: Provides ConfigError; filtering itself never fails.

use std::fmt;
use thiserror::Error;

/// Errors raised while building a [`FilterConfig`](crate::FilterConfig).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Attributes were declared for a tag that is not whitelisted.
    #[error("attribute `{attribute}` declared for tag `{tag}` which is not whitelisted")]
    UnknownTag { tag: String, attribute: String },

    /// A tag was declared both self-closing and requiring a closing tag.
    #[error("tag `{0}` cannot be both self-closing and require closing")]
    ClosingConflict(String),

    /// A name contains characters outside its grammar.
    #[error("invalid {kind} name: {name:?}")]
    InvalidName { kind: &'static str, name: String },

    /// The disallowed-tag matcher could not be built.
    #[error("failed to build disallowed-tag matcher: {0}")]
    Matcher(String),

    /// A configuration document could not be decoded.
    #[error("failed to decode configuration: {0}")]
    Json(String),
}

impl ConfigError {
    /// Creates an InvalidName error for the given kind of name.
    pub fn invalid_name(kind: &'static str, name: impl Into<String>) -> Self {
        ConfigError::InvalidName {
            kind,
            name: name.into(),
        }
    }

    /// Creates a Json error from an underlying decode error.
    pub fn json(err: impl fmt::Display) -> Self {
        ConfigError::Json(err.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::json(err)
    }
}
