// ABOUTME: Whitelist-based HTML sanitizer for user-supplied rich text.
// ABOUTME: Re-exports the public API: HtmlFilter, clean, FilterConfig, ConfigBuilder, RawConfig, ConfigError.

//! htmlfilter - make untrusted markup safe to embed in a trusted page.
//!
//! Input runs through a fixed sequence of passes: disallowed tags are cut out
//! with everything they enclose, the rest is tokenized (repairing or escaping
//! unmatched angle brackets), tags outside the whitelist are dropped, the
//! survivors are balanced, URL attributes are checked for dangerous schemes
//! and stray ampersands are escaped.
//!
//! # Example
//!
//! ```
//! use htmlfilter::{FilterConfig, HtmlFilter};
//!
//! let config = FilterConfig::builder()
//!     .allow_tag("p", ["class"])
//!     .allow_tag("br", Vec::<String>::new())
//!     .need_closing(["p"])
//!     .self_closing(["br"])
//!     .disallow(["script"])
//!     .build()
//!     .unwrap();
//! let filter = HtmlFilter::with_config(config);
//!
//! assert_eq!(
//!     filter.filter(r#"<p class=note onclick="x()">hi<br><script>alert(1)</script>"#),
//!     r#"<p class="note">hi<br /></p>"#
//! );
//! ```

pub mod attributes;
pub mod balancer;
pub mod config;
pub mod entities;
pub mod error;
pub mod filter;
pub mod protocol;
pub mod strip;
pub mod tokenizer;

pub use crate::attributes::TagToken;
pub use crate::config::{parse_allowed_tags, parse_list, ConfigBuilder, FilterConfig, RawConfig};
pub use crate::entities::escape_entities;
pub use crate::error::ConfigError;
pub use crate::filter::{clean, HtmlFilter};
pub use crate::protocol::validate_protocol;
pub use crate::tokenizer::{tokenize, Token};
