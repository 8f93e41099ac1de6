//! Parsed hyperlink targets.
//!
//! Chapter markup links either out of the book or to another place inside
//! it. Internal targets are kept relative here; they only become spine
//! indices once resolved against the chapter they were activated from.

use crate::package::{is_external, split_fragment};

/// A parsed `href`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Link {
    /// URL with a scheme (`https://`, `mailto:`, ...).
    External(String),

    /// Link into the book.
    /// Example: `href="ch2.xhtml#sec3"` → path `ch2.xhtml`, fragment `sec3`.
    /// An empty path means the chapter the link lives in.
    Internal {
        path: String,
        fragment: Option<String>,
    },
}

impl Link {
    /// Parse a raw href. Returns `None` for an empty or fragment-less `#`.
    pub fn parse(href: &str) -> Option<Link> {
        let href = href.trim();
        if href.is_empty() || href == "#" {
            return None;
        }
        if is_external(href) {
            return Some(Link::External(href.to_string()));
        }

        let (path, fragment) = split_fragment(href);
        Some(Link::Internal {
            path: path.to_string(),
            fragment: fragment.map(str::to_string),
        })
    }

    pub fn is_external(&self) -> bool {
        matches!(self, Link::External(_))
    }

    /// Get the URL if this is an external link.
    pub fn as_external(&self) -> Option<&str> {
        match self {
            Link::External(url) => Some(url),
            Link::Internal { .. } => None,
        }
    }
}
