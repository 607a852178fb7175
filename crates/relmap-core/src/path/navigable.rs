//! Structural identifiers for positions in an entity's attribute graph.
//!
//! Rendered as `Order(o).customer.address`: segments joined with `.`, an
//! optional alias in parentheses. Equality and hashing are by value.
//!
//! Rendering parses back to an equal path as long as every name and alias
//! is a plain identifier or a synthetic part; the domain model and query
//! roots enforce that for the paths a [`QueryTree`](super::QueryTree) builds.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{RelmapError, Result};
use crate::model::ident::is_ident_segment;

/// Synthetic part name for a collection element.
pub const ELEMENT: &str = "{element}";
/// Synthetic part name for a list index.
pub const INDEX: &str = "{index}";
/// Synthetic part name for a map key.
pub const KEY: &str = "{key}";
/// Synthetic part name for a map value.
pub const VALUE: &str = "{value}";

static SEGMENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<name>[^.(){}]+|\{(?:element|index|key|value)\})(?:\((?P<alias>[^.()]+)\))?$")
        .unwrap()
});

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Segment {
    name: Arc<str>,
    alias: Option<Arc<str>>,
}

impl Segment {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub fn is_synthetic(&self) -> bool {
        self.name.starts_with('{')
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let Some(alias) = &self.alias {
            write!(f, "({alias})")?;
        }
        Ok(())
    }
}

/// Immutable, never empty; the first segment names the root entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NavigablePath {
    segments: Arc<[Segment]>,
}

impl NavigablePath {
    pub fn root(entity_name: &str) -> Self {
        Self::from_segments(vec![segment(entity_name, None)])
    }

    pub fn root_aliased(entity_name: &str, alias: &str) -> Self {
        Self::from_segments(vec![segment(entity_name, Some(alias))])
    }

    fn from_segments(segments: Vec<Segment>) -> Self {
        Self {
            segments: Arc::from(segments),
        }
    }

    /// Child path; `self` is left untouched.
    pub fn append(&self, name: &str) -> Self {
        self.extend(segment(name, None))
    }

    pub fn append_aliased(&self, name: &str, alias: &str) -> Self {
        self.extend(segment(name, Some(alias)))
    }

    fn extend(&self, child: Segment) -> Self {
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        segments.extend(self.segments.iter().cloned());
        segments.push(child);
        Self::from_segments(segments)
    }

    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        Some(Self::from_segments(
            self.segments[..self.segments.len() - 1].to_vec(),
        ))
    }

    pub fn local_name(&self) -> &str {
        self.last().name()
    }

    pub fn alias(&self) -> Option<&str> {
        self.last().alias()
    }

    fn last(&self) -> &Segment {
        // never empty by construction
        &self.segments[self.segments.len() - 1]
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Number of steps below the root.
    pub fn depth(&self) -> usize {
        self.segments.len() - 1
    }

    pub fn is_root(&self) -> bool {
        self.segments.len() == 1
    }

    pub fn is_parent_of(&self, other: &NavigablePath) -> bool {
        other.segments.len() == self.segments.len() + 1 && self.is_prefix_of(other)
    }

    /// Reflexive.
    pub fn is_prefix_of(&self, other: &NavigablePath) -> bool {
        other.segments.len() >= self.segments.len()
            && other.segments[..self.segments.len()] == self.segments[..]
    }

    /// Dotted remainder of `self` below `base`, if `base` is a prefix.
    pub fn relativize(&self, base: &NavigablePath) -> Option<String> {
        if !base.is_prefix_of(self) {
            return None;
        }
        Some(
            self.segments[base.segments.len()..]
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("."),
        )
    }

    /// Dotted names without aliases.
    pub fn full_path(&self) -> String {
        self.segments
            .iter()
            .map(Segment::name)
            .collect::<Vec<_>>()
            .join(".")
    }
}

fn segment(name: &str, alias: Option<&str>) -> Segment {
    Segment {
        name: Arc::from(name),
        alias: alias.map(Arc::from),
    }
}

impl fmt::Display for NavigablePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{seg}")?;
        }
        Ok(())
    }
}

impl FromStr for NavigablePath {
    type Err = RelmapError;

    fn from_str(input: &str) -> Result<Self> {
        let invalid = |reason: String| RelmapError::InvalidPath {
            input: input.to_string(),
            reason,
        };

        let s = input.trim();
        if s.is_empty() {
            return Err(invalid("empty path".into()));
        }

        let mut segments = Vec::new();
        for part in s.split('.') {
            let caps = SEGMENT_RE
                .captures(part.trim())
                .ok_or_else(|| invalid(format!("malformed segment `{part}`")))?;
            let name = &caps["name"];
            if segments.is_empty() && name.starts_with('{') {
                return Err(invalid("root cannot be a synthetic part".into()));
            }
            let alias = caps.name("alias").map(|m| m.as_str());
            let plain = name.starts_with('{') || is_ident_segment(name);
            if !plain || !alias.map_or(true, is_ident_segment) {
                return Err(invalid(format!("`{part}` is not a plain identifier")));
            }
            segments.push(segment(name, alias));
        }
        Ok(Self::from_segments(segments))
    }
}

impl TryFrom<&str> for NavigablePath {
    type Error = RelmapError;

    fn try_from(s: &str) -> Result<Self> {
        s.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_structural_equality() {
        let a = NavigablePath::root("Order").append("customer").append("address");
        let b = NavigablePath::root("Order").append("customer").append("address");
        assert_eq!(a, b);

        let mut index = HashMap::new();
        index.insert(a, 1);
        assert_eq!(index.get(&b), Some(&1));

        let aliased = NavigablePath::root_aliased("Order", "o").append("customer");
        assert_ne!(aliased, NavigablePath::root("Order").append("customer"));
    }

    #[test]
    fn test_parent_and_local_name() {
        let root = NavigablePath::root("Order");
        let customer = root.append("customer");
        assert_eq!(customer.local_name(), "customer");
        assert_eq!(customer.parent(), Some(root.clone()));
        assert!(root.parent().is_none());
        assert!(root.is_parent_of(&customer));
        assert!(!customer.is_parent_of(&root));
        assert_eq!(root.depth(), 0);
        assert_eq!(customer.depth(), 1);
        // the parent is not modified by deriving a child
        assert!(root.is_root());
    }

    #[test]
    fn test_depth_counts_steps_below_root() {
        assert_eq!(NavigablePath::root_aliased("Order", "o").depth(), 0);
        let city: NavigablePath = "Order(o).customer.address.city".parse().unwrap();
        assert_eq!(city.segments().len(), 4);
        assert_eq!(city.depth(), 3);
        assert_eq!(city.append(ELEMENT).depth(), 4);
    }

    #[test]
    fn test_relativize() {
        let root = NavigablePath::root_aliased("Order", "o");
        let city = root.append("customer").append("address").append("city");
        assert_eq!(city.relativize(&root).as_deref(), Some("customer.address.city"));
        assert_eq!(city.relativize(&city).as_deref(), Some(""));
        assert!(root.relativize(&city).is_none());
        assert_eq!(city.full_path(), "Order.customer.address.city");
    }

    #[test]
    fn test_display_and_parse() {
        let path = NavigablePath::root_aliased("Order", "o")
            .append_aliased("lines", "l")
            .append(ELEMENT)
            .append("quantity");
        let text = path.to_string();
        assert_eq!(text, "Order(o).lines(l).{element}.quantity");
        assert_eq!(text.parse::<NavigablePath>().unwrap(), path);
        assert_eq!(path.alias(), None);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["", "Order..customer", "Order.cust omer", "{key}.value", "Order(o"] {
            let err = bad.parse::<NavigablePath>().unwrap_err();
            assert!(matches!(err, RelmapError::InvalidPath { .. }), "{bad}");
        }
    }
}
