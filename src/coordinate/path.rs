//! The coordinate value type.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Ordered key path from the root to one instance, outermost key first.
///
/// `[orderId, lineItemId]` names the line item `lineItemId` inside order
/// `orderId`. The empty coordinate is the root component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Coordinate(Vec<String>);

impl Coordinate {
    /// The root coordinate (no segments).
    pub const fn root() -> Self {
        Self(Vec::new())
    }

    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// A new coordinate one level deeper.
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = Vec::with_capacity(self.0.len() + 1);
        segments.extend(self.0.iter().cloned());
        segments.push(segment.into());
        Self(segments)
    }

    pub fn parent(&self) -> Option<Self> {
        let (_, rest) = self.0.split_last()?;
        Some(Self(rest.to_vec()))
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// The innermost segment, i.e. the key of the item this coordinate ends in.
    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// True if `self` is `prefix` or lies underneath it.
    pub fn starts_with(&self, prefix: &Coordinate) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Every strict ancestor, innermost first, ending with the root.
    pub fn ancestors(&self) -> impl Iterator<Item = Coordinate> + '_ {
        (0..self.0.len()).rev().map(|len| Self(self.0[..len].to_vec()))
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.join("/"))
    }
}

impl<S: Into<String>> FromIterator<S> for Coordinate {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_and_parent() {
        let order = Coordinate::root().child("o1");
        let line = order.child("l7");

        assert_eq!(line.segments(), ["o1", "l7"]);
        assert_eq!(line.parent(), Some(order.clone()));
        assert_eq!(order.parent(), Some(Coordinate::root()));
        assert_eq!(Coordinate::root().parent(), None);
        assert_eq!(line.last(), Some("l7"));
    }

    #[test]
    fn test_prefix_matching() {
        let b = Coordinate::new(["b"]);
        let inside = Coordinate::new(["b", "node", "x"]);
        let sibling = Coordinate::new(["bb"]);

        assert!(inside.starts_with(&b));
        assert!(b.starts_with(&b));
        assert!(!sibling.starts_with(&b));
        assert!(b.starts_with(&Coordinate::root()));
    }

    #[test]
    fn test_ancestors_innermost_first() {
        let c = Coordinate::new(["a", "b", "c"]);
        let ancestors: Vec<_> = c.ancestors().collect();
        assert_eq!(
            ancestors,
            vec![
                Coordinate::new(["a", "b"]),
                Coordinate::new(["a"]),
                Coordinate::root(),
            ]
        );
    }

    #[test]
    fn test_display_and_wire_format() {
        let c = Coordinate::new(["b", "node"]);
        assert_eq!(c.to_string(), "[b/node]");
        assert_eq!(serde_json::to_string(&c).unwrap(), r#"["b","node"]"#);
    }
}
