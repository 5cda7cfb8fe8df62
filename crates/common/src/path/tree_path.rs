use std::borrow::Borrow;
use std::fmt;

use serde::Serialize;

/// An encoded position in the tree.
///
/// Paths are only produced by a [`PathCodec`](super::PathCodec), either by
/// encoding ranks or by validating a stored string, so every `TreePath` in
/// circulation has a length that is a multiple of the codec's step length
/// and only contains alphabet characters.
///
/// Ordering is plain byte-wise string ordering, which the codec guarantees
/// to coincide with depth-first tree order.
///
/// Stored strings come back in through
///  [`PathCodec::parse`](super::PathCodec::parse); there is no `Deserialize`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct TreePath(String);

impl TreePath {
    pub(crate) fn from_validated(path: String) -> Self {
        Self(path)
    }

    /// The path as stored by a persistence backend.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of characters in the path.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `self` lies inside the subtree rooted at `other`
    ///  (a path is inside its own subtree).
    pub fn is_within(&self, other: &TreePath) -> bool {
        self.0.starts_with(&other.0)
    }

    /// Whether `self` is a strict ancestor of `other`.
    pub fn is_ancestor_of(&self, other: &TreePath) -> bool {
        other.0.len() > self.0.len() && other.is_within(self)
    }

    /// Exclusive upper bound of this path's subtree in string order.
    ///
    /// The node and all of its descendants sort in `[self, subtree_end)`
    ///  and nothing else does, since alphabet characters are ASCII.
    pub fn subtree_end(&self) -> String {
        format!("{}{}", self.0, char::MAX)
    }

    /// Swap the `from` prefix of this path for `to`, keeping the suffix
    ///  verbatim. Returns `None` if `from` is not a prefix.
    pub(crate) fn rebased(&self, from: &TreePath, to: &TreePath) -> Option<TreePath> {
        self.0
            .strip_prefix(&from.0)
            .map(|suffix| TreePath(format!("{}{}", to.0, suffix)))
    }

    pub(crate) fn truncated(&self, len: usize) -> TreePath {
        TreePath(self.0[..len].to_string())
    }

    pub(crate) fn joined(&self, segment: &str) -> TreePath {
        TreePath(format!("{}{}", self.0, segment))
    }
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Borrow<str> for TreePath {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for TreePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
