//! Materialized paths
//!
//! A node's position in the tree is a string made of fixed-width segments,
//! one per level. Each segment encodes the node's rank among its siblings
//! in an ordered alphabet, so comparing two paths as plain strings compares
//! the nodes' positions in a depth-first walk of the tree:
//!
//! ```text
//! 0001              Root
//! 00010001          Root / Pies
//! 000100010001      Root / Pies / Savoury
//! 000100010002      Root / Pies / Sweet
//! ```
//!
//! Hierarchy questions become prefix and range comparisons:
//! - ancestors of `p` are the prefixes of `p` at segment boundaries
//! - descendants of `p` are the paths that start with `p`
//! - siblings of `p` share `p` minus its last segment
//!
//! [`PathCodec`] owns all of the arithmetic; [`TreePath`] is an opaque,
//! ordered handle that callers can compare but never assemble by hand.

mod codec;
mod tree_path;

pub use codec::{PathCodec, PathError};
pub use tree_path::TreePath;
