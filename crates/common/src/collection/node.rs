use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::path::{PathCodec, PathError, TreePath};

/// Longest accepted collection name, in characters
pub const MAX_NAME_LEN: usize = 255;

/// Stable identity of a collection, independent of its position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Uuid);

impl NodeId {
    /// The well-known id of the reserved Root collection
    pub const ROOT: NodeId = NodeId(Uuid::nil());

    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        *self == Self::ROOT
    }
}

impl From<Uuid> for NodeId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/**
 * Nodes
 * =====
 * A node is a single collection in the tree. Its position is fully
 *  described by its materialized path; depth is derived from the path
 *  and numchild is kept up to date by the tree engine as children come
 *  and go.
 * Nodes are snapshots: holding one does not pin the tree, and after any
 *  structural mutation the path in a held node may be stale. Re-read by
 *  id through the query engine when in doubt.
 */
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    id: NodeId,
    name: String,
    path: TreePath,
    depth: u32,
    numchild: u64,
}

impl Node {
    pub(crate) fn new(id: NodeId, name: String, path: TreePath, codec: &PathCodec) -> Self {
        let depth = codec.depth(&path);
        Self {
            id,
            name,
            path,
            depth,
            numchild: 0,
        }
    }

    /// Rebuild a node from a stored row, validating its path.
    pub fn from_parts(
        id: NodeId,
        name: String,
        path: &str,
        numchild: u64,
        codec: &PathCodec,
    ) -> Result<Self, PathError> {
        let path = codec.parse(path)?;
        let depth = codec.depth(&path);
        Ok(Self {
            id,
            name,
            path,
            depth,
            numchild,
        })
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &TreePath {
        &self.path
    }

    /// 1 for top-level nodes
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Number of direct children
    pub fn numchild(&self) -> u64 {
        self.numchild
    }

    pub fn is_leaf(&self) -> bool {
        self.numchild == 0
    }

    pub fn is_root(&self) -> bool {
        self.id.is_root()
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub(crate) fn rebase(&mut self, path: TreePath, depth_delta: i64) {
        self.path = path;
        self.depth = (self.depth as i64 + depth_delta) as u32;
    }

    pub(crate) fn set_numchild(&mut self, numchild: u64) {
        self.numchild = numchild;
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
