use std::fmt::Debug;

use async_trait::async_trait;

use crate::collection::{Node, NodeId};
use crate::path::{PathError, TreePath};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError<T> {
    /// Backend failure (I/O, driver, lock poisoning, ...)
    #[error("unhandled tree store provider error: {0}")]
    Provider(#[from] T),
    /// A change set's preconditions no longer hold: another writer
    ///  touched the same part of the tree. Nothing was written.
    #[error("conflict with current tree: {0}")]
    Conflict(String),
    /// A stored row carries a path the codec cannot read
    #[error("corrupt stored path: {0}")]
    Path(PathError),
}

/// Which rows a [`TreeSnapshot::scan`] returns. Results are always
///  ordered by path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scan<'a> {
    /// Every node in the tree
    All,
    /// Direct children of the node at the path, or top-level nodes for `None`
    Children(Option<&'a TreePath>),
    /// The node at the path and all of its descendants
    Subtree(&'a TreePath),
}

/// One step of an atomic structural mutation.
///
/// Changes apply in order. A change whose precondition fails aborts the
///  whole [`ChangeSet`] with [`StoreError::Conflict`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// The node must still sit at `path` with `numchild` children
    Expect {
        id: NodeId,
        path: TreePath,
        numchild: u64,
    },
    /// The children of `parent` (top-level nodes for `None`) must be
    ///  exactly `children`, in path order, with the same names
    ExpectChildren {
        parent: Option<TreePath>,
        children: Vec<ChildState>,
    },
    /// Add a node; its id and path must be unused
    Insert(Node),
    /// Replace the `from` prefix with `to` on the node at `from` and every
    ///  descendant. The node at `from` must exist and `to` must be vacant.
    Rebase {
        from: TreePath,
        to: TreePath,
        depth_delta: i64,
    },
    Rename { id: NodeId, name: String },
    /// Add `delta` to a node's numchild; it may not drop below zero
    AdjustChildren { id: NodeId, delta: i64 },
    /// Remove the node at `root` together with its whole subtree
    RemoveSubtree { root: TreePath },
}

/// What a sibling looked like when a change set was planned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildState {
    pub id: NodeId,
    pub path: TreePath,
    pub name: String,
}

impl From<&Node> for ChildState {
    fn from(node: &Node) -> Self {
        Self {
            id: node.id(),
            path: node.path().clone(),
            name: node.name().to_string(),
        }
    }
}

impl ChildState {
    pub fn matches(&self, node: &Node) -> bool {
        self.id == node.id() && &self.path == node.path() && self.name == node.name()
    }
}

/// An ordered batch of changes applied all-or-nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    changes: Vec<Change>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, change: Change) {
        self.changes.push(change);
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Change> {
        self.changes.iter()
    }
}

impl Extend<Change> for ChangeSet {
    fn extend<I: IntoIterator<Item = Change>>(&mut self, iter: I) {
        self.changes.extend(iter);
    }
}

impl IntoIterator for ChangeSet {
    type Item = Change;
    type IntoIter = std::vec::IntoIter<Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.into_iter()
    }
}

/// A consistent read-only view of the tree.
///
/// Every read through one snapshot observes the same committed state,
///  no matter what writers do in the meantime.
#[async_trait]
pub trait TreeSnapshot: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn node(&self, id: NodeId) -> Result<Option<Node>, StoreError<Self::Error>>;

    async fn node_at(&self, path: &TreePath) -> Result<Option<Node>, StoreError<Self::Error>>;

    /// Nodes at any of the given paths, ordered by path. Paths without a
    ///  node are skipped.
    async fn nodes_at(&self, paths: &[TreePath]) -> Result<Vec<Node>, StoreError<Self::Error>>;

    async fn scan(&self, scan: Scan<'_>) -> Result<Vec<Node>, StoreError<Self::Error>>;
}

/// Persistence substrate for the collection tree.
///
/// Backends provide point lookups, path-ordered range reads and atomic
///  multi-row writes. They know nothing about sibling ordering; the tree
///  engine plans every path rewrite and hands it over as a [`ChangeSet`].
#[async_trait]
pub trait TreeBackend: Send + Sync + Debug + Clone + 'static {
    type Error: std::error::Error + Send + Sync + 'static;
    type Snapshot: TreeSnapshot<Error = Self::Error> + 'static;

    async fn snapshot(&self) -> Result<Self::Snapshot, StoreError<Self::Error>>;

    /// Apply every change or none of them.
    async fn commit(&self, changes: ChangeSet) -> Result<(), StoreError<Self::Error>>;
}
