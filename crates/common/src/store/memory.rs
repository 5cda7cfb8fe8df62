use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::{Arc, RwLock};

use super::provider::{Change, ChangeSet, Scan, StoreError, TreeBackend, TreeSnapshot};
use crate::collection::{Node, NodeId};
use crate::path::TreePath;

/// In-memory tree backend.
///
/// The committed tree lives behind an `Arc`; a snapshot is just another
///  reference to it. Commits apply their changes to a private copy and
///  swap it in, so readers never see half of a change set and a failed
///  change set leaves nothing behind.
#[derive(Debug, Clone)]
pub struct MemoryTreeBackend {
    inner: Arc<RwLock<Arc<MemoryTree>>>,
}

#[derive(Debug, Clone, Default)]
struct MemoryTree {
    /// Node rows by id
    nodes: HashMap<NodeId, Node>,
    /// Path index: path -> node id, kept in path order
    paths: BTreeMap<TreePath, NodeId>,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryTreeError {
    #[error("memory provider error: {0}")]
    Internal(String),
}

/// Snapshot of a [`MemoryTreeBackend`]
#[derive(Debug, Clone)]
pub struct MemorySnapshot {
    tree: Arc<MemoryTree>,
}

impl MemoryTreeBackend {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(MemoryTree::default()))),
        }
    }
}

impl Default for MemoryTreeBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn conflict<T>(message: impl Into<String>) -> Result<T, StoreError<MemoryTreeError>> {
    Err(StoreError::Conflict(message.into()))
}

impl MemoryTree {
    fn subtree_ids(&self, root: &TreePath) -> Vec<NodeId> {
        self.paths
            .range(root.clone()..)
            .take_while(|(path, _)| path.is_within(root))
            .map(|(_, id)| *id)
            .collect()
    }

    /// Direct children of `parent`, or top-level nodes for `None`, in path
    ///  order. Jumps over each child's subtree instead of walking it.
    fn child_ids(&self, parent: Option<&TreePath>) -> Vec<NodeId> {
        let mut next = match parent {
            Some(parent) if !self.paths.contains_key(parent) => return Vec::new(),
            Some(parent) => self
                .paths
                .range::<TreePath, _>((Bound::Excluded(parent), Bound::Unbounded))
                .next(),
            None => self.paths.iter().next(),
        };

        let mut ids = Vec::new();
        while let Some((path, id)) = next {
            if parent.is_some_and(|parent| !path.is_within(parent)) {
                break;
            }
            ids.push(*id);
            let end = path.subtree_end();
            next = self
                .paths
                .range::<str, _>((Bound::Included(end.as_str()), Bound::Unbounded))
                .next();
        }
        ids
    }

    fn node_at(&self, path: &TreePath) -> Option<&Node> {
        self.paths.get(path).and_then(|id| self.nodes.get(id))
    }

    fn collect(&self, ids: impl Iterator<Item = NodeId>) -> Vec<Node> {
        ids.filter_map(|id| self.nodes.get(&id).cloned()).collect()
    }

    fn apply(&mut self, change: Change) -> Result<(), StoreError<MemoryTreeError>> {
        match change {
            Change::Expect { id, path, numchild } => match self.nodes.get(&id) {
                Some(node) if node.path() == &path && node.numchild() == numchild => Ok(()),
                Some(node) => conflict(format!(
                    "node {} moved to {} with {} children, expected {} with {}",
                    id,
                    node.path(),
                    node.numchild(),
                    path,
                    numchild
                )),
                None => conflict(format!("node {} no longer exists", id)),
            },
            Change::ExpectChildren { parent, children } => {
                if let Some(parent) = &parent {
                    if !self.paths.contains_key(parent) {
                        return conflict(format!("parent {} no longer exists", parent));
                    }
                }
                let current = self.collect(self.child_ids(parent.as_ref()).into_iter());
                let unchanged = current.len() == children.len()
                    && children.iter().zip(&current).all(|(child, node)| child.matches(node));
                if !unchanged {
                    return conflict(format!(
                        "children of {} changed since planning",
                        parent.as_ref().map_or("the forest".to_string(), ToString::to_string)
                    ));
                }
                Ok(())
            }
            Change::Insert(node) => {
                if self.nodes.contains_key(&node.id()) {
                    return conflict(format!("node {} already exists", node.id()));
                }
                if self.paths.contains_key(node.path()) {
                    return conflict(format!("path {} is occupied", node.path()));
                }
                self.paths.insert(node.path().clone(), node.id());
                self.nodes.insert(node.id(), node);
                Ok(())
            }
            Change::Rebase {
                from,
                to,
                depth_delta,
            } => {
                if !self.paths.contains_key(&from) {
                    return conflict(format!("nothing to rebase at {}", from));
                }
                if self.paths.contains_key(&to) {
                    return conflict(format!("rebase target {} is occupied", to));
                }
                let ids = self.subtree_ids(&from);
                let mut moved = Vec::with_capacity(ids.len());
                for id in ids {
                    let Some(mut node) = self.nodes.remove(&id) else {
                        return conflict(format!("path index points at missing node {}", id));
                    };
                    self.paths.remove(node.path());
                    let Some(path) = node.path().rebased(&from, &to) else {
                        return conflict(format!("{} is outside {}", node.path(), from));
                    };
                    node.rebase(path, depth_delta);
                    moved.push(node);
                }
                for node in moved {
                    if self.paths.insert(node.path().clone(), node.id()).is_some() {
                        return conflict(format!("rebased path {} is occupied", node.path()));
                    }
                    self.nodes.insert(node.id(), node);
                }
                Ok(())
            }
            Change::Rename { id, name } => match self.nodes.get_mut(&id) {
                Some(node) => {
                    node.set_name(name);
                    Ok(())
                }
                None => conflict(format!("node {} no longer exists", id)),
            },
            Change::AdjustChildren { id, delta } => {
                let Some(node) = self.nodes.get_mut(&id) else {
                    return conflict(format!("node {} no longer exists", id));
                };
                let numchild = node.numchild() as i64 + delta;
                if numchild < 0 {
                    return conflict(format!("numchild of {} would drop below zero", id));
                }
                node.set_numchild(numchild as u64);
                Ok(())
            }
            Change::RemoveSubtree { root } => {
                if !self.paths.contains_key(&root) {
                    return conflict(format!("nothing to remove at {}", root));
                }
                for id in self.subtree_ids(&root) {
                    if let Some(node) = self.nodes.remove(&id) {
                        self.paths.remove(node.path());
                    }
                }
                Ok(())
            }
        }
    }
}

#[async_trait]
impl TreeSnapshot for MemorySnapshot {
    type Error = MemoryTreeError;

    async fn node(&self, id: NodeId) -> Result<Option<Node>, StoreError<Self::Error>> {
        Ok(self.tree.nodes.get(&id).cloned())
    }

    async fn node_at(&self, path: &TreePath) -> Result<Option<Node>, StoreError<Self::Error>> {
        Ok(self.tree.node_at(path).cloned())
    }

    async fn nodes_at(&self, paths: &[TreePath]) -> Result<Vec<Node>, StoreError<Self::Error>> {
        let mut nodes: Vec<Node> = paths
            .iter()
            .filter_map(|path| self.tree.node_at(path).cloned())
            .collect();
        nodes.sort_by(|a, b| a.path().cmp(b.path()));
        nodes.dedup_by_key(|node| node.id());
        Ok(nodes)
    }

    async fn scan(&self, scan: Scan<'_>) -> Result<Vec<Node>, StoreError<Self::Error>> {
        let tree = &self.tree;
        Ok(match scan {
            Scan::All => tree.collect(tree.paths.values().copied()),
            Scan::Subtree(root) => tree.collect(tree.subtree_ids(root).into_iter()),
            Scan::Children(parent) => tree.collect(tree.child_ids(parent).into_iter()),
        })
    }
}

#[async_trait]
impl TreeBackend for MemoryTreeBackend {
    type Error = MemoryTreeError;
    type Snapshot = MemorySnapshot;

    async fn snapshot(&self) -> Result<Self::Snapshot, StoreError<Self::Error>> {
        let inner = self.inner.read().map_err(|e| {
            StoreError::Provider(MemoryTreeError::Internal(format!(
                "failed to acquire read lock: {}",
                e
            )))
        })?;

        Ok(MemorySnapshot {
            tree: Arc::clone(&inner),
        })
    }

    async fn commit(&self, changes: ChangeSet) -> Result<(), StoreError<Self::Error>> {
        let mut inner = self.inner.write().map_err(|e| {
            StoreError::Provider(MemoryTreeError::Internal(format!(
                "failed to acquire write lock: {}",
                e
            )))
        })?;

        // Work on a copy; the live tree is only replaced once every
        //  change applied cleanly
        let mut next = MemoryTree::clone(&inner);
        for change in changes {
            next.apply(change)?;
        }
        *inner = Arc::new(next);

        Ok(())
    }
}
