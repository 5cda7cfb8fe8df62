use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::collection::{DefaultNode, NameOrder, Node, NodeId, SiblingOrder, MAX_NAME_LEN};
use crate::config::{ConfigError, TreeConfig};
use crate::path::{PathCodec, TreePath};
use crate::store::{Change, ChangeSet, ChildState, Scan, StoreError, TreeBackend, TreeSnapshot};

use super::error::TreeError;
use super::locks::{LockScope, SubtreeGuard, SubtreeLocks};
use super::plan::{current_index, fits_at, insertion_index, place};
use super::query::TreeQuery;

/// Where a moved node should land among its new siblings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Position {
    /// Wherever its name sorts
    #[default]
    Sorted,
    /// At this 0-based index among the other children of the new parent.
    ///  Must agree with the sibling order.
    Index(usize),
}

/// What a mutation needs locked while it runs.
#[derive(Debug, Clone, Copy)]
enum Target {
    /// The subtree of this node
    Node(NodeId),
    /// The subtree of this node's parent, or the forest for top-level nodes
    ParentOf(NodeId),
}

/// Handle to a collection tree.
///
/// All structural mutations go through here. Each one locks the parent
///  scopes it reads sibling order from, plans its path rewrites against
///  a snapshot, and commits them as one change set. Mutations on disjoint
///  subtrees run in parallel; overlapping ones queue.
///
/// Cloning is cheap and clones share locks.
pub struct Tree<B: TreeBackend> {
    inner: Arc<TreeInner<B>>,
}

struct TreeInner<B> {
    backend: B,
    codec: PathCodec,
    config: TreeConfig,
    order: Box<dyn SiblingOrder>,
    locks: Arc<SubtreeLocks>,
}

impl<B: TreeBackend> Clone for Tree<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: TreeBackend> std::fmt::Debug for Tree<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tree")
            .field("backend", &self.inner.backend)
            .field("config", &self.inner.config)
            .field("order", &self.inner.order)
            .finish()
    }
}

impl<B: TreeBackend> Tree<B> {
    pub fn new(backend: B, config: TreeConfig) -> Result<Self, ConfigError> {
        Self::with_order(backend, config, NameOrder)
    }

    pub fn with_order(
        backend: B,
        config: TreeConfig,
        order: impl SiblingOrder,
    ) -> Result<Self, ConfigError> {
        let codec = PathCodec::from_config(&config)?;
        Ok(Self {
            inner: Arc::new(TreeInner {
                backend,
                codec,
                config,
                order: Box::new(order),
                locks: Arc::new(SubtreeLocks::new()),
            }),
        })
    }

    fn validate_name(name: &str) -> Result<(), TreeError<B::Error>> {
        if name.trim().is_empty() || name.chars().count() > MAX_NAME_LEN {
            return Err(TreeError::InvalidName(name.to_string()));
        }
        Ok(())
    }

    pub fn backend(&self) -> &B {
        &self.inner.backend
    }

    pub fn codec(&self) -> &PathCodec {
        &self.inner.codec
    }

    pub fn config(&self) -> &TreeConfig {
        &self.inner.config
    }

    /// Read-side access to the tree
    pub fn query(&self) -> TreeQuery<B> {
        TreeQuery::new(self.inner.backend.clone(), self.inner.codec.clone())
    }

    /// Create a top-level node.
    ///
    /// The first top-level node becomes the reserved Root with the
    ///  well-known [`NodeId::ROOT`] at rank 1; later ones get fresh ids and
    ///  are appended after the last top-level rank, so existing top-level
    ///  paths never change.
    #[tracing::instrument(skip(self))]
    pub async fn create_root(&self, name: &str) -> Result<Node, TreeError<B::Error>> {
        Self::validate_name(name)?;
        self.retrying("create_root", || self.try_create_top_level(name, false))
            .await
    }

    /// The reserved Root, created with `name` if it does not exist yet.
    #[tracing::instrument(skip(self))]
    pub async fn ensure_root(&self, name: &str) -> Result<Node, TreeError<B::Error>> {
        Self::validate_name(name)?;
        self.retrying("ensure_root", || self.try_create_top_level(name, true))
            .await
    }

    /// Create a child of `parent`, placed among its siblings by name.
    #[tracing::instrument(skip(self))]
    pub async fn add_child(&self, parent: NodeId, name: &str) -> Result<Node, TreeError<B::Error>> {
        Self::validate_name(name)?;
        self.retrying("add_child", || self.try_add_child(parent, name))
            .await
    }

    /// Move `node` and its subtree below `new_parent`.
    ///
    /// Descendants keep their path suffixes; only the prefix of the moved
    ///  subtree is rewritten.
    #[tracing::instrument(skip(self))]
    pub async fn move_node(
        &self,
        node: NodeId,
        new_parent: NodeId,
        position: Position,
    ) -> Result<Node, TreeError<B::Error>> {
        if node.is_root() {
            return Err(TreeError::ProtectedNode(node));
        }
        self.retrying("move_node", || self.try_move(node, new_parent, position))
            .await
    }

    /// Rename `node`, relocating it among its siblings if the new name
    ///  sorts elsewhere. Top-level nodes keep their rank.
    #[tracing::instrument(skip(self))]
    pub async fn rename(&self, node: NodeId, name: &str) -> Result<Node, TreeError<B::Error>> {
        if node.is_root() {
            return Err(TreeError::ProtectedNode(node));
        }
        Self::validate_name(name)?;
        self.retrying("rename", || self.try_rename(node, name)).await
    }

    /// Delete `node` together with its whole subtree. Returns how many
    ///  nodes were removed.
    ///
    /// Ranks of the remaining siblings are left alone, so a gap stays
    ///  where the node used to be.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, node: NodeId) -> Result<usize, TreeError<B::Error>> {
        if node.is_root() {
            return Err(TreeError::ProtectedNode(node));
        }
        self.retrying("delete", || self.try_delete(node)).await
    }

    /// Run `attempt` until it stops conflicting in the store or the
    ///  configured retries run out.
    async fn retrying<T, F, Fut>(&self, op: &'static str, mut attempt: F) -> Result<T, TreeError<B::Error>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TreeError<B::Error>>>,
    {
        let mut retries = 0;
        loop {
            match attempt().await {
                Err(err) if err.is_conflict() && retries < self.inner.config.commit_retries => {
                    retries += 1;
                    tracing::warn!(op, retries, error = %err, "tree mutation conflicted, re-planning");
                }
                result => return result,
            }
        }
    }

    async fn scope_of(
        &self,
        snapshot: &B::Snapshot,
        target: Target,
    ) -> Result<LockScope, TreeError<B::Error>> {
        let (Target::Node(id) | Target::ParentOf(id)) = target;
        let node = Self::load(snapshot, id).await?;
        Ok(match target {
            Target::Node(_) => LockScope::Subtree(node.path().clone()),
            Target::ParentOf(_) => LockScope::for_parent(self.inner.codec.parent(node.path())),
        })
    }

    async fn scopes_of(
        &self,
        snapshot: &B::Snapshot,
        targets: &[Target],
    ) -> Result<Vec<LockScope>, TreeError<B::Error>> {
        let mut scopes = Vec::with_capacity(targets.len());
        for target in targets {
            let scope = self.scope_of(snapshot, *target).await?;
            if !scopes.contains(&scope) {
                scopes.push(scope);
            }
        }
        Ok(scopes)
    }

    /// Lock the scopes behind `targets` and return a snapshot in which
    ///  those scopes are current.
    ///
    /// Paths can shift between looking a node up and getting its lock, so
    ///  the scopes are resolved again once held and the whole thing is
    ///  retried if they moved.
    async fn lock(
        &self,
        targets: &[Target],
    ) -> Result<(SubtreeGuard, B::Snapshot), TreeError<B::Error>> {
        loop {
            let scopes = {
                let snapshot = self.inner.backend.snapshot().await?;
                self.scopes_of(&snapshot, targets).await?
            };
            let guard = self.inner.locks.acquire(scopes.clone()).await;
            let snapshot = self.inner.backend.snapshot().await?;
            if self.scopes_of(&snapshot, targets).await? == scopes {
                return Ok((guard, snapshot));
            }
            tracing::debug!(?targets, "locked scopes moved before acquisition, retrying");
        }
    }

    async fn load(snapshot: &B::Snapshot, id: NodeId) -> Result<Node, TreeError<B::Error>> {
        snapshot.node(id).await?.ok_or(TreeError::NotFound(id))
    }

    async fn parent_of(
        &self,
        snapshot: &B::Snapshot,
        node: &Node,
    ) -> Result<Option<Node>, TreeError<B::Error>> {
        match self.inner.codec.parent(node.path()) {
            Some(path) => Ok(Some(snapshot.node_at(&path).await?.ok_or_else(|| {
                StoreError::<B::Error>::Conflict(format!("parent of {} is missing at {}", node.id(), path))
            })?)),
            None => Ok(None),
        }
    }

    async fn children_below(
        snapshot: &B::Snapshot,
        parent: Option<&TreePath>,
    ) -> Result<Vec<Node>, TreeError<B::Error>> {
        Ok(snapshot.scan(Scan::Children(parent)).await?)
    }

    fn without(children: &[Node], id: NodeId) -> Vec<Node> {
        children.iter().filter(|c| c.id() != id).cloned().collect()
    }

    fn index_for(&self, siblings: &[Node], name: &str) -> Result<usize, TreeError<B::Error>> {
        insertion_index(
            self.inner.order.as_ref(),
            siblings,
            name,
            self.inner.config.unique_sibling_names,
        )
        .map_err(|existing| TreeError::DuplicateSibling {
            name: existing.to_string(),
        })
    }

    async fn commit(&self, changes: ChangeSet) -> Result<(), TreeError<B::Error>> {
        self.inner.backend.commit(changes).await?;
        Ok(())
    }

    async fn reload(&self, id: NodeId) -> Result<Node, TreeError<B::Error>> {
        let snapshot = self.inner.backend.snapshot().await?;
        Self::load(&snapshot, id).await
    }

    fn expect(node: &Node) -> Change {
        Change::Expect {
            id: node.id(),
            path: node.path().clone(),
            numchild: node.numchild(),
        }
    }

    /// Pin the sibling list a plan was computed from. Must come before
    ///  any change that rewrites paths under `parent`.
    fn expect_children(parent: Option<&Node>, children: &[Node]) -> Change {
        Change::ExpectChildren {
            parent: parent.map(|parent| parent.path().clone()),
            children: children.iter().map(ChildState::from).collect(),
        }
    }

    /// Park `node` under the destination's scratch slot, shift the
    ///  destination siblings, then drop the subtree into its final slot.
    fn relocation(
        &self,
        node: &Node,
        destination: Option<&Node>,
        siblings: &[Node],
        index: usize,
    ) -> Result<(TreePath, Vec<Change>), TreeError<B::Error>> {
        let codec = &self.inner.codec;
        let parent_path = destination.map(Node::path);
        let placement = place(codec, parent_path, siblings, index)?;
        let scratch = codec.scratch(parent_path);
        let depth_delta = codec.depth(&scratch) as i64 - node.depth() as i64;

        let mut changes = Vec::with_capacity(placement.shifts.len() + 2);
        changes.push(Change::Rebase {
            from: node.path().clone(),
            to: scratch.clone(),
            depth_delta,
        });
        changes.extend(placement.shifts);
        changes.push(Change::Rebase {
            from: scratch,
            to: placement.path.clone(),
            depth_delta: 0,
        });
        Ok((placement.path, changes))
    }

    async fn try_create_top_level(
        &self,
        name: &str,
        reuse_root: bool,
    ) -> Result<Node, TreeError<B::Error>> {
        let _guard = self.inner.locks.acquire(vec![LockScope::Forest]).await;

        let (node, changes) = {
            let snapshot = self.inner.backend.snapshot().await?;
            let existing_root = snapshot.node(NodeId::ROOT).await?;
            if reuse_root {
                if let Some(root) = existing_root {
                    return Ok(root);
                }
            }

            let top_level = Self::children_below(&snapshot, None).await?;
            // only for the uniqueness check; top-level nodes always append
            self.index_for(&top_level, name)?;
            let placement = place(&self.inner.codec, None, &top_level, top_level.len())?;
            let id = match existing_root {
                Some(_) => NodeId::generate(),
                None => NodeId::ROOT,
            };
            let node = Node::new(id, name.to_string(), placement.path, &self.inner.codec);

            let mut changes = ChangeSet::new();
            changes.push(Self::expect_children(None, &top_level));
            changes.push(Change::Insert(node.clone()));
            (node, changes)
        };

        self.commit(changes).await?;
        tracing::info!(id = %node.id(), name, path = %node.path(), "created top-level collection");
        self.reload(node.id()).await
    }

    async fn try_add_child(&self, parent: NodeId, name: &str) -> Result<Node, TreeError<B::Error>> {
        let (_guard, snapshot) = self.lock(&[Target::Node(parent)]).await?;

        let (node, changes, shifted) = {
            let parent = Self::load(&snapshot, parent).await?;
            let siblings = Self::children_below(&snapshot, Some(parent.path())).await?;
            drop(snapshot);

            let index = self.index_for(&siblings, name)?;
            let placement = place(&self.inner.codec, Some(parent.path()), &siblings, index)?;
            let node = Node::new(
                NodeId::generate(),
                name.to_string(),
                placement.path,
                &self.inner.codec,
            );

            let shifted = placement.shifts.len();
            let mut changes = ChangeSet::new();
            changes.push(Self::expect(&parent));
            changes.push(Self::expect_children(Some(&parent), &siblings));
            changes.extend(placement.shifts);
            changes.push(Change::Insert(node.clone()));
            changes.push(Change::AdjustChildren {
                id: parent.id(),
                delta: 1,
            });
            (node, changes, shifted)
        };

        self.commit(changes).await?;
        tracing::info!(id = %node.id(), name, path = %node.path(), shifted, "added collection");
        self.reload(node.id()).await
    }

    async fn try_move(
        &self,
        id: NodeId,
        new_parent: NodeId,
        position: Position,
    ) -> Result<Node, TreeError<B::Error>> {
        let (_guard, snapshot) = self
            .lock(&[Target::ParentOf(id), Target::Node(new_parent)])
            .await?;

        let node = Self::load(&snapshot, id).await?;
        let destination = Self::load(&snapshot, new_parent).await?;
        if destination.path().is_within(node.path()) {
            return Err(TreeError::CyclicMove {
                node: id,
                target: new_parent,
            });
        }
        let old_parent = self.parent_of(&snapshot, &node).await?;
        let children = Self::children_below(&snapshot, Some(destination.path())).await?;
        drop(snapshot);
        let siblings = Self::without(&children, id);

        // a uniqueness check applies even when the index is explicit
        let sorted = self.index_for(&siblings, node.name())?;
        let index = match position {
            Position::Sorted => sorted,
            Position::Index(index) => {
                if !fits_at(self.inner.order.as_ref(), &siblings, node.name(), index) {
                    return Err(TreeError::MisplacedSibling {
                        name: node.name().to_string(),
                        position: index,
                    });
                }
                index
            }
        };

        let same_parent = old_parent.as_ref().map(Node::id) == Some(destination.id());
        if same_parent && index == current_index(&siblings, node.path()) {
            tracing::debug!(id = %id, "move leaves node in place");
            return Ok(node);
        }

        let (path, relocation) = self.relocation(&node, Some(&destination), &siblings, index)?;

        let mut changes = ChangeSet::new();
        changes.push(Self::expect(&node));
        if let Some(old_parent) = old_parent.as_ref().filter(|_| !same_parent) {
            changes.push(Self::expect(old_parent));
        }
        changes.push(Self::expect(&destination));
        changes.push(Self::expect_children(Some(&destination), &children));
        let shifted = relocation.len() - 2;
        changes.extend(relocation);
        if !same_parent {
            if let Some(old_parent) = &old_parent {
                changes.push(Change::AdjustChildren {
                    id: old_parent.id(),
                    delta: -1,
                });
            }
            changes.push(Change::AdjustChildren {
                id: destination.id(),
                delta: 1,
            });
        }

        self.commit(changes).await?;
        tracing::info!(
            id = %id,
            from = %node.path(),
            to = %path,
            shifted,
            "moved collection"
        );
        self.reload(id).await
    }

    async fn try_rename(&self, id: NodeId, name: &str) -> Result<Node, TreeError<B::Error>> {
        let (_guard, snapshot) = self.lock(&[Target::ParentOf(id)]).await?;

        let node = Self::load(&snapshot, id).await?;
        let parent = self.parent_of(&snapshot, &node).await?;
        let parent_path = parent.as_ref().map(Node::path);
        let children = Self::children_below(&snapshot, parent_path).await?;
        drop(snapshot);
        let siblings = Self::without(&children, id);

        let index = self.index_for(&siblings, name)?;

        let mut changes = ChangeSet::new();
        changes.push(Self::expect(&node));
        if let Some(parent) = &parent {
            changes.push(Self::expect(parent));
        }
        changes.push(Self::expect_children(parent.as_ref(), &children));
        changes.push(Change::Rename {
            id,
            name: name.to_string(),
        });
        let relocated = parent.is_some() && index != current_index(&siblings, node.path());
        if relocated {
            let (_, relocation) = self.relocation(&node, parent.as_ref(), &siblings, index)?;
            changes.extend(relocation);
        }

        self.commit(changes).await?;
        tracing::info!(id = %id, from = node.name(), to = name, relocated, "renamed collection");
        self.reload(id).await
    }

    async fn try_delete(&self, id: NodeId) -> Result<usize, TreeError<B::Error>> {
        let (_guard, snapshot) = self.lock(&[Target::ParentOf(id)]).await?;

        let node = Self::load(&snapshot, id).await?;
        let parent = self.parent_of(&snapshot, &node).await?;
        let removed = snapshot.scan(Scan::Subtree(node.path())).await?.len();
        drop(snapshot);

        let mut changes = ChangeSet::new();
        changes.push(Self::expect(&node));
        if let Some(parent) = &parent {
            changes.push(Self::expect(parent));
        }
        changes.push(Change::RemoveSubtree {
            root: node.path().clone(),
        });
        if let Some(parent) = &parent {
            changes.push(Change::AdjustChildren {
                id: parent.id(),
                delta: -1,
            });
        }

        self.commit(changes).await?;
        tracing::info!(id = %id, path = %node.path(), removed, "deleted collection subtree");
        Ok(removed)
    }
}

#[async_trait]
impl<B: TreeBackend> DefaultNode for Tree<B> {
    type Error = TreeError<B::Error>;

    async fn default_node(&self) -> Result<Node, Self::Error> {
        self.query().root().await
    }
}
