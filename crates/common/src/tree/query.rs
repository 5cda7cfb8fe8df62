use std::collections::BTreeSet;

use crate::collection::{Node, NodeId};
use crate::path::PathCodec;
use crate::store::{Scan, TreeBackend, TreeSnapshot};

use super::error::TreeError;

/// Read-only hierarchy queries.
///
/// Every method works off a single snapshot, so a result never mixes
///  states from before and after a concurrent mutation. Results come back
///  in path order (root first, siblings in name order) unless noted.
#[derive(Debug, Clone)]
pub struct TreeQuery<B: TreeBackend> {
    backend: B,
    codec: PathCodec,
}

impl<B: TreeBackend> TreeQuery<B> {
    pub fn new(backend: B, codec: PathCodec) -> Self {
        Self { backend, codec }
    }

    async fn load(snapshot: &B::Snapshot, id: NodeId) -> Result<Node, TreeError<B::Error>> {
        snapshot.node(id).await?.ok_or(TreeError::NotFound(id))
    }

    pub async fn node(&self, id: NodeId) -> Result<Node, TreeError<B::Error>> {
        let snapshot = self.backend.snapshot().await?;
        Self::load(&snapshot, id).await
    }

    /// The reserved Root
    pub async fn root(&self) -> Result<Node, TreeError<B::Error>> {
        self.node(NodeId::ROOT).await
    }

    /// Every node in the tree
    pub async fn all(&self) -> Result<Vec<Node>, TreeError<B::Error>> {
        let snapshot = self.backend.snapshot().await?;
        Ok(snapshot.scan(Scan::All).await?)
    }

    /// The chain from the top of the tree down to `id`'s parent, or down
    ///  to `id` itself when `inclusive`.
    pub async fn ancestors_of(
        &self,
        id: NodeId,
        inclusive: bool,
    ) -> Result<Vec<Node>, TreeError<B::Error>> {
        let snapshot = self.backend.snapshot().await?;
        let node = Self::load(&snapshot, id).await?;
        let paths = self.codec.ancestors(node.path(), inclusive);
        Ok(snapshot.nodes_at(&paths).await?)
    }

    /// Ids of [`ancestors_of`](Self::ancestors_of), for handing to registries.
    pub async fn ancestor_ids(
        &self,
        id: NodeId,
        inclusive: bool,
    ) -> Result<Vec<NodeId>, TreeError<B::Error>> {
        Ok(self
            .ancestors_of(id, inclusive)
            .await?
            .iter()
            .map(Node::id)
            .collect())
    }

    /// Everything below `id`, plus `id` itself when `inclusive`.
    pub async fn descendants_of(
        &self,
        id: NodeId,
        inclusive: bool,
    ) -> Result<Vec<Node>, TreeError<B::Error>> {
        let snapshot = self.backend.snapshot().await?;
        let node = Self::load(&snapshot, id).await?;
        let mut nodes = snapshot.scan(Scan::Subtree(node.path())).await?;
        if !inclusive {
            nodes.retain(|n| n.id() != id);
        }
        Ok(nodes)
    }

    pub async fn children_of(&self, id: NodeId) -> Result<Vec<Node>, TreeError<B::Error>> {
        let snapshot = self.backend.snapshot().await?;
        let node = Self::load(&snapshot, id).await?;
        Ok(snapshot.scan(Scan::Children(Some(node.path()))).await?)
    }

    /// Children of `node`'s parent, `node` included.
    async fn family(
        &self,
        snapshot: &B::Snapshot,
        node: &Node,
    ) -> Result<Vec<Node>, TreeError<B::Error>> {
        let parent = self.codec.parent(node.path());
        Ok(snapshot.scan(Scan::Children(parent.as_ref())).await?)
    }

    /// Nodes sharing `id`'s parent (top-level nodes for a top-level `id`).
    pub async fn siblings_of(
        &self,
        id: NodeId,
        inclusive: bool,
    ) -> Result<Vec<Node>, TreeError<B::Error>> {
        let snapshot = self.backend.snapshot().await?;
        let node = Self::load(&snapshot, id).await?;
        let mut siblings = self.family(&snapshot, &node).await?;
        if !inclusive {
            siblings.retain(|s| s.id() != id);
        }
        Ok(siblings)
    }

    /// Siblings sorting after `id`, nearest first.
    pub async fn next_siblings_of(&self, id: NodeId) -> Result<Vec<Node>, TreeError<B::Error>> {
        let snapshot = self.backend.snapshot().await?;
        let node = Self::load(&snapshot, id).await?;
        let mut siblings = self.family(&snapshot, &node).await?;
        siblings.retain(|s| s.path() > node.path());
        Ok(siblings)
    }

    /// Siblings sorting before `id`, nearest first.
    pub async fn prev_siblings_of(&self, id: NodeId) -> Result<Vec<Node>, TreeError<B::Error>> {
        let snapshot = self.backend.snapshot().await?;
        let node = Self::load(&snapshot, id).await?;
        let mut siblings = self.family(&snapshot, &node).await?;
        siblings.retain(|s| s.path() < node.path());
        siblings.reverse();
        Ok(siblings)
    }

    /// Union of the subtrees rooted at `roots`, each node once. Roots that
    ///  no longer exist are skipped.
    pub async fn subtrees_of(
        &self,
        roots: &BTreeSet<NodeId>,
    ) -> Result<Vec<Node>, TreeError<B::Error>> {
        let snapshot = self.backend.snapshot().await?;
        let mut tops = Vec::with_capacity(roots.len());
        for id in roots {
            if let Some(node) = snapshot.node(*id).await? {
                tops.push(node);
            }
        }
        tops.sort_by(|a, b| a.path().cmp(b.path()));

        let mut nodes = Vec::new();
        let mut covered: Option<Node> = None;
        for top in tops {
            // nested roots are already part of an earlier subtree
            if covered
                .as_ref()
                .is_some_and(|outer| top.path().is_within(outer.path()))
            {
                continue;
            }
            nodes.extend(snapshot.scan(Scan::Subtree(top.path())).await?);
            covered = Some(top);
        }
        Ok(nodes)
    }
}
