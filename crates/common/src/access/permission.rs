use std::collections::BTreeSet;

use super::error::ResolveError;
use super::grant::{Action, GrantRegistry, GroupId};
use crate::collection::{Node, NodeId};
use crate::store::TreeBackend;
use crate::tree::TreeQuery;

/// Answers "may these groups do this here?" against a grant registry.
///
/// A grant on a collection covers the collection and everything below
///  it. There are no denials: any matching grant on the node or one of
///  its ancestors allows the action.
#[derive(Debug, Clone)]
pub struct PermissionResolver<B: TreeBackend, G: GrantRegistry> {
    query: TreeQuery<B>,
    grants: G,
}

impl<B: TreeBackend, G: GrantRegistry> PermissionResolver<B, G> {
    pub fn new(query: TreeQuery<B>, grants: G) -> Self {
        Self { query, grants }
    }

    pub fn grants(&self) -> &G {
        &self.grants
    }

    /// Checks the node and all of its ancestors in one registry lookup.
    #[tracing::instrument(skip(self))]
    pub async fn has_permission(
        &self,
        groups: &[GroupId],
        node: NodeId,
        action: &Action,
    ) -> Result<bool, ResolveError<B::Error, G::Error>> {
        let chain = self.query.ancestor_ids(node, true).await?;
        if groups.is_empty() {
            return Ok(false);
        }
        let granted = self
            .grants
            .lookup(groups, action, &chain)
            .await
            .map_err(ResolveError::Registry)?;
        tracing::debug!(depth = chain.len(), granted = granted.len(), "resolved permission");
        Ok(!granted.is_empty())
    }

    /// Every collection `groups` may perform `action` on, in tree order.
    #[tracing::instrument(skip(self))]
    pub async fn permitted_nodes(
        &self,
        groups: &[GroupId],
        action: &Action,
    ) -> Result<Vec<Node>, ResolveError<B::Error, G::Error>> {
        if groups.is_empty() {
            return Ok(Vec::new());
        }
        let granted: BTreeSet<NodeId> = self
            .grants
            .granted_nodes(groups, action)
            .await
            .map_err(ResolveError::Registry)?;
        Ok(self.query.subtrees_of(&granted).await?)
    }
}
