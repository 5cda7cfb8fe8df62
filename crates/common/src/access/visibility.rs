use std::collections::BTreeSet;

use async_trait::async_trait;

use super::error::ResolveError;
use super::grant::GroupId;
use super::restriction::{RestrictionEntry, RestrictionId, RestrictionKind, RestrictionStore};
use crate::collection::NodeId;
use crate::store::TreeBackend;
use crate::tree::TreeQuery;

/// Who is asking to see a collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Viewer {
    pub authenticated: bool,
    pub superuser: bool,
    pub groups: BTreeSet<GroupId>,
}

impl Viewer {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn member_of(groups: impl IntoIterator<Item = GroupId>) -> Self {
        Self {
            authenticated: true,
            superuser: false,
            groups: groups.into_iter().collect(),
        }
    }

    /// Whether `restriction` lets this viewer through, given whether they
    ///  have already passed it (e.g. entered the password) this session.
    pub fn satisfies(&self, restriction: &RestrictionEntry, passed: bool) -> bool {
        match restriction.kind {
            RestrictionKind::Password => passed,
            RestrictionKind::Login => self.authenticated,
            RestrictionKind::Groups => {
                self.authenticated
                    && (self.superuser || !self.groups.is_disjoint(&restriction.groups))
            }
        }
    }
}

/// Session-side record of restrictions a viewer has already passed.
#[async_trait]
pub trait PassedRestrictions: Send + Sync {
    async fn has_passed(&self, restriction: RestrictionId) -> bool;
}

#[async_trait]
impl PassedRestrictions for BTreeSet<RestrictionId> {
    async fn has_passed(&self, restriction: RestrictionId) -> bool {
        self.contains(&restriction)
    }
}

/// Works out which view restrictions guard a collection.
#[derive(Debug, Clone)]
pub struct VisibilityResolver<B: TreeBackend, S: RestrictionStore> {
    query: TreeQuery<B>,
    restrictions: S,
}

impl<B: TreeBackend, S: RestrictionStore> VisibilityResolver<B, S> {
    pub fn new(query: TreeQuery<B>, restrictions: S) -> Self {
        Self {
            query,
            restrictions,
        }
    }

    pub fn restrictions(&self) -> &S {
        &self.restrictions
    }

    /// Restrictions on the node or any of its ancestors, in one store
    ///  lookup.
    #[tracing::instrument(skip(self))]
    pub async fn restrictions_for(
        &self,
        node: NodeId,
    ) -> Result<BTreeSet<RestrictionEntry>, ResolveError<B::Error, S::Error>> {
        let chain = self.query.ancestor_ids(node, true).await?;
        let found = self
            .restrictions
            .lookup(&chain)
            .await
            .map_err(ResolveError::Registry)?;
        tracing::debug!(depth = chain.len(), restrictions = found.len(), "resolved restrictions");
        Ok(found)
    }

    /// Whether `viewer` satisfies every restriction guarding `node`.
    pub async fn can_view<P: PassedRestrictions>(
        &self,
        viewer: &Viewer,
        node: NodeId,
        passed: &P,
    ) -> Result<bool, ResolveError<B::Error, S::Error>> {
        for restriction in self.restrictions_for(node).await? {
            let has_passed = passed.has_passed(restriction.id).await;
            if !viewer.satisfies(&restriction, has_passed) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
