use std::collections::{BTreeSet, HashSet};
use std::fmt::{self, Debug};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::collection::NodeId;

/// A group of users that permissions are granted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(Uuid);

impl GroupId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for GroupId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Name of a permission, e.g. `add`, `change` or `choose`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Action(String);

impl Action {
    pub fn new(action: impl Into<String>) -> Self {
        Self(action.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Action {
    fn from(action: &str) -> Self {
        Self::new(action)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `group` may perform `action` on `node` and everything below it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GrantEntry {
    pub group: GroupId,
    pub node: NodeId,
    pub action: Action,
}

impl fmt::Display for GrantEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "group {} has permission '{}' on collection {}",
            self.group, self.action, self.node
        )
    }
}

/// Where group permissions on collections are recorded.
///
/// Grants have no notion of inheritance here; the resolver expands a node
///  into its ancestors and asks about all of them at once.
#[async_trait]
pub trait GrantRegistry: Send + Sync + Debug + Clone + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    /// The subset of `nodes` carrying a grant of `action` to any of
    ///  `groups`.
    async fn lookup(
        &self,
        groups: &[GroupId],
        action: &Action,
        nodes: &[NodeId],
    ) -> Result<BTreeSet<NodeId>, Self::Error>;

    /// Every node carrying a grant of `action` to any of `groups`.
    async fn granted_nodes(
        &self,
        groups: &[GroupId],
        action: &Action,
    ) -> Result<BTreeSet<NodeId>, Self::Error>;
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryRegistryError {
    #[error("memory registry error: {0}")]
    Internal(String),
}

/// In-memory grant registry
#[derive(Debug, Clone, Default)]
pub struct MemoryGrantRegistry {
    inner: Arc<RwLock<HashSet<GrantEntry>>>,
}

impl MemoryGrantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a grant. Returns false if the exact grant already existed.
    pub fn grant(&self, entry: GrantEntry) -> Result<bool, MemoryRegistryError> {
        let mut grants = self.inner.write().map_err(|e| {
            MemoryRegistryError::Internal(format!("failed to acquire write lock: {}", e))
        })?;
        Ok(grants.insert(entry))
    }

    pub fn revoke(&self, entry: &GrantEntry) -> Result<bool, MemoryRegistryError> {
        let mut grants = self.inner.write().map_err(|e| {
            MemoryRegistryError::Internal(format!("failed to acquire write lock: {}", e))
        })?;
        Ok(grants.remove(entry))
    }

    /// Drop every grant on `nodes`; call with the ids of a deleted subtree.
    pub fn forget_nodes(&self, nodes: &[NodeId]) -> Result<usize, MemoryRegistryError> {
        let mut grants = self.inner.write().map_err(|e| {
            MemoryRegistryError::Internal(format!("failed to acquire write lock: {}", e))
        })?;
        let before = grants.len();
        grants.retain(|grant| !nodes.contains(&grant.node));
        Ok(before - grants.len())
    }

    fn matching(
        &self,
        groups: &[GroupId],
        action: &Action,
        mut node: impl FnMut(&NodeId) -> bool,
    ) -> Result<BTreeSet<NodeId>, MemoryRegistryError> {
        let grants = self.inner.read().map_err(|e| {
            MemoryRegistryError::Internal(format!("failed to acquire read lock: {}", e))
        })?;
        Ok(grants
            .iter()
            .filter(|grant| &grant.action == action && groups.contains(&grant.group))
            .filter(|grant| node(&grant.node))
            .map(|grant| grant.node)
            .collect())
    }
}

#[async_trait]
impl GrantRegistry for MemoryGrantRegistry {
    type Error = MemoryRegistryError;

    async fn lookup(
        &self,
        groups: &[GroupId],
        action: &Action,
        nodes: &[NodeId],
    ) -> Result<BTreeSet<NodeId>, Self::Error> {
        self.matching(groups, action, |node| nodes.contains(node))
    }

    async fn granted_nodes(
        &self,
        groups: &[GroupId],
        action: &Action,
    ) -> Result<BTreeSet<NodeId>, Self::Error> {
        self.matching(groups, action, |_| true)
    }
}
