use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Debug};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::grant::{GroupId, MemoryRegistryError};
use crate::collection::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RestrictionId(Uuid);

impl RestrictionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for RestrictionId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for RestrictionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestrictionKind {
    /// Viewers must have entered the shared password this session
    Password,
    /// Viewers must be signed in
    Login,
    /// Viewers must be signed in and belong to one of the listed groups
    Groups,
}

/// A view restriction attached to a collection. It applies to the
///  collection and every collection below it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RestrictionEntry {
    pub id: RestrictionId,
    pub node: NodeId,
    pub kind: RestrictionKind,
    /// Shared password for [`RestrictionKind::Password`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    /// Allowed groups for [`RestrictionKind::Groups`]
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub groups: BTreeSet<GroupId>,
}

impl RestrictionEntry {
    pub fn password(node: NodeId, secret: impl Into<String>) -> Self {
        Self {
            id: RestrictionId::generate(),
            node,
            kind: RestrictionKind::Password,
            secret: Some(secret.into()),
            groups: BTreeSet::new(),
        }
    }

    pub fn login(node: NodeId) -> Self {
        Self {
            id: RestrictionId::generate(),
            node,
            kind: RestrictionKind::Login,
            secret: None,
            groups: BTreeSet::new(),
        }
    }

    pub fn groups(node: NodeId, groups: impl IntoIterator<Item = GroupId>) -> Self {
        Self {
            id: RestrictionId::generate(),
            node,
            kind: RestrictionKind::Groups,
            secret: None,
            groups: groups.into_iter().collect(),
        }
    }
}

/// Where view restrictions are recorded.
#[async_trait]
pub trait RestrictionStore: Send + Sync + Debug + Clone + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Restrictions attached directly to any of `nodes`
    async fn lookup(&self, nodes: &[NodeId]) -> Result<BTreeSet<RestrictionEntry>, Self::Error>;
}

/// In-memory restriction store
#[derive(Debug, Clone, Default)]
pub struct MemoryRestrictionStore {
    inner: Arc<RwLock<BTreeMap<RestrictionId, RestrictionEntry>>>,
}

impl MemoryRestrictionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, entry: RestrictionEntry) -> Result<(), MemoryRegistryError> {
        let mut entries = self.inner.write().map_err(|e| {
            MemoryRegistryError::Internal(format!("failed to acquire write lock: {}", e))
        })?;
        entries.insert(entry.id, entry);
        Ok(())
    }

    pub fn remove(&self, id: RestrictionId) -> Result<Option<RestrictionEntry>, MemoryRegistryError> {
        let mut entries = self.inner.write().map_err(|e| {
            MemoryRegistryError::Internal(format!("failed to acquire write lock: {}", e))
        })?;
        Ok(entries.remove(&id))
    }

    /// Drop every restriction on `nodes`; call with the ids of a deleted
    ///  subtree.
    pub fn forget_nodes(&self, nodes: &[NodeId]) -> Result<usize, MemoryRegistryError> {
        let mut entries = self.inner.write().map_err(|e| {
            MemoryRegistryError::Internal(format!("failed to acquire write lock: {}", e))
        })?;
        let before = entries.len();
        entries.retain(|_, entry| !nodes.contains(&entry.node));
        Ok(before - entries.len())
    }
}

#[async_trait]
impl RestrictionStore for MemoryRestrictionStore {
    type Error = MemoryRegistryError;

    async fn lookup(&self, nodes: &[NodeId]) -> Result<BTreeSet<RestrictionEntry>, Self::Error> {
        let entries = self.inner.read().map_err(|e| {
            MemoryRegistryError::Internal(format!("failed to acquire read lock: {}", e))
        })?;
        Ok(entries
            .values()
            .filter(|entry| nodes.contains(&entry.node))
            .cloned()
            .collect())
    }
}
