use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{Node, NodeId};

/// Supplies the collection to fall back on when an entity has to live
///  somewhere before anyone picked a collection for it.
#[async_trait]
pub trait DefaultNode: Send + Sync {
    type Error;

    async fn default_node(&self) -> Result<Node, Self::Error>;
}

/// Placement of a resource (document, image, ...) in the collection tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionMember {
    collection: NodeId,
}

impl CollectionMember {
    pub fn new(collection: NodeId) -> Self {
        Self { collection }
    }

    /// Use `explicit` when given, otherwise whatever `defaults` hands out.
    pub async fn place<D: DefaultNode>(
        explicit: Option<NodeId>,
        defaults: &D,
    ) -> Result<Self, D::Error> {
        match explicit {
            Some(collection) => Ok(Self::new(collection)),
            None => Ok(Self::new(defaults.default_node().await?.id())),
        }
    }

    pub fn collection(&self) -> NodeId {
        self.collection
    }

    pub fn set_collection(&mut self, collection: NodeId) {
        self.collection = collection;
    }
}
