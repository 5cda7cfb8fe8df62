use crate::collection::NodeId;
use crate::path::PathError;
use crate::store::StoreError;

#[derive(thiserror::Error, Debug)]
pub enum TreeError<E> {
    #[error("path error: {0}")]
    Path(#[from] PathError),
    #[error("store error: {0}")]
    Store(#[from] StoreError<E>),
    #[error("collection not found: {0}")]
    NotFound(NodeId),
    /// Another sibling already sorts into the same slot
    #[error("a sibling named {name:?} already exists")]
    DuplicateSibling { name: String },
    #[error("cannot move {node} below {target}: target is inside the moved subtree")]
    CyclicMove { node: NodeId, target: NodeId },
    /// The reserved Root cannot be moved, renamed or deleted
    #[error("collection {0} is protected")]
    ProtectedNode(NodeId),
    /// An explicit position disagrees with the sibling order
    #[error("{name:?} cannot be placed at position {position} without breaking sibling order")]
    MisplacedSibling { name: String, position: usize },
    #[error("invalid collection name: {0:?}")]
    InvalidName(String),
}

impl<E> TreeError<E> {
    /// Whether the store rejected the change set because another writer
    ///  got there first
    pub fn is_conflict(&self) -> bool {
        matches!(self, TreeError::Store(StoreError::Conflict(_)))
    }
}
