use crate::tree::TreeError;

#[derive(thiserror::Error, Debug)]
pub enum ResolveError<E, R> {
    /// The node could not be resolved in the tree
    #[error("tree error: {0}")]
    Tree(#[from] TreeError<E>),
    /// The grant registry or restriction store failed
    #[error("registry error: {0}")]
    Registry(R),
}
