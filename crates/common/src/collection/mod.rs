//! Collections
//!
//! A collection is a named location that groups resources such as images
//!  and documents. Collections form a single tree under the reserved
//!  Root; siblings are kept in name order.
//!
//! - **[`Node`]**: one collection, with its materialized path
//! - **[`SiblingOrder`]**: the ordering capability the tree maintains
//! - **[`DefaultNode`]** / **[`CollectionMember`]**: placing resources
//!   in a collection, with a fallback when none was chosen

mod member;
mod node;
mod ordering;

pub use member::{CollectionMember, DefaultNode};
pub use node::{Node, NodeId, MAX_NAME_LEN};
pub use ordering::{NameOrder, SiblingOrder};
