/**
 * Group permissions and view restrictions,
 *  inherited down the collection tree.
 */
pub mod access;
/**
 * Collection nodes and the capabilities
 *  resources use to live in them.
 */
pub mod collection;
/**
 * Tree configuration, loadable from TOML.
 */
pub mod config;
/**
 * Materialized path encoding: ranks to
 *  fixed-width segments and back.
 */
pub mod path;
/**
 * Persistence substrate traits and the
 *  in-memory backend.
 */
pub mod store;
/**
 * The tree engine: ordered structural
 *  mutations and snapshot queries.
 */
pub mod tree;

pub mod prelude {
    pub use crate::access::{
        Action, GrantEntry, GrantRegistry, GroupId, PermissionResolver, ResolveError,
        RestrictionEntry, RestrictionKind, RestrictionStore, Viewer, VisibilityResolver,
    };
    pub use crate::collection::{CollectionMember, DefaultNode, Node, NodeId};
    pub use crate::config::TreeConfig;
    pub use crate::path::{PathCodec, PathError, TreePath};
    pub use crate::store::{MemoryTreeBackend, StoreError, TreeBackend, TreeSnapshot};
    pub use crate::tree::{LabelStyle, Position, Tree, TreeError, TreeQuery};
}
