//! Access control over the collection tree
//!
//! Grants and view restrictions are stored against individual collections
//!  but apply to the whole subtree below them. The resolvers here expand a
//!  collection into its ancestor chain and ask the external registries
//!  about that chain in one lookup:
//! - [`PermissionResolver`]: group permissions, via a [`GrantRegistry`]
//! - [`VisibilityResolver`]: view restrictions, via a [`RestrictionStore`]
//!
//! A missing grant or restriction is never an error, it just means
//!  "not granted" or "unrestricted".

mod error;
mod grant;
mod permission;
mod restriction;
mod visibility;

pub use error::ResolveError;
pub use grant::{Action, GrantEntry, GrantRegistry, GroupId, MemoryGrantRegistry, MemoryRegistryError};
pub use permission::PermissionResolver;
pub use restriction::{
    MemoryRestrictionStore, RestrictionEntry, RestrictionId, RestrictionKind, RestrictionStore,
};
pub use visibility::{PassedRestrictions, Viewer, VisibilityResolver};
