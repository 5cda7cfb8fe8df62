//! SQLite backend for arbor collection trees
//!
//! This crate stores the collection tree, group permission grants and view
//! restrictions in SQLite and implements the persistence traits the tree
//! engine and resolvers consume.
//!
//! # Example
//!
//! ```rust,no_run
//! use arbor_sqlite::{Database, SqliteTreeBackend};
//! use common::config::TreeConfig;
//! use common::path::PathCodec;
//! use common::tree::Tree;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TreeConfig::default();
//! let db = Database::new(Path::new("/tmp/collections.db")).await?;
//! let backend = SqliteTreeBackend::new(db, PathCodec::from_config(&config)?);
//! let tree = Tree::new(backend, config)?;
//! let _root = tree.ensure_root("Root").await?;
//! # Ok(())
//! # }
//! ```

mod database;
mod error;
mod grants;
mod restrictions;
mod tree;

pub use database::Database;
pub use error::{DatabaseError, Result};
pub use grants::SqliteGrantRegistry;
pub use restrictions::SqliteRestrictionStore;
pub use tree::{SqliteSnapshot, SqliteTreeBackend};
