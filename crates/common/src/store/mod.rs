//! Persistence substrate
//!
//! The tree engine talks to storage through two traits:
//! - [`TreeBackend`]: hands out snapshots and commits change sets atomically
//! - [`TreeSnapshot`]: consistent point and range reads over paths
//!
//! [`MemoryTreeBackend`] keeps everything in process and is what the
//!  tests run against. A SQLite backend lives in the `arbor-sqlite` crate.

mod memory;
mod provider;

pub use memory::{MemorySnapshot, MemoryTreeBackend, MemoryTreeError};
pub use provider::{Change, ChangeSet, ChildState, Scan, StoreError, TreeBackend, TreeSnapshot};
