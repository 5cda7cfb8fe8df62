//! Tree engine
//!
//! [`Tree`] owns every structural mutation of the collection tree and keeps
//!  the sibling order encoded in the paths. [`TreeQuery`] answers hierarchy
//!  questions off a single snapshot.

mod error;
mod label;
mod locks;
mod plan;
mod query;
#[allow(clippy::module_inception)]
mod tree;

pub use error::TreeError;
pub use label::{
    indented_choices, indented_label, LabelStyle, DEFAULT_LABEL_BASE_DEPTH, INDENT_WIDTH,
};
pub use query::TreeQuery;
pub use tree::{Position, Tree};
