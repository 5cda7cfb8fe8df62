use std::cmp::Ordering;
use std::fmt::Debug;

/// How a parent orders its children.
///
/// The tree assigns ranks so that path order always agrees with this
///  ordering. Implementations must be a total order that does not change
///  over time for the same pair of names.
pub trait SiblingOrder: Send + Sync + Debug + 'static {
    fn compare(&self, a: &str, b: &str) -> Ordering;

    /// Whether two names occupy the same slot, for trees that
    ///  require unique sibling names.
    fn collides(&self, a: &str, b: &str) -> bool;
}

/// Case-insensitive name order, ties broken on the raw name so the order
///  stays total.
#[derive(Debug, Clone, Copy, Default)]
pub struct NameOrder;

impl SiblingOrder for NameOrder {
    fn compare(&self, a: &str, b: &str) -> Ordering {
        a.to_lowercase()
            .cmp(&b.to_lowercase())
            .then_with(|| a.cmp(b))
    }

    fn collides(&self, a: &str, b: &str) -> bool {
        a.to_lowercase() == b.to_lowercase()
    }
}
