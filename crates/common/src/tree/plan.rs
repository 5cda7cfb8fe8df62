use crate::collection::{Node, SiblingOrder};
use crate::path::{PathCodec, PathError, TreePath};
use crate::store::Change;

/// Where a node lands among its new siblings, and which siblings have to
///  move one rank up to make room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Placement {
    pub path: TreePath,
    pub shifts: Vec<Change>,
}

/// Index at which `name` sorts among `siblings` (ordered by path). Equal
///  keys land after the existing ones. With `unique`, a colliding name is
///  returned as the error.
pub(crate) fn insertion_index<'a>(
    order: &dyn SiblingOrder,
    siblings: &'a [Node],
    name: &str,
    unique: bool,
) -> Result<usize, &'a str> {
    if unique {
        if let Some(existing) = siblings.iter().find(|s| order.collides(s.name(), name)) {
            return Err(existing.name());
        }
    }
    Ok(siblings
        .iter()
        .position(|s| order.compare(s.name(), name).is_gt())
        .unwrap_or(siblings.len()))
}

/// Whether `name` can sit at `index` without breaking the order.
pub(crate) fn fits_at(order: &dyn SiblingOrder, siblings: &[Node], name: &str, index: usize) -> bool {
    if index > siblings.len() {
        return false;
    }
    let after_previous = index == 0 || !order.compare(siblings[index - 1].name(), name).is_gt();
    let before_next = index == siblings.len() || !order.compare(name, siblings[index].name()).is_gt();
    after_previous && before_next
}

/// Index a node currently holds among its siblings, itself excluded.
pub(crate) fn current_index(siblings: &[Node], path: &TreePath) -> usize {
    siblings.iter().filter(|s| s.path() < path).count()
}

/// Plan the slot at `index` below `parent`.
///
/// Appending takes the rank after the last sibling. Inserting in front of
///  an existing sibling takes that sibling's rank and shifts it, and every
///  sibling after it, one rank up. Shifts are emitted last sibling first so
///  each target slot is already vacant when its rebase runs.
pub(crate) fn place(
    codec: &PathCodec,
    parent: Option<&TreePath>,
    siblings: &[Node],
    index: usize,
) -> Result<Placement, PathError> {
    let Some(last) = siblings.last() else {
        return Ok(Placement {
            path: codec.child(parent, 1)?,
            shifts: Vec::new(),
        });
    };

    let last_rank = codec.rank(last.path())?;
    if index >= siblings.len() {
        return Ok(Placement {
            path: codec.child(parent, last_rank + 1)?,
            shifts: Vec::new(),
        });
    }

    // fail before planning anything if the last sibling cannot move up
    codec.encode(last_rank + 1)?;

    let rank = codec.rank(siblings[index].path())?;
    let shifts = siblings[index..]
        .iter()
        .rev()
        .map(|sibling| -> Result<Change, PathError> {
            let next = codec.rank(sibling.path())? + 1;
            Ok(Change::Rebase {
                from: sibling.path().clone(),
                to: codec.with_rank(sibling.path(), next)?,
                depth_delta: 0,
            })
        })
        .collect::<Result<Vec<_>, PathError>>()?;

    Ok(Placement {
        path: codec.child(parent, rank)?,
        shifts,
    })
}
