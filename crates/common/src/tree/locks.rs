use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::path::TreePath;

/// The part of the tree a structural mutation needs to itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LockScope {
    /// Every top-level node and everything below them
    Forest,
    /// The node at the path and its descendants
    Subtree(TreePath),
}

impl LockScope {
    pub fn for_parent(parent: Option<TreePath>) -> Self {
        match parent {
            Some(path) => LockScope::Subtree(path),
            None => LockScope::Forest,
        }
    }

    fn overlaps(&self, other: &LockScope) -> bool {
        match (self, other) {
            (LockScope::Forest, _) | (_, LockScope::Forest) => true,
            (LockScope::Subtree(a), LockScope::Subtree(b)) => a.is_within(b) || b.is_within(a),
        }
    }
}

/// In-process table of locked subtrees.
///
/// Two scopes conflict when one contains the other. A set of scopes is
///  taken all at once or not at all, so callers that need two parents
///  (a move) cannot deadlock against each other.
#[derive(Debug, Default)]
pub(crate) struct SubtreeLocks {
    held: Mutex<Vec<(u64, LockScope)>>,
    next_ticket: AtomicU64,
    released: Notify,
}

impl SubtreeLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(self: &Arc<Self>, scopes: Vec<LockScope>) -> SubtreeGuard {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        loop {
            // registered before checking, so a release between the check
            //  and the await still wakes us
            let released = self.released.notified();
            {
                let mut held = self.held.lock();
                let blocked = scopes
                    .iter()
                    .any(|scope| held.iter().any(|(_, other)| scope.overlaps(other)));
                if !blocked {
                    held.extend(scopes.iter().cloned().map(|scope| (ticket, scope)));
                    return SubtreeGuard {
                        locks: Arc::clone(self),
                        ticket,
                    };
                }
            }
            released.await;
        }
    }

    #[cfg(test)]
    fn held(&self) -> usize {
        self.held.lock().len()
    }
}

/// Releases its scopes on drop.
#[derive(Debug)]
pub(crate) struct SubtreeGuard {
    locks: Arc<SubtreeLocks>,
    ticket: u64,
}

impl Drop for SubtreeGuard {
    fn drop(&mut self) {
        self.locks
            .held
            .lock()
            .retain(|(ticket, _)| *ticket != self.ticket);
        self.locks.released.notify_waiters();
    }
}
