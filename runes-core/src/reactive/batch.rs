//! Batch frame bookkeeping.

use indexmap::IndexSet;

use crate::graph::NodeId;

/// Writes collected while notification is deferred.
///
/// Notification is deferred while any `batch` is open (`depth > 0`) or while
/// a propagation pass is running. Nested batches only bump the depth; the
/// outermost exit is the one that flushes.
#[derive(Debug, Default)]
pub(crate) struct BatchFrame {
    depth: usize,
    dirty: IndexSet<NodeId>,
    propagating: bool,
}

impl BatchFrame {
    pub(crate) fn enter(&mut self) {
        self.depth += 1;
    }

    /// Close one level. Returns `true` when the outermost batch closed.
    pub(crate) fn exit(&mut self) -> bool {
        self.depth = self.depth.saturating_sub(1);
        self.depth == 0
    }

    pub(crate) fn depth(&self) -> usize {
        self.depth
    }

    pub(crate) fn mark(&mut self, node: NodeId) {
        self.dirty.insert(node);
    }

    pub(crate) fn forget(&mut self, node: NodeId) {
        self.dirty.shift_remove(&node);
    }

    pub(crate) fn take_dirty(&mut self) -> IndexSet<NodeId> {
        std::mem::take(&mut self.dirty)
    }

    #[cfg(test)]
    pub(crate) fn has_pending(&self) -> bool {
        !self.dirty.is_empty()
    }

    pub(crate) fn is_propagating(&self) -> bool {
        self.propagating
    }

    pub(crate) fn set_propagating(&mut self, propagating: bool) {
        self.propagating = propagating;
    }

    /// Whether a write must be queued instead of flushed immediately.
    pub(crate) fn is_deferring(&self) -> bool {
        self.depth > 0 || self.propagating
    }
}
