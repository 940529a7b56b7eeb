//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a signal is read,
//! it is recorded against the computation on top of the stack.
//!
//! # Implementation
//!
//! Each runtime owns a stack of tracking frames. Running a derived value or
//! an effect pushes a frame owned by that node; reads land in the top frame
//! only, so nested computations (a derived read inside an effect) keep their
//! own dependency sets. An ownerless frame suppresses tracking for
//! `untrack`.

use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::graph::NodeId;

pub(crate) type Reads = SmallVec<[NodeId; 8]>;

/// One entry on the tracking stack.
#[derive(Debug, Default)]
struct TrackingFrame {
    /// The computation collecting reads, or `None` while untracked.
    owner: Option<NodeId>,
    /// Nodes read so far, deduplicated, in first-read order.
    reads: Reads,
}

/// The per-runtime stack of tracking frames.
#[derive(Debug, Default)]
pub(crate) struct TrackingStack {
    frames: Vec<TrackingFrame>,
}

impl TrackingStack {
    /// Record a read of `node` into the top frame, if it is tracking.
    pub(crate) fn record(&mut self, node: NodeId) {
        if let Some(frame) = self.frames.last_mut() {
            if frame.owner.is_some() && !frame.reads.contains(&node) {
                frame.reads.push(node);
            }
        }
    }

    pub(crate) fn current_owner(&self) -> Option<NodeId> {
        self.frames.last().and_then(|frame| frame.owner)
    }

    #[cfg(test)]
    pub(crate) fn depth(&self) -> usize {
        self.frames.len()
    }

    pub(crate) fn clear(&mut self) {
        self.frames.clear();
    }
}

/// Guard that pops its frame when finished or dropped.
///
/// This keeps the stack balanced even if the computation panics.
pub(crate) struct ReactiveContext<'a> {
    stack: &'a Mutex<TrackingStack>,
    depth: usize,
    popped: bool,
}

impl<'a> ReactiveContext<'a> {
    /// Push a frame for `owner` (or an untracked frame for `None`).
    pub(crate) fn enter(stack: &'a Mutex<TrackingStack>, owner: Option<NodeId>) -> Self {
        let depth = {
            let mut stack = stack.lock();
            stack.frames.push(TrackingFrame {
                owner,
                reads: Reads::new(),
            });
            stack.frames.len()
        };
        Self {
            stack,
            depth,
            popped: false,
        }
    }

    /// Pop the frame and return what it read.
    pub(crate) fn finish(mut self) -> Reads {
        self.popped = true;
        self.pop()
    }

    fn pop(&self) -> Reads {
        let mut stack = self.stack.lock();
        debug_assert_eq!(
            stack.frames.len(),
            self.depth,
            "ReactiveContext mismatch: expected depth {}, got {}",
            self.depth,
            stack.frames.len()
        );
        stack.frames.truncate(self.depth);
        stack.frames.pop().map(|frame| frame.reads).unwrap_or_default()
    }
}

impl Drop for ReactiveContext<'_> {
    fn drop(&mut self) {
        if !self.popped {
            self.pop();
        }
    }
}
