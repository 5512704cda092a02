//! # Inverse Edit Log
//!
//! An ordered sequence of reversible operations accumulated by the undo
//! router while a transactional block records. Inverting the log replays it
//! in reverse; the mutations performed by the replay are themselves observed
//! and re-recorded, and the log adopts that fresh recording; that is how a
//! single log alternates between acting as the undo and the redo payload.

use crate::undo::router::{EditBlock, UndoRouter};
use std::any::Any;
use std::rc::Rc;

/// One reversible operation.
pub trait Edit: 'static {
    /// Apply the stored inverse, restoring prior state. Returns false when
    /// the target no longer exists (expired layer, vanished spec).
    fn invert(&mut self) -> bool;

    /// Attempt to absorb `other` into this edit; return true when merged
    /// (the caller then discards `other`).
    fn merge_with(&mut self, other: &mut dyn Edit) -> bool {
        let _ = other;
        false
    }

    /// Downcast support for merge implementations.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Ordered, invertible record of mutations.
#[derive(Default)]
pub struct InverseLog {
    edits: Vec<Box<dyn Edit>>,
}

impl InverseLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Append an edit, coalescing with the tail when it accepts the merge.
    pub fn add(&mut self, mut edit: Box<dyn Edit>) {
        if let Some(last) = self.edits.last_mut() {
            if last.merge_with(edit.as_mut()) {
                return;
            }
        }
        self.edits.push(edit);
    }

    pub(crate) fn into_edits(self) -> Vec<Box<dyn Edit>> {
        self.edits
    }

    /// Replay the log in reverse inside an auto-committing block, then adopt
    /// the edits the replay re-recorded (the payload for the opposite
    /// direction). Returns false when any edit failed to invert.
    ///
    /// Inverting while a block is already recording means an undo/redo is
    /// running inside an edit scope; that is the fragmentation scenario and
    /// is diagnosed loudly, but execution continues deterministically.
    pub fn invert(&mut self, router: &Rc<UndoRouter>) -> bool {
        if router.depth() > 0 {
            tracing::error!(
                depth = router.depth(),
                "coding error: inverting an edit log while a transactional block is recording"
            );
        }
        let block = EditBlock::new(router.clone());
        let mut ok = true;
        for edit in self.edits.iter_mut().rev() {
            ok &= edit.invert();
        }
        self.edits = router.take_edits().into_edits();
        drop(block);
        ok
    }
}

impl std::fmt::Debug for InverseLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InverseLog").field("edits", &self.len()).finish()
    }
}
