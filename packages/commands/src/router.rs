//! # Command Router
//!
//! Accumulates independently-finalized commands while a command block is
//! open so the outermost close can batch them into one atomic undo unit.
//! One router exists per [`crate::CommandInterface`]; it is an explicit
//! object, not a process global.

use crate::command::UndoCommandRef;
use std::cell::{Cell, RefCell};

/// Name used for groups created by an unnamed block.
pub const DEFAULT_BLOCK_NAME: &str = "command_block";

/// Depth-counted command accumulator.
pub struct CommandRouter {
    depth: Cell<u32>,
    pending: RefCell<Vec<UndoCommandRef>>,
    block_name: RefCell<String>,
}

impl CommandRouter {
    pub fn new() -> Self {
        CommandRouter {
            depth: Cell::new(0),
            pending: RefCell::new(Vec::new()),
            block_name: RefCell::new(DEFAULT_BLOCK_NAME.to_string()),
        }
    }

    pub fn depth(&self) -> u32 {
        self.depth.get()
    }

    /// True while at least one command block is open; finalized commands are
    /// intercepted instead of announced.
    pub fn is_locked(&self) -> bool {
        self.depth.get() > 0
    }

    pub fn pending_count(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Open one nesting level. The outermost open records the block name and
    /// runs the fragmentation check: pending commands left over from an
    /// earlier block mean that block was never drained.
    pub(crate) fn open(&self, name: Option<&str>) {
        if self.depth.get() == 0 {
            if !self.pending.borrow().is_empty() {
                tracing::error!(
                    pending = self.pending.borrow().len(),
                    "coding error: opening a command block over an un-drained command log"
                );
            }
            if let Some(name) = name {
                *self.block_name.borrow_mut() = name.to_string();
            } else {
                *self.block_name.borrow_mut() = DEFAULT_BLOCK_NAME.to_string();
            }
        }
        self.depth.set(self.depth.get() + 1);
    }

    /// Close one nesting level. At the outermost close, returns the pending
    /// commands and the block name so the caller can group-finalize them;
    /// inner closes return `None`.
    pub(crate) fn close(&self) -> Option<(String, Vec<UndoCommandRef>)> {
        debug_assert!(self.depth.get() > 0, "command block close without open");
        self.depth.set(self.depth.get().saturating_sub(1));
        if self.depth.get() > 0 {
            return None;
        }
        let drained = std::mem::take(&mut *self.pending.borrow_mut());
        Some((self.block_name.borrow().clone(), drained))
    }

    /// Append a finalized undo-capable command to the open block.
    pub fn add_command(&self, command: UndoCommandRef) {
        self.pending.borrow_mut().push(command);
    }

    /// Atomically drain pending commands into `out` without creating a
    /// group, for callers building their own composite.
    pub fn transfer_commands(&self, out: &mut Vec<UndoCommandRef>) {
        out.append(&mut self.pending.borrow_mut());
    }
}

impl Default for CommandRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CommandRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRouter")
            .field("depth", &self.depth.get())
            .field("pending", &self.pending_count())
            .finish()
    }
}
