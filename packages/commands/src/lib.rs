//! # Stratum Commands
//!
//! Command execution, grouping and the undo stack.
//!
//! Caller-issued commands finalize through a [`CommandInterface`]; while a
//! transactional command block is open, finalized undo-capable commands are
//! intercepted by the [`CommandRouter`] instead of being announced, and the
//! outermost block close batches them into one [`GroupCommand`]. The
//! [`UndoStack`] listens on the interface and records every announced
//! undo-capable command.

mod block;
mod command;
mod group;
mod interface;
mod router;
mod undo_stack;

pub use block::{CommandBlock, UndoCommandBlock};
pub use command::{Command, CommandError, CommandHandle, UndoCommand, UndoCommandRef};
pub use group::GroupCommand;
pub use interface::CommandInterface;
pub use router::{CommandRouter, DEFAULT_BLOCK_NAME};
pub use undo_stack::UndoStack;
