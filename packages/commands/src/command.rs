//! Command traits and handles.

use std::cell::RefCell;
use std::rc::Rc;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    #[error("Command failed: {0}")]
    Failed(String),

    #[error("Command is not executable: {0}")]
    NotExecutable(String),
}

impl From<CommandError> for stratum_common::CommonError {
    fn from(err: CommandError) -> Self {
        stratum_common::CommonError::Command(err.to_string())
    }
}

/// A polymorphic user-facing action.
pub trait Command: 'static {
    /// Stable command name, used for logging and merge matching.
    fn name(&self) -> &str;

    fn execute(&mut self) -> Result<(), CommandError> {
        Ok(())
    }
}

/// An undo-capable command.
pub trait UndoCommand: Command {
    fn undo(&mut self);

    fn redo(&mut self);

    /// Attempt to absorb `other` into this command; return true when merged
    /// (the caller then discards `other`).
    fn merge_with(&mut self, other: &mut dyn UndoCommand) -> bool {
        let _ = other;
        false
    }
}

/// Shared handle to an undo-capable command.
pub type UndoCommandRef = Rc<RefCell<dyn UndoCommand>>;

/// A finalized command, tagged by undo capability.
#[derive(Clone)]
pub enum CommandHandle {
    Plain(Rc<RefCell<dyn Command>>),
    Undoable(UndoCommandRef),
}

impl CommandHandle {
    pub fn plain(command: impl Command) -> Self {
        CommandHandle::Plain(Rc::new(RefCell::new(command)))
    }

    pub fn undoable(command: impl UndoCommand) -> Self {
        CommandHandle::Undoable(Rc::new(RefCell::new(command)))
    }

    pub fn name(&self) -> String {
        match self {
            CommandHandle::Plain(c) => c.borrow().name().to_string(),
            CommandHandle::Undoable(c) => c.borrow().name().to_string(),
        }
    }

    pub fn execute(&self) -> Result<(), CommandError> {
        match self {
            CommandHandle::Plain(c) => c.borrow_mut().execute(),
            CommandHandle::Undoable(c) => c.borrow_mut().execute(),
        }
    }

    pub fn as_undoable(&self) -> Option<&UndoCommandRef> {
        match self {
            CommandHandle::Plain(_) => None,
            CommandHandle::Undoable(c) => Some(c),
        }
    }
}

impl std::fmt::Debug for CommandHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("CommandHandle").field(&self.name()).finish()
    }
}
