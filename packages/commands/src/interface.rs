//! # Command Interface
//!
//! The execution/finalization facility: accepts a ready-made command,
//! optionally invokes it, and announces it to registered listeners (the undo
//! stack, scripting echoes, panels). While a command block is open, finalized
//! undo-capable commands are routed into the block instead of announced.

use crate::command::{CommandError, CommandHandle};
use crate::router::CommandRouter;
use std::rc::Rc;
use stratum_common::{EventDispatcher, ListenerHandle};

pub struct CommandInterface {
    router: CommandRouter,
    listeners: EventDispatcher<CommandHandle>,
}

impl CommandInterface {
    pub fn new() -> Rc<Self> {
        Rc::new(CommandInterface {
            router: CommandRouter::new(),
            listeners: EventDispatcher::new(),
        })
    }

    pub fn router(&self) -> &CommandRouter {
        &self.router
    }

    /// Register a listener notified for every announced command.
    pub fn subscribe(&self, listener: impl Fn(&CommandHandle) + 'static) -> ListenerHandle {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&self, handle: ListenerHandle) -> bool {
        self.listeners.unsubscribe(handle)
    }

    /// Execute `command`, then finalize it.
    pub fn execute(&self, command: CommandHandle) -> Result<(), CommandError> {
        command.execute()?;
        self.finalize(command);
        Ok(())
    }

    /// Finalize an already-executed command: inside an open command block,
    /// undo-capable commands are intercepted by the router; otherwise the
    /// command is announced to listeners.
    pub fn finalize(&self, command: CommandHandle) {
        if self.router.is_locked() {
            if let Some(undoable) = command.as_undoable() {
                self.router.add_command(undoable.clone());
            } else {
                tracing::debug!(name = %command.name(), "non-undoable command finalized inside block");
                self.listeners.emit(&command);
            }
            return;
        }
        tracing::debug!(name = %command.name(), "command finalized");
        self.listeners.emit(&command);
    }

    /// Atomically drain the open block's pending commands into `out`.
    pub fn transfer_commands(&self, out: &mut Vec<crate::command::UndoCommandRef>) {
        self.router.transfer_commands(out);
    }
}

impl std::fmt::Debug for CommandInterface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandInterface")
            .field("router", &self.router)
            .finish()
    }
}
