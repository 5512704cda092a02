//! # Command Blocks
//!
//! RAII scopes that bracket independently-issued commands into one atomic
//! undo unit. Release always runs, on every exit path, via `Drop`.

use crate::command::CommandHandle;
use crate::group::GroupCommand;
use crate::interface::CommandInterface;
use std::rc::Rc;

/// Grouping block: on outermost close, pending commands (if any) are wrapped
/// into one [`GroupCommand`] named after the block and finalized through the
/// ordinary command path. Closing with zero commands is a no-op.
pub struct UndoCommandBlock {
    interface: Rc<CommandInterface>,
}

impl UndoCommandBlock {
    pub fn new(interface: Rc<CommandInterface>) -> Self {
        interface.router().open(None);
        UndoCommandBlock { interface }
    }

    pub fn named(interface: Rc<CommandInterface>, name: &str) -> Self {
        interface.router().open(Some(name));
        UndoCommandBlock { interface }
    }
}

impl Drop for UndoCommandBlock {
    fn drop(&mut self) {
        if let Some((name, commands)) = self.interface.router().close() {
            if !commands.is_empty() {
                let group = GroupCommand::new(name, commands);
                self.interface.finalize(CommandHandle::undoable(group));
            }
        }
    }
}

/// Transfer block: commands accumulate the same way, but the caller is
/// expected to drain them with
/// [`CommandInterface::transfer_commands`] before the block closes;
/// un-transferred leftovers are discarded at the outermost close.
pub struct CommandBlock {
    interface: Rc<CommandInterface>,
}

impl CommandBlock {
    pub fn new(interface: Rc<CommandInterface>) -> Self {
        interface.router().open(None);
        CommandBlock { interface }
    }
}

impl Drop for CommandBlock {
    fn drop(&mut self) {
        // Outermost close drains; whatever was not transferred is dropped.
        let _ = self.interface.router().close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Command, UndoCommand};
    use std::cell::RefCell;

    struct NoopCommand(&'static str);

    impl Command for NoopCommand {
        fn name(&self) -> &str {
            self.0
        }
    }

    impl UndoCommand for NoopCommand {
        fn undo(&mut self) {}
        fn redo(&mut self) {}
    }

    fn collecting_interface() -> (Rc<CommandInterface>, Rc<RefCell<Vec<String>>>) {
        let interface = CommandInterface::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = seen.clone();
        interface.subscribe(move |cmd| seen_clone.borrow_mut().push(cmd.name()));
        (interface, seen)
    }

    #[test]
    fn test_block_intercepts_and_groups() {
        let (interface, seen) = collecting_interface();

        {
            let _block = UndoCommandBlock::named(interface.clone(), "move_prims");
            assert!(interface.router().is_locked());
            interface.finalize(CommandHandle::undoable(NoopCommand("a")));
            interface.finalize(CommandHandle::undoable(NoopCommand("b")));
            assert!(seen.borrow().is_empty());
        }

        assert!(!interface.router().is_locked());
        assert_eq!(*seen.borrow(), vec!["move_prims".to_string()]);
    }

    #[test]
    fn test_unnamed_block_uses_default_name() {
        let (interface, seen) = collecting_interface();
        {
            let _block = UndoCommandBlock::new(interface.clone());
            interface.finalize(CommandHandle::undoable(NoopCommand("a")));
        }
        assert_eq!(*seen.borrow(), vec![crate::DEFAULT_BLOCK_NAME.to_string()]);
    }

    #[test]
    fn test_empty_block_is_noop() {
        let (interface, seen) = collecting_interface();
        {
            let _block = UndoCommandBlock::new(interface.clone());
        }
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn test_nested_blocks_group_once() {
        let (interface, seen) = collecting_interface();
        {
            let _outer = UndoCommandBlock::named(interface.clone(), "outer");
            {
                let _inner = UndoCommandBlock::named(interface.clone(), "inner");
                interface.finalize(CommandHandle::undoable(NoopCommand("a")));
            }
            // Inner close does not drain.
            assert!(interface.router().is_locked());
            assert!(seen.borrow().is_empty());
            interface.finalize(CommandHandle::undoable(NoopCommand("b")));
        }
        assert_eq!(*seen.borrow(), vec!["outer".to_string()]);
    }

    #[test]
    fn test_transfer_block_drains_without_group() {
        let (interface, seen) = collecting_interface();
        let mut taken = Vec::new();
        {
            let _block = CommandBlock::new(interface.clone());
            interface.finalize(CommandHandle::undoable(NoopCommand("a")));
            interface.transfer_commands(&mut taken);
            assert_eq!(taken.len(), 1);
            assert_eq!(interface.router().pending_count(), 0);
        }
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn test_untransferred_commands_discarded() {
        let (interface, seen) = collecting_interface();
        {
            let _block = CommandBlock::new(interface.clone());
            interface.finalize(CommandHandle::undoable(NoopCommand("a")));
        }
        assert_eq!(interface.router().pending_count(), 0);
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn test_plain_command_announced_outside_block() {
        let (interface, seen) = collecting_interface();
        interface.finalize(CommandHandle::plain(NoopCommand("p")));
        assert_eq!(*seen.borrow(), vec!["p".to_string()]);
    }
}
