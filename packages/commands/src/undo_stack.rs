//! # Undo Stack
//!
//! Ordered record of finalized undo-capable commands with a cursor: entries
//! before the cursor are undoable, entries at or after it are redoable.
//! Pushing truncates the redo tail, enforces the undo limit and attempts to
//! merge with the previous entry of the same name.

use crate::command::{CommandHandle, UndoCommandRef};
use crate::interface::CommandInterface;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use stratum_common::ListenerHandle;

const DEFAULT_UNDO_LIMIT: usize = 100;

pub struct UndoStack {
    commands: RefCell<VecDeque<UndoCommandRef>>,
    index: Cell<usize>,
    undo_limit: Cell<usize>,
    enabled: Cell<bool>,
    listener: Cell<Option<ListenerHandle>>,
    interface: RefCell<Option<Rc<CommandInterface>>>,
}

impl UndoStack {
    pub fn new(undo_limit: usize) -> Rc<Self> {
        Rc::new(UndoStack {
            commands: RefCell::new(VecDeque::new()),
            index: Cell::new(0),
            undo_limit: Cell::new(undo_limit),
            enabled: Cell::new(true),
            listener: Cell::new(None),
            interface: RefCell::new(None),
        })
    }

    /// Create a stack registered as a listener on `interface`, so every
    /// announced undo-capable command is recorded.
    pub fn attach(interface: &Rc<CommandInterface>) -> Rc<Self> {
        Self::attach_with_limit(interface, DEFAULT_UNDO_LIMIT)
    }

    pub fn attach_with_limit(interface: &Rc<CommandInterface>, undo_limit: usize) -> Rc<Self> {
        let stack = Self::new(undo_limit);
        let weak = Rc::downgrade(&stack);
        let handle = interface.subscribe(move |command: &CommandHandle| {
            if let (Some(stack), Some(undoable)) = (weak.upgrade(), command.as_undoable()) {
                stack.push(undoable.clone());
            }
        });
        stack.listener.set(Some(handle));
        *stack.interface.borrow_mut() = Some(interface.clone());
        stack
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.set(enabled);
        if !enabled {
            self.clear();
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.get()
    }

    pub fn undo_limit(&self) -> usize {
        self.undo_limit.get()
    }

    /// Change the limit, trimming oldest entries when already above it.
    /// A limit of zero means unlimited.
    pub fn set_undo_limit(&self, limit: usize) {
        let mut commands = self.commands.borrow_mut();
        if commands.len() > limit && limit != 0 {
            let delete_count = commands.len() - limit;
            commands.drain(..delete_count);
            let index = self.index.get();
            self.index.set(index.saturating_sub(delete_count));
        }
        self.undo_limit.set(limit);
    }

    pub fn len(&self) -> usize {
        self.commands.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.borrow().is_empty()
    }

    pub fn can_undo(&self) -> bool {
        self.index.get() != 0
    }

    pub fn can_redo(&self) -> bool {
        self.index.get() < self.commands.borrow().len()
    }

    /// Record a command. Truncates the redo tail; merges with the previous
    /// entry when names match and the entry accepts the merge.
    pub fn push(&self, command: UndoCommandRef) {
        if !self.enabled.get() {
            return;
        }

        let name = command.borrow().name().to_string();
        tracing::debug!(%name, "push undo entry");

        {
            let mut commands = self.commands.borrow_mut();
            commands.truncate(self.index.get());

            if let Some(last) = commands.back() {
                let try_merge = last.borrow().name() == name && !Rc::ptr_eq(last, &command);
                if try_merge && last.borrow_mut().merge_with(&mut *command.borrow_mut()) {
                    return;
                }
            }

            let limit = self.undo_limit.get();
            if limit == 0 || commands.len() != limit {
                self.index.set(self.index.get() + 1);
            } else {
                commands.pop_front();
            }
            commands.push_back(command);
        }
    }

    /// Undo the entry below the cursor. Returns false when there is none.
    pub fn undo(&self) -> bool {
        if self.index.get() == 0 {
            return false;
        }
        self.index.set(self.index.get() - 1);
        let command = self.commands.borrow()[self.index.get()].clone();
        tracing::debug!(name = %command.borrow().name(), "undo");
        command.borrow_mut().undo();
        true
    }

    /// Redo the entry at the cursor. Returns false when there is none.
    pub fn redo(&self) -> bool {
        let index = self.index.get();
        let command = {
            let commands = self.commands.borrow();
            if index == commands.len() {
                return false;
            }
            commands[index].clone()
        };
        self.index.set(index + 1);
        tracing::debug!(name = %command.borrow().name(), "redo");
        command.borrow_mut().redo();
        true
    }

    pub fn clear(&self) {
        self.commands.borrow_mut().clear();
        self.index.set(0);
    }
}

impl Drop for UndoStack {
    fn drop(&mut self) {
        if let (Some(handle), Some(interface)) = (self.listener.take(), self.interface.borrow().as_ref()) {
            interface.unsubscribe(handle);
        }
    }
}

impl std::fmt::Debug for UndoStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UndoStack")
            .field("entries", &self.len())
            .field("index", &self.index.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Command, UndoCommand};

    struct Counter {
        name: &'static str,
        undos: Rc<Cell<u32>>,
        redos: Rc<Cell<u32>>,
    }

    impl Counter {
        fn entry(name: &'static str) -> (UndoCommandRef, Rc<Cell<u32>>, Rc<Cell<u32>>) {
            let undos = Rc::new(Cell::new(0));
            let redos = Rc::new(Cell::new(0));
            let cmd: UndoCommandRef = Rc::new(RefCell::new(Counter {
                name,
                undos: undos.clone(),
                redos: redos.clone(),
            }));
            (cmd, undos, redos)
        }
    }

    impl Command for Counter {
        fn name(&self) -> &str {
            self.name
        }
    }

    impl UndoCommand for Counter {
        fn undo(&mut self) {
            self.undos.set(self.undos.get() + 1);
        }

        fn redo(&mut self) {
            self.redos.set(self.redos.get() + 1);
        }
    }

    #[test]
    fn test_undo_redo_cursor() {
        let stack = UndoStack::new(10);
        let (a, a_undos, a_redos) = Counter::entry("a");
        let (b, b_undos, _) = Counter::entry("b");
        stack.push(a);
        stack.push(b);

        assert!(stack.can_undo());
        assert!(!stack.can_redo());

        assert!(stack.undo());
        assert_eq!(b_undos.get(), 1);
        assert!(stack.undo());
        assert_eq!(a_undos.get(), 1);
        assert!(!stack.undo());

        assert!(stack.redo());
        assert_eq!(a_redos.get(), 1);
        assert!(stack.can_redo());
    }

    #[test]
    fn test_push_truncates_redo_tail() {
        let stack = UndoStack::new(10);
        let (a, _, _) = Counter::entry("a");
        let (b, _, _) = Counter::entry("b");
        let (c, _, _) = Counter::entry("c");
        stack.push(a);
        stack.push(b);
        stack.undo();
        stack.push(c);

        assert_eq!(stack.len(), 2);
        assert!(!stack.can_redo());
    }

    #[test]
    fn test_undo_limit_trims_oldest() {
        let stack = UndoStack::new(2);
        for name in ["a", "b", "c"] {
            let (cmd, _, _) = Counter::entry(name);
            stack.push(cmd);
        }
        assert_eq!(stack.len(), 2);
        // Cursor still allows exactly two undos.
        assert!(stack.undo());
        assert!(stack.undo());
        assert!(!stack.undo());
    }

    #[test]
    fn test_disable_clears() {
        let stack = UndoStack::new(10);
        let (a, _, _) = Counter::entry("a");
        stack.push(a);
        stack.set_enabled(false);
        assert!(stack.is_empty());
        let (b, _, _) = Counter::entry("b");
        stack.push(b);
        assert!(stack.is_empty());
    }
}
