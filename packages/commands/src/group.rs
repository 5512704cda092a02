//! Composite undo-capable command.

use crate::command::{Command, UndoCommand, UndoCommandRef};

/// Ordered batch of child commands undone in reverse and redone in the
/// original order, preserving the interleaving the user produced.
pub struct GroupCommand {
    name: String,
    commands: Vec<UndoCommandRef>,
}

impl GroupCommand {
    pub fn new(name: impl Into<String>, commands: Vec<UndoCommandRef>) -> Self {
        GroupCommand {
            name: name.into(),
            commands,
        }
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl Command for GroupCommand {
    fn name(&self) -> &str {
        &self.name
    }
}

impl UndoCommand for GroupCommand {
    fn undo(&mut self) {
        for command in self.commands.iter().rev() {
            command.borrow_mut().undo();
        }
    }

    fn redo(&mut self) {
        for command in self.commands.iter() {
            command.borrow_mut().redo();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Tagged {
        tag: &'static str,
        trace: Rc<RefCell<Vec<String>>>,
    }

    impl Command for Tagged {
        fn name(&self) -> &str {
            self.tag
        }
    }

    impl UndoCommand for Tagged {
        fn undo(&mut self) {
            self.trace.borrow_mut().push(format!("undo {}", self.tag));
        }

        fn redo(&mut self) {
            self.trace.borrow_mut().push(format!("redo {}", self.tag));
        }
    }

    #[test]
    fn test_group_undoes_in_reverse_and_redoes_in_order() {
        let trace = Rc::new(RefCell::new(Vec::new()));
        let a: UndoCommandRef = Rc::new(RefCell::new(Tagged { tag: "a", trace: trace.clone() }));
        let b: UndoCommandRef = Rc::new(RefCell::new(Tagged { tag: "b", trace: trace.clone() }));

        let mut group = GroupCommand::new("pair", vec![a, b]);
        group.undo();
        group.redo();

        assert_eq!(
            *trace.borrow(),
            vec!["undo b", "undo a", "redo a", "redo b"]
        );
    }
}
