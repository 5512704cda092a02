//! # Undo-Stack Bridge
//!
//! Connects the undo router's commit feed to the command layer: every
//! drained inverse-edit log is wrapped into a generic document-edit undo
//! command and finalized through the command interface, so document edits
//! land on the same undo stack as ordinary user commands and compose
//! transparently with command groups.
//!
//! The bridge exists only in interactive sessions; headless sessions still
//! track the tree and fan mutations out (edits stay attributable) but push
//! nothing anywhere.

use crate::delegates::DelegatesHolder;
use crate::undo::{CommittedLog, InverseLog, UndoRouter};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use stratum_commands::{Command, CommandError, CommandHandle, CommandInterface, UndoCommand};
use stratum_common::ListenerHandle;

/// Generic undo command wrapping one committed inverse-edit log. Undo and
/// redo both invert the log; each inversion re-records, so the log
/// alternates between the two directions.
pub struct LayerEditCommand {
    log: Rc<RefCell<InverseLog>>,
    router: Rc<UndoRouter>,
}

impl LayerEditCommand {
    pub fn new(log: Rc<RefCell<InverseLog>>, router: Rc<UndoRouter>) -> Self {
        LayerEditCommand { log, router }
    }

    pub fn edit_count(&self) -> usize {
        self.log.borrow().len()
    }
}

impl Command for LayerEditCommand {
    fn name(&self) -> &str {
        "edit_layers"
    }

    fn execute(&mut self) -> Result<(), CommandError> {
        // The edits already happened; the command only replays them.
        Ok(())
    }
}

impl UndoCommand for LayerEditCommand {
    fn undo(&mut self) {
        if !self.log.borrow_mut().invert(&self.router) {
            tracing::warn!("some inverse edits failed to apply during undo");
        }
    }

    fn redo(&mut self) {
        if !self.log.borrow_mut().invert(&self.router) {
            tracing::warn!("some inverse edits failed to apply during redo");
        }
    }
}

/// Subscribes to router commits and pushes [`LayerEditCommand`]s through the
/// standard command-finalization path. Also keeps the delegates holder
/// alive, which is what wraps newly tracked layers with the interceptor set.
pub struct UndoStackBridge {
    router: Rc<UndoRouter>,
    _holder: Rc<DelegatesHolder>,
    commit_subscription: Cell<Option<ListenerHandle>>,
}

impl UndoStackBridge {
    pub fn new(
        router: &Rc<UndoRouter>,
        interface: &Rc<CommandInterface>,
        holder: &Rc<DelegatesHolder>,
    ) -> Self {
        let interface = interface.clone();
        let command_router = router.clone();
        let subscription = router.on_commit(move |log: &CommittedLog| {
            let command = LayerEditCommand::new(log.clone(), command_router.clone());
            interface.finalize(CommandHandle::undoable(command));
        });
        UndoStackBridge {
            router: router.clone(),
            _holder: holder.clone(),
            commit_subscription: Cell::new(Some(subscription)),
        }
    }
}

impl Drop for UndoStackBridge {
    fn drop(&mut self) {
        if let Some(handle) = self.commit_subscription.take() {
            self.router.off_commit(handle);
        }
    }
}

impl std::fmt::Debug for UndoStackBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UndoStackBridge").finish()
    }
}
