//! # Undo Router
//!
//! Accumulates the inverse-edit log while nested transactional blocks are
//! open. One router exists per editor session and is passed around as an
//! explicit `Rc` handle; every edit site in the session routes through its
//! single depth counter so reentrant edits fold into the same transaction.

use crate::undo::inverse::{Edit, InverseLog};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use stratum_common::{EventDispatcher, ListenerHandle};

/// Commit payload: the drained log of one completed transaction.
pub type CommittedLog = Rc<RefCell<InverseLog>>;

/// Depth-counted accumulator of inverse edits.
pub struct UndoRouter {
    depth: Cell<u32>,
    mute_depth: Cell<u32>,
    log: RefCell<InverseLog>,
    commits: EventDispatcher<CommittedLog>,
}

impl UndoRouter {
    pub fn new() -> Rc<Self> {
        Rc::new(UndoRouter {
            depth: Cell::new(0),
            mute_depth: Cell::new(0),
            log: RefCell::new(InverseLog::new()),
            commits: EventDispatcher::new(),
        })
    }

    /// Current block nesting depth; zero means idle.
    pub fn depth(&self) -> u32 {
        self.depth.get()
    }

    /// Number of edits accumulated so far in the open transaction.
    pub fn edit_count(&self) -> usize {
        self.log.borrow().len()
    }

    /// True while at least one mute scope is active; interceptors skip
    /// inverse generation entirely.
    pub fn is_muted(&self) -> bool {
        self.mute_depth.get() > 0
    }

    pub fn mute(&self) {
        self.mute_depth.set(self.mute_depth.get() + 1);
    }

    pub fn unmute(&self) {
        debug_assert!(self.mute_depth.get() > 0, "unmute without mute");
        self.mute_depth.set(self.mute_depth.get().saturating_sub(1));
    }

    /// Subscribe to completed-transaction commits.
    pub fn on_commit(&self, listener: impl Fn(&CommittedLog) + 'static) -> ListenerHandle {
        self.commits.subscribe(listener)
    }

    pub fn off_commit(&self, handle: ListenerHandle) -> bool {
        self.commits.unsubscribe(handle)
    }

    /// Record one inverse edit. The append is bracketed by its own
    /// auto-committing open/close pair, so a mutation fired completely
    /// outside any explicit block still commits as a one-operation
    /// transaction.
    pub fn add_inverse(&self, edit: Box<dyn Edit>) {
        self.open();
        self.log.borrow_mut().add(edit);
        self.close_commit();
    }

    /// Atomically swap the accumulated log out for an empty one.
    pub fn take_edits(&self) -> InverseLog {
        std::mem::take(&mut *self.log.borrow_mut())
    }

    /// Open one nesting level, running the fragmentation check: a non-empty
    /// log at depth zero means a previous block's log was never drained.
    fn open(&self) {
        if self.depth.get() == 0 && !self.log.borrow().is_empty() {
            tracing::error!(
                edits = self.log.borrow().len(),
                "coding error: opening a transactional block over an un-drained edit log"
            );
        }
        self.depth.set(self.depth.get() + 1);
    }

    /// Close one level; the outermost close takes the whole non-empty log
    /// and hands it to the commit listeners in one step.
    fn close_commit(&self) {
        debug_assert!(self.depth.get() > 0, "edit block close without open");
        self.depth.set(self.depth.get().saturating_sub(1));
        if self.depth.get() > 0 {
            return;
        }
        if self.log.borrow().is_empty() {
            return;
        }
        let log = self.take_edits();
        self.commits.emit(&Rc::new(RefCell::new(log)));
    }

    /// Close one level; the outermost close clears whatever the caller did
    /// not retrieve via [`EditCapture::take_edits`].
    fn close_clear(&self) {
        debug_assert!(self.depth.get() > 0, "edit capture close without open");
        self.depth.set(self.depth.get().saturating_sub(1));
        if self.depth.get() == 0 {
            *self.log.borrow_mut() = InverseLog::new();
        }
    }
}

impl std::fmt::Debug for UndoRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UndoRouter")
            .field("depth", &self.depth.get())
            .field("edits", &self.edit_count())
            .field("muted", &self.is_muted())
            .finish()
    }
}

/// Auto-committing transactional block. Guaranteed release on every exit
/// path: the outermost drop drains a non-empty log to the commit listeners.
pub struct EditBlock {
    router: Rc<UndoRouter>,
}

impl EditBlock {
    pub fn new(router: Rc<UndoRouter>) -> Self {
        router.open();
        EditBlock { router }
    }
}

impl Drop for EditBlock {
    fn drop(&mut self) {
        self.router.close_commit();
    }
}

/// Capturing transactional block: same depth bookkeeping, but the log is
/// never auto-committed. The caller retrieves it with
/// [`take_edits`](Self::take_edits) to embed the raw inverse log inside its
/// own undo record. Un-taken edits are cleared at the outermost close.
pub struct EditCapture {
    router: Rc<UndoRouter>,
}

impl EditCapture {
    pub fn new(router: Rc<UndoRouter>) -> Self {
        router.open();
        EditCapture { router }
    }

    /// Atomically swap out the log accumulated since the capture opened (or
    /// since the previous take).
    pub fn take_edits(&self) -> InverseLog {
        self.router.take_edits()
    }
}

impl Drop for EditCapture {
    fn drop(&mut self) {
        self.router.close_clear();
    }
}
