//! # Event Dispatcher
//!
//! Synchronous listener registry used for structural-change feeds and
//! registry notices. Listeners are invoked in registration order on the
//! calling thread; the listener list is snapshotted before a dispatch so a
//! callback may subscribe or unsubscribe without invalidating the iteration.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Handle returned by [`EventDispatcher::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle(u64);

/// Single-threaded, reentrancy-safe event dispatcher.
pub struct EventDispatcher<E> {
    listeners: RefCell<Vec<(u64, Rc<dyn Fn(&E)>)>>,
    next_id: Cell<u64>,
}

impl<E> EventDispatcher<E> {
    pub fn new() -> Self {
        Self {
            listeners: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
        }
    }

    /// Register a listener; returns a handle for later removal.
    pub fn subscribe(&self, listener: impl Fn(&E) + 'static) -> ListenerHandle {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.listeners.borrow_mut().push((id, Rc::new(listener)));
        ListenerHandle(id)
    }

    /// Remove a previously registered listener. Returns false if the handle
    /// is unknown (already removed).
    pub fn unsubscribe(&self, handle: ListenerHandle) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(id, _)| *id != handle.0);
        listeners.len() != before
    }

    /// Invoke every listener with `event`, in registration order.
    pub fn emit(&self, event: &E) {
        // Snapshot so listeners can (un)subscribe reentrantly.
        let snapshot: Vec<Rc<dyn Fn(&E)>> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        for listener in snapshot {
            listener(event);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.borrow().is_empty()
    }
}

impl<E> Default for EventDispatcher<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for EventDispatcher<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("listeners", &self.len())
            .finish()
    }
}
