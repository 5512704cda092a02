//! # State Delegate Fan-out
//!
//! [`DelegateProxy`] is the single concrete delegate installed at a layer's
//! hook point; it forwards every mutation callback to all named delegates it
//! owns and aggregates their dirty state. [`DelegateRegistry`] resolves
//! delegate names to factories, and [`DelegatesHolder`] keeps the installed
//! delegate sets synchronized with layer-tree membership, so a layer that
//! enters the tree mid-session is wrapped before it can be mutated.

use crate::layer_tree::{LayerTree, SublayerEvent};
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::rc::{Rc, Weak};
use stratum_document::{
    LayerHandle, SpecPath, SpecType, StateDelegate, SublayerChange, TimeCode, Value,
    WeakLayerHandle,
};
use stratum_common::ListenerHandle;

/// Fan-out state delegate: owns `name → delegate` and forwards every
/// callback to each owned delegate in registration order.
pub struct DelegateProxy {
    layer: RefCell<WeakLayerHandle>,
    delegates: RefCell<Vec<(String, Rc<dyn StateDelegate>)>>,
    dirty: Cell<bool>,
}

impl DelegateProxy {
    pub fn new() -> Rc<Self> {
        Rc::new(DelegateProxy {
            layer: RefCell::new(Weak::new()),
            delegates: RefCell::new(Vec::new()),
            dirty: Cell::new(false),
        })
    }

    /// The layer this proxy is installed on, while it is alive.
    pub fn layer(&self) -> Option<LayerHandle> {
        self.layer.borrow().upgrade()
    }

    /// Store `delegate` under `name` (replacing a previous holder of the
    /// name) and immediately bind it to the current layer so it can
    /// initialize from present state.
    pub fn add_delegate(&self, name: &str, delegate: Rc<dyn StateDelegate>) {
        {
            let mut delegates = self.delegates.borrow_mut();
            if let Some(slot) = delegates.iter_mut().find(|(n, _)| n == name) {
                slot.1 = delegate.clone();
            } else {
                delegates.push((name.to_string(), delegate.clone()));
            }
        }
        delegate.on_set_layer(self.layer().as_ref());
    }

    pub fn remove_delegate(&self, name: &str) -> bool {
        let mut delegates = self.delegates.borrow_mut();
        let before = delegates.len();
        delegates.retain(|(n, _)| n != name);
        delegates.len() != before
    }

    pub fn has_delegate(&self, name: &str) -> bool {
        self.delegates.borrow().iter().any(|(n, _)| n == name)
    }

    pub fn delegate(&self, name: &str) -> Option<Rc<dyn StateDelegate>> {
        self.delegates
            .borrow()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, d)| d.clone())
    }

    pub fn delegate_count(&self) -> usize {
        self.delegates.borrow().len()
    }

    /// Guarded dirty setter: a no-op when already at the requested state, so
    /// redundant fan-out is avoided.
    pub fn set_dirty(&self, dirty: bool) {
        if dirty == self.dirty.get() {
            return;
        }
        if dirty {
            self.mark_dirty();
        } else {
            self.mark_clean();
        }
    }

    fn snapshot(&self) -> Vec<Rc<dyn StateDelegate>> {
        self.delegates.borrow().iter().map(|(_, d)| d.clone()).collect()
    }
}

impl StateDelegate for DelegateProxy {
    fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    fn mark_clean(&self) {
        self.dirty.set(false);
        for delegate in self.snapshot() {
            delegate.mark_clean();
        }
    }

    fn mark_dirty(&self) {
        self.dirty.set(true);
        for delegate in self.snapshot() {
            delegate.mark_dirty();
        }
    }

    fn on_set_layer(&self, layer: Option<&LayerHandle>) {
        *self.layer.borrow_mut() = layer.map(Rc::downgrade).unwrap_or_default();
        for delegate in self.snapshot() {
            delegate.on_set_layer(layer);
        }
    }

    fn on_set_field(&self, path: &SpecPath, field: &str, value: &Value) {
        for delegate in self.snapshot() {
            delegate.on_set_field(path, field, value);
        }
    }

    fn on_set_field_dict_key(&self, path: &SpecPath, field: &str, key: &str, value: &Value) {
        for delegate in self.snapshot() {
            delegate.on_set_field_dict_key(path, field, key, value);
        }
    }

    fn on_set_time_sample(&self, path: &SpecPath, time: TimeCode, value: &Value) {
        for delegate in self.snapshot() {
            delegate.on_set_time_sample(path, time, value);
        }
    }

    fn on_create_spec(&self, path: &SpecPath, spec_type: SpecType, inert: bool) {
        for delegate in self.snapshot() {
            delegate.on_create_spec(path, spec_type, inert);
        }
    }

    fn on_delete_spec(&self, path: &SpecPath, inert: bool) {
        for delegate in self.snapshot() {
            delegate.on_delete_spec(path, inert);
        }
    }

    fn on_move_spec(&self, old_path: &SpecPath, new_path: &SpecPath) {
        for delegate in self.snapshot() {
            delegate.on_move_spec(old_path, new_path);
        }
    }

    fn on_push_child(&self, parent: &SpecPath, field: &str, value: &str) {
        for delegate in self.snapshot() {
            delegate.on_push_child(parent, field, value);
        }
    }

    fn on_pop_child(&self, parent: &SpecPath, field: &str, old_value: &str) {
        for delegate in self.snapshot() {
            delegate.on_pop_child(parent, field, old_value);
        }
    }

    fn as_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

impl std::fmt::Debug for DelegateProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelegateProxy")
            .field("delegates", &self.delegate_count())
            .field("dirty", &self.dirty.get())
            .finish()
    }
}

/// Factory producing a named delegate bound to a proxy.
pub type DelegateFactory = Box<dyn Fn(Weak<DelegateProxy>) -> Rc<dyn StateDelegate>>;

/// Name → factory registry for state delegates. New delegate kinds register
/// here; neither the proxy nor the tracker changes when one is added.
pub struct DelegateRegistry {
    factories: RefCell<BTreeMap<String, DelegateFactory>>,
}

impl DelegateRegistry {
    pub fn new() -> Rc<Self> {
        Rc::new(DelegateRegistry {
            factories: RefCell::new(BTreeMap::new()),
        })
    }

    /// Register a factory under `name`. Returns false when the name is
    /// already taken.
    pub fn register(
        &self,
        name: &str,
        factory: impl Fn(Weak<DelegateProxy>) -> Rc<dyn StateDelegate> + 'static,
    ) -> bool {
        let mut factories = self.factories.borrow_mut();
        if factories.contains_key(name) {
            return false;
        }
        factories.insert(name.to_string(), Box::new(factory));
        true
    }

    /// Drop the factory under `name`. Returns false when unregistered.
    pub fn unregister(&self, name: &str) -> bool {
        self.factories.borrow_mut().remove(name).is_some()
    }

    /// Instantiate the delegate registered under `name`, bound to `proxy`.
    /// Returns `None` for unknown names; callers must check.
    pub fn create(&self, name: &str, proxy: &Rc<DelegateProxy>) -> Option<Rc<dyn StateDelegate>> {
        let factories = self.factories.borrow();
        factories.get(name).map(|factory| factory(Rc::downgrade(proxy)))
    }
}

impl std::fmt::Debug for DelegateRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelegateRegistry")
            .field("factories", &self.factories.borrow().len())
            .finish()
    }
}

/// Bridges the layer tree, the delegate registry and the per-layer proxies:
/// ensures every tracked layer carries a proxy, attaches named delegates
/// tree-wide or per layer, and wraps layers that enter the tree later with
/// the full current delegate set automatically.
pub struct DelegatesHolder {
    tree: Rc<LayerTree>,
    registry: Rc<DelegateRegistry>,
    names: RefCell<BTreeSet<String>>,
    subscription: Cell<Option<ListenerHandle>>,
}

impl DelegatesHolder {
    pub fn new(tree: Rc<LayerTree>, registry: Rc<DelegateRegistry>) -> Rc<Self> {
        let holder = Rc::new(DelegatesHolder {
            tree: tree.clone(),
            registry,
            names: RefCell::new(BTreeSet::new()),
            subscription: Cell::new(None),
        });
        for layer in holder.tree.get_all_layers() {
            holder.ensure_proxy(&layer);
        }
        let weak = Rc::downgrade(&holder);
        let subscription = tree.subscribe(move |event: &SublayerEvent| {
            if event.change == SublayerChange::Added {
                if let Some(holder) = weak.upgrade() {
                    holder.wrap(&event.child);
                }
            }
        });
        holder.subscription.set(Some(subscription));
        holder
    }

    /// Attach the delegate registered under `name` to every tracked layer
    /// that does not already carry it; layers added later receive it
    /// automatically.
    pub fn add_delegate(&self, name: &str) {
        self.names.borrow_mut().insert(name.to_string());
        for layer in self.tree.get_all_layers() {
            self.attach(name, &layer);
        }
    }

    /// Attach the delegate registered under `name` to a single layer.
    pub fn add_delegate_to(&self, name: &str, identifier: &str) {
        if let Some(layer) = self.tree.registry().find_or_open(identifier) {
            self.attach(name, &layer);
        }
    }

    /// Detach the named delegate everywhere and stop auto-attaching it.
    pub fn remove_delegate(&self, name: &str) {
        self.names.borrow_mut().remove(name);
        for layer in self.tree.get_all_layers() {
            if let Some(proxy) = self.existing_proxy(&layer) {
                proxy.remove_delegate(name);
            }
        }
    }

    /// Detach the named delegate from a single layer.
    pub fn remove_delegate_from(&self, name: &str, identifier: &str) {
        if let Some(layer) = self.tree.registry().find_or_open(identifier) {
            if let Some(proxy) = self.existing_proxy(&layer) {
                proxy.remove_delegate(name);
            }
        }
    }

    fn attach(&self, name: &str, layer: &LayerHandle) {
        let Some(proxy) = self.ensure_proxy(layer) else {
            return;
        };
        if proxy.has_delegate(name) {
            return;
        }
        match self.registry.create(name, &proxy) {
            Some(delegate) => proxy.add_delegate(name, delegate),
            None => tracing::warn!(name, "no state delegate factory registered under name"),
        }
    }

    /// Wrap a layer that just entered the tree with a proxy plus every
    /// holder-wide delegate name.
    fn wrap(&self, identifier: &str) {
        let Some(layer) = self.tree.registry().find_or_open(identifier) else {
            return;
        };
        if self.ensure_proxy(&layer).is_none() {
            return;
        }
        let names: Vec<String> = self.names.borrow().iter().cloned().collect();
        for name in names {
            self.attach(&name, &layer);
        }
    }

    /// Install a proxy on `layer` unless one is already present. A foreign
    /// (non-proxy) hook is never clobbered; such layers are skipped.
    fn ensure_proxy(&self, layer: &LayerHandle) -> Option<Rc<DelegateProxy>> {
        match layer.delegate() {
            Some(hook) => match hook.as_any().downcast::<DelegateProxy>() {
                Ok(proxy) => Some(proxy),
                Err(_) => {
                    tracing::warn!(
                        identifier = %layer.identifier(),
                        "layer carries a foreign state delegate; leaving it untouched"
                    );
                    None
                }
            },
            None => {
                let proxy = DelegateProxy::new();
                layer.set_delegate(Some(proxy.clone()));
                Some(proxy)
            }
        }
    }

    fn existing_proxy(&self, layer: &LayerHandle) -> Option<Rc<DelegateProxy>> {
        layer
            .delegate()
            .and_then(|hook| hook.as_any().downcast::<DelegateProxy>().ok())
    }
}

impl Drop for DelegatesHolder {
    fn drop(&mut self) {
        if let Some(handle) = self.subscription.take() {
            self.tree.unsubscribe(handle);
        }
    }
}

impl std::fmt::Debug for DelegatesHolder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelegatesHolder")
            .field("names", &self.names.borrow())
            .finish()
    }
}
