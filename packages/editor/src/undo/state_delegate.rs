//! # Undo State Delegate
//!
//! The "undo" interceptor: one instance per mutated layer, attached through
//! the delegate proxy. Every mutation callback marks the proxy dirty and,
//! unless the router is muted, appends the inverse operation to the
//! router's current transaction log. Inverses write back through the layer's
//! ordinary primitives, so replaying them is itself observed and re-recorded
//! (the redo payload).

use crate::delegates::{DelegateProxy, DelegateRegistry};
use crate::undo::inverse::Edit;
use crate::undo::router::UndoRouter;
use std::any::Any;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};
use stratum_document::{LayerHandle, Spec, SpecPath, SpecType, StateDelegate, TimeCode, Value};

/// Registry name of the undo interceptor.
pub const UNDO_DELEGATE: &str = "undo";

/// Resolve the layer behind a proxy for inversion, diagnosing expiry.
fn resolve_layer(proxy: &Weak<DelegateProxy>, op: &str) -> Option<LayerHandle> {
    match proxy.upgrade().and_then(|p| p.layer()) {
        Some(layer) => Some(layer),
        None => {
            tracing::error!(op, "cannot invert edit for expired layer");
            None
        }
    }
}

/// Sequence of primitive inversions, applied in reverse recording order.
/// Consecutive instances in the log merge by concatenation.
struct LayerEdit {
    inversions: Vec<Box<dyn FnMut() -> bool>>,
}

impl LayerEdit {
    fn new(inversion: impl FnMut() -> bool + 'static) -> Box<Self> {
        Box::new(LayerEdit {
            inversions: vec![Box::new(inversion)],
        })
    }
}

impl Edit for LayerEdit {
    fn invert(&mut self) -> bool {
        let mut ok = true;
        for inversion in self.inversions.iter_mut().rev() {
            ok &= inversion();
        }
        ok
    }

    fn merge_with(&mut self, other: &mut dyn Edit) -> bool {
        let Some(other) = other.as_any_mut().downcast_mut::<LayerEdit>() else {
            return false;
        };
        self.inversions.append(&mut other.inversions);
        true
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Field restores coalesced per `(path, field)`: only the first recorded
/// inverse per field survives a merge, so repeated sets of one field within
/// a transaction restore the oldest value once.
struct FieldEdit {
    proxy: Weak<DelegateProxy>,
    restores: BTreeMap<(SpecPath, String), Value>,
}

impl FieldEdit {
    fn new(proxy: Weak<DelegateProxy>, path: SpecPath, field: String, old_value: Value) -> Box<Self> {
        let mut restores = BTreeMap::new();
        restores.insert((path, field), old_value);
        Box::new(FieldEdit { proxy, restores })
    }
}

impl Edit for FieldEdit {
    fn invert(&mut self) -> bool {
        let Some(layer) = resolve_layer(&self.proxy, "set_field") else {
            return false;
        };
        let mut ok = true;
        for ((path, field), value) in &self.restores {
            ok &= layer.set_field(path, field, value.clone()).is_ok();
        }
        ok
    }

    fn merge_with(&mut self, other: &mut dyn Edit) -> bool {
        let Some(other) = other.as_any_mut().downcast_mut::<FieldEdit>() else {
            return false;
        };
        if !Weak::ptr_eq(&self.proxy, &other.proxy) {
            return false;
        }
        for (key, value) in std::mem::take(&mut other.restores) {
            self.restores.entry(key).or_insert(value);
        }
        true
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// The undo interceptor.
pub struct UndoStateDelegate {
    proxy: Weak<DelegateProxy>,
    router: Rc<UndoRouter>,
}

impl UndoStateDelegate {
    pub fn new(proxy: Weak<DelegateProxy>, router: Rc<UndoRouter>) -> Rc<Self> {
        Rc::new(UndoStateDelegate { proxy, router })
    }

    /// Register the undo-delegate factory under [`UNDO_DELEGATE`].
    pub fn register(registry: &DelegateRegistry, router: &Rc<UndoRouter>) -> bool {
        let router = router.clone();
        registry.register(UNDO_DELEGATE, move |proxy| {
            let delegate: Rc<dyn StateDelegate> = UndoStateDelegate::new(proxy, router.clone());
            delegate
        })
    }

    fn record(&self, edit: Box<dyn Edit>) {
        if self.router.is_muted() {
            tracing::warn!("performance: inverse generated against a muted router; mute earlier in the stack");
            return;
        }
        self.router.add_inverse(edit);
    }

    /// Mark dirty and hand back the proxy + layer when inverse generation
    /// should proceed.
    fn observe(&self) -> Option<(Rc<DelegateProxy>, LayerHandle)> {
        let proxy = self.proxy.upgrade()?;
        proxy.set_dirty(true);
        let layer = proxy.layer()?;
        Some((proxy, layer))
    }
}

impl StateDelegate for UndoStateDelegate {
    fn is_dirty(&self) -> bool {
        self.proxy.upgrade().map(|p| p.is_dirty()).unwrap_or(false)
    }

    fn on_set_field(&self, path: &SpecPath, field: &str, _value: &Value) {
        let Some((_, layer)) = self.observe() else {
            return;
        };
        let old_value = layer.field(path, field).unwrap_or(Value::Null);
        self.record(FieldEdit::new(
            self.proxy.clone(),
            path.clone(),
            field.to_string(),
            old_value,
        ));
    }

    fn on_set_field_dict_key(&self, path: &SpecPath, field: &str, key: &str, _value: &Value) {
        let Some((_, layer)) = self.observe() else {
            return;
        };
        let old_value = layer.field_dict_key(path, field, key).unwrap_or(Value::Null);
        let proxy = self.proxy.clone();
        let path = path.clone();
        let field = field.to_string();
        let key = key.to_string();
        self.record(LayerEdit::new(move || {
            let Some(layer) = resolve_layer(&proxy, "set_field_dict_key") else {
                return false;
            };
            layer
                .set_field_dict_key(&path, &field, &key, old_value.clone())
                .is_ok()
        }));
    }

    fn on_set_time_sample(&self, path: &SpecPath, time: TimeCode, _value: &Value) {
        let Some((_, layer)) = self.observe() else {
            return;
        };
        // A missing previous sample inverts to erasure.
        let old_value = layer.time_sample(path, time).unwrap_or(Value::Null);
        let proxy = self.proxy.clone();
        let path = path.clone();
        self.record(LayerEdit::new(move || {
            let Some(layer) = resolve_layer(&proxy, "set_time_sample") else {
                return false;
            };
            layer.set_time_sample(&path, time, old_value.clone()).is_ok()
        }));
    }

    fn on_create_spec(&self, path: &SpecPath, _spec_type: SpecType, inert: bool) {
        if self.observe().is_none() {
            return;
        }
        let proxy = self.proxy.clone();
        let path = path.clone();
        self.record(LayerEdit::new(move || {
            let Some(layer) = resolve_layer(&proxy, "create_spec") else {
                return false;
            };
            layer.delete_spec(&path, inert).is_ok()
        }));
    }

    fn on_delete_spec(&self, path: &SpecPath, inert: bool) {
        let Some((_, layer)) = self.observe() else {
            return;
        };
        // Snapshot the doomed subtree before the deletion lands.
        let snapshot = layer.collect_subtree(path);
        let proxy = self.proxy.clone();
        self.record(LayerEdit::new(move || {
            let Some(layer) = resolve_layer(&proxy, "delete_spec") else {
                return false;
            };
            restore_subtree(&layer, &snapshot, inert)
        }));
    }

    fn on_move_spec(&self, old_path: &SpecPath, new_path: &SpecPath) {
        if self.observe().is_none() {
            return;
        }
        let proxy = self.proxy.clone();
        let old_path = old_path.clone();
        let new_path = new_path.clone();
        self.record(LayerEdit::new(move || {
            let Some(layer) = resolve_layer(&proxy, "move_spec") else {
                return false;
            };
            layer.move_spec(&new_path, &old_path).is_ok()
        }));
    }

    fn on_push_child(&self, parent: &SpecPath, field: &str, value: &str) {
        if self.observe().is_none() {
            return;
        }
        let proxy = self.proxy.clone();
        let parent = parent.clone();
        let field = field.to_string();
        let value = value.to_string();
        self.record(LayerEdit::new(move || {
            let Some(layer) = resolve_layer(&proxy, "push_child") else {
                return false;
            };
            matches!(layer.pop_child(&parent, &field), Ok(Some(popped)) if popped == value)
        }));
    }

    fn on_pop_child(&self, parent: &SpecPath, field: &str, old_value: &str) {
        if self.observe().is_none() {
            return;
        }
        let proxy = self.proxy.clone();
        let parent = parent.clone();
        let field = field.to_string();
        let old_value = old_value.to_string();
        self.record(LayerEdit::new(move || {
            let Some(layer) = resolve_layer(&proxy, "pop_child") else {
                return false;
            };
            layer.push_child(&parent, &field, &old_value).is_ok()
        }));
    }

    fn as_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

/// Rebuild a deleted subtree from its snapshot, parents-first, through the
/// layer's ordinary primitives so the rebuild is observed.
fn restore_subtree(layer: &LayerHandle, snapshot: &[(SpecPath, Spec)], inert: bool) -> bool {
    let mut ok = true;
    for (index, (path, spec)) in snapshot.iter().enumerate() {
        let spec_type = spec.spec_type.unwrap_or(SpecType::Prim);
        // The deletion root keeps its inert flag; descendants are plain.
        let inert_flag = inert && index == 0;
        ok &= layer.create_spec(path, spec_type, inert_flag).is_ok();
        for (field, value) in &spec.fields {
            ok &= layer.set_field(path, field, value.clone()).is_ok();
        }
        for (&time, value) in &spec.time_samples {
            ok &= layer.set_time_sample(path, time, value.clone()).is_ok();
        }
        for (field, children) in &spec.child_lists {
            for child in children {
                ok &= layer.push_child(path, field, child).is_ok();
            }
        }
    }
    ok
}
