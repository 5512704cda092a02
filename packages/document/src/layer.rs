//! # Layer
//!
//! A mutable hierarchical document unit. All primitive writes route through
//! the layer's state-delegate hook (when installed) *before* the data is
//! changed, then land in [`LayerData`]. Sublayer-list edits additionally emit
//! registry notices so the composition-tree mirror stays current.

use crate::data::{LayerData, Spec, FIELD_SUBLAYERS};
use crate::delegate::StateDelegate;
use crate::errors::DocumentError;
use crate::path::{SpecPath, SpecType};
use crate::registry::{LayerNotice, LayerRegistry, SublayerChange};
use crate::value::{TimeCode, Value};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

/// Shared handle to a layer.
pub type LayerHandle = Rc<Layer>;

/// Weak handle to a layer.
pub type WeakLayerHandle = Weak<Layer>;

/// A mutable hierarchical document identified by a stable identifier string.
pub struct Layer {
    identifier: RefCell<String>,
    anonymous: bool,
    data: RefCell<LayerData>,
    delegate: RefCell<Option<Rc<dyn StateDelegate>>>,
    registry: Weak<LayerRegistry>,
    self_handle: RefCell<WeakLayerHandle>,
    // Fallback dirty flag for layers without a delegate installed.
    dirty: Cell<bool>,
}

impl Layer {
    pub(crate) fn new(identifier: String, anonymous: bool, registry: Weak<LayerRegistry>) -> LayerHandle {
        let layer = Rc::new(Layer {
            identifier: RefCell::new(identifier),
            anonymous,
            data: RefCell::new(LayerData::new()),
            delegate: RefCell::new(None),
            registry,
            self_handle: RefCell::new(Weak::new()),
            dirty: Cell::new(false),
        });
        *layer.self_handle.borrow_mut() = Rc::downgrade(&layer);
        layer
    }

    pub fn identifier(&self) -> String {
        self.identifier.borrow().clone()
    }

    pub fn is_anonymous(&self) -> bool {
        self.anonymous
    }

    /// Change this layer's identifier, re-keying the registry and emitting an
    /// identifier-changed notice. Fails when the new identifier is taken.
    pub fn set_identifier(&self, new_identifier: &str) -> Result<(), DocumentError> {
        let old = self.identifier();
        if old == new_identifier {
            return Ok(());
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.rekey(&old, new_identifier)?;
        }
        *self.identifier.borrow_mut() = new_identifier.to_string();
        self.notify(LayerNotice::IdentifierChanged {
            old_identifier: old,
            new_identifier: new_identifier.to_string(),
        });
        Ok(())
    }

    /// Currently installed state delegate, if any.
    pub fn delegate(&self) -> Option<Rc<dyn StateDelegate>> {
        self.delegate.borrow().clone()
    }

    /// Install or clear the state-delegate hook. The outgoing delegate is
    /// unbound, the incoming one is bound via `on_set_layer`.
    pub fn set_delegate(&self, delegate: Option<Rc<dyn StateDelegate>>) {
        let old = self.delegate.borrow_mut().take();
        if let Some(old) = old {
            old.on_set_layer(None);
        }
        if let Some(new) = delegate {
            *self.delegate.borrow_mut() = Some(new.clone());
            let handle = self.self_handle.borrow().upgrade();
            new.on_set_layer(handle.as_ref());
        }
    }

    pub fn is_dirty(&self) -> bool {
        match self.delegate() {
            Some(delegate) => delegate.is_dirty(),
            None => self.dirty.get(),
        }
    }

    pub fn mark_clean(&self) {
        self.dirty.set(false);
        if let Some(delegate) = self.delegate() {
            delegate.mark_clean();
        }
    }

    pub fn has_spec(&self, path: &SpecPath) -> bool {
        self.data.borrow().has_spec(path)
    }

    pub fn spec_type(&self, path: &SpecPath) -> Option<SpecType> {
        self.data.borrow().spec_type(path)
    }

    pub fn spec_count(&self) -> usize {
        self.data.borrow().spec_count()
    }

    pub fn field(&self, path: &SpecPath, field: &str) -> Option<Value> {
        self.data.borrow().field(path, field)
    }

    pub fn field_dict_key(&self, path: &SpecPath, field: &str, key: &str) -> Option<Value> {
        self.data.borrow().field_dict_key(path, field, key)
    }

    pub fn time_sample(&self, path: &SpecPath, time: TimeCode) -> Option<Value> {
        self.data.borrow().time_sample(path, time)
    }

    pub fn child_list(&self, path: &SpecPath, field: &str) -> Vec<String> {
        self.data.borrow().child_list(path, field)
    }

    /// Copy of the subtree at `path`, parents-first.
    pub fn collect_subtree(&self, path: &SpecPath) -> Vec<(SpecPath, Spec)> {
        self.data.borrow().collect_subtree(path)
    }

    /// Declared sublayer identifiers, in declaration order.
    pub fn sublayer_paths(&self) -> Vec<String> {
        self.field(&SpecPath::root(), FIELD_SUBLAYERS)
            .map(|v| v.as_string_list())
            .unwrap_or_default()
    }

    /// Set `field` on the spec at `path`; `Value::Null` erases it.
    pub fn set_field(&self, path: &SpecPath, field: &str, value: Value) -> Result<(), DocumentError> {
        if !self.has_spec(path) {
            return Err(DocumentError::SpecNotFound(path.clone()));
        }
        let old_sublayers = (path.is_root() && field == FIELD_SUBLAYERS).then(|| self.sublayer_paths());

        if let Some(delegate) = self.delegate() {
            delegate.on_set_field(path, field, &value);
        }
        self.data.borrow_mut().set_field(path, field, value)?;
        self.dirty.set(true);

        if let Some(old) = old_sublayers {
            self.notify_sublayer_diff(&old, &self.sublayer_paths());
        }
        Ok(())
    }

    /// Set one key of a dictionary-valued field; `Value::Null` erases the key.
    pub fn set_field_dict_key(
        &self,
        path: &SpecPath,
        field: &str,
        key: &str,
        value: Value,
    ) -> Result<(), DocumentError> {
        if !self.has_spec(path) {
            return Err(DocumentError::SpecNotFound(path.clone()));
        }
        if let Some(delegate) = self.delegate() {
            delegate.on_set_field_dict_key(path, field, key, &value);
        }
        self.data.borrow_mut().set_field_dict_key(path, field, key, value)?;
        self.dirty.set(true);
        Ok(())
    }

    /// Set the sample at `time`; `Value::Null` erases it.
    pub fn set_time_sample(&self, path: &SpecPath, time: TimeCode, value: Value) -> Result<(), DocumentError> {
        if !self.has_spec(path) {
            return Err(DocumentError::SpecNotFound(path.clone()));
        }
        if let Some(delegate) = self.delegate() {
            delegate.on_set_time_sample(path, time, &value);
        }
        self.data.borrow_mut().set_time_sample(path, time, value)?;
        self.dirty.set(true);
        Ok(())
    }

    /// Create an empty spec at `path`. `inert` marks bookkeeping-only specs
    /// and is forwarded to observers unchanged.
    pub fn create_spec(&self, path: &SpecPath, spec_type: SpecType, inert: bool) -> Result<(), DocumentError> {
        {
            let data = self.data.borrow();
            if data.has_spec(path) {
                return Err(DocumentError::SpecExists(path.clone()));
            }
            if let Some(parent) = path.parent() {
                if !data.has_spec(&parent) {
                    return Err(DocumentError::ParentNotFound(parent));
                }
            }
        }
        if let Some(delegate) = self.delegate() {
            delegate.on_create_spec(path, spec_type, inert);
        }
        self.data.borrow_mut().create_spec(path, spec_type)?;
        self.dirty.set(true);
        Ok(())
    }

    /// Delete the spec at `path` and its subtree.
    pub fn delete_spec(&self, path: &SpecPath, inert: bool) -> Result<(), DocumentError> {
        if path.is_root() || !self.has_spec(path) {
            return Err(DocumentError::SpecNotFound(path.clone()));
        }
        if let Some(delegate) = self.delegate() {
            delegate.on_delete_spec(path, inert);
        }
        self.data.borrow_mut().delete_spec(path)?;
        self.dirty.set(true);
        Ok(())
    }

    /// Move the spec at `old_path` (with its subtree) to `new_path`.
    pub fn move_spec(&self, old_path: &SpecPath, new_path: &SpecPath) -> Result<(), DocumentError> {
        {
            let data = self.data.borrow();
            if !data.has_spec(old_path) {
                return Err(DocumentError::SpecNotFound(old_path.clone()));
            }
            if data.has_spec(new_path) {
                return Err(DocumentError::SpecExists(new_path.clone()));
            }
        }
        if let Some(delegate) = self.delegate() {
            delegate.on_move_spec(old_path, new_path);
        }
        self.data.borrow_mut().move_spec(old_path, new_path)?;
        self.dirty.set(true);
        Ok(())
    }

    /// Append to the ordered child list `field` of the spec at `parent`.
    pub fn push_child(&self, parent: &SpecPath, field: &str, value: &str) -> Result<(), DocumentError> {
        if !self.has_spec(parent) {
            return Err(DocumentError::SpecNotFound(parent.clone()));
        }
        if let Some(delegate) = self.delegate() {
            delegate.on_push_child(parent, field, value);
        }
        self.data.borrow_mut().push_child(parent, field, value)?;
        self.dirty.set(true);
        Ok(())
    }

    /// Pop the last entry of the ordered child list `field`.
    pub fn pop_child(&self, parent: &SpecPath, field: &str) -> Result<Option<String>, DocumentError> {
        if !self.has_spec(parent) {
            return Err(DocumentError::SpecNotFound(parent.clone()));
        }
        let old_value = self.data.borrow().child_list(parent, field).last().cloned();
        let Some(old_value) = old_value else {
            return Ok(None);
        };
        if let Some(delegate) = self.delegate() {
            delegate.on_pop_child(parent, field, &old_value);
        }
        let popped = self.data.borrow_mut().pop_child(parent, field)?;
        self.dirty.set(true);
        Ok(popped)
    }

    /// Append `identifier` to the declared sublayers. Duplicate insertions
    /// are rejected.
    pub fn insert_sublayer_path(&self, identifier: &str) -> Result<(), DocumentError> {
        let mut sublayers = self.sublayer_paths();
        if sublayers.iter().any(|s| s == identifier) {
            return Err(DocumentError::SublayerExists(identifier.to_string()));
        }
        sublayers.push(identifier.to_string());
        self.set_field(&SpecPath::root(), FIELD_SUBLAYERS, Value::string_list(sublayers))
    }

    /// Insert `identifier` into the declared sublayers at `index` (clamped).
    pub fn insert_sublayer_path_at(&self, identifier: &str, index: usize) -> Result<(), DocumentError> {
        let mut sublayers = self.sublayer_paths();
        if sublayers.iter().any(|s| s == identifier) {
            return Err(DocumentError::SublayerExists(identifier.to_string()));
        }
        let index = index.min(sublayers.len());
        sublayers.insert(index, identifier.to_string());
        self.set_field(&SpecPath::root(), FIELD_SUBLAYERS, Value::string_list(sublayers))
    }

    /// Remove `identifier` from the declared sublayers. Removing a missing
    /// path is a silent no-op.
    pub fn remove_sublayer_path(&self, identifier: &str) -> Result<(), DocumentError> {
        let mut sublayers = self.sublayer_paths();
        let before = sublayers.len();
        sublayers.retain(|s| s != identifier);
        if sublayers.len() == before {
            return Ok(());
        }
        self.set_field(&SpecPath::root(), FIELD_SUBLAYERS, Value::string_list(sublayers))
    }

    fn notify(&self, notice: LayerNotice) {
        if let Some(registry) = self.registry.upgrade() {
            registry.notify(&notice);
        }
    }

    fn notify_sublayer_diff(&self, old: &[String], new: &[String]) {
        let identifier = self.identifier();
        for removed in old.iter().filter(|s| !new.contains(s)) {
            self.notify(LayerNotice::SublayersChanged {
                layer: identifier.clone(),
                sublayer: removed.clone(),
                change: SublayerChange::Removed,
            });
        }
        for added in new.iter().filter(|s| !old.contains(s)) {
            self.notify(LayerNotice::SublayersChanged {
                layer: identifier.clone(),
                sublayer: added.clone(),
                change: SublayerChange::Added,
            });
        }
    }
}

impl Drop for Layer {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.forget(&self.identifier.borrow());
        }
    }
}

impl std::fmt::Debug for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Layer")
            .field("identifier", &self.identifier())
            .field("anonymous", &self.anonymous)
            .field("specs", &self.spec_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingDelegate {
        events: RefCell<Vec<String>>,
        old_values: RefCell<Vec<Option<Value>>>,
        layer: RefCell<Option<WeakLayerHandle>>,
    }

    impl StateDelegate for RecordingDelegate {
        fn on_set_layer(&self, layer: Option<&LayerHandle>) {
            *self.layer.borrow_mut() = layer.map(Rc::downgrade);
            self.events.borrow_mut().push("set_layer".into());
        }

        fn on_set_field(&self, path: &SpecPath, field: &str, _value: &Value) {
            // Callback fires before the write, so prior state is readable.
            if let Some(layer) = self.layer.borrow().as_ref().and_then(Weak::upgrade) {
                self.old_values.borrow_mut().push(layer.field(path, field));
            }
            self.events.borrow_mut().push(format!("set_field {path} {field}"));
        }

        fn on_delete_spec(&self, path: &SpecPath, _inert: bool) {
            self.events.borrow_mut().push(format!("delete_spec {path}"));
        }

        fn as_any(self: Rc<Self>) -> Rc<dyn std::any::Any> {
            self
        }
    }

    fn make_layer() -> (Rc<LayerRegistry>, LayerHandle) {
        let registry = LayerRegistry::new();
        let layer = registry.create_anonymous("test");
        (registry, layer)
    }

    #[test]
    fn test_delegate_sees_prior_state() {
        let (_registry, layer) = make_layer();
        let delegate = Rc::new(RecordingDelegate::default());
        layer.set_delegate(Some(delegate.clone()));

        layer.set_field(&SpecPath::root(), "x", Value::Int(1)).unwrap();
        layer.set_field(&SpecPath::root(), "x", Value::Int(2)).unwrap();

        assert_eq!(
            *delegate.old_values.borrow(),
            vec![None, Some(Value::Int(1))]
        );
    }

    #[test]
    fn test_set_delegate_fires_bind_callback() {
        let (_registry, layer) = make_layer();
        let delegate = Rc::new(RecordingDelegate::default());
        layer.set_delegate(Some(delegate.clone()));
        assert_eq!(delegate.events.borrow()[0], "set_layer");
        assert!(delegate.layer.borrow().as_ref().unwrap().upgrade().is_some());
    }

    #[test]
    fn test_writes_without_delegate_are_silent() {
        let (_registry, layer) = make_layer();
        layer.set_field(&SpecPath::root(), "x", Value::Int(1)).unwrap();
        assert!(layer.is_dirty());
        layer.mark_clean();
        assert!(!layer.is_dirty());
    }

    #[test]
    fn test_sublayer_notices() {
        let registry = LayerRegistry::new();
        let layer = registry.create_anonymous("root");
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = seen.clone();
        registry.notices().subscribe(move |n: &LayerNotice| {
            if let LayerNotice::SublayersChanged { sublayer, change, .. } = n {
                seen_clone.borrow_mut().push((sublayer.clone(), *change));
            }
        });

        layer.insert_sublayer_path("a.sdoc").unwrap();
        layer.remove_sublayer_path("a.sdoc").unwrap();
        // Removing a missing path is a no-op without a notice.
        layer.remove_sublayer_path("a.sdoc").unwrap();

        assert_eq!(
            *seen.borrow(),
            vec![
                ("a.sdoc".to_string(), SublayerChange::Added),
                ("a.sdoc".to_string(), SublayerChange::Removed),
            ]
        );
    }

    #[test]
    fn test_duplicate_sublayer_rejected() {
        let (_registry, layer) = make_layer();
        layer.insert_sublayer_path("a.sdoc").unwrap();
        assert!(matches!(
            layer.insert_sublayer_path("a.sdoc"),
            Err(DocumentError::SublayerExists(_))
        ));
    }
}
