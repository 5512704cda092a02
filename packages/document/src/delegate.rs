//! # State Delegate
//!
//! Capability interface observing every primitive mutation on one layer.
//!
//! A layer carries at most one delegate at its hook point; fan-out to several
//! named observers is layered on top by installing a proxy delegate that owns
//! the others. Callbacks fire *before* the corresponding write lands, so a
//! delegate can read prior state to build inverses.

use crate::layer::LayerHandle;
use crate::path::{SpecPath, SpecType};
use crate::value::{TimeCode, Value};
use std::any::Any;
use std::rc::Rc;

/// Observer of all primitive mutations on one layer.
///
/// Methods take `&self`; implementations use interior mutability so callbacks
/// can re-enter the layer (reads and, during undo playback, writes) without
/// aliasing hazards.
pub trait StateDelegate: 'static {
    /// Aggregate dirty query.
    fn is_dirty(&self) -> bool {
        false
    }

    fn mark_clean(&self) {}

    fn mark_dirty(&self) {}

    /// Fired when the delegate is (un)bound from a layer.
    fn on_set_layer(&self, layer: Option<&LayerHandle>) {
        let _ = layer;
    }

    fn on_set_field(&self, path: &SpecPath, field: &str, value: &Value) {
        let _ = (path, field, value);
    }

    fn on_set_field_dict_key(&self, path: &SpecPath, field: &str, key: &str, value: &Value) {
        let _ = (path, field, key, value);
    }

    fn on_set_time_sample(&self, path: &SpecPath, time: TimeCode, value: &Value) {
        let _ = (path, time, value);
    }

    fn on_create_spec(&self, path: &SpecPath, spec_type: SpecType, inert: bool) {
        let _ = (path, spec_type, inert);
    }

    fn on_delete_spec(&self, path: &SpecPath, inert: bool) {
        let _ = (path, inert);
    }

    fn on_move_spec(&self, old_path: &SpecPath, new_path: &SpecPath) {
        let _ = (old_path, new_path);
    }

    fn on_push_child(&self, parent: &SpecPath, field: &str, value: &str) {
        let _ = (parent, field, value);
    }

    fn on_pop_child(&self, parent: &SpecPath, field: &str, old_value: &str) {
        let _ = (parent, field, old_value);
    }

    /// Checked-downcast escape hatch so a holder can recognize its own hook
    /// type before replacing it.
    fn as_any(self: Rc<Self>) -> Rc<dyn Any>;
}
