//! # Layer Registry
//!
//! Identifier → layer map with change notices.
//!
//! The registry is an explicit, injectable object (one per document/session)
//! rather than a process-wide table: everything that needs to find or observe
//! layers holds an `Rc<LayerRegistry>`. Layers are held weakly; a layer whose
//! last strong handle drops disappears from the registry. Destruction is
//! observed here, never caused.

use crate::errors::DocumentError;
use crate::layer::{Layer, LayerHandle};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use stratum_common::EventDispatcher;

/// Direction of a sublayer-list change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SublayerChange {
    Added,
    Removed,
}

/// Change notice emitted by the registry when a layer's sublayer list or
/// identifier changes.
#[derive(Debug, Clone)]
pub enum LayerNotice {
    SublayersChanged {
        /// Identifier of the layer whose sublayer list changed.
        layer: String,
        /// The inserted/removed sublayer identifier, as declared (unresolved).
        sublayer: String,
        change: SublayerChange,
    },
    IdentifierChanged {
        old_identifier: String,
        new_identifier: String,
    },
}

/// Fallback used by [`LayerRegistry::find_or_open`] for identifiers not
/// currently registered (e.g. storage-backed layers not yet loaded).
pub type LayerOpener = Box<dyn Fn(&Rc<LayerRegistry>, &str) -> Option<LayerHandle>>;

const ANONYMOUS_PREFIX: &str = "anon:";

/// Identifier → layer map plus the change-notice feed.
pub struct LayerRegistry {
    layers: RefCell<HashMap<String, std::rc::Weak<Layer>>>,
    notices: EventDispatcher<LayerNotice>,
    opener: RefCell<Option<LayerOpener>>,
    anon_serial: Cell<u64>,
    self_handle: RefCell<std::rc::Weak<LayerRegistry>>,
}

impl LayerRegistry {
    pub fn new() -> Rc<Self> {
        let registry = Rc::new(LayerRegistry {
            layers: RefCell::new(HashMap::new()),
            notices: EventDispatcher::new(),
            opener: RefCell::new(None),
            anon_serial: Cell::new(0),
            self_handle: RefCell::new(std::rc::Weak::new()),
        });
        *registry.self_handle.borrow_mut() = Rc::downgrade(&registry);
        registry
    }

    /// The change-notice feed.
    pub fn notices(&self) -> &EventDispatcher<LayerNotice> {
        &self.notices
    }

    pub(crate) fn notify(&self, notice: &LayerNotice) {
        self.notices.emit(notice);
    }

    /// Install the opener consulted by [`find_or_open`](Self::find_or_open).
    pub fn set_opener(&self, opener: LayerOpener) {
        *self.opener.borrow_mut() = Some(opener);
    }

    /// Create a storage-backed layer under `identifier`.
    pub fn create(&self, identifier: &str) -> Result<LayerHandle, DocumentError> {
        if identifier.is_empty() || identifier.starts_with(ANONYMOUS_PREFIX) {
            return Err(DocumentError::InvalidIdentifier(identifier.to_string()));
        }
        if self.find(identifier).is_some() {
            return Err(DocumentError::LayerExists(identifier.to_string()));
        }
        let layer = Layer::new(identifier.to_string(), false, self.self_handle.borrow().clone());
        self.layers
            .borrow_mut()
            .insert(identifier.to_string(), Rc::downgrade(&layer));
        Ok(layer)
    }

    /// Create a session-only layer with a generated anonymous identifier.
    pub fn create_anonymous(&self, tag: &str) -> LayerHandle {
        let serial = self.anon_serial.get();
        self.anon_serial.set(serial + 1);
        let identifier = format!("{ANONYMOUS_PREFIX}{serial:04}:{tag}");
        let layer = Layer::new(identifier.clone(), true, self.self_handle.borrow().clone());
        self.layers.borrow_mut().insert(identifier, Rc::downgrade(&layer));
        layer
    }

    /// Look up a live layer by exact identifier.
    pub fn find(&self, identifier: &str) -> Option<LayerHandle> {
        let layer = self.layers.borrow().get(identifier).and_then(|w| w.upgrade());
        if layer.is_none() {
            // Drop the stale entry so `create` can reuse the identifier.
            self.layers.borrow_mut().remove(identifier);
        }
        layer
    }

    /// Look up a layer, falling back to the configured opener. Returns `None`
    /// when the layer is neither registered nor openable.
    pub fn find_or_open(&self, identifier: &str) -> Option<LayerHandle> {
        if let Some(layer) = self.find(identifier) {
            return Some(layer);
        }
        let registry = self.self_handle.borrow().upgrade()?;
        let opener = self.opener.borrow();
        opener.as_ref().and_then(|open| open(&registry, identifier))
    }

    /// Number of live registered layers.
    pub fn len(&self) -> usize {
        self.layers.borrow().values().filter(|w| w.strong_count() > 0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True for session-only identifiers, which are never resolved.
    pub fn is_anonymous_identifier(identifier: &str) -> bool {
        identifier.starts_with(ANONYMOUS_PREFIX)
    }

    /// Resolve `identifier` against the identifier of its referencing layer.
    ///
    /// Anonymous and absolute identifiers pass through unresolved; relative
    /// identifiers are anchored to the directory of `anchor`.
    pub fn resolve_identifier(identifier: &str, anchor: &str) -> String {
        if Self::is_anonymous_identifier(identifier) || identifier.starts_with('/') {
            return identifier.to_string();
        }
        if anchor.is_empty() || Self::is_anonymous_identifier(anchor) {
            return identifier.to_string();
        }
        let anchor_dir = match anchor.rfind('/') {
            Some(idx) => &anchor[..idx],
            None => "",
        };
        let mut segments: Vec<&str> = anchor_dir.split('/').filter(|s| !s.is_empty()).collect();
        let absolute = anchor.starts_with('/');
        for segment in identifier.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                other => segments.push(other),
            }
        }
        let joined = segments.join("/");
        if absolute {
            format!("/{joined}")
        } else {
            joined
        }
    }

    pub(crate) fn rekey(&self, old: &str, new: &str) -> Result<(), DocumentError> {
        let mut layers = self.layers.borrow_mut();
        if layers.get(new).map(|w| w.strong_count() > 0).unwrap_or(false) {
            return Err(DocumentError::LayerExists(new.to_string()));
        }
        let Some(weak) = layers.remove(old) else {
            return Err(DocumentError::LayerNotFound(old.to_string()));
        };
        layers.insert(new.to_string(), weak);
        Ok(())
    }

    pub(crate) fn forget(&self, identifier: &str) {
        let mut layers = self.layers.borrow_mut();
        if let Some(weak) = layers.get(identifier) {
            if weak.strong_count() == 0 {
                layers.remove(identifier);
            }
        }
    }
}

impl std::fmt::Debug for LayerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayerRegistry").field("layers", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_find() {
        let registry = LayerRegistry::new();
        let layer = registry.create("/scenes/a.sdoc").unwrap();
        assert!(Rc::ptr_eq(&registry.find("/scenes/a.sdoc").unwrap(), &layer));
        assert!(registry.find("/scenes/missing.sdoc").is_none());
    }

    #[test]
    fn test_duplicate_create_rejected() {
        let registry = LayerRegistry::new();
        let _layer = registry.create("/scenes/a.sdoc").unwrap();
        assert!(matches!(
            registry.create("/scenes/a.sdoc"),
            Err(DocumentError::LayerExists(_))
        ));
    }

    #[test]
    fn test_dropped_layer_disappears() {
        let registry = LayerRegistry::new();
        let layer = registry.create("/scenes/a.sdoc").unwrap();
        assert_eq!(registry.len(), 1);
        drop(layer);
        assert!(registry.find("/scenes/a.sdoc").is_none());
        assert_eq!(registry.len(), 0);
        // Identifier is reusable after the layer died.
        registry.create("/scenes/a.sdoc").unwrap();
    }

    #[test]
    fn test_find_or_open_uses_opener() {
        let registry = LayerRegistry::new();
        registry.set_opener(Box::new(|registry, identifier| {
            identifier.ends_with(".sdoc").then(|| registry.create(identifier).unwrap())
        }));
        assert!(registry.find_or_open("/scenes/late.sdoc").is_some());
        assert!(registry.find_or_open("/scenes/late.other").is_none());
    }

    #[test]
    fn test_anonymous_identifiers_pass_through() {
        let registry = LayerRegistry::new();
        let anon = registry.create_anonymous("scratch");
        let id = anon.identifier();
        assert!(LayerRegistry::is_anonymous_identifier(&id));
        assert_eq!(LayerRegistry::resolve_identifier(&id, "/scenes/a.sdoc"), id);
    }

    #[test]
    fn test_relative_resolution() {
        assert_eq!(
            LayerRegistry::resolve_identifier("./empty.sdoc", "/tmp/rel.sdoc"),
            "/tmp/empty.sdoc"
        );
        assert_eq!(
            LayerRegistry::resolve_identifier("../../empty2.sdoc", "/tmp/sub/directory/subdir.sdoc"),
            "/tmp/empty2.sdoc"
        );
        assert_eq!(
            LayerRegistry::resolve_identifier("/abs/empty.sdoc", "/tmp/rel.sdoc"),
            "/abs/empty.sdoc"
        );
    }
}
