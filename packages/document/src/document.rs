//! # Document
//!
//! A document is the pairing of a root layer with its session overlay, plus
//! the registry both live in. The root carries persistent content; the
//! session layer is an anonymous scratch overlay for session-only opinions.

use crate::errors::DocumentError;
use crate::layer::LayerHandle;
use crate::registry::LayerRegistry;
use std::rc::Rc;

/// Two-root layer document: persistent root + anonymous session overlay.
#[derive(Debug)]
pub struct Document {
    root: LayerHandle,
    session: LayerHandle,
    registry: Rc<LayerRegistry>,
}

impl Document {
    /// Create an in-memory document with an anonymous root.
    pub fn in_memory(registry: &Rc<LayerRegistry>) -> Self {
        let root = registry.create_anonymous("root");
        let session = registry.create_anonymous("session");
        Document {
            root,
            session,
            registry: registry.clone(),
        }
    }

    /// Open a document over the layer at `identifier` (found or opened via
    /// the registry).
    pub fn open(registry: &Rc<LayerRegistry>, identifier: &str) -> Result<Self, DocumentError> {
        let root = registry
            .find_or_open(identifier)
            .ok_or_else(|| DocumentError::LayerNotFound(identifier.to_string()))?;
        let session = registry.create_anonymous("session");
        Ok(Document {
            root,
            session,
            registry: registry.clone(),
        })
    }

    pub fn root_layer(&self) -> &LayerHandle {
        &self.root
    }

    pub fn session_layer(&self) -> &LayerHandle {
        &self.session
    }

    pub fn registry(&self) -> &Rc<LayerRegistry> {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_document_has_two_roots() {
        let registry = LayerRegistry::new();
        let doc = Document::in_memory(&registry);
        assert!(doc.root_layer().is_anonymous());
        assert!(doc.session_layer().is_anonymous());
        assert_ne!(doc.root_layer().identifier(), doc.session_layer().identifier());
    }

    #[test]
    fn test_open_missing_layer_fails() {
        let registry = LayerRegistry::new();
        assert!(matches!(
            Document::open(&registry, "/missing.sdoc"),
            Err(DocumentError::LayerNotFound(_))
        ));
    }

    #[test]
    fn test_open_existing_layer() {
        let registry = LayerRegistry::new();
        let layer = registry.create("/scenes/a.sdoc").unwrap();
        let doc = Document::open(&registry, "/scenes/a.sdoc").unwrap();
        assert!(Rc::ptr_eq(doc.root_layer(), &layer));
    }
}
