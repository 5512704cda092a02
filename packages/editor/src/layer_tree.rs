//! # Layer Tree
//!
//! Incrementally-maintained mirror of the layer composition graph. The tree
//! is seeded from a document's two roots, walks declared sublayer references
//! transitively, and then follows registry notices so sublayer edits and
//! identifier changes anywhere in the session keep the mirror current.
//!
//! A layer may be referenced by more than one parent (shared sublayer); a
//! node survives until its last parent link is removed, at which point
//! removal cascades into children whose only parent it was.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;
use stratum_common::{EventDispatcher, ListenerHandle};
use stratum_document::{Document, LayerHandle, LayerNotice, LayerRegistry, SublayerChange};

/// Per-layer bookkeeping record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayerNode {
    pub sublayers: BTreeSet<String>,
    pub parents: BTreeSet<String>,
}

/// Structural-change event: `child` gained or lost the link from `parent`.
#[derive(Debug, Clone)]
pub struct SublayerEvent {
    pub child: String,
    pub parent: String,
    pub change: SublayerChange,
}

/// Mirror of the composition graph, keyed by resolved layer identifier.
pub struct LayerTree {
    layers: RefCell<BTreeMap<String, LayerNode>>,
    registry: Rc<LayerRegistry>,
    dispatcher: EventDispatcher<SublayerEvent>,
    notice_subscription: Cell<Option<ListenerHandle>>,
}

impl LayerTree {
    /// Build the mirror from a document's root and session layers, then
    /// follow registry notices for incremental maintenance.
    pub fn new(document: &Document) -> Rc<Self> {
        let tree = Rc::new(LayerTree {
            layers: RefCell::new(BTreeMap::new()),
            registry: document.registry().clone(),
            dispatcher: EventDispatcher::new(),
            notice_subscription: Cell::new(None),
        });
        tree.add_sublayer(document.root_layer(), "");
        tree.add_sublayer(document.session_layer(), "");

        let weak = Rc::downgrade(&tree);
        let subscription = tree.registry.notices().subscribe(move |notice: &LayerNotice| {
            if let Some(tree) = weak.upgrade() {
                tree.on_layer_notice(notice);
            }
        });
        tree.notice_subscription.set(Some(subscription));
        tree
    }

    pub fn registry(&self) -> &Rc<LayerRegistry> {
        &self.registry
    }

    /// Subscribe to the structural-change feed. Callbacks fire synchronously
    /// inside add/remove.
    pub fn subscribe(&self, callback: impl Fn(&SublayerEvent) + 'static) -> ListenerHandle {
        self.dispatcher.subscribe(callback)
    }

    pub fn unsubscribe(&self, handle: ListenerHandle) -> bool {
        self.dispatcher.unsubscribe(handle)
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.layers.borrow().contains_key(identifier)
    }

    pub fn len(&self) -> usize {
        self.layers.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.borrow().is_empty()
    }

    /// Sublayer identifiers of a tracked layer.
    pub fn child_layers(&self, identifier: &str) -> BTreeSet<String> {
        self.layers
            .borrow()
            .get(identifier)
            .map(|node| node.sublayers.clone())
            .unwrap_or_default()
    }

    /// Bookkeeping record of a tracked layer.
    pub fn node(&self, identifier: &str) -> Option<LayerNode> {
        self.layers.borrow().get(identifier).cloned()
    }

    /// One resolved layer handle per tracked node, using an arbitrary
    /// surviving parent as the resolution anchor.
    pub fn get_all_layers(&self) -> Vec<LayerHandle> {
        let entries: Vec<(String, String)> = self
            .layers
            .borrow()
            .iter()
            .map(|(id, node)| {
                let anchor = node.parents.iter().next().cloned().unwrap_or_default();
                (id.clone(), anchor)
            })
            .collect();
        entries
            .into_iter()
            .filter_map(|(identifier, anchor)| {
                let resolved = LayerRegistry::resolve_identifier(&identifier, &anchor);
                let layer = self.registry.find_or_open(&resolved);
                if layer.is_none() {
                    tracing::warn!(
                        %identifier,
                        "failed to find layer; layer tree might be corrupted"
                    );
                }
                layer
            })
            .collect()
    }

    /// Idempotent registration of `layer` under `parent`. A "added" event is
    /// always dispatched, even when the parent link already existed (the
    /// child is re-confirmed to listeners). New layers register their own
    /// declared sublayers recursively.
    pub fn add_sublayer(&self, layer: &LayerHandle, parent: &str) {
        let child = layer.identifier();
        self.dispatcher.emit(&SublayerEvent {
            child: child.clone(),
            parent: parent.to_string(),
            change: SublayerChange::Added,
        });

        {
            let mut layers = self.layers.borrow_mut();
            if let Some(parent_node) = layers.get_mut(parent) {
                parent_node.sublayers.insert(child.clone());
            }
            if let Some(node) = layers.get_mut(&child) {
                node.parents.insert(parent.to_string());
                return;
            }
            let mut node = LayerNode::default();
            node.parents.insert(parent.to_string());
            layers.insert(child.clone(), node);
        }

        for declared in layer.sublayer_paths() {
            let resolved = LayerRegistry::resolve_identifier(&declared, &child);
            match self.registry.find_or_open(&resolved) {
                Some(sublayer) => self.add_sublayer(&sublayer, &child),
                None => tracing::warn!(
                    identifier = %declared,
                    anchor = %child,
                    "failed to find or open declared sublayer; link skipped"
                ),
            }
        }
    }

    /// Detach the `parent` link of `identifier`, dispatching a "removed"
    /// event unconditionally. When the node's parent set empties, removal
    /// cascades into children whose sole parent it was, and the node is
    /// erased.
    pub fn remove_sublayer(&self, identifier: &str, parent: &str) {
        if let Some(parent_node) = self.layers.borrow_mut().get_mut(parent) {
            parent_node.sublayers.remove(identifier);
        }

        self.dispatcher.emit(&SublayerEvent {
            child: identifier.to_string(),
            parent: parent.to_string(),
            change: SublayerChange::Removed,
        });

        let orphaned_children = {
            let mut layers = self.layers.borrow_mut();
            let Some(node) = layers.get_mut(identifier) else {
                return;
            };
            node.parents.remove(parent);
            if !node.parents.is_empty() {
                return;
            }
            node.sublayers.clone()
        };

        for child in orphaned_children {
            let sole_parent = self
                .layers
                .borrow()
                .get(&child)
                .map(|node| node.parents.len() == 1)
                .unwrap_or(false);
            if sole_parent {
                self.remove_sublayer(&child, identifier);
            }
        }

        self.layers.borrow_mut().remove(identifier);
    }

    /// Re-key a node after its layer's identifier changed, rewriting every
    /// parent's and child's cross-reference; self-references survive.
    pub fn rename_layer(&self, old_identifier: &str, new_identifier: &str) {
        let mut layers = self.layers.borrow_mut();
        let Some(mut node) = layers.remove(old_identifier) else {
            return;
        };

        for parent in &node.parents {
            if let Some(parent_node) = layers.get_mut(parent) {
                parent_node.sublayers.remove(old_identifier);
                parent_node.sublayers.insert(new_identifier.to_string());
            }
        }
        for child in &node.sublayers {
            if let Some(child_node) = layers.get_mut(child) {
                child_node.parents.remove(old_identifier);
                child_node.parents.insert(new_identifier.to_string());
            }
        }
        if node.parents.remove(old_identifier) {
            node.parents.insert(new_identifier.to_string());
        }
        if node.sublayers.remove(old_identifier) {
            node.sublayers.insert(new_identifier.to_string());
        }
        layers.insert(new_identifier.to_string(), node);
    }

    fn on_layer_notice(&self, notice: &LayerNotice) {
        match notice {
            LayerNotice::SublayersChanged {
                layer: parent,
                sublayer,
                change,
            } => {
                let resolved = LayerRegistry::resolve_identifier(sublayer, parent);
                match change {
                    SublayerChange::Added => match self.registry.find_or_open(&resolved) {
                        Some(layer) => self.add_sublayer(&layer, parent),
                        None => tracing::error!(
                            identifier = %sublayer,
                            anchor = %parent,
                            "failed to find layer for added sublayer"
                        ),
                    },
                    SublayerChange::Removed => self.remove_sublayer(&resolved, parent),
                }
            }
            LayerNotice::IdentifierChanged {
                old_identifier,
                new_identifier,
            } => self.rename_layer(old_identifier, new_identifier),
        }
    }
}

impl Drop for LayerTree {
    fn drop(&mut self) {
        if let Some(handle) = self.notice_subscription.take() {
            self.registry.notices().unsubscribe(handle);
        }
    }
}

impl std::fmt::Debug for LayerTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayerTree").field("layers", &self.len()).finish()
    }
}
