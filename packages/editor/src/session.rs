//! # Editor Session
//!
//! Wires the whole editing core around one document: the layer-tree mirror,
//! the delegate registry and holder, the undo router and the command layer.
//! Each session owns its own routers; there are no process-wide singletons, and
//! everything that needs shared nesting state receives an `Rc` handle from
//! here.

use crate::bridge::UndoStackBridge;
use crate::delegates::{DelegateRegistry, DelegatesHolder};
use crate::layer_tree::LayerTree;
use crate::undo::{EditBlock, EditCapture, UndoRouter, UndoStateDelegate, UNDO_DELEGATE};
use std::rc::Rc;
use stratum_commands::{CommandInterface, UndoCommandBlock, UndoStack};
use stratum_document::Document;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Whether an interactive front-end is present; headless sessions track
    /// and intercept but push nothing onto the undo stack.
    pub interactive: bool,
    pub undo_limit: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            interactive: true,
            undo_limit: 100,
        }
    }
}

pub struct EditorSession {
    document: Document,
    layer_tree: Rc<LayerTree>,
    delegate_registry: Rc<DelegateRegistry>,
    delegates: Rc<DelegatesHolder>,
    undo_router: Rc<UndoRouter>,
    command_interface: Rc<CommandInterface>,
    undo_stack: Rc<UndoStack>,
    bridge: Option<UndoStackBridge>,
}

impl EditorSession {
    pub fn new(document: Document) -> Self {
        Self::with_config(document, SessionConfig::default())
    }

    pub fn with_config(document: Document, config: SessionConfig) -> Self {
        let layer_tree = LayerTree::new(&document);
        let undo_router = UndoRouter::new();
        let delegate_registry = DelegateRegistry::new();
        UndoStateDelegate::register(&delegate_registry, &undo_router);

        let delegates = DelegatesHolder::new(layer_tree.clone(), delegate_registry.clone());
        delegates.add_delegate(UNDO_DELEGATE);

        let command_interface = CommandInterface::new();
        let undo_stack = UndoStack::attach_with_limit(&command_interface, config.undo_limit);
        let bridge = config
            .interactive
            .then(|| UndoStackBridge::new(&undo_router, &command_interface, &delegates));

        EditorSession {
            document,
            layer_tree,
            delegate_registry,
            delegates,
            undo_router,
            command_interface,
            undo_stack,
            bridge,
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn layer_tree(&self) -> &Rc<LayerTree> {
        &self.layer_tree
    }

    pub fn delegate_registry(&self) -> &Rc<DelegateRegistry> {
        &self.delegate_registry
    }

    pub fn delegates(&self) -> &Rc<DelegatesHolder> {
        &self.delegates
    }

    pub fn undo_router(&self) -> &Rc<UndoRouter> {
        &self.undo_router
    }

    pub fn command_interface(&self) -> &Rc<CommandInterface> {
        &self.command_interface
    }

    pub fn undo_stack(&self) -> &Rc<UndoStack> {
        &self.undo_stack
    }

    pub fn is_interactive(&self) -> bool {
        self.bridge.is_some()
    }

    /// Open an auto-committing transactional scope over document edits.
    pub fn edit_block(&self) -> EditBlock {
        EditBlock::new(self.undo_router.clone())
    }

    /// Open a capturing transactional scope; retrieve its edits with
    /// [`EditCapture::take_edits`].
    pub fn edit_capture(&self) -> EditCapture {
        EditCapture::new(self.undo_router.clone())
    }

    /// Open a command-grouping scope named `name`.
    pub fn command_block(&self, name: &str) -> UndoCommandBlock {
        UndoCommandBlock::named(self.command_interface.clone(), name)
    }

    /// Undo the most recent undo-stack entry. Running this while a
    /// transactional block is recording is a caller bug and is diagnosed by
    /// the router.
    pub fn undo(&self) -> bool {
        self.undo_stack.undo()
    }

    pub fn redo(&self) -> bool {
        self.undo_stack.redo()
    }

    /// Suppress inverse generation for bulk or internal edits that should
    /// not be undoable. Depth-counted; pair with [`unmute_undo`](Self::unmute_undo).
    pub fn mute_undo(&self) {
        self.undo_router.mute();
    }

    pub fn unmute_undo(&self) {
        self.undo_router.unmute();
    }
}

impl std::fmt::Debug for EditorSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorSession")
            .field("layers", &self.layer_tree.len())
            .field("interactive", &self.is_interactive())
            .finish()
    }
}
