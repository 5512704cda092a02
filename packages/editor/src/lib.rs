//! # Stratum Editor
//!
//! Core editing engine: the incrementally-maintained mirror of the layer
//! composition tree, the per-layer mutation interceptor fan-out, and the
//! transactional undo machinery that turns primitive document mutations into
//! atomic, invertible command records.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ document store: layers + primitive writes   │
//! └─────────────────────────────────────────────┘
//!                     ↓ observes
//! ┌─────────────────────────────────────────────┐
//! │ editor:                                     │
//! │  - LayerTree mirrors the composition graph  │
//! │  - DelegateProxy fans mutations out to      │
//! │    named state delegates per layer          │
//! │  - UndoStateDelegate records inverse edits  │
//! │    into the UndoRouter's transaction log    │
//! │  - UndoStackBridge wraps drained logs into  │
//! │    undo commands                            │
//! └─────────────────────────────────────────────┘
//!                     ↓ finalizes through
//! ┌─────────────────────────────────────────────┐
//! │ commands: interface + grouping + undo stack │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Everything here is single-threaded and synchronous: mutation callbacks,
//! block open/close and log draining all run on the thread performing the
//! edit. Nesting, not concurrency, is the hazard: reentrant edits issued
//! from inside a callback fold into the same outer transaction through the
//! shared depth counter.

mod bridge;
mod delegates;
mod layer_tree;
mod session;
pub mod undo;

pub use bridge::{LayerEditCommand, UndoStackBridge};
pub use delegates::{DelegateProxy, DelegateRegistry, DelegatesHolder};
pub use layer_tree::{LayerNode, LayerTree, SublayerEvent};
pub use session::{EditorSession, SessionConfig};
pub use undo::{Edit, EditBlock, EditCapture, InverseLog, UndoRouter, UndoStateDelegate, UNDO_DELEGATE};

// Re-export the document vocabulary consumers need alongside the editor.
pub use stratum_document::{Document, LayerRegistry, SublayerChange};
