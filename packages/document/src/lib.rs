//! # Stratum Document
//!
//! The mutable, hierarchically-composed layer store.
//!
//! A [`Layer`] is a mutable hierarchical document identified by a stable
//! identifier string. Layers reference other layers as sublayers, forming the
//! composition tree that the editor mirrors and edits. Every primitive write
//! against a layer routes through an optional [`StateDelegate`] hook *before*
//! the data changes, which is what makes undo recording and dirty tracking
//! possible without the store knowing anything about either.
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ document: layers + specs + fields           │
//! │  - primitive mutation vocabulary            │
//! │  - state-delegate hook per layer            │
//! │  - registry with change notices             │
//! └─────────────────────────────────────────────┘
//!                     ↓ observes
//! ┌─────────────────────────────────────────────┐
//! │ editor: tree mirror + interceptors + undo   │
//! └─────────────────────────────────────────────┘
//! ```

mod data;
mod delegate;
mod document;
mod errors;
mod layer;
mod path;
mod registry;
mod value;

pub use data::{LayerData, Spec, FIELD_SUBLAYERS};
pub use delegate::StateDelegate;
pub use document::Document;
pub use errors::DocumentError;
pub use layer::{Layer, LayerHandle, WeakLayerHandle};
pub use path::{SpecPath, SpecType};
pub use registry::{LayerNotice, LayerOpener, LayerRegistry, SublayerChange};
pub use value::{TimeCode, Value};
