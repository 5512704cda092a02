//! Transactional undo: inverse-edit log, router and scoped blocks.

mod inverse;
mod router;
mod state_delegate;

pub use inverse::{Edit, InverseLog};
pub use router::{CommittedLog, EditBlock, EditCapture, UndoRouter};
pub use state_delegate::{UndoStateDelegate, UNDO_DELEGATE};
