//! Error types for the document store

use crate::path::SpecPath;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DocumentError {
    #[error("Spec not found: {0}")]
    SpecNotFound(SpecPath),

    #[error("Spec already exists: {0}")]
    SpecExists(SpecPath),

    #[error("Parent spec not found: {0}")]
    ParentNotFound(SpecPath),

    #[error("Layer not found: {0}")]
    LayerNotFound(String),

    #[error("Layer already exists: {0}")]
    LayerExists(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Field {1:?} on {0} is not a dictionary")]
    NotADict(SpecPath, String),

    #[error("Sublayer already present: {0}")]
    SublayerExists(String),
}

impl From<DocumentError> for stratum_common::CommonError {
    fn from(err: DocumentError) -> Self {
        stratum_common::CommonError::Document(err.to_string())
    }
}
