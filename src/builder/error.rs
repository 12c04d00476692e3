//! Errors raised while building a machine.

use crate::definition::DefinitionError;
use thiserror::Error;

/// Errors that can occur when building a machine from a definition.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error("initial state \"{state}\" is not a defined state, try one of [{known}]")]
    UnknownInitialState { state: String, known: String },
}
