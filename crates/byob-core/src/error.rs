//! Core error types for byob-core.
//!
//! Uses `thiserror` for structured, matchable error variants. The first two
//! variants are contract violations: they signal a caller bug and must be
//! propagated, never absorbed.

use crate::id::{DefinitionId, ReceiverId};
use thiserror::Error;

/// Core errors produced by the byob-core crate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// The number of `_` placeholders in an abstract spec does not match the
    /// definition's declared inputs.
    #[error("expecting the number of inputs to match: {placeholders} placeholder(s) for {inputs} input(s)")]
    InputCountMismatch { placeholders: usize, inputs: usize },

    /// Dependencies of a sprite-local definition were requested without the
    /// receiver that owns it.
    #[error("cannot collect dependencies for local custom block '{spec}' of an unspecified sprite")]
    MissingReceiver { spec: String },

    /// A definition ID was not found.
    #[error("definition not found: DefinitionId({id})", id = id.0)]
    DefinitionNotFound { id: DefinitionId },

    /// A receiver ID was not found.
    #[error("receiver not found: ReceiverId({id})", id = id.0)]
    ReceiverNotFound { id: ReceiverId },

    /// A fragment index was out of range for the prototype being edited.
    #[error("fragment index {index} out of range ({len} fragment(s))")]
    FragmentOutOfRange { index: usize, len: usize },
}
