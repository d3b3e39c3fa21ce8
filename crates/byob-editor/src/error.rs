//! Editor error types.
//!
//! [`EditorError`] is the unified error type of the project service. Core
//! contract violations and storage failures convert into it with `?`.

use byob_core::error::CoreError;
use byob_core::id::{DefinitionId, ReceiverId};
use byob_storage::StorageError;

/// Errors produced by project and editor operations.
#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    /// A data model contract was violated.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Reading or writing a library bundle failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// No definition with this id exists in the project.
    #[error("definition not found: {0}")]
    DefinitionNotFound(DefinitionId),

    /// No receiver with this id exists in the project.
    #[error("receiver not found: {0}")]
    ReceiverNotFound(ReceiverId),

    /// The registry does not list this selector.
    #[error("unknown primitive: {0}")]
    UnknownPrimitive(String),

    /// An export, import or removal was accepted with nothing selected.
    #[error("no blocks were selected")]
    NothingSelected,

    /// A script element index was out of range.
    #[error("no script at index {index} ({len} script(s))")]
    ScriptNotFound { index: usize, len: usize },

    /// The block at a script position is not a custom block.
    #[error("not a custom block: {0}")]
    NotACustomBlock(String),
}
