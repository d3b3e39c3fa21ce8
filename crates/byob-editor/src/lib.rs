//! The project service for custom block definitions.
//!
//! Owns receivers (the stage and its sprites), the global and sprite-local
//! definition tables and the primitive registry. Provides the block editor
//! surface with its commit and close protocols, definition lifecycle
//! operations, and the export, import, removal and visibility workflows.
//! The palette UI and the script scheduler are reached through the traits
//! in [`host`].

pub mod editor;
pub mod error;
pub mod host;
pub mod library;
pub mod lifecycle;
pub mod project;
pub mod settings;

// Re-export commonly used types
pub use editor::{BlockEditor, CloseOutcome};
pub use error::EditorError;
pub use host::{PaletteHost, ProcessHandle, QueueScheduler, RecordingHost, Scheduler};
pub use library::{ExportPicker, ImportPicker, PaletteBlock, RemovalPicker, VisibilityPicker};
pub use lifecycle::Alternative;
pub use project::{CallNode, Project, Receiver};
pub use settings::ProjectSettings;
