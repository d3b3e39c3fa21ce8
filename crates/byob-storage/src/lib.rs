//! Serialization of custom block definitions.
//!
//! Produces and consumes the field set of a definition and bundles selected
//! definitions for export. Where bundles are kept is the caller's concern.
//!
//! # Modules
//!
//! - [`error`]: StorageError enum with all failure modes
//! - [`convert`]: BlockDefinition decompose/recompose and declaration tuples
//! - [`hash`]: blake3 content hashes of records
//! - [`bundle`]: LibraryBundle, the export/import unit

pub mod bundle;
pub mod convert;
pub mod error;
pub mod hash;

// Re-export key types for ergonomic use.
pub use bundle::{LibraryBundle, BUNDLE_FORMAT};
pub use convert::{decompose, recompose, remap_calls, DeclarationTuple, DefinitionRecord};
pub use error::StorageError;
pub use hash::{hash_record, hash_records};
