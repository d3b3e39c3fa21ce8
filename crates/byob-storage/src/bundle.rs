//! Library bundles: a selected set of definitions plus two variable
//! snapshots, written as one JSON document.
//!
//! A bundle is the unit of export and import. It carries the definitions as
//! [`DefinitionRecord`]s, the global (stage) and local (sprite) variables
//! they read, and a blake3 checksum over the records.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use byob_core::definition::BlockDefinition;
use byob_core::id::{DefinitionId, ReceiverId};
use byob_core::variables::VariableFrame;

use crate::convert::{decompose, recompose, remap_calls, DefinitionRecord};
use crate::error::StorageError;
use crate::hash::hash_records;

/// Format marker written into every bundle.
pub const BUNDLE_FORMAT: &str = "byob-blocks/1";

/// An exportable set of definitions with their variable closure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryBundle {
    pub format: String,
    pub name: String,
    pub definitions: Vec<DefinitionRecord>,
    /// Stage-level variables read by the definitions.
    #[serde(default)]
    pub global_variables: VariableFrame,
    /// Sprite-level variables read by the definitions.
    #[serde(default)]
    pub local_variables: VariableFrame,
    /// Hex blake3 hash of `definitions`.
    pub checksum: String,
}

impl LibraryBundle {
    /// Bundles `definitions` together with the two variable snapshots.
    pub fn new<'a>(
        name: impl Into<String>,
        definitions: impl IntoIterator<Item = &'a BlockDefinition>,
        global_variables: VariableFrame,
        local_variables: VariableFrame,
    ) -> Result<Self, StorageError> {
        let definitions: Vec<DefinitionRecord> = definitions.into_iter().map(decompose).collect();
        let checksum = hash_records(&definitions)?.to_hex().to_string();
        Ok(LibraryBundle {
            format: BUNDLE_FORMAT.to_string(),
            name: name.into(),
            definitions,
            global_variables,
            local_variables,
            checksum,
        })
    }

    /// Checks the stored checksum against the records.
    pub fn verify(&self) -> Result<(), StorageError> {
        let found = hash_records(&self.definitions)?.to_hex().to_string();
        if found != self.checksum {
            return Err(StorageError::ChecksumMismatch {
                expected: self.checksum.clone(),
                found,
            });
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, StorageError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses and verifies a bundle.
    pub fn from_json(json: &str) -> Result<Self, StorageError> {
        let bundle: LibraryBundle = serde_json::from_str(json)?;
        bundle.verify()?;
        Ok(bundle)
    }

    pub fn write_to(&self, path: &Path) -> Result<(), StorageError> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn read_from(path: &Path) -> Result<Self, StorageError> {
        let json = fs::read_to_string(path)?;
        LibraryBundle::from_json(&json)
    }

    /// Spec strings of the bundled definitions, in order.
    pub fn specs(&self) -> Vec<&str> {
        self.definitions.iter().map(|r| r.spec.as_str()).collect()
    }

    /// Rebuilds the definitions under project ids drawn from `next_id`.
    /// Calls between bundled definitions follow their new ids; local
    /// definitions are owned by `receiver`.
    pub fn into_definitions(
        self,
        mut next_id: impl FnMut() -> DefinitionId,
        receiver: Option<ReceiverId>,
    ) -> Result<Vec<BlockDefinition>, StorageError> {
        let ids: HashMap<u32, DefinitionId> = self
            .definitions
            .iter()
            .map(|record| (record.tag, next_id()))
            .collect();
        self.definitions
            .into_iter()
            .map(|mut record| {
                remap_calls(&mut record, &ids);
                let id = ids[&record.tag];
                let owner = if record.is_global { None } else { receiver };
                recompose(record, id, owner)
            })
            .collect()
    }
}
