//! Deterministic content hashing for definition records using blake3.
//!
//! Hashes are derived state: a bundle stores the hash of its definitions
//! and recomputes it on load to detect tampering or truncation.
//!
//! All hashing is deterministic: records contain only `Vec`/`IndexMap`
//! collections, so `serde_json::to_vec` yields the same bytes for the same
//! content.

use crate::convert::DefinitionRecord;
use crate::error::StorageError;

/// Hash of a single record's content, tag included.
pub fn hash_record(record: &DefinitionRecord) -> Result<blake3::Hash, StorageError> {
    let bytes = serde_json::to_vec(record)?;
    Ok(blake3::hash(&bytes))
}

/// Hash over an ordered list of records, composed from the per-record
/// hashes. Reordering the records changes the hash.
pub fn hash_records(records: &[DefinitionRecord]) -> Result<blake3::Hash, StorageError> {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&(records.len() as u64).to_le_bytes());
    for record in records {
        hasher.update(hash_record(record)?.as_bytes());
    }
    Ok(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::decompose;
    use byob_core::definition::BlockDefinition;
    use byob_core::id::DefinitionId;

    fn record(id: u32, spec: &str) -> DefinitionRecord {
        decompose(&BlockDefinition::new(DefinitionId(id), spec))
    }

    #[test]
    fn test_hash_is_deterministic() {
        let a = record(1, "jump");
        assert_eq!(hash_record(&a).unwrap(), hash_record(&a.clone()).unwrap());
    }

    #[test]
    fn test_hash_changes_with_content() {
        let a = record(1, "jump");
        let mut b = a.clone();
        b.category = "motion".into();
        assert_ne!(hash_record(&a).unwrap(), hash_record(&b).unwrap());
    }

    #[test]
    fn test_hash_records_depends_on_order() {
        let a = record(1, "jump");
        let b = record(2, "duck");
        let ab = hash_records(&[a.clone(), b.clone()]).unwrap();
        let ba = hash_records(&[b, a]).unwrap();
        assert_ne!(ab, ba);
        assert_ne!(hash_records(&[]).unwrap(), ab);
    }
}
