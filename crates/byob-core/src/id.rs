//! Stable ID newtypes for project entities.
//!
//! All IDs are distinct newtype wrappers over `u32`, so a `DefinitionId`
//! cannot be passed where a `ReceiverId` is expected.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a custom block definition within a project.
///
/// Definitions are compared by identity, not by spec: two definitions may
/// share a spec (a "double") and still be distinct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DefinitionId(pub u32);

/// Identity of a receiver (the stage or a sprite) that owns scripts and
/// sprite-local definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReceiverId(pub u32);

impl ReceiverId {
    /// The stage is always receiver 0.
    pub const STAGE: ReceiverId = ReceiverId(0);
}

// Display implementations -- just print the inner value.

impl fmt::Display for DefinitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ReceiverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn definition_id_display() {
        assert_eq!(format!("{}", DefinitionId(7)), "7");
    }

    #[test]
    fn receiver_id_display() {
        assert_eq!(format!("{}", ReceiverId(3)), "3");
        assert_eq!(ReceiverId::STAGE, ReceiverId(0));
    }

    #[test]
    fn serde_roundtrip() {
        let def = DefinitionId(42);
        let json = serde_json::to_string(&def).unwrap();
        assert_eq!(json, "42");
        let back: DefinitionId = serde_json::from_str(&json).unwrap();
        assert_eq!(def, back);
    }
}
