//! Input slot types and per-input declarations.
//!
//! A [`SlotType`] is the type tag of an input (`%s`, `%n`, `%b`, `%upvar`,
//! `%mult%s`, ...). Libraries and extensions add their own tags, so the
//! set is open: a string newtype with classification helpers rather than a
//! closed enum. [`InputSlotDecl`] is the 11-field declaration a
//! definition keeps for each named input.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Prefix marking a variadic input type (`%mult%n`).
pub const MULT_PREFIX: &str = "%mult";

/// Prefix marking a grouped variadic input type.
pub const GROUP_PREFIX: &str = "%group";

/// Variadic tags whose separator/collapse/expand settings are fixed by the
/// system and never taken from a declaration.
pub const SYSTEM_VARIADICS: [&str; 4] = ["%scriptVars", "%receive", "%send", "%elseif"];

const COMMAND_SLOTS: [&str; 4] = ["%cs", "%ca", "%loop", "%c"];
const RING_SLOTS: [&str; 5] = ["%cmdRing", "%repRing", "%predRing", "%anyUE", "%boolUE"];

/// The type tag of an input slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotType(String);

/// How an input slot is shaped, derived from its type tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotKind {
    /// Editable text/number slot.
    Text { numeric: bool },
    /// Boolean (hexagonal) slot.
    Boolean,
    /// Upvar: declares a variable name visible to the caller's script.
    Upvar,
    /// C-shaped slot holding a nested command stack.
    CommandSlot,
    /// Ring slot holding an unevaluated script.
    Ring,
    /// Variadic slot whose elements have the given single-slot spec.
    Variadic { element: String },
}

impl SlotType {
    /// The generic "any" type, used for undeclared inputs.
    pub const ANY: &'static str = "%s";
    /// Upvar type tag.
    pub const UPVAR: &'static str = "%upvar";

    pub fn new(tag: impl Into<String>) -> Self {
        SlotType(tag.into())
    }

    /// The generic "any" type.
    pub fn any() -> Self {
        SlotType(Self::ANY.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for `%mult...` and `%group...` types.
    pub fn is_multiple(&self) -> bool {
        self.0.contains(MULT_PREFIX) || self.0.contains(GROUP_PREFIX)
    }

    pub fn is_upvar(&self) -> bool {
        self.0 == Self::UPVAR
    }

    /// The element type of a `%mult` type, or the type itself.
    pub fn single_type(&self) -> &str {
        self.0.strip_prefix(MULT_PREFIX).unwrap_or(&self.0)
    }

    /// Classifies the slot shape this tag produces in a block instance.
    pub fn kind(&self) -> SlotKind {
        let tag = self.0.as_str();
        if self.is_multiple() {
            return SlotKind::Variadic {
                element: self.single_type().to_string(),
            };
        }
        if SYSTEM_VARIADICS.contains(&tag) {
            return SlotKind::Variadic {
                element: tag.to_string(),
            };
        }
        match tag {
            "%b" => SlotKind::Boolean,
            Self::UPVAR => SlotKind::Upvar,
            _ if COMMAND_SLOTS.contains(&tag) => SlotKind::CommandSlot,
            _ if RING_SLOTS.contains(&tag) => SlotKind::Ring,
            _ => SlotKind::Text {
                numeric: tag == "%n",
            },
        }
    }
}

impl Default for SlotType {
    fn default() -> Self {
        SlotType::any()
    }
}

impl fmt::Display for SlotType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SlotType {
    fn from(tag: &str) -> Self {
        SlotType::new(tag)
    }
}

/// Declaration of a single named input of a custom block.
///
/// Field order matches the positional 11-slot tuple used by the serializer:
/// type, default, options, read-only, irreplaceable, separator, collapse,
/// expand, initial slots, min slots, max slots. The last six only apply to
/// variadic inputs; `0` slot counts mean "unset".
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InputSlotDecl {
    pub slot_type: SlotType,
    /// Default contents. A single-line value prefixed `$_` is a translatable
    /// selector; variadic defaults are newline-separated per sub-slot.
    pub default: String,
    /// Encoded dropdown menu (see [`crate::choices`]). Empty means none.
    pub options: String,
    pub read_only: bool,
    pub irreplaceable: bool,
    pub separator: Option<String>,
    pub collapse: Option<String>,
    pub expand: Option<String>,
    pub initial_slots: u32,
    pub min_slots: u32,
    pub max_slots: u32,
}

impl InputSlotDecl {
    /// A declaration of the given type with all other fields unset.
    pub fn of_type(slot_type: impl Into<SlotType>) -> Self {
        InputSlotDecl {
            slot_type: slot_type.into(),
            ..Default::default()
        }
    }

    /// Builder-style default value.
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = default.into();
        self
    }

    /// Builder-style encoded options.
    pub fn with_options(mut self, options: impl Into<String>) -> Self {
        self.options = options.into();
        self
    }
}
