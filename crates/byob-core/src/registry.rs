//! The primitive block registry.
//!
//! Built-in operations are listed by selector together with the shape of
//! their slots. A global custom block that overloads a built-in
//! ("bootstrapping") is recorded here as the selector's delegate; whether a
//! definition is bootstrapped is always derived from this table, never
//! stored on the definition.

use indexmap::IndexMap;

use crate::choices::{self, Choice};
use crate::definition::{BlockDefinition, BlockType};
use crate::id::DefinitionId;
use crate::slot::{InputSlotDecl, SlotType};

/// Where a primitive slot's dropdown comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SlotMenu {
    #[default]
    None,
    /// A built-in menu provider.
    Special(String),
    /// Fixed choices.
    Static(Vec<Choice>),
}

/// The shape of one slot of a primitive block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotShape {
    /// Slot spec as it appears in the primitive's spec (`%n`, `%dir`, ...).
    pub spec: String,
    pub menu: SlotMenu,
    pub read_only: bool,
    pub is_static: bool,
    /// Variadic settings; unset for single slots.
    pub infix: Option<String>,
    pub collapse: Option<String>,
    pub expand: Option<String>,
    pub initial_slots: u32,
    pub min_slots: u32,
    pub max_slots: u32,
}

impl SlotShape {
    pub fn new(spec: impl Into<String>) -> Self {
        SlotShape {
            spec: spec.into(),
            ..Default::default()
        }
    }
}

/// A built-in block.
#[derive(Debug, Clone, PartialEq)]
pub struct PrimitiveBlock {
    pub selector: String,
    /// Semantic spec (`move %n steps`).
    pub spec: String,
    pub kind: BlockType,
    pub category: String,
    /// Default contents per input, positionally.
    pub defaults: Vec<String>,
    /// Slot shapes per input, positionally. Inputs without an entry are
    /// plain slots of the spec's type.
    pub slots: Vec<SlotShape>,
    /// Selectors this block can be relabelled to, each with the input shift
    /// to apply: new input `i` takes old input `i + shift`.
    pub alternatives: Vec<(String, isize)>,
    /// The bootstrapped definition this block delegates to.
    pub definition: Option<DefinitionId>,
}

impl PrimitiveBlock {
    fn with_kind(selector: &str, spec: &str, kind: BlockType) -> Self {
        PrimitiveBlock {
            selector: selector.to_string(),
            spec: spec.to_string(),
            kind,
            category: "other".to_string(),
            defaults: Vec::new(),
            slots: Vec::new(),
            alternatives: Vec::new(),
            definition: None,
        }
    }

    pub fn command(selector: &str, spec: &str) -> Self {
        PrimitiveBlock::with_kind(selector, spec, BlockType::Command)
    }

    pub fn reporter(selector: &str, spec: &str) -> Self {
        PrimitiveBlock::with_kind(selector, spec, BlockType::Reporter)
    }

    pub fn predicate(selector: &str, spec: &str) -> Self {
        PrimitiveBlock::with_kind(selector, spec, BlockType::Predicate)
    }

    pub fn in_category(mut self, category: &str) -> Self {
        self.category = category.to_string();
        self
    }

    pub fn with_defaults(mut self, defaults: &[&str]) -> Self {
        self.defaults = defaults.iter().map(|d| d.to_string()).collect();
        self
    }

    pub fn with_slots(mut self, slots: Vec<SlotShape>) -> Self {
        self.slots = slots;
        self
    }

    pub fn with_alternatives(mut self, alternatives: &[(&str, isize)]) -> Self {
        self.alternatives = alternatives
            .iter()
            .map(|(selector, shift)| (selector.to_string(), *shift))
            .collect();
        self
    }

    /// Slot shape of the input at `idx`, falling back to the spec's tag.
    pub fn slot_shape(&self, idx: usize) -> SlotShape {
        self.slots.get(idx).cloned().unwrap_or_else(|| {
            let tag = crate::spec::split_block_spec(&self.spec)
                .into_iter()
                .filter(|t| crate::spec::is_input_token(t))
                .nth(idx)
                .unwrap_or(SlotType::ANY)
                .to_string();
            SlotShape::new(tag)
        })
    }
}

/// Selector-keyed table of built-in blocks and their delegates.
#[derive(Debug, Clone, Default)]
pub struct PrimitiveRegistry {
    blocks: IndexMap<String, PrimitiveBlock>,
}

impl PrimitiveRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lists a built-in block, replacing any previous entry.
    pub fn insert(&mut self, block: PrimitiveBlock) {
        self.blocks.insert(block.selector.clone(), block);
    }

    pub fn get(&self, selector: &str) -> Option<&PrimitiveBlock> {
        self.blocks.get(selector)
    }

    pub fn contains(&self, selector: &str) -> bool {
        self.blocks.contains_key(selector)
    }

    pub fn selectors(&self) -> impl Iterator<Item = &str> {
        self.blocks.keys().map(String::as_str)
    }

    pub fn blocks(&self) -> impl Iterator<Item = &PrimitiveBlock> {
        self.blocks.values()
    }

    /// Makes `definition` the delegate of `selector`. Returns `false` if the
    /// selector is not listed.
    pub fn register(&mut self, selector: &str, definition: DefinitionId) -> bool {
        match self.blocks.get_mut(selector) {
            Some(block) => {
                block.definition = Some(definition);
                true
            }
            None => false,
        }
    }

    /// Removes the delegate of `selector`, returning it.
    pub fn unregister(&mut self, selector: &str) -> Option<DefinitionId> {
        self.blocks.get_mut(selector)?.definition.take()
    }

    /// Whether `definition` is the delegate of `selector`.
    pub fn is_registered(&self, selector: &str, definition: DefinitionId) -> bool {
        self.delegate(selector) == Some(definition)
    }

    pub fn delegate(&self, selector: &str) -> Option<DefinitionId> {
        self.blocks.get(selector)?.definition
    }

    /// All bootstrapped definitions.
    pub fn delegates(&self) -> Vec<DefinitionId> {
        self.blocks.values().filter_map(|b| b.definition).collect()
    }
}

// ---------------------------------------------------------------------------
// Migrating primitive slots to declarations
// ---------------------------------------------------------------------------

/// Canonical declaration tag for a primitive slot spec.
fn canonical_slot_type(spec: &str) -> &str {
    match spec {
        "%rc" => "%cmdRing",
        "%rr" => "%repRing",
        "%rp" => "%predRing",
        other => other,
    }
}

impl BlockDefinition {
    /// The declaration that gives a custom input the look and feel of a
    /// primitive slot: its type, menu, read-only and static flags, and its
    /// variadic settings. The default is left empty; callers fill it from
    /// the primitive's defaults.
    pub fn declaration_for(shape: &SlotShape) -> InputSlotDecl {
        let options = match &shape.menu {
            SlotMenu::None => String::new(),
            SlotMenu::Special(name) => format!("{}{name}", choices::SPECIAL_PREFIX),
            SlotMenu::Static(items) => choices::encode_choices(items),
        };
        let is_text_slot = matches!(
            SlotType::new(shape.spec.clone()).kind(),
            crate::slot::SlotKind::Text { .. }
        );
        InputSlotDecl {
            slot_type: SlotType::new(canonical_slot_type(&shape.spec)),
            default: String::new(),
            options,
            read_only: if is_text_slot { shape.read_only } else { true },
            irreplaceable: shape.is_static,
            separator: shape.infix.clone(),
            collapse: shape.collapse.clone(),
            expand: shape.expand.clone(),
            initial_slots: shape.initial_slots,
            min_slots: shape.min_slots,
            max_slots: shape.max_slots,
        }
    }
}
