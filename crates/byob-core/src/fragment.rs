//! Label fragments and block prototypes.
//!
//! While a definition is being edited, its label is a list of
//! [`LabelFragment`]s: one per word or input. The fragments carry scratch
//! copies of the input declarations and are folded back into the definition
//! only when the edit is committed. A [`PrototypeBlock`] owns that list and
//! the block shape being edited; changing the shape builds a new prototype
//! value that carries the fragments over.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::choices;
use crate::definition::{BlockDefinition, BlockType, HatSemantics};
use crate::error::CoreError;
use crate::slot::{InputSlotDecl, SlotType, MULT_PREFIX};
use crate::spec;

/// One word or input of a block label being edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelFragment {
    /// The word, or the input name.
    pub label: String,
    /// `None` for a plain word, otherwise the input's type tag.
    pub slot_type: Option<SlotType>,
    pub default_value: String,
    /// Encoded dropdown menu.
    pub options: String,
    pub read_only: bool,
    pub irreplaceable: bool,
    pub separator: Option<String>,
    pub collapse: Option<String>,
    pub expand: Option<String>,
    pub initial_slots: u32,
    /// `0` means no minimum.
    pub min_slots: u32,
    /// `0` means no maximum.
    pub max_slots: u32,
    /// Skipped when the spec is rebuilt; dropped on the next refresh.
    pub is_deleted: bool,
}

impl LabelFragment {
    /// A new input fragment of type `%s`.
    pub fn input(label: impl Into<String>) -> Self {
        LabelFragment {
            label: label.into(),
            slot_type: Some(SlotType::any()),
            default_value: String::new(),
            options: String::new(),
            read_only: false,
            irreplaceable: false,
            separator: None,
            collapse: None,
            expand: None,
            initial_slots: 1,
            min_slots: 0,
            max_slots: 0,
            is_deleted: false,
        }
    }

    /// A plain word.
    pub fn word(label: impl Into<String>) -> Self {
        LabelFragment {
            slot_type: None,
            ..LabelFragment::input(label)
        }
    }

    /// An input fragment seeded from a declaration.
    pub fn from_declaration(name: &str, decl: &InputSlotDecl) -> Self {
        LabelFragment {
            label: name.to_string(),
            slot_type: Some(decl.slot_type.clone()),
            default_value: decl.default.clone(),
            options: decl.options.clone(),
            read_only: decl.read_only,
            irreplaceable: decl.irreplaceable,
            separator: decl.separator.clone(),
            collapse: decl.collapse.clone(),
            expand: decl.expand.clone(),
            initial_slots: decl.initial_slots,
            min_slots: decl.min_slots,
            max_slots: decl.max_slots,
            is_deleted: false,
        }
    }

    /// The declaration this fragment stands for. `None` for words.
    pub fn to_declaration(&self) -> Option<InputSlotDecl> {
        Some(InputSlotDecl {
            slot_type: self.slot_type.clone()?,
            default: self.default_value.clone(),
            options: self.options.clone(),
            read_only: self.read_only,
            irreplaceable: self.irreplaceable,
            separator: self.separator.clone(),
            collapse: self.collapse.clone(),
            expand: self.expand.clone(),
            initial_slots: self.initial_slots,
            min_slots: self.min_slots,
            max_slots: self.max_slots,
        })
    }

    pub fn is_input(&self) -> bool {
        self.slot_type.is_some()
    }

    /// This fragment's token in a definition spec; empty when deleted.
    pub fn def_spec_fragment(&self) -> String {
        if self.is_deleted {
            return String::new();
        }
        match self.slot_type {
            Some(_) => spec::input_token(&self.label),
            None => spec::join_spec(&[self.label.as_str()]),
        }
    }

    /// The label shown on the prototype in the editor: the input name with
    /// an indicator of its type, arity or default.
    pub fn def_template_spec_fragment(&self) -> String {
        let Some(slot_type) = &self.slot_type else {
            return self.def_spec_fragment();
        };
        let tag = slot_type.as_str();
        let default = &self.default_value;
        let suffix = if slot_type.is_upvar() {
            if default.is_empty() {
                " \u{2191}".to_string()
            } else {
                format!(" \u{2191} = {default}")
            }
        } else if tag == "%scriptVars" {
            " \u{2191}...".to_string()
        } else if slot_type.is_multiple() || ["%receive", "%send", "%elseif"].contains(&tag) {
            "...".to_string()
        } else if ["%cs", "%ca", "%loop"].contains(&tag)
            || ["%cmdRing", "%repRing", "%predRing", "%anyUE", "%boolUE"].contains(&tag)
        {
            " \u{03bb}".to_string()
        } else if tag == "%b" {
            " ?".to_string()
        } else if tag == "%l" {
            " \u{fe19}".to_string()
        } else if !default.is_empty() {
            match tag {
                "%n" => format!(" # = {default}"),
                "%mlt" | "%code" => format!(" \u{00b6} = {default}"),
                _ => format!(" = {default}"),
            }
        } else {
            match tag {
                "%n" => " #".to_string(),
                "%mlt" | "%code" => " \u{00b6}".to_string(),
                _ => String::new(),
            }
        };
        format!("{}{suffix}", self.label)
    }

    /// This fragment's token in a semantic spec; empty when deleted.
    pub fn block_spec_fragment(&self) -> String {
        if self.is_deleted {
            return String::new();
        }
        match &self.slot_type {
            Some(t) => t.as_str().to_string(),
            None => self.label.clone(),
        }
    }

    /// Has a static or computed menu (not a special provider).
    pub fn has_options(&self) -> bool {
        !self.options.is_empty() && !self.has_special_menu()
    }

    /// Names a built-in menu provider.
    pub fn has_special_menu(&self) -> bool {
        choices::special_menu_name(&self.options)
            .is_some_and(|name| !name.starts_with(choices::EXTENSION_PREFIX))
    }

    /// Names an extension-provided menu.
    pub fn has_extension_menu(&self) -> bool {
        choices::special_menu_name(&self.options)
            .is_some_and(|name| name.starts_with(choices::EXTENSION_PREFIX))
    }

    pub fn is_multiple_input(&self) -> bool {
        self.slot_type.as_ref().is_some_and(SlotType::is_multiple)
    }

    pub fn is_upvar(&self) -> bool {
        self.slot_type.as_ref().is_some_and(SlotType::is_upvar)
    }

    pub fn is_single_input(&self) -> bool {
        !self.is_multiple_input() && !self.is_upvar()
    }

    /// The element type, without any `%mult` prefix.
    pub fn single_input_type(&self) -> Option<&str> {
        self.slot_type.as_ref().map(SlotType::single_type)
    }

    /// Turns a variadic or upvar input into a single input. No-op on words.
    pub fn set_to_single_input(&mut self) {
        let Some(slot_type) = &self.slot_type else { return };
        let single = if slot_type.is_upvar() {
            SlotType::ANY
        } else {
            slot_type.single_type()
        };
        self.slot_type = Some(SlotType::new(single));
    }

    /// Turns the input into a variadic one of its current element type.
    /// Upvars become `%mult%s`; C-slot variants become `%mult%cs`.
    pub fn set_to_multiple_input(&mut self) {
        let Some(slot_type) = &self.slot_type else { return };
        let element = match slot_type.single_type() {
            SlotType::UPVAR => SlotType::ANY,
            "%ca" | "%loop" => "%cs",
            other => other,
        };
        self.slot_type = Some(SlotType::new(format!("{MULT_PREFIX}{element}")));
    }

    /// Turns the input into an upvar. No-op on words.
    pub fn set_to_upvar(&mut self) {
        if self.slot_type.is_some() {
            self.slot_type = Some(SlotType::new(SlotType::UPVAR));
        }
    }

    /// Sets the element type, keeping a variadic input variadic. On a word
    /// this turns it into an input.
    pub fn set_single_input_type(&mut self, tag: &str) {
        self.slot_type = Some(if self.is_multiple_input() {
            SlotType::new(format!("{MULT_PREFIX}{tag}"))
        } else {
            SlotType::new(tag)
        });
    }
}

// ---------------------------------------------------------------------------
// PrototypeBlock
// ---------------------------------------------------------------------------

/// The editable stand-in for a definition's header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrototypeBlock {
    pub kind: BlockType,
    pub category: String,
    pub semantics: Option<HatSemantics>,
    fragments: Vec<LabelFragment>,
}

impl BlockDefinition {
    /// A prototype whose fragments carry this definition's declarations.
    pub fn prototype_instance(&self) -> PrototypeBlock {
        let fragments = spec::parse_spec(self.spec())
            .into_iter()
            .map(|token| match spec::input_name(&token) {
                Some(name) => match self.declarations().get(name) {
                    Some(decl) => LabelFragment::from_declaration(name, decl),
                    None => LabelFragment::input(name),
                },
                None => LabelFragment::word(token),
            })
            .collect();
        PrototypeBlock {
            kind: self.kind,
            category: self.category.clone(),
            semantics: self.semantics,
            fragments,
        }
    }
}

impl PrototypeBlock {
    pub fn new(kind: BlockType, category: impl Into<String>, fragments: Vec<LabelFragment>) -> Self {
        PrototypeBlock {
            kind,
            category: category.into(),
            semantics: None,
            fragments,
        }
    }

    pub fn fragments(&self) -> &[LabelFragment] {
        &self.fragments
    }

    fn live(&self) -> impl Iterator<Item = &LabelFragment> {
        self.fragments.iter().filter(|f| !f.is_deleted)
    }

    /// The definition spec the current fragments spell.
    pub fn spec_from_fragments(&self) -> String {
        self.live()
            .map(LabelFragment::def_spec_fragment)
            .collect::<Vec<_>>()
            .join(" ")
            .trim()
            .to_string()
    }

    /// The semantic spec the current fragments spell.
    pub fn block_spec_from_fragments(&self) -> String {
        self.live()
            .map(LabelFragment::block_spec_fragment)
            .collect::<Vec<_>>()
            .join(" ")
            .trim()
            .to_string()
    }

    /// Declarations of the live input fragments, in label order.
    pub fn declarations_from_fragments(&self) -> IndexMap<String, InputSlotDecl> {
        self.live()
            .filter_map(|f| f.to_declaration().map(|d| (f.label.clone(), d)))
            .collect()
    }

    pub fn input_fragment_names(&self) -> Vec<String> {
        self.live()
            .filter(|f| f.is_input())
            .map(|f| f.label.clone())
            .collect()
    }

    pub fn upvar_fragment_names(&self) -> Vec<String> {
        self.live()
            .filter(|f| f.is_upvar())
            .map(|f| f.label.clone())
            .collect()
    }

    /// Re-derives the fragment list: deleted fragments are dropped and
    /// multi-word words are split into one fragment per word. A label may
    /// not become empty; if nothing would remain, the previous fragments
    /// stay.
    pub fn refreshed(self) -> PrototypeBlock {
        let mut fragments = Vec::new();
        for fragment in self.fragments.iter().filter(|f| !f.is_deleted) {
            if fragment.is_input() {
                fragments.push(fragment.clone());
                continue;
            }
            for word in spec::parse_spec(&fragment.label) {
                if word.is_empty() {
                    continue;
                }
                fragments.push(LabelFragment {
                    label: word,
                    ..fragment.clone()
                });
            }
        }
        if fragments.is_empty() {
            let mut kept = self.fragments;
            kept.iter_mut().for_each(|f| f.is_deleted = false);
            return PrototypeBlock { fragments: kept, ..self };
        }
        PrototypeBlock { fragments, ..self }
    }

    /// The prototype for another block shape, carrying the fragments.
    pub fn rebuilt_as(self, kind: BlockType, category: impl Into<String>) -> PrototypeBlock {
        let semantics = match kind {
            BlockType::Hat => self.semantics,
            _ => None,
        };
        PrototypeBlock {
            kind,
            category: category.into(),
            semantics,
            fragments: self.fragments,
        }
        .refreshed()
    }

    /// Replaces the fragment at `idx` with an edited copy and refreshes.
    pub fn replace_fragment(self, idx: usize, fragment: LabelFragment) -> Result<PrototypeBlock, CoreError> {
        let len = self.fragments.len();
        if idx >= len {
            return Err(CoreError::FragmentOutOfRange { index: idx, len });
        }
        let mut proto = self;
        proto.fragments[idx] = fragment;
        Ok(proto.refreshed())
    }

    /// Inserts a fragment before position `idx` (`idx == len` appends).
    pub fn insert_fragment(self, idx: usize, fragment: LabelFragment) -> Result<PrototypeBlock, CoreError> {
        let len = self.fragments.len();
        if idx > len {
            return Err(CoreError::FragmentOutOfRange { index: idx, len });
        }
        let mut proto = self;
        proto.fragments.insert(idx, fragment);
        Ok(proto.refreshed())
    }

    /// Marks the fragment at `idx` as deleted and refreshes.
    pub fn delete_fragment(self, idx: usize) -> Result<PrototypeBlock, CoreError> {
        let len = self.fragments.len();
        let mut proto = self;
        match proto.fragments.get_mut(idx) {
            Some(fragment) => fragment.is_deleted = true,
            None => return Err(CoreError::FragmentOutOfRange { index: idx, len }),
        }
        Ok(proto.refreshed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::DefinitionId;

    fn move_steps() -> BlockDefinition {
        let mut decls = IndexMap::new();
        decls.insert("steps".to_string(), InputSlotDecl::of_type("%n").with_default("10"));
        BlockDefinition::with_header(DefinitionId(1), "move %steps steps", decls)
    }

    #[test]
    fn prototype_carries_declarations() {
        let proto = move_steps().prototype_instance();
        assert_eq!(proto.fragments().len(), 3);
        assert_eq!(proto.spec_from_fragments(), "move %steps steps");
        assert_eq!(proto.block_spec_from_fragments(), "move %n steps");
        assert_eq!(proto.input_fragment_names(), vec!["steps"]);
        assert_eq!(proto.declarations_from_fragments(), move_steps().declarations().clone());
    }

    #[test]
    fn template_spec_fragments_indicate_types() {
        let mut frag = LabelFragment::input("steps");
        frag.slot_type = Some(SlotType::new("%n"));
        assert_eq!(frag.def_template_spec_fragment(), "steps #");
        frag.default_value = "10".into();
        assert_eq!(frag.def_template_spec_fragment(), "steps # = 10");
        frag.set_to_upvar();
        assert_eq!(frag.def_template_spec_fragment(), "steps \u{2191} = 10");
        frag.set_to_multiple_input();
        assert_eq!(frag.slot_type.as_ref().unwrap().as_str(), "%mult%s");
        assert_eq!(frag.def_template_spec_fragment(), "steps...");
        frag.set_single_input_type("%b");
        assert_eq!(frag.slot_type.as_ref().unwrap().as_str(), "%mult%b");
        frag.set_to_single_input();
        assert_eq!(frag.def_template_spec_fragment(), "steps ?");
        assert_eq!(LabelFragment::word("move").def_template_spec_fragment(), "move");
    }

    #[test]
    fn c_slot_variants_become_command_lists() {
        let mut frag = LabelFragment::input("action");
        frag.slot_type = Some(SlotType::new("%loop"));
        frag.set_to_multiple_input();
        assert_eq!(frag.slot_type.unwrap().as_str(), "%mult%cs");
    }

    #[test]
    fn retyping_keeps_other_metadata() {
        let mut frag = LabelFragment::input("x");
        frag.default_value = "5".into();
        frag.options = "a\nb".into();
        frag.set_to_multiple_input();
        frag.set_to_single_input();
        assert_eq!(frag.default_value, "5");
        assert_eq!(frag.options, "a\nb");
        assert!(frag.has_options());
    }

    #[test]
    fn special_and_extension_menus() {
        let mut frag = LabelFragment::input("x");
        frag.options = "§_keysMenu".into();
        assert!(frag.has_special_menu());
        assert!(!frag.has_options());
        frag.options = "§_ext_colors".into();
        assert!(frag.has_extension_menu());
        assert!(!frag.has_special_menu());
    }

    #[test]
    fn refresh_splits_words_and_drops_deleted() {
        let proto = move_steps().prototype_instance();
        let proto = proto.replace_fragment(0, LabelFragment::word("walk 'far away'")).unwrap();
        assert_eq!(proto.spec_from_fragments(), "walk 'far away' %steps steps");
        let proto = proto.delete_fragment(1).unwrap();
        assert_eq!(proto.spec_from_fragments(), "walk %steps steps");
        assert_eq!(proto.fragments().len(), 3);
    }

    #[test]
    fn last_fragment_cannot_be_deleted() {
        let def = BlockDefinition::new(DefinitionId(1), "foo");
        let proto = def.prototype_instance().delete_fragment(0).unwrap();
        assert_eq!(proto.spec_from_fragments(), "foo");
    }

    #[test]
    fn insert_and_rebuild_keep_fragments() {
        let proto = move_steps()
            .prototype_instance()
            .insert_fragment(3, LabelFragment::input("speed"))
            .unwrap();
        assert_eq!(proto.spec_from_fragments(), "move %steps steps %speed");
        let rebuilt = proto.rebuilt_as(BlockType::Reporter, "motion");
        assert_eq!(rebuilt.kind, BlockType::Reporter);
        assert_eq!(rebuilt.input_fragment_names(), vec!["steps", "speed"]);
        assert!(matches!(
            rebuilt.delete_fragment(9),
            Err(CoreError::FragmentOutOfRange { index: 9, len: 4 })
        ));
    }
}
