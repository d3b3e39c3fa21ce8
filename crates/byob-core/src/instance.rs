//! Custom block instances and their refresh algorithm.
//!
//! One [`CustomBlock`] type covers command, reporter, predicate and hat
//! instances; the shape is the `kind` tag. An instance keeps only its slot
//! contents (on the enclosing [`Block`]) and a little bookkeeping. Whenever
//! its definition changes, [`Block::refresh`] re-derives label and slots.
//!
//! When the label changed, the old slots are snapshotted, new slots are
//! built from the new spec, and old contents are put back where the shapes
//! match. Blocks that fit nowhere are returned to the caller, which moves
//! them into the surrounding scripting area instead of dropping them.

use serde::{Deserialize, Serialize};

use crate::definition::{BlockDefinition, BlockType};
use crate::id::DefinitionId;
use crate::script::{Block, BlockKind, Input, LiteralSlot, MultiSlot};
use crate::slot::{SlotKind, SlotType, SYSTEM_VARIADICS};
use crate::spec::{self, BREAK_TAG};
use crate::variables::{VarValue, VariableFrame};

/// Bookkeeping of a custom block occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomBlock {
    /// The bound definition. Local non-prototype instances drop it after a
    /// refresh and are resolved by `semantic_spec` through their receiver.
    pub definition: Option<DefinitionId>,
    pub is_global: bool,
    /// The editing stand-in shown in a block editor.
    pub is_prototype: bool,
    /// A palette copy.
    pub is_template: bool,
    pub kind: BlockType,
    /// The definition's semantic spec as of the last refresh.
    pub semantic_spec: String,
    /// The rendered label as of the last refresh.
    pub label: String,
    pub category: String,
    /// The primitive the definition delegates to, if any.
    pub primitive: Option<String>,
    /// Block variables.
    pub variables: VariableFrame,
}

impl CustomBlock {
    /// Bookkeeping for a new instance of `def`. Slots are built by the
    /// first refresh.
    pub fn for_definition(def: &BlockDefinition) -> Self {
        let mut variables = VariableFrame::new();
        for name in &def.variable_names {
            variables.add_var(name.clone());
        }
        CustomBlock {
            definition: Some(def.id),
            is_global: def.is_global,
            is_prototype: false,
            is_template: false,
            kind: def.kind,
            semantic_spec: def.block_spec(),
            label: String::new(),
            category: def.category.clone(),
            primitive: def.primitive().map(str::to_string),
            variables,
        }
    }
}

impl BlockDefinition {
    /// A fresh instance with empty slots, rendered in `language`.
    pub fn block_instance(&self, language: &str) -> Block {
        let mut block = Block::custom(CustomBlock::for_definition(self));
        block.refresh(self, language, None);
        block
    }

    /// A palette copy with default values filled in.
    pub fn template_instance(&self, language: &str) -> Block {
        let mut block = self.block_instance(language);
        block.refresh_defaults(self);
        if let Some(custom) = block.as_custom_mut() {
            custom.is_template = true;
        }
        block
    }
}

// ---------------------------------------------------------------------------
// Slot construction
// ---------------------------------------------------------------------------

/// Input tokens of a rendered label, line breaks excluded.
fn label_inputs(label: &str) -> Vec<&str> {
    spec::split_block_spec(label)
        .into_iter()
        .filter(|token| spec::is_input_token(token) && *token != BREAK_TAG)
        .collect()
}

/// An empty slot for a type tag, without any declaration applied.
fn element_slot(tag: &str) -> Input {
    match SlotType::new(tag).kind() {
        SlotKind::Text { numeric } => Input::Literal(LiteralSlot {
            numeric,
            ..Default::default()
        }),
        SlotKind::Boolean => Input::Boolean(None),
        SlotKind::Upvar => Input::Template(String::new()),
        SlotKind::CommandSlot => Input::Commands(None),
        SlotKind::Ring => Input::Ring(None),
        SlotKind::Variadic { element } => Input::Multi(MultiSlot {
            element_spec: element,
            ..Default::default()
        }),
    }
}

/// An empty slot for input `idx` of `def`, with its declared settings.
fn declared_slot(tag: &str, def: &BlockDefinition, idx: usize) -> Input {
    let mut slot = element_slot(tag);
    match &mut slot {
        Input::Literal(literal) => {
            literal.read_only = def.is_read_only_input_idx(idx);
            literal.is_static = def.is_irreplaceable_input_idx(idx);
            literal.options = def.input_options_of_idx(idx);
        }
        Input::Multi(multi) => multi.is_static = def.is_irreplaceable_input_idx(idx),
        _ => {}
    }
    slot
}

/// Applies declaration settings that do not depend on the label: upvar
/// names and variadic settings.
fn apply_declared_settings(inputs: &mut [Input], def: &BlockDefinition) {
    let names = def.input_names();
    for (idx, input) in inputs.iter_mut().enumerate() {
        match input {
            Input::Template(name) if name.is_empty() => {
                if let Some(input_name) = names.get(idx) {
                    *name = input_name.clone();
                }
            }
            Input::Multi(multi) => {
                multi.is_static = def.is_irreplaceable_input_idx(idx);
                if SYSTEM_VARIADICS.contains(&multi.element_spec.as_str()) {
                    continue;
                }
                multi.infix = def.separator_of_input_idx(idx);
                multi.collapse = def.collapse_of_input_idx(idx);
                multi.expand = def.expand_of_input_idx(idx);
                multi.default_value = def.default_value_of_input_idx(idx).text().to_string();
                multi.initial_slots = def.initial_slots_of_input_idx(idx);
                multi.min_slots = def.min_slots_of_input_idx(idx);
                multi.max_slots = def.max_slots_of_input_idx(idx);
            }
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Restoring old contents
// ---------------------------------------------------------------------------

/// Puts `old` into `slot` if the shapes match; otherwise hands it back.
fn transfer(slot: &mut Input, old: Input) -> Option<Input> {
    match old {
        Input::Reporter(_) | Input::Ring(_) => {
            if matches!(slot, Input::Template(_)) {
                return Some(old);
            }
            *slot = old;
            None
        }
        Input::Literal(old_literal) => match slot {
            Input::Literal(literal) => {
                literal.contents = old_literal.contents;
                None
            }
            _ => Some(Input::Literal(old_literal)),
        },
        Input::Boolean(value) => match slot {
            Input::Boolean(target) => {
                *target = value;
                None
            }
            _ => Some(Input::Boolean(value)),
        },
        Input::Template(name) => match slot {
            Input::Template(target) => {
                *target = name;
                None
            }
            _ => Some(Input::Template(name)),
        },
        Input::Commands(body) => match slot {
            Input::Commands(target) => {
                *target = body;
                None
            }
            _ => Some(Input::Commands(body)),
        },
        Input::Multi(old_multi) => match slot {
            Input::Multi(multi) if multi.element_spec == old_multi.element_spec => {
                multi.items = old_multi.items;
                None
            }
            _ => Some(Input::Multi(old_multi)),
        },
    }
}

/// Collects the blocks held by an input that could not be placed.
fn preserve(input: Input, displaced: &mut Vec<Block>) {
    match input {
        Input::Multi(multi) => {
            for item in multi.items {
                preserve(item, displaced);
            }
        }
        Input::Reporter(block) => displaced.push(*block),
        Input::Commands(Some(block)) | Input::Ring(Some(block)) => displaced.push(*block),
        _ => {}
    }
}

/// Restores `old` into `inputs`.
///
/// Without an offset, old input `i` goes to new slot `i`. With an offset
/// (relabelling to a related block), new slot `i` takes old input
/// `i + offset`. In both modes only same-shape contents are placed; the
/// blocks of everything else are returned.
fn restore_inputs(inputs: &mut [Input], old: Vec<Input>, offset: Option<isize>) -> Vec<Block> {
    let mut displaced = Vec::new();
    let mut old: Vec<Option<Input>> = old.into_iter().map(Some).collect();
    let shift = offset.unwrap_or(0);

    for (i, slot) in inputs.iter_mut().enumerate() {
        let Some(j) = i.checked_add_signed(shift) else { continue };
        let Some(previous) = old.get_mut(j).and_then(Option::take) else { continue };
        if let Some(unplaced) = transfer(slot, previous) {
            preserve(unplaced, &mut displaced);
        }
    }
    for leftover in old.into_iter().flatten() {
        preserve(leftover, &mut displaced);
    }
    displaced
}

// ---------------------------------------------------------------------------
// Refresh
// ---------------------------------------------------------------------------

impl Block {
    /// Re-synchronizes a custom block instance with `def`.
    ///
    /// If the semantic spec is unchanged only the label and slot settings
    /// are updated in place, so switching languages keeps every slot.
    /// Otherwise slots are rebuilt from the new label and old contents
    /// restored (see `offset` on relabelling). Returns the blocks
    /// that could not be restored; the caller relocates them. Non-custom
    /// blocks are left alone.
    pub fn refresh(&mut self, def: &BlockDefinition, language: &str, offset: Option<isize>) -> Vec<Block> {
        let BlockKind::Custom(custom) = &mut self.kind else {
            return Vec::new();
        };
        let inputs = &mut self.inputs;

        let new_label = if custom.is_prototype {
            def.spec().to_string()
        } else {
            def.localized_spec(language)
        };
        let new_spec = def.block_spec();
        let respec = if custom.is_prototype {
            custom.label != new_label
        } else {
            custom.label.is_empty() || custom.semantic_spec != new_spec
        };
        custom.semantic_spec = new_spec;
        custom.definition = if custom.is_global || custom.is_prototype {
            Some(def.id)
        } else {
            None
        };
        custom.is_global = def.is_global;
        custom.category = def.category.clone();
        custom.primitive = def.primitive().map(str::to_string);
        if !custom.kind.is_major_change_to(def.kind) {
            custom.kind = def.kind;
        }

        let mut displaced = Vec::new();
        if respec {
            let old = std::mem::take(inputs);
            *inputs = label_inputs(&new_label)
                .into_iter()
                .enumerate()
                .map(|(idx, tag)| declared_slot(tag, def, idx))
                .collect();
            custom.label = new_label;
            apply_declared_settings(inputs, def);
            if !custom.is_prototype {
                if offset.is_some() {
                    fill_defaults(inputs, def);
                }
                displaced = restore_inputs(inputs, old, offset);
            }
        } else {
            custom.label = new_label;
            for (idx, input) in inputs.iter_mut().enumerate() {
                if let Input::Literal(literal) = input {
                    literal.is_static = def.is_irreplaceable_input_idx(idx);
                    literal.options = def.input_options_of_idx(idx);
                }
            }
            apply_declared_settings(inputs, def);
        }

        custom.variables.reinit(&def.variable_names);
        displaced
    }

    /// Fills editable slots with the defaults declared in `def`. Variadic
    /// slots are reset to their initial number of sub-slots, each with its
    /// positional default. Prototypes are left alone.
    pub fn refresh_defaults(&mut self, def: &BlockDefinition) {
        if self.as_custom().is_some_and(|c| c.is_prototype) {
            return;
        }
        fill_defaults(&mut self.inputs, def);
    }

    /// The slot of the input called `name`, matched case-insensitively.
    pub fn input_slot_named(&self, def: &BlockDefinition, name: &str) -> Option<&Input> {
        let wanted = name.to_lowercase();
        let idx = def
            .input_names()
            .iter()
            .position(|n| n.to_lowercase() == wanted)?;
        self.inputs.get(idx)
    }

    /// The literal values of the inputs bound by name, for handing to
    /// helper scripts. Slots holding unevaluated blocks bind as empty.
    pub fn input_values(&self, names: &[String]) -> VariableFrame {
        let mut frame = VariableFrame::new();
        for (name, input) in names.iter().zip(&self.inputs) {
            let value = match input {
                Input::Literal(literal) if literal.numeric => literal
                    .contents
                    .parse()
                    .map(VarValue::Number)
                    .unwrap_or_else(|_| VarValue::Text(literal.contents.clone())),
                Input::Literal(literal) => VarValue::Text(literal.contents.clone()),
                Input::Boolean(Some(b)) => VarValue::Bool(*b),
                Input::Template(name) => VarValue::Text(name.clone()),
                _ => VarValue::Empty,
            };
            frame.set_var(name.clone(), value);
        }
        frame
    }
}

// ---------------------------------------------------------------------------
// Relabelling
// ---------------------------------------------------------------------------

impl Block {
    /// Turns this instance into an instance of `def`, a related block.
    /// New slots start with their defaults; new slot `i` then takes old
    /// input `i + shift` where the shapes match. Returns displaced blocks.
    pub fn relabel_to(&mut self, def: &BlockDefinition, language: &str, shift: isize) -> Vec<Block> {
        match self.as_custom_mut() {
            Some(custom) => {
                custom.definition = Some(def.id);
                custom.is_global = def.is_global;
                custom.kind = def.kind;
                custom.label.clear();
            }
            None => {
                let inputs = std::mem::take(&mut self.inputs);
                *self = Block::custom(CustomBlock::for_definition(def));
                self.inputs = inputs;
            }
        }
        self.refresh(def, language, Some(shift))
    }

    /// Turns this block into a call of the primitive `selector` with the
    /// given semantic spec. Slots are restored as in [`Block::relabel_to`].
    pub fn relabel_to_primitive(&mut self, selector: &str, spec: &str, kind: BlockType, shift: isize) -> Vec<Block> {
        let old = std::mem::take(&mut self.inputs);
        let mut inputs: Vec<Input> = label_inputs(spec).into_iter().map(element_slot).collect();
        let displaced = restore_inputs(&mut inputs, old, Some(shift));
        let mut relabelled = if kind.is_reporter() {
            Block::reporter(selector)
        } else {
            Block::command(selector)
        };
        relabelled.inputs = inputs;
        relabelled.next = self.next.take();
        *self = relabelled;
        displaced
    }
}

fn fill_defaults(inputs: &mut [Input], def: &BlockDefinition) {
    for (idx, input) in inputs.iter_mut().enumerate() {
        let default = def.default_value_of_input_idx(idx);
        let text = default.text();
        match input {
            Input::Literal(literal) => literal.contents = text.to_string(),
            Input::Boolean(value) => {
                *value = match text {
                    "true" => Some(true),
                    "false" => Some(false),
                    _ => None,
                }
            }
            Input::Template(name) => {
                if !text.is_empty() {
                    *name = text.to_string();
                }
            }
            Input::Multi(multi) => {
                let defaults: Vec<&str> = multi.default_value.split('\n').collect();
                multi.items = (0..multi.initial_slots as usize)
                    .map(|i| {
                        let mut slot = element_slot(&multi.element_spec);
                        if let Input::Literal(literal) = &mut slot {
                            literal.contents = defaults.get(i).copied().unwrap_or("").to_string();
                        }
                        slot
                    })
                    .collect();
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slot::InputSlotDecl;
    use indexmap::IndexMap;

    fn def_with(spec: &str, decls: &[(&str, InputSlotDecl)]) -> BlockDefinition {
        let decls: IndexMap<_, _> = decls
            .iter()
            .map(|(name, decl)| (name.to_string(), decl.clone()))
            .collect();
        let mut def = BlockDefinition::with_header(DefinitionId(1), spec, decls);
        def.is_global = true;
        def
    }

    fn move_steps() -> BlockDefinition {
        def_with("move %steps steps", &[("steps", InputSlotDecl::of_type("%n").with_default("10"))])
    }

    #[test]
    fn block_instance_builds_slots_from_the_spec() {
        let block = move_steps().block_instance("en");
        let custom = block.as_custom().unwrap();
        assert_eq!(custom.label, "move %n steps");
        assert_eq!(block.inputs.len(), 1);
        assert!(matches!(&block.inputs[0], Input::Literal(l) if l.numeric && l.contents.is_empty()));
    }

    #[test]
    fn template_instance_fills_defaults() {
        let block = move_steps().template_instance("en");
        assert_eq!(block.inputs[0].literal(), Some("10"));
        assert!(block.as_custom().unwrap().is_template);
    }

    #[test]
    fn unchanged_label_keeps_contents_and_updates_settings() {
        let mut def = move_steps();
        let mut block = def.block_instance("en");
        block.inputs[0] = Input::number("42");
        def.declaration_mut("steps").unwrap().options = "1\n2".into();
        let displaced = block.refresh(&def, "en", None);
        assert!(displaced.is_empty());
        let Input::Literal(literal) = &block.inputs[0] else { panic!("literal expected") };
        assert_eq!(literal.contents, "42");
        assert_eq!(literal.options, "1\n2");
    }

    #[test]
    fn changed_label_restores_matching_shapes() {
        let mut def = move_steps();
        let mut block = def.block_instance("en");
        block.inputs[0] = Input::number("42");
        def.set_block_label("walk _ paces").unwrap();
        block.refresh(&def, "en", None);
        assert_eq!(block.as_custom().unwrap().label, "walk %n paces");
        assert_eq!(block.inputs[0].literal(), Some("42"));
    }

    #[test]
    fn unmatched_reporters_are_displaced() {
        let mut def = move_steps();
        let mut block = def.block_instance("en");
        block.inputs[0] = Input::reporter(Block::variable("x"));
        def.declaration_mut("steps").unwrap().slot_type = SlotType::new("%upvar");
        let displaced = block.refresh(&def, "en", None);
        assert_eq!(displaced, vec![Block::variable("x")]);
        assert_eq!(block.inputs[0], Input::Template("steps".into()));
    }

    #[test]
    fn removed_inputs_displace_their_blocks() {
        let mut def = def_with(
            "f %a %b",
            &[("a", InputSlotDecl::of_type("%s")), ("b", InputSlotDecl::of_type("%cs"))],
        );
        let mut block = def.block_instance("en");
        block.inputs[1] = Input::Commands(Some(Box::new(Block::command("bubble"))));
        def.remove_inputs(1);
        let displaced = block.refresh(&def, "en", None);
        assert_eq!(block.inputs.len(), 1);
        assert_eq!(displaced, vec![Block::command("bubble")]);
    }

    #[test]
    fn variadic_contents_survive_when_element_spec_matches() {
        let decl = InputSlotDecl {
            separator: Some(",".into()),
            ..InputSlotDecl::of_type("%mult%n")
        };
        let mut def = def_with("sum %xs", &[("xs", decl)]);
        let mut block = def.block_instance("en");
        let Input::Multi(multi) = &mut block.inputs[0] else { panic!("multi expected") };
        assert_eq!(multi.infix.as_deref(), Some(","));
        multi.items = vec![Input::number("1"), Input::number("2")];
        def.set_block_label("total _").unwrap();
        block.refresh(&def, "en", None);
        let Input::Multi(multi) = &block.inputs[0] else { panic!("multi expected") };
        assert_eq!(multi.items.len(), 2);
    }

    #[test]
    fn offset_relabel_shifts_and_validates_shapes() {
        let two = def_with(
            "f %a %b",
            &[("a", InputSlotDecl::of_type("%n")), ("b", InputSlotDecl::of_type("%b"))],
        );
        let mut one = def_with("g %x", &[("x", InputSlotDecl::of_type("%b").with_default("true"))]);
        one.id = DefinitionId(2);
        let mut block = two.block_instance("en");
        block.inputs[0] = Input::reporter(Block::variable("v"));
        block.inputs[1] = Input::Boolean(Some(false));
        let displaced = block.refresh(&one, "en", Some(1));
        assert_eq!(block.inputs, vec![Input::Boolean(Some(false))]);
        assert_eq!(displaced, vec![Block::variable("v")]);
    }

    #[test]
    fn local_instances_drop_their_definition() {
        let mut def = move_steps();
        def.is_global = false;
        let block = def.block_instance("en");
        assert_eq!(block.as_custom().unwrap().definition, None);
        assert_eq!(block.as_custom().unwrap().semantic_spec, "move %n steps");
    }

    #[test]
    fn block_variables_keep_surviving_values() {
        let mut def = move_steps();
        def.variable_names = vec!["count".into()];
        let mut block = def.block_instance("en");
        block
            .as_custom_mut()
            .unwrap()
            .variables
            .set_var("count", VarValue::Number(3.0));
        def.variable_names = vec!["count".into(), "extra".into()];
        block.refresh(&def, "en", None);
        let vars = &block.as_custom().unwrap().variables;
        assert_eq!(vars.get("count"), Some(&VarValue::Number(3.0)));
        assert_eq!(vars.get("extra"), Some(&VarValue::Empty));
    }

    #[test]
    fn variadic_defaults_are_positional() {
        let decl = InputSlotDecl {
            default: "1\n2".into(),
            initial_slots: 3,
            ..InputSlotDecl::of_type("%mult%n")
        };
        let def = def_with("sum %xs", &[("xs", decl)]);
        let block = def.template_instance("en");
        let Input::Multi(multi) = &block.inputs[0] else { panic!("multi expected") };
        let values: Vec<_> = multi.items.iter().map(|i| i.literal().unwrap()).collect();
        assert_eq!(values, vec!["1", "2", ""]);
    }

    #[test]
    fn input_slot_named_ignores_case() {
        let def = move_steps();
        let block = def.template_instance("en");
        assert_eq!(block.input_slot_named(&def, "STEPS").and_then(Input::literal), Some("10"));
        let values = block.input_values(&def.input_names());
        assert_eq!(values.get("steps"), Some(&VarValue::Number(10.0)));
    }

    #[test]
    fn localized_label_is_rendered() {
        let mut def = move_steps();
        def.update_translations("de:gehe _ Schritte");
        let block = def.block_instance("de");
        assert_eq!(block.as_custom().unwrap().label, "gehe %n Schritte");
    }

    #[test]
    fn switching_language_keeps_slot_contents() {
        let mut def = move_steps();
        def.update_translations("de:gehe _ Schritte");
        let mut block = def.block_instance("en");
        block.inputs[0] = Input::reporter(Block::variable("speed"));
        let displaced = block.refresh(&def, "de", None);
        assert!(displaced.is_empty());
        assert_eq!(block.as_custom().unwrap().label, "gehe %n Schritte");
        assert_eq!(block.inputs[0], Input::reporter(Block::variable("speed")));
    }

    #[test]
    fn relabel_to_primitive_shifts_inputs() {
        let mut block = move_steps().block_instance("en");
        block.inputs[0] = Input::number("5");
        let displaced = block.relabel_to_primitive("turn", "turn %n degrees by %n", BlockType::Command, -1);
        assert!(displaced.is_empty());
        assert_eq!(block.selector(), Some("turn"));
        assert_eq!(block.inputs.len(), 2);
        assert_eq!(block.inputs[0].literal(), Some(""));
        assert_eq!(block.inputs[1].literal(), Some("5"));
    }

    #[test]
    fn relabel_to_keeps_matching_inputs_and_fills_defaults() {
        let mut block = move_steps().block_instance("en");
        block.inputs[0] = Input::reporter(Block::variable("speed"));
        let target = def_with(
            "glide %a then %b",
            &[
                ("a", InputSlotDecl::of_type("%n").with_default("1")),
                ("b", InputSlotDecl::of_type("%n").with_default("2")),
            ],
        );
        let displaced = block.relabel_to(&target, "en", 0);
        assert!(displaced.is_empty());
        assert_eq!(block.inputs[0], Input::reporter(Block::variable("speed")));
        assert_eq!(block.inputs[1].literal(), Some("2"));
        assert_eq!(block.as_custom().unwrap().semantic_spec, "glide %n then %n");
    }
}
