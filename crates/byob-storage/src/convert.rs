//! Decompose/recompose conversions between BlockDefinition and flat records.
//!
//! [`decompose`] flattens a [`BlockDefinition`] into a [`DefinitionRecord`]:
//! declarations become positional 11-slot [`DeclarationTuple`]s and
//! translations become `lang:spec` text. [`recompose`] rebuilds the
//! definition under a fresh identity, checking that spec and declarations
//! still correspond.
//!
//! A record carries its definition's id at the time of writing as a
//! transient identity tag. Calls between definitions of the same bundle
//! refer to each other through these tags; [`remap_calls`] rewrites them to
//! the ids assigned on import.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use byob_core::definition::{BlockDefinition, BlockType, HatSemantics};
use byob_core::id::{DefinitionId, ReceiverId};
use byob_core::script::{Block, ReifiedScript, ScriptElement};
use byob_core::slot::{InputSlotDecl, SlotType};

use crate::error::StorageError;

/// A declaration as a positional tuple: type, default, options, read-only,
/// irreplaceable, separator, collapse, expand, initial slots, min slots,
/// max slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclarationTuple(
    pub String,
    pub String,
    pub String,
    pub bool,
    pub bool,
    pub Option<String>,
    pub Option<String>,
    pub Option<String>,
    pub u32,
    pub u32,
    pub u32,
);

impl From<&InputSlotDecl> for DeclarationTuple {
    fn from(decl: &InputSlotDecl) -> Self {
        DeclarationTuple(
            decl.slot_type.as_str().to_string(),
            decl.default.clone(),
            decl.options.clone(),
            decl.read_only,
            decl.irreplaceable,
            decl.separator.clone(),
            decl.collapse.clone(),
            decl.expand.clone(),
            decl.initial_slots,
            decl.min_slots,
            decl.max_slots,
        )
    }
}

impl From<DeclarationTuple> for InputSlotDecl {
    fn from(tuple: DeclarationTuple) -> Self {
        let DeclarationTuple(
            slot_type,
            default,
            options,
            read_only,
            irreplaceable,
            separator,
            collapse,
            expand,
            initial_slots,
            min_slots,
            max_slots,
        ) = tuple;
        InputSlotDecl {
            slot_type: SlotType::new(slot_type),
            default,
            options,
            read_only,
            irreplaceable,
            separator,
            collapse,
            expand,
            initial_slots,
            min_slots,
            max_slots,
        }
    }
}

/// The field set of a block definition, as written to a bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefinitionRecord {
    /// Transient identity tag: the definition's id when it was written.
    pub tag: u32,
    pub spec: String,
    #[serde(rename = "type")]
    pub kind: BlockType,
    pub category: String,
    pub is_global: bool,
    #[serde(default)]
    pub is_helper: bool,
    #[serde(default)]
    pub space_above: bool,
    #[serde(default)]
    pub selector: Option<String>,
    #[serde(default)]
    pub primitive: Option<String>,
    #[serde(default)]
    pub semantics: Option<HatSemantics>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub variable_names: Vec<String>,
    pub declarations: IndexMap<String, DeclarationTuple>,
    #[serde(default)]
    pub body: Option<ReifiedScript>,
    #[serde(default)]
    pub scripts: Vec<ScriptElement>,
    /// `lang:spec` lines.
    #[serde(default)]
    pub translations: String,
}

/// Flattens a definition into a record tagged with its current id.
pub fn decompose(def: &BlockDefinition) -> DefinitionRecord {
    DefinitionRecord {
        tag: def.id.0,
        spec: def.spec().to_string(),
        kind: def.kind,
        category: def.category.clone(),
        is_global: def.is_global,
        is_helper: def.is_helper,
        space_above: def.space_above,
        selector: def.selector.clone(),
        primitive: def.primitive().map(str::to_string),
        semantics: def.semantics,
        comment: def.comment.clone(),
        variable_names: def.variable_names.clone(),
        declarations: def
            .declarations()
            .iter()
            .map(|(name, decl)| (name.clone(), DeclarationTuple::from(decl)))
            .collect(),
        body: def.body().cloned(),
        scripts: def.scripts.clone(),
        translations: def.translations_as_text(),
    }
}

/// Rebuilds a definition from a record under identity `id`.
///
/// Inputs the record does not declare get a generic `%s` declaration;
/// declarations for names the spec does not mention are an integrity
/// error.
pub fn recompose(
    record: DefinitionRecord,
    id: DefinitionId,
    receiver: Option<ReceiverId>,
) -> Result<BlockDefinition, StorageError> {
    let mut declarations: IndexMap<String, InputSlotDecl> = record
        .declarations
        .into_iter()
        .map(|(name, tuple)| (name, InputSlotDecl::from(tuple)))
        .collect();

    let mut def = BlockDefinition::new(id, record.spec);
    let names = def.input_names();
    if let Some(stray) = declarations.keys().find(|key| !names.contains(*key)) {
        return Err(StorageError::IntegrityError {
            reason: format!("declaration '{stray}' has no input in spec '{}'", def.spec()),
        });
    }
    for name in &names {
        declarations
            .entry(name.clone())
            .or_insert_with(|| InputSlotDecl::of_type(SlotType::any()));
    }
    let spec = def.spec().to_string();
    def.set_header(spec, declarations);

    let mut def = def.with_primitive(record.primitive);
    def.receiver = receiver;
    def.is_global = record.is_global;
    def.kind = record.kind;
    def.category = record.category;
    def.is_helper = record.is_helper;
    def.space_above = record.space_above;
    def.selector = record.selector;
    def.semantics = record.semantics;
    def.comment = record.comment;
    def.variable_names = record.variable_names;
    def.scripts = record.scripts;
    def.set_body(record.body);
    def.update_translations(&record.translations);
    Ok(def)
}

/// Rewrites global custom block calls in a record from bundle tags to
/// project ids. Calls to tags outside `ids` lose their binding and are
/// resolved by spec on import.
pub fn remap_calls(record: &mut DefinitionRecord, ids: &HashMap<u32, DefinitionId>) {
    let mut remap = |block: &mut Block| {
        if let Some(custom) = block.as_custom_mut() {
            if custom.is_global {
                custom.definition = custom.definition.and_then(|tag| ids.get(&tag.0).copied());
            }
        }
    };
    if let Some(body) = &mut record.body {
        body.expression.for_each_mut(&mut remap);
    }
    for element in &mut record.scripts {
        if let Some(block) = element.block_mut() {
            block.for_each_mut(&mut remap);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byob_core::instance::CustomBlock;
    use byob_core::script::Input;

    fn move_steps() -> BlockDefinition {
        let mut decls = IndexMap::new();
        decls.insert(
            "steps".to_string(),
            InputSlotDecl {
                separator: Some(",".into()),
                initial_slots: 2,
                ..InputSlotDecl::of_type("%n").with_default("10")
            },
        );
        let mut def = BlockDefinition::with_header(DefinitionId(3), "move %steps steps", decls);
        def.is_global = true;
        def.category = "motion".into();
        def.update_translations("de:gehe _ Schritte");
        def
    }

    #[test]
    fn test_declaration_tuple_is_positional() {
        let decl = InputSlotDecl::of_type("%n").with_default("10");
        let json = serde_json::to_string(&DeclarationTuple::from(&decl)).unwrap();
        assert_eq!(json, r#"["%n","10","",false,false,null,null,null,0,0,0]"#);
    }

    #[test]
    fn test_recompose_restores_fields() {
        let def = move_steps();
        let record = decompose(&def);
        assert_eq!(record.tag, 3);
        assert_eq!(record.translations, "de:gehe _ Schritte\n");

        let back = recompose(record, DefinitionId(9), None).unwrap();
        assert_eq!(back.id, DefinitionId(9));
        assert_eq!(back.spec(), "move %steps steps");
        assert_eq!(back.declarations(), def.declarations());
        assert_eq!(back.category, "motion");
        assert_eq!(back.localized_spec("de"), "gehe %n Schritte");
    }

    #[test]
    fn test_recompose_declares_missing_inputs() {
        let mut record = decompose(&move_steps());
        record.spec = "move %steps steps %extra".into();
        let back = recompose(record, DefinitionId(1), None).unwrap();
        assert_eq!(back.type_of("extra"), "%s");
        assert_eq!(back.declarations().len(), 2);
    }

    #[test]
    fn test_recompose_rejects_stray_declarations() {
        let mut record = decompose(&move_steps());
        record.spec = "move".into();
        let err = recompose(record, DefinitionId(1), None).unwrap_err();
        assert!(matches!(err, StorageError::IntegrityError { .. }));
    }

    #[test]
    fn test_remap_calls_rewrites_known_tags() {
        let callee = move_steps();
        let mut caller = BlockDefinition::new(DefinitionId(4), "run");
        caller.is_global = true;
        let call = Block::custom(CustomBlock::for_definition(&callee)).with_inputs(vec![Input::number("5")]);
        caller.set_body(Some(ReifiedScript::reify(call, Vec::new())));

        let mut record = decompose(&caller);
        let ids = HashMap::from([(3, DefinitionId(30))]);
        remap_calls(&mut record, &ids);
        let body = record.body.unwrap();
        assert_eq!(body.expression.as_custom().unwrap().definition, Some(DefinitionId(30)));

        let mut record = decompose(&caller);
        remap_calls(&mut record, &HashMap::new());
        let body = record.body.unwrap();
        assert_eq!(body.expression.as_custom().unwrap().definition, None);
    }
}
