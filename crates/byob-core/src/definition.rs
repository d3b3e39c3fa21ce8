//! Custom block definitions.
//!
//! [`BlockDefinition`] is the persistent model of a user-defined block: its
//! spec, the declarations of its inputs, its body script, loose helper
//! scripts, translations and primitive binding. Instances of the block
//! ([`crate::instance::CustomBlock`]) hold no copy of this data; they
//! re-derive their label and slots from the definition on refresh.
//!
//! The spec and the declaration map must stay in 1:1 correspondence: every
//! `%name` token of the spec has a declaration and vice versa. The
//! structural edit operations here ([`BlockDefinition::add_inputs`],
//! [`BlockDefinition::remove_inputs`], [`BlockDefinition::set_block_label`],
//! [`BlockDefinition::set_block_definition`]) preserve that invariant;
//! [`BlockDefinition::set_header`] replaces both halves at once.

use std::cell::{Cell, RefCell};
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::choices::{self, Menu};
use crate::error::CoreError;
use crate::id::{DefinitionId, ReceiverId};
use crate::registry::PrimitiveRegistry;
use crate::script::{Block, Input, ReifiedScript, ScriptElement, DO_PRIMITIVE, DO_REPORT};
use crate::slot::{InputSlotDecl, SlotType};
use crate::spec::{self, BREAK_TAG, LINE_BREAK, PLACEHOLDER};

// ---------------------------------------------------------------------------
// Block shape
// ---------------------------------------------------------------------------

/// The shape of a custom block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockType {
    #[default]
    Command,
    Reporter,
    Predicate,
    Hat,
}

impl BlockType {
    /// Reporters and predicates.
    pub fn is_reporter(self) -> bool {
        matches!(self, BlockType::Reporter | BlockType::Predicate)
    }

    /// Command and reporter shapes are not interchangeable in a script;
    /// predicate and reporter are.
    pub fn is_major_change_to(self, other: BlockType) -> bool {
        self.is_reporter() != other.is_reporter()
            || (self == BlockType::Hat) != (other == BlockType::Hat)
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BlockType::Command => "command",
            BlockType::Reporter => "reporter",
            BlockType::Predicate => "predicate",
            BlockType::Hat => "hat",
        };
        f.write_str(name)
    }
}

/// How a custom hat block fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HatSemantics {
    /// Fires once when its condition becomes true.
    #[default]
    Event,
    /// Fires every time its condition is true.
    Rule,
}

/// The default value of an input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultValue {
    /// Literal text, inserted as is.
    Text(String),
    /// A translatable selector, declared as `$_selector`.
    Selector(String),
}

impl DefaultValue {
    /// The text to put into a slot.
    pub fn text(&self) -> &str {
        match self {
            DefaultValue::Text(text) | DefaultValue::Selector(text) => text,
        }
    }
}

/// Resolves custom block calls found in scripts to their definitions.
///
/// Implemented by the project: global calls resolve by identity, local
/// calls by spec through a receiver's method table (inheritance included).
pub trait DefinitionResolver {
    fn definition(&self, id: DefinitionId) -> Option<&BlockDefinition>;
    fn method(&self, receiver: ReceiverId, spec: &str) -> Option<&BlockDefinition>;
}

// ---------------------------------------------------------------------------
// BlockDefinition
// ---------------------------------------------------------------------------

/// The persistent model of a custom block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockDefinition {
    /// Identity within the project.
    pub id: DefinitionId,
    /// Label words, `%name` inputs and `$nl` line breaks.
    spec: String,
    /// Owner of a sprite-local definition. `None` for global definitions
    /// not tied to any sprite.
    pub receiver: Option<ReceiverId>,
    pub is_global: bool,
    pub kind: BlockType,
    pub category: String,
    /// Input declarations keyed by input name.
    declarations: IndexMap<String, InputSlotDecl>,
    /// The implementation. `None` means "no implementation yet".
    body: Option<ReifiedScript>,
    /// Loose helper scripts and comments kept next to the definition.
    pub scripts: Vec<ScriptElement>,
    /// Block variables; every instance owns a frame with these names.
    pub variable_names: Vec<String>,
    pub comment: Option<String>,
    /// Hidden from the palette, still usable from other definitions.
    pub is_helper: bool,
    /// Extra space above the palette template.
    pub space_above: bool,
    /// Selector of the built-in operation this definition can take over.
    pub selector: Option<String>,
    /// Selector of the primitive the body delegates to via `doPrimitive`.
    primitive: Option<String>,
    /// Firing semantics of hat blocks.
    pub semantics: Option<HatSemantics>,
    /// Language code -> abstract spec with `_` placeholders.
    translations: IndexMap<String, String>,

    #[serde(skip)]
    cached_translation: RefCell<Option<(String, String)>>,
    #[serde(skip)]
    cached_is_recursive: Cell<Option<bool>>,
}

impl BlockDefinition {
    /// Creates an empty definition (the "make a block" starting point).
    pub fn new(id: DefinitionId, spec: impl Into<String>) -> Self {
        BlockDefinition {
            id,
            spec: spec.into(),
            receiver: None,
            is_global: false,
            kind: BlockType::Command,
            category: "other".to_string(),
            declarations: IndexMap::new(),
            body: None,
            scripts: Vec::new(),
            variable_names: Vec::new(),
            comment: None,
            is_helper: false,
            space_above: false,
            selector: None,
            primitive: None,
            semantics: None,
            translations: IndexMap::new(),
            cached_translation: RefCell::new(None),
            cached_is_recursive: Cell::new(None),
        }
    }

    /// Creates a definition with the given spec and declarations, which must
    /// correspond.
    pub fn with_header(
        id: DefinitionId,
        spec: impl Into<String>,
        declarations: IndexMap<String, InputSlotDecl>,
    ) -> Self {
        let mut def = BlockDefinition::new(id, spec);
        def.declarations = declarations;
        def
    }

    fn invalidate_caches(&self) {
        self.cached_translation.replace(None);
        self.cached_is_recursive.set(None);
    }

    // -- header ------------------------------------------------------------

    pub fn spec(&self) -> &str {
        &self.spec
    }

    /// Replaces the spec. Callers keep the declarations in step.
    pub fn set_spec(&mut self, spec: impl Into<String>) {
        self.spec = spec.into();
        self.invalidate_caches();
    }

    pub fn declarations(&self) -> &IndexMap<String, InputSlotDecl> {
        &self.declarations
    }

    /// Mutable access to one declaration. Keys cannot change through this.
    pub fn declaration_mut(&mut self, name: &str) -> Option<&mut InputSlotDecl> {
        self.invalidate_caches();
        self.declarations.get_mut(name)
    }

    /// Replaces spec and declarations together.
    pub fn set_header(
        &mut self,
        spec: impl Into<String>,
        declarations: IndexMap<String, InputSlotDecl>,
    ) {
        self.spec = spec.into();
        self.declarations = declarations;
        self.invalidate_caches();
    }

    pub fn body(&self) -> Option<&ReifiedScript> {
        self.body.as_ref()
    }

    pub fn set_body(&mut self, body: Option<ReifiedScript>) {
        self.body = body;
        self.cached_is_recursive.set(None);
    }

    pub fn primitive(&self) -> Option<&str> {
        self.primitive.as_deref()
    }

    /// Binds the definition to a primitive. Selectors the registry does not
    /// list are ignored; `None` always unbinds.
    pub fn set_primitive(&mut self, primitive: Option<&str>, registry: &PrimitiveRegistry) {
        match primitive {
            Some(selector) if !registry.contains(selector) => {}
            other => self.primitive = other.map(str::to_string),
        }
    }

    /// Restores a primitive binding read back from a serialized record,
    /// without consulting a registry.
    pub fn with_primitive(mut self, primitive: Option<String>) -> Self {
        self.primitive = primitive;
        self
    }

    /// Names of the inputs in spec order.
    pub fn input_names(&self) -> Vec<String> {
        spec::parse_spec(&self.spec)
            .iter()
            .filter_map(|token| spec::input_name(token).map(str::to_string))
            .collect()
    }

    /// The semantic spec: input names replaced by their type tags and line
    /// breaks by `%br`.
    pub fn block_spec(&self) -> String {
        let parts: Vec<String> = spec::parse_spec(&self.spec)
            .into_iter()
            .map(|token| match spec::input_name(&token) {
                Some(name) => self.type_of(name).to_string(),
                None if token == LINE_BREAK => BREAK_TAG.to_string(),
                None => token,
            })
            .collect();
        parts.join(" ").trim().to_string()
    }

    /// The label words without inputs or question marks, run together.
    pub fn help_spec(&self) -> String {
        spec::parse_spec(&self.spec)
            .into_iter()
            .filter(|token| !token.starts_with('%'))
            .collect::<String>()
            .replace('?', "")
    }

    /// The semantic spec with every input replaced by `_` and `%br` by
    /// `$nl`.
    pub fn abstract_block_spec(&self) -> String {
        spec::split_block_spec(&self.block_spec())
            .into_iter()
            .map(|token| {
                if token == BREAK_TAG {
                    LINE_BREAK
                } else if spec::is_input_token(token) {
                    PLACEHOLDER
                } else {
                    token
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    // -- localization --------------------------------------------------------

    pub fn translations(&self) -> &IndexMap<String, String> {
        &self.translations
    }

    /// The display spec in `language`.
    ///
    /// A translation is an abstract spec with one `_` per input. It is used
    /// only if the placeholder count matches and none of its tokens looks
    /// like an input; otherwise the semantic spec is shown. Each `_` takes
    /// the next semantic input tag, so translations may reorder words but
    /// not retype inputs. The result is cached per language until the spec,
    /// declarations or translations change.
    pub fn localized_spec(&self, language: &str) -> String {
        if self.selector.is_some() {
            return self.block_spec();
        }
        if let Some((lang, cached)) = self.cached_translation.borrow().as_ref() {
            if lang == language {
                return cached.clone();
            }
        }

        let semantic = self.block_spec();
        let Some(translation) = self.translations.get(language) else {
            return semantic;
        };
        let inputs: Vec<&str> = spec::split_block_spec(&semantic)
            .into_iter()
            .filter(|token| spec::is_input_token(token) && *token != BREAK_TAG)
            .collect();
        let parts = spec::split_block_spec(translation);
        let placeholders = parts.iter().filter(|p| **p == PLACEHOLDER).count();

        let localized = if parts.iter().any(|p| spec::is_input_token(p)) || placeholders != inputs.len()
        {
            semantic
        } else {
            let mut next_input = inputs.into_iter();
            parts
                .into_iter()
                .map(|part| {
                    if part == PLACEHOLDER {
                        next_input.next().unwrap_or(part)
                    } else if part == LINE_BREAK {
                        BREAK_TAG
                    } else {
                        part
                    }
                })
                .collect::<Vec<_>>()
                .join(" ")
        };
        self.cached_translation
            .replace(Some((language.to_string(), localized.clone())));
        localized
    }

    /// Translations as editable `lang:spec` lines.
    pub fn translations_as_text(&self) -> String {
        self.translations
            .iter()
            .map(|(lang, spec)| format!("{lang}:{spec}\n"))
            .collect()
    }

    /// Replaces all translations from `lang:spec` lines. Lines without a
    /// colon or with an empty language code are skipped.
    pub fn update_translations(&mut self, text: &str) {
        self.translations = text
            .split('\n')
            .filter_map(|line| {
                let (lang, spec) = line.split_once(':')?;
                let lang = lang.trim();
                (!lang.is_empty()).then(|| (lang.to_string(), spec.trim().to_string()))
            })
            .collect();
        self.invalidate_caches();
    }

    // -- declaration accessors -------------------------------------------------

    fn decl(&self, name: &str) -> Option<&InputSlotDecl> {
        self.declarations.get(name)
    }

    /// Input name at `idx` in spec order.
    pub fn input_name_at(&self, idx: usize) -> Option<String> {
        self.input_names().into_iter().nth(idx)
    }

    /// Type tag of an input; undeclared inputs are `%s`.
    pub fn type_of(&self, name: &str) -> &str {
        self.decl(name)
            .map(|d| d.slot_type.as_str())
            .unwrap_or(SlotType::ANY)
    }

    pub fn default_value_of(&self, name: &str) -> DefaultValue {
        let Some(decl) = self.decl(name) else {
            return DefaultValue::Text(String::new());
        };
        match decl.default.strip_prefix(choices::TRANSLATABLE_PREFIX) {
            Some(selector) if !selector.is_empty() && !decl.default.contains('\n') => {
                DefaultValue::Selector(selector.to_string())
            }
            _ => DefaultValue::Text(decl.default.clone()),
        }
    }

    /// The dropdown menu of an input, if any.
    pub fn drop_down_menu_of(&self, name: &str) -> Option<Menu> {
        self.decl(name).and_then(|d| choices::parse_menu(&d.options))
    }

    /// The encoded options of an input.
    pub fn input_options_of(&self, name: &str) -> &str {
        self.decl(name).map(|d| d.options.as_str()).unwrap_or("")
    }

    pub fn is_read_only_input(&self, name: &str) -> bool {
        self.decl(name).is_some_and(|d| d.read_only)
    }

    pub fn is_irreplaceable_input(&self, name: &str) -> bool {
        self.decl(name).is_some_and(|d| d.irreplaceable)
    }

    pub fn separator_of(&self, name: &str) -> Option<&str> {
        self.decl(name).and_then(|d| d.separator.as_deref())
    }

    pub fn collapse_of(&self, name: &str) -> Option<&str> {
        self.decl(name).and_then(|d| d.collapse.as_deref())
    }

    pub fn expand_of(&self, name: &str) -> Option<&str> {
        self.decl(name).and_then(|d| d.expand.as_deref())
    }

    pub fn initial_slots_of(&self, name: &str) -> u32 {
        self.decl(name).map_or(0, |d| d.initial_slots)
    }

    pub fn min_slots_of(&self, name: &str) -> u32 {
        self.decl(name).map_or(0, |d| d.min_slots)
    }

    pub fn max_slots_of(&self, name: &str) -> u32 {
        self.decl(name).map_or(0, |d| d.max_slots)
    }

    // Positional twins, resolved through `input_names()`. Out-of-range
    // indices behave like undeclared inputs.

    fn name_or_empty(&self, idx: usize) -> String {
        self.input_name_at(idx).unwrap_or_default()
    }

    pub fn type_of_input_idx(&self, idx: usize) -> String {
        self.type_of(&self.name_or_empty(idx)).to_string()
    }

    pub fn default_value_of_input_idx(&self, idx: usize) -> DefaultValue {
        self.default_value_of(&self.name_or_empty(idx))
    }

    pub fn drop_down_menu_of_input_idx(&self, idx: usize) -> Option<Menu> {
        self.drop_down_menu_of(&self.name_or_empty(idx))
    }

    pub fn input_options_of_idx(&self, idx: usize) -> String {
        self.input_options_of(&self.name_or_empty(idx)).to_string()
    }

    pub fn is_read_only_input_idx(&self, idx: usize) -> bool {
        self.is_read_only_input(&self.name_or_empty(idx))
    }

    pub fn is_irreplaceable_input_idx(&self, idx: usize) -> bool {
        self.is_irreplaceable_input(&self.name_or_empty(idx))
    }

    pub fn separator_of_input_idx(&self, idx: usize) -> Option<String> {
        self.separator_of(&self.name_or_empty(idx)).map(str::to_string)
    }

    pub fn collapse_of_input_idx(&self, idx: usize) -> Option<String> {
        self.collapse_of(&self.name_or_empty(idx)).map(str::to_string)
    }

    pub fn expand_of_input_idx(&self, idx: usize) -> Option<String> {
        self.expand_of(&self.name_or_empty(idx)).map(str::to_string)
    }

    pub fn initial_slots_of_input_idx(&self, idx: usize) -> u32 {
        self.initial_slots_of(&self.name_or_empty(idx))
    }

    pub fn min_slots_of_input_idx(&self, idx: usize) -> u32 {
        self.min_slots_of(&self.name_or_empty(idx))
    }

    pub fn max_slots_of_input_idx(&self, idx: usize) -> u32 {
        self.max_slots_of(&self.name_or_empty(idx))
    }

    /// Lower-cased words of all dropdown menus, for palette search.
    pub fn menu_search_words(&self) -> String {
        self.input_names()
            .iter()
            .filter_map(|name| self.drop_down_menu_of(name))
            .flat_map(|menu| choices::menu_words(&menu))
            .collect::<Vec<_>>()
            .join(" ")
    }

    // -- structural edits ------------------------------------------------------

    /// Appends `count` generically named (`#1`, `#2`, ...) inputs of type
    /// `%s` to the end of the spec.
    pub fn add_inputs(&mut self, count: usize) {
        if count == 0 {
            return;
        }
        let mut names = self.input_names();
        let mut tokens = spec::parse_spec(&self.spec);
        for _ in 0..count {
            let name = gensym(&names);
            tokens.push(spec::input_token(&name));
            self.declarations
                .insert(name.clone(), InputSlotDecl::of_type(SlotType::any()));
            names.push(name);
        }
        self.spec = spec::join_spec(&tokens);
        self.invalidate_caches();
    }

    /// Removes the last `count` inputs from spec and declarations.
    pub fn remove_inputs(&mut self, count: usize) {
        let names = self.input_names();
        let surplus = &names[names.len().saturating_sub(count)..];
        let tokens: Vec<String> = spec::parse_spec(&self.spec)
            .into_iter()
            .filter(|token| !spec::input_name(token).is_some_and(|n| surplus.iter().any(|s| s == n)))
            .collect();
        self.spec = spec::join_spec(&tokens);
        for name in surplus {
            self.declarations.shift_remove(name);
        }
        self.invalidate_caches();
    }

    /// Grows or shrinks the input list to `count` inputs.
    pub fn resize_inputs(&mut self, count: usize) {
        let current = self.input_names().len();
        if count > current {
            self.add_inputs(count - current);
        } else {
            self.remove_inputs(current - count);
        }
    }

    /// Rewrites the label from an abstract spec (`move _ steps`), keeping the
    /// current input names in order. A definition without inputs grows
    /// generic ones to match the placeholders.
    pub fn set_block_label(&mut self, abstract_spec: &str) -> Result<(), CoreError> {
        let parts = spec::split_block_spec(abstract_spec);
        let placeholders = parts.iter().filter(|p| **p == PLACEHOLDER).count();
        let mut names = self.input_names();
        if names.is_empty() && placeholders > 0 {
            self.add_inputs(placeholders);
            names = self.input_names();
        }
        if placeholders != names.len() {
            return Err(CoreError::InputCountMismatch {
                placeholders,
                inputs: names.len(),
            });
        }
        self.spec = substitute_placeholders(&parts, &names);
        self.invalidate_caches();
        Ok(())
    }

    /// Re-binds inputs and body to a freshly reified script: its parameter
    /// list `inputs` and its `expression`.
    ///
    /// Declarations carry over to the new names by position. A body rooted
    /// in an enabled `doPrimitive` call binds the definition to that
    /// primitive; any other body unbinds it. Reporter expressions are
    /// wrapped in a `doReport` command so that every body is a command
    /// stack. An empty expression clears the body.
    pub fn set_block_definition(
        &mut self,
        inputs: &[String],
        expression: Option<Block>,
        registry: &PrimitiveRegistry,
    ) {
        self.resize_inputs(inputs.len());
        let parts_owned = self.abstract_block_spec();
        let parts = spec::split_block_spec(&parts_owned);
        let old_names = self.input_names();
        self.spec = substitute_placeholders(&parts, inputs);

        let old_decls = std::mem::take(&mut self.declarations);
        for (name, decl) in old_decls {
            if let Some(pos) = old_names.iter().position(|n| *n == name) {
                if let Some(new_name) = inputs.get(pos) {
                    self.declarations.insert(new_name.clone(), decl);
                }
            }
        }
        self.invalidate_caches();

        let bound = expression.as_ref().and_then(primitive_binding);
        match bound {
            Some(selector) => self.set_primitive(Some(&selector), registry),
            None => self.primitive = None,
        }

        let body = expression.map(|expression| {
            let expression = if expression.is_reporter() {
                Block::command(DO_REPORT).with_inputs(vec![Input::reporter(expression)])
            } else {
                expression
            };
            ReifiedScript::reify(expression, inputs.to_vec())
        });
        self.set_body(body);
    }

    /// Reifies `expression` against the current input names as the new
    /// body and re-detects the primitive binding from its root call.
    pub fn set_body_expression(&mut self, expression: Option<Block>, registry: &PrimitiveRegistry) {
        match expression.as_ref().and_then(primitive_binding) {
            Some(selector) => self.set_primitive(Some(&selector), registry),
            None => self.primitive = None,
        }
        let inputs = self.input_names();
        self.set_body(expression.map(|expression| ReifiedScript::reify(expression, inputs)));
    }

    /// Drops the body and scripts that were marked for deletion.
    pub fn purge_corpses(&mut self) {
        if self.body.as_ref().is_some_and(|b| b.expression.is_corpse) {
            self.set_body(None);
        }
        self.scripts
            .retain(|element| !element.block().is_some_and(|b| b.is_corpse));
    }

    /// Deep copy for a new owner, under a new identity. A header-only copy
    /// has no body and no scripts.
    pub fn copy_and_bind_to(
        &self,
        id: DefinitionId,
        receiver: Option<ReceiverId>,
        header_only: bool,
    ) -> BlockDefinition {
        let mut copy = self.clone();
        copy.id = id;
        copy.receiver = receiver;
        copy.invalidate_caches();
        if header_only {
            copy.body = None;
            copy.scripts.clear();
            return copy;
        }
        copy.body = self
            .body
            .as_ref()
            .map(|body| ReifiedScript::reify(body.expression.clone(), self.input_names()));
        copy
    }

    // -- analysis --------------------------------------------------------------

    fn script_roots(&self) -> impl Iterator<Item = &Block> {
        self.scripts
            .iter()
            .filter_map(ScriptElement::block)
            .chain(self.body.as_ref().map(|b| &b.expression))
    }

    /// Adds every definition reachable from this one's scripts and body to
    /// `result`, depth first. Definitions in `excluding` or already in
    /// `result` are not revisited; this one is pushed onto `excluding`.
    ///
    /// Local definitions, and local calls inside global ones, resolve
    /// through `local_receiver`; without one they are an error.
    pub fn collect_dependencies(
        &self,
        excluding: &mut Vec<DefinitionId>,
        result: &mut Vec<DefinitionId>,
        resolver: &impl DefinitionResolver,
        local_receiver: Option<ReceiverId>,
    ) -> Result<(), CoreError> {
        if !self.is_global && local_receiver.is_none() {
            return Err(CoreError::MissingReceiver {
                spec: self.spec.clone(),
            });
        }
        excluding.push(self.id);

        let mut calls = Vec::new();
        for root in self.script_roots() {
            root.for_each(&mut |block: &Block| {
                if let Some(custom) = block.as_custom() {
                    calls.push(custom.clone());
                }
            });
        }

        for call in calls {
            let callee = if call.is_global {
                call.definition.and_then(|id| resolver.definition(id))
            } else {
                let receiver = local_receiver.ok_or_else(|| CoreError::MissingReceiver {
                    spec: call.semantic_spec.clone(),
                })?;
                resolver.method(receiver, &call.semantic_spec)
            };
            let Some(callee) = callee else { continue };
            if excluding.contains(&callee.id) || result.contains(&callee.id) {
                continue;
            }
            result.push(callee.id);
            callee.collect_dependencies(excluding, result, resolver, local_receiver)?;
        }
        Ok(())
    }

    /// Sorted names of variables the body reads without declaring them:
    /// not an input, not a block variable, not a template in scope.
    pub fn data_dependencies(&self) -> Vec<String> {
        let Some(body) = &self.body else {
            return Vec::new();
        };
        let inputs = self.input_names();
        let mut names: Vec<String> = body
            .expression
            .free_variables()
            .into_iter()
            .filter(|name| !inputs.contains(name) && !self.variable_names.contains(name))
            .collect();
        names.sort();
        names
    }

    /// Whether the body calls a block with this definition's own semantic
    /// spec. Cached until the body or the header changes.
    pub fn is_directly_recursive(&self) -> bool {
        if let Some(cached) = self.cached_is_recursive.get() {
            return cached;
        }
        let recursive = match &self.body {
            None => false,
            Some(body) => {
                let own = self.block_spec();
                body.expression.any(&|block: &Block| {
                    block.as_custom().is_some_and(|c| c.semantic_spec == own)
                })
            }
        };
        self.cached_is_recursive.set(Some(recursive));
        recursive
    }

    /// Whether any script or the body broadcasts `message`.
    pub fn is_sending(&self, message: &str) -> bool {
        self.script_roots().any(|root| root.is_sending(message))
    }

    /// Whether this definition has taken over its selector's built-in.
    pub fn is_bootstrapped(&self, registry: &PrimitiveRegistry) -> bool {
        match &self.selector {
            Some(selector) if self.is_global => registry.is_registered(selector, self.id),
            _ => false,
        }
    }

    /// Bootstrapped and delegating to its own selector.
    pub fn is_quasi_primitive(&self, registry: &PrimitiveRegistry) -> bool {
        self.is_bootstrapped(registry) && self.primitive.is_some() && self.primitive == self.selector
    }

    /// Whether any custom block call in scripts or body is sprite-local.
    pub fn calls_local_blocks(&self) -> Option<String> {
        let mut found = None;
        for root in self.script_roots() {
            root.for_each(&mut |block: &Block| {
                if let Some(custom) = block.as_custom() {
                    if !custom.is_global && found.is_none() {
                        found = Some(custom.semantic_spec.clone());
                    }
                }
            });
        }
        found
    }
}

/// `#n` with the smallest `n` not in `existing`.
fn gensym(existing: &[String]) -> String {
    (1..)
        .map(|n| format!("#{n}"))
        .find(|name| !existing.contains(name))
        .unwrap_or_default()
}

/// Replaces each `_` in `parts` with the next name's input token.
fn substitute_placeholders<S: AsRef<str>>(parts: &[&str], names: &[S]) -> String {
    let mut names = names.iter();
    parts
        .iter()
        .filter_map(|part| {
            if *part == PLACEHOLDER {
                names.next().map(|n| spec::input_token(n.as_ref()))
            } else {
                Some(part.to_string())
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// The primitive selector of an enabled `doPrimitive` root call.
fn primitive_binding(expression: &Block) -> Option<String> {
    if expression.selector() != Some(DO_PRIMITIVE) {
        return None;
    }
    match expression.inputs.as_slice() {
        [Input::Boolean(Some(true)), selector, ..] => selector
            .literal()
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::CustomBlock;
    use proptest::prelude::*;
    use std::collections::HashMap;

    fn move_steps() -> BlockDefinition {
        let mut decls = IndexMap::new();
        decls.insert(
            "steps".to_string(),
            InputSlotDecl::of_type("%n").with_default("10"),
        );
        BlockDefinition::with_header(DefinitionId(1), "move %steps steps", decls)
    }

    struct Defs(HashMap<DefinitionId, BlockDefinition>);

    impl DefinitionResolver for Defs {
        fn definition(&self, id: DefinitionId) -> Option<&BlockDefinition> {
            self.0.get(&id)
        }
        fn method(&self, _receiver: ReceiverId, spec: &str) -> Option<&BlockDefinition> {
            self.0.values().find(|d| d.block_spec() == spec)
        }
    }

    fn global(id: u32, spec: &str) -> BlockDefinition {
        let mut def = BlockDefinition::new(DefinitionId(id), spec);
        def.is_global = true;
        def
    }

    fn call(def: &BlockDefinition) -> Block {
        Block::custom(CustomBlock::for_definition(def))
    }

    #[test]
    fn move_steps_scenario() {
        let def = move_steps();
        assert_eq!(def.block_spec(), "move %n steps");
        assert_eq!(def.input_names(), vec!["steps"]);
        assert_eq!(def.default_value_of("steps"), DefaultValue::Text("10".into()));
        assert_eq!(def.abstract_block_spec(), "move _ steps");
    }

    #[test]
    fn block_spec_maps_line_breaks_and_undeclared_inputs() {
        let def = BlockDefinition::new(DefinitionId(1), "say %msg $nl now");
        assert_eq!(def.block_spec(), "say %s %br now");
        assert_eq!(def.abstract_block_spec(), "say _ $nl now");
    }

    #[test]
    fn help_spec_drops_inputs_and_question_marks() {
        let def = BlockDefinition::new(DefinitionId(1), "is %x empty?");
        assert_eq!(def.help_spec(), "isempty");
    }

    #[test]
    fn translatable_default_is_a_selector() {
        let mut def = move_steps();
        def.declaration_mut("steps").unwrap().default = "$_left".into();
        assert_eq!(def.default_value_of("steps"), DefaultValue::Selector("left".into()));
        def.declaration_mut("steps").unwrap().default = "$_a\nb".into();
        assert_eq!(def.default_value_of("steps"), DefaultValue::Text("$_a\nb".into()));
    }

    #[test]
    fn localized_spec_permutes_words_and_keeps_types() {
        let mut def = move_steps();
        def.update_translations("de:gehe _ Schritte\nfr:avance de _ pas\n");
        assert_eq!(def.localized_spec("de"), "gehe %n Schritte");
        assert_eq!(def.localized_spec("fr"), "avance de %n pas");
        assert_eq!(def.localized_spec("en"), "move %n steps");
    }

    #[test]
    fn localized_spec_rejects_bad_translations() {
        let mut def = move_steps();
        def.update_translations("de:gehe _ _ Schritte");
        assert_eq!(def.localized_spec("de"), def.block_spec());
        def.update_translations("de:gehe %n Schritte _");
        assert_eq!(def.localized_spec("de"), def.block_spec());
    }

    #[test]
    fn localized_cache_is_invalidated_by_edits() {
        let mut def = move_steps();
        def.update_translations("de:gehe _ Schritte");
        assert_eq!(def.localized_spec("de"), "gehe %n Schritte");
        def.declaration_mut("steps").unwrap().slot_type = SlotType::new("%s");
        assert_eq!(def.localized_spec("de"), "gehe %s Schritte");
    }

    #[test]
    fn translations_text_skips_malformed_lines() {
        let mut def = move_steps();
        def.update_translations("de:gehe _ Schritte\nno colon\n:empty key\n");
        assert_eq!(def.translations().len(), 1);
        assert_eq!(def.translations_as_text(), "de:gehe _ Schritte\n");
    }

    #[test]
    fn remove_inputs_drops_the_last_declared() {
        let mut decls = IndexMap::new();
        decls.insert("a".to_string(), InputSlotDecl::of_type("%n"));
        decls.insert("b".to_string(), InputSlotDecl::of_type("%s"));
        let mut def = BlockDefinition::with_header(DefinitionId(1), "f %a %b", decls);
        def.remove_inputs(1);
        assert_eq!(def.spec(), "f %a");
        assert_eq!(def.input_names(), vec!["a"]);
        assert_eq!(def.declarations().len(), 1);
        assert_eq!(def.type_of("a"), "%n");
    }

    #[test]
    fn add_inputs_uses_fresh_gensyms() {
        let mut def = BlockDefinition::new(DefinitionId(1), "f %#1");
        def.add_inputs(2);
        assert_eq!(def.input_names(), vec!["#1", "#2", "#3"]);
        assert_eq!(def.type_of("#3"), "%s");
    }

    #[test]
    fn set_block_label_substitutes_names() {
        let mut def = move_steps();
        def.set_block_label("walk _ paces").unwrap();
        assert_eq!(def.spec(), "walk %steps paces");
    }

    #[test]
    fn set_block_label_grows_inputs_when_none() {
        let mut def = BlockDefinition::new(DefinitionId(1), "sum");
        def.set_block_label("_ + _").unwrap();
        assert_eq!(def.spec(), "%#1 + %#2");
    }

    #[test]
    fn set_block_label_rejects_count_mismatch() {
        let mut def = move_steps();
        let err = def.set_block_label("walk _ _").unwrap_err();
        assert_eq!(
            err,
            CoreError::InputCountMismatch { placeholders: 2, inputs: 1 }
        );
        assert_eq!(def.spec(), "move %steps steps");
    }

    #[test]
    fn set_block_definition_rebinds_names_and_wraps_reporters() {
        let mut def = move_steps();
        let registry = PrimitiveRegistry::new();
        def.set_block_definition(&["n".to_string()], Some(Block::variable("n")), &registry);
        assert_eq!(def.spec(), "move %n steps");
        assert_eq!(def.type_of("n"), "%n");
        let body = def.body().unwrap();
        assert_eq!(body.expression.selector(), Some(DO_REPORT));
        assert_eq!(body.inputs, vec!["n"]);

        def.set_block_definition(&[], None, &registry);
        assert_eq!(def.spec(), "move steps");
        assert!(def.body().is_none());
    }

    #[test]
    fn set_block_definition_detects_primitive_binding() {
        let mut registry = PrimitiveRegistry::new();
        registry.insert(crate::registry::PrimitiveBlock::command("forward", "move %n steps"));
        let mut def = move_steps();
        let body = Block::command(DO_PRIMITIVE)
            .with_inputs(vec![Input::Boolean(Some(true)), Input::text("forward")]);
        def.set_block_definition(&["steps".to_string()], Some(body), &registry);
        assert_eq!(def.primitive(), Some("forward"));

        let unlisted = Block::command(DO_PRIMITIVE)
            .with_inputs(vec![Input::Boolean(Some(true)), Input::text("nope")]);
        def.set_block_definition(&["steps".to_string()], Some(unlisted), &registry);
        assert_eq!(def.primitive(), Some("forward"));

        def.set_block_definition(&["steps".to_string()], Some(Block::command("bubble")), &registry);
        assert_eq!(def.primitive(), None);
    }

    #[test]
    fn collect_dependencies_survives_mutual_recursion() {
        let mut a = global(1, "a");
        let mut b = global(2, "b");
        let registry = PrimitiveRegistry::new();
        a.set_block_definition(&[], Some(call(&b)), &registry);
        b.set_block_definition(&[], Some(call(&a)), &registry);
        let defs = Defs([(a.id, a.clone()), (b.id, b.clone())].into_iter().collect());

        let mut excluding = Vec::new();
        let mut result = Vec::new();
        a.collect_dependencies(&mut excluding, &mut result, &defs, None).unwrap();
        assert_eq!(result, vec![DefinitionId(2)]);
    }

    #[test]
    fn collect_dependencies_respects_initial_exclusions() {
        let mut a = global(1, "a");
        let b = global(2, "b");
        a.set_block_definition(&[], Some(call(&b)), &PrimitiveRegistry::new());
        let defs = Defs([(a.id, a.clone()), (b.id, b.clone())].into_iter().collect());

        let mut excluding = vec![DefinitionId(2)];
        let mut result = Vec::new();
        a.collect_dependencies(&mut excluding, &mut result, &defs, None).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn local_dependencies_require_a_receiver() {
        let local = BlockDefinition::new(DefinitionId(3), "mine");
        let defs = Defs(HashMap::new());
        let err = local
            .collect_dependencies(&mut Vec::new(), &mut Vec::new(), &defs, None)
            .unwrap_err();
        assert!(matches!(err, CoreError::MissingReceiver { .. }));
    }

    #[test]
    fn data_dependencies_skip_inputs_and_block_vars() {
        let mut def = move_steps();
        def.variable_names.push("memo".into());
        let body = Block::command("forward")
            .with_inputs(vec![Input::reporter(Block::variable("steps"))])
            .then(Block::command("bubble").with_inputs(vec![Input::reporter(Block::variable("score"))]))
            .then(Block::command("bubble").with_inputs(vec![Input::reporter(Block::variable("memo"))]))
            .then(Block::command("bubble").with_inputs(vec![Input::reporter(Block::variable("alpha"))]));
        def.set_body(Some(ReifiedScript::reify(body, def.input_names())));
        assert_eq!(def.data_dependencies(), vec!["alpha", "score"]);
    }

    #[test]
    fn recursion_cache_follows_body() {
        let mut def = global(1, "loop");
        assert!(!def.is_directly_recursive());
        let self_call = call(&def);
        def.set_body(Some(ReifiedScript::reify(self_call, Vec::new())));
        assert!(def.is_directly_recursive());
        def.set_body(Some(ReifiedScript::reify(Block::command("bubble"), Vec::new())));
        assert!(!def.is_directly_recursive());
    }

    #[test]
    fn purge_corpses_removes_marked_scripts() {
        let mut def = move_steps();
        let mut dead = Block::command("bubble");
        dead.is_corpse = true;
        def.scripts.push(ScriptElement::Script {
            block: dead.clone(),
            position: Default::default(),
        });
        def.set_body(Some(ReifiedScript::reify(dead, Vec::new())));
        def.purge_corpses();
        assert!(def.scripts.is_empty());
        assert!(def.body().is_none());
    }

    #[test]
    fn header_only_copy_has_no_implementation() {
        let mut def = move_steps();
        def.set_body(Some(ReifiedScript::reify(Block::command("bubble"), vec!["steps".into()])));
        let header = def.copy_and_bind_to(DefinitionId(9), Some(ReceiverId(2)), true);
        assert!(header.body().is_none());
        assert_eq!(header.declarations(), def.declarations());
        let full = def.copy_and_bind_to(DefinitionId(10), Some(ReceiverId(2)), false);
        assert_eq!(full.body().unwrap().inputs, vec!["steps"]);
        assert_eq!(full.receiver, Some(ReceiverId(2)));
    }

    #[test]
    fn menu_search_words_cover_static_and_special_menus() {
        let mut def = BlockDefinition::new(DefinitionId(1), "paint %c %k");
        def.set_header("paint %c %k", {
            let mut d = IndexMap::new();
            d.insert("c".into(), InputSlotDecl::of_type("%s").with_options("Red\nBlue"));
            d.insert("k".into(), InputSlotDecl::of_type("%s").with_options("§_keysMenu"));
            d
        });
        assert_eq!(def.menu_search_words(), "red blue keysmenu");
    }

    fn word() -> impl Strategy<Value = String> {
        prop_oneof!["[a-z]{1,6}", Just(LINE_BREAK.to_string())]
    }

    proptest! {
        #[test]
        fn add_then_remove_inputs_restores_header(
            words in proptest::collection::vec(word(), 1..5),
            names in proptest::collection::btree_set("[a-z]{1,4}", 0..4),
            n in 0usize..4,
        ) {
            let mut tokens = words;
            let mut decls = IndexMap::new();
            for name in &names {
                tokens.push(format!("%{name}"));
                decls.insert(name.clone(), InputSlotDecl::of_type("%n").with_default("1"));
            }
            let spec = tokens.join(" ");
            let mut def = BlockDefinition::with_header(DefinitionId(1), spec.clone(), decls.clone());
            let before = def.block_spec();
            def.add_inputs(n);
            prop_assert_eq!(def.input_names().len(), names.len() + n);
            def.remove_inputs(n);
            prop_assert_eq!(def.spec(), spec.as_str());
            prop_assert_eq!(def.declarations(), &decls);
            prop_assert_eq!(def.block_spec(), before);
        }
    }
}
