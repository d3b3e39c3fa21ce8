//! Creating, copying, deleting and relabelling custom blocks, and taking
//! over built-in primitives.

use indexmap::IndexMap;
use tracing::{debug, info};

use byob_core::definition::{BlockDefinition, BlockType};
use byob_core::id::{DefinitionId, ReceiverId};
use byob_core::script::{Block, Input, ReifiedScript, ScriptElement, DO_PRIMITIVE, RECEIVE_SLOT_EVENT};
use byob_core::slot::{InputSlotDecl, SlotType};
use byob_core::spec;

use crate::error::EditorError;
use crate::host::{PaletteHost, ProcessHandle, Scheduler};
use crate::project::Project;

/// A block an instance can be relabelled to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Alternative {
    Definition(DefinitionId),
    /// A built-in; new input `i` takes old input `i + shift`.
    Primitive { selector: String, shift: isize },
}

impl<H: PaletteHost> Project<H> {
    /// Appends " (2)", " (3)", ... to a definition's spec until no other
    /// definition in its scope shares the semantic spec.
    pub(crate) fn disambiguate(&mut self, id: DefinitionId) -> Result<(), EditorError> {
        let base = self.definition(id)?.spec().to_string();
        let mut count = 1;
        while !self.double_definitions_for(id)?.is_empty() {
            count += 1;
            self.definition_mut(id)?.set_spec(format!("{base} ({count})"));
        }
        Ok(())
    }

    /// The "make a block" workflow. Inputs named in `spec` are declared as
    /// plain `%s` slots.
    pub fn new_block(
        &mut self,
        spec: &str,
        kind: BlockType,
        category: &str,
        is_global: bool,
        receiver: ReceiverId,
    ) -> Result<DefinitionId, EditorError> {
        self.receiver(receiver)?;
        let id = self.allocate_definition_id();
        let mut def = BlockDefinition::new(id, spec);
        let declarations: IndexMap<String, InputSlotDecl> = def
            .input_names()
            .into_iter()
            .map(|name| (name, InputSlotDecl::of_type(SlotType::any())))
            .collect();
        def.set_header(spec, declarations);
        def.kind = kind;
        def.category = category.to_string();
        def.is_global = is_global;
        if !is_global {
            def.receiver = Some(receiver);
        }
        self.add_definition(def)?;
        self.disambiguate(id)?;
        self.invalidate_palette();
        info!(definition = %id, %spec, is_global, "created block definition");
        Ok(id)
    }

    /// Copies a definition into the same scope under a unique spec.
    /// Recursive calls in the copy call the copy.
    pub fn duplicate_block_definition(&mut self, id: DefinitionId) -> Result<DefinitionId, EditorError> {
        let new_id = self.allocate_definition_id();
        let original = self.definition(id)?;
        let old_spec = original.block_spec();
        let copy = original.copy_and_bind_to(new_id, original.receiver, false);
        self.add_definition(copy)?;
        self.disambiguate(new_id)?;

        let language = self.settings.language.clone();
        let template = self.definition(new_id)?.clone();
        let is_recursive_call = |block: &Block| {
            block.as_custom().is_some_and(|c| {
                if c.is_global {
                    c.definition == Some(id)
                } else {
                    c.semantic_spec == old_spec
                }
            })
        };
        let def = self.definition_mut(new_id)?;
        let mut displaced = Vec::new();
        if let Some(mut body) = def.body().cloned() {
            body.expression.for_each_mut(&mut |block: &mut Block| {
                if is_recursive_call(block) {
                    displaced.extend(block.refresh(&template, &language, None));
                }
            });
            def.set_body(Some(body));
        }
        for element in def.scripts.iter_mut() {
            if let Some(root) = element.block_mut() {
                root.for_each_mut(&mut |block: &mut Block| {
                    if is_recursive_call(block) {
                        displaced.extend(block.refresh(&template, &language, None));
                    }
                });
            }
        }
        def.scripts.extend(displaced.into_iter().map(|block| ScriptElement::Script {
            block,
            position: Default::default(),
        }));

        self.invalidate_palette();
        info!(definition = %id, copy = %new_id, "duplicated block definition");
        Ok(new_id)
    }

    /// Deletes a definition and every instance of it. Deleting a
    /// bootstrapped definition only restores the primitive.
    pub fn delete_block_definition(&mut self, id: DefinitionId) -> Result<(), EditorError> {
        let def = self.definition(id)?.clone();
        if def.is_bootstrapped(&self.registry) {
            return self.restore_primitive(id);
        }
        let spec = def.block_spec();
        let scope = if def.is_global {
            Vec::new()
        } else {
            self.local_scope(&def, &spec)
        };
        let removed = if def.is_global {
            self.delete_matching(|_, c| c.is_global && c.definition == Some(id))
        } else {
            self.delete_matching(|owner, c| {
                !c.is_global && c.semantic_spec == spec && owner.is_some_and(|r| scope.contains(&r))
            })
        };
        self.remove_definition(id);
        for receiver in scope {
            let Some(inherited) = self.get_method(receiver, &spec).cloned() else { continue };
            self.refresh_matching(&inherited, |owner, c| {
                !c.is_global && c.semantic_spec == spec && owner == Some(receiver)
            });
        }
        self.invalidate_palette();
        info!(definition = %id, %spec, instances = removed, "deleted block definition");
        Ok(())
    }

    /// Replaces the definitions sharing this one's spec and scope, rebinding
    /// their instances to it. Returns how many were replaced.
    pub fn replace_double_definitions_for(&mut self, id: DefinitionId) -> Result<usize, EditorError> {
        let survivor = self.definition(id)?.clone();
        let doubles = self.double_definitions_for(id)?;
        for double in &doubles {
            let double = *double;
            self.refresh_matching(&survivor, |_, c| c.is_global && c.definition == Some(double));
            self.remove_definition(double);
        }
        if !survivor.is_global {
            let spec = survivor.block_spec();
            let scope = self.local_scope(&survivor, &spec);
            self.refresh_matching(&survivor, |owner, c| {
                !c.is_global && c.semantic_spec == spec && owner.is_some_and(|r| scope.contains(&r))
            });
        }
        self.invalidate_palette();
        info!(definition = %id, replaced = doubles.len(), "consolidated same-named blocks");
        Ok(doubles.len())
    }

    // -- relabelling -------------------------------------------------------------

    /// The blocks `block` can be relabelled to from `receiver`: definitions
    /// of the same shape that are neither helpers nor the block itself, and
    /// for a primitive-bound global block the primitive's alternatives that
    /// are not hidden.
    pub fn alternatives(&self, block: &Block, receiver: ReceiverId) -> Result<Vec<Alternative>, EditorError> {
        let call = block
            .as_custom()
            .ok_or_else(|| EditorError::NotACustomBlock(block.selector().unwrap_or_default().to_string()))?;
        let current = self.resolve_call(Some(receiver), call);

        let mut candidates: Vec<&BlockDefinition> = self.global_definitions().collect();
        for step in self.lineage(receiver) {
            candidates.extend(self.local_definitions(step)?);
        }
        let mut alternatives: Vec<Alternative> = candidates
            .into_iter()
            .filter(|def| def.kind == call.kind && !def.is_helper && Some(def.id) != current)
            .map(|def| Alternative::Definition(def.id))
            .collect();

        let bound = current
            .and_then(|id| self.definitions().find(|def| def.id == id))
            .filter(|def| def.is_global)
            .and_then(|def| def.primitive())
            .and_then(|selector| self.registry.get(selector));
        if let Some(primitive) = bound {
            alternatives.extend(
                primitive
                    .alternatives
                    .iter()
                    .filter(|(selector, _)| !self.hidden_primitives.contains(selector))
                    .map(|(selector, shift)| Alternative::Primitive {
                        selector: selector.clone(),
                        shift: *shift,
                    }),
            );
        }
        Ok(alternatives)
    }

    /// Relabels `block` in place. Returns the blocks that no longer fit.
    pub fn relabel(&self, block: &mut Block, to: &Alternative) -> Result<Vec<Block>, EditorError> {
        match to {
            Alternative::Definition(id) => {
                let def = self.definition(*id)?;
                Ok(block.relabel_to(def, &self.settings.language, 0))
            }
            Alternative::Primitive { selector, shift } => {
                let primitive = self
                    .registry
                    .get(selector)
                    .ok_or_else(|| EditorError::UnknownPrimitive(selector.clone()))?;
                Ok(block.relabel_to_primitive(selector, &primitive.spec, primitive.kind, *shift))
            }
        }
    }

    /// Relabels the root block of a receiver's script. Displaced blocks
    /// become loose scripts next to it.
    pub fn relabel_script(
        &mut self,
        receiver: ReceiverId,
        index: usize,
        to: &Alternative,
    ) -> Result<usize, EditorError> {
        let scripts = &self.receiver(receiver)?.scripts;
        let len = scripts.len();
        let element = scripts.get(index).ok_or(EditorError::ScriptNotFound { index, len })?;
        let position = element.position();
        let Some(mut root) = element.block().cloned() else {
            return Err(EditorError::NotACustomBlock("comment".to_string()));
        };
        let displaced = self.relabel(&mut root, to)?;
        let (dx, dy) = self.settings.relocation_offset;
        let count = displaced.len();

        let scripts = &mut self.receiver_mut(receiver)?.scripts;
        scripts[index] = ScriptElement::Script { block: root, position };
        for (k, block) in displaced.into_iter().enumerate() {
            let step = (k + 1) as f64;
            scripts.push(ScriptElement::Script {
                block,
                position: position.offset(dx * step, dy * step),
            });
        }
        Ok(count)
    }

    // -- primitives --------------------------------------------------------------

    /// Lets a global definition with a selector take over that built-in.
    /// Selectors the registry does not list are ignored.
    pub fn bootstrap(&mut self, id: DefinitionId) -> Result<bool, EditorError> {
        let def = self.definition(id)?;
        let Some(selector) = def.selector.clone().filter(|_| def.is_global) else {
            debug!(definition = %id, "not bootstrapping a block without selector");
            return Ok(false);
        };
        if !self.registry.register(&selector, id) {
            debug!(definition = %id, %selector, "no such primitive to bootstrap");
            return Ok(false);
        }
        self.unlist_global(id);
        self.invalidate_palette();
        info!(definition = %id, %selector, "bootstrapped primitive");
        Ok(true)
    }

    /// Gives a bootstrapped primitive back its built-in behavior. The
    /// definition returns to the palette.
    pub fn restore_primitive(&mut self, id: DefinitionId) -> Result<(), EditorError> {
        let def = self.definition(id)?;
        if !def.is_bootstrapped(&self.registry) {
            return Ok(());
        }
        if let Some(selector) = def.selector.clone() {
            self.registry.unregister(&selector);
            info!(definition = %id, %selector, "restored primitive");
        }
        self.list_global(id);
        self.invalidate_palette();
        Ok(())
    }

    /// Creates a global definition that looks like the built-in `selector`
    /// and delegates to it, then bootstraps it.
    pub fn customize_primitive(&mut self, selector: &str) -> Result<DefinitionId, EditorError> {
        let primitive = self
            .registry
            .get(selector)
            .ok_or_else(|| EditorError::UnknownPrimitive(selector.to_string()))?
            .clone();

        let mut declarations = IndexMap::new();
        let mut tokens = Vec::new();
        let mut idx = 0;
        for token in spec::split_block_spec(&primitive.spec) {
            if !spec::is_input_token(token) {
                tokens.push(token.to_string());
                continue;
            }
            let name = format!("#{}", idx + 1);
            let mut decl = BlockDefinition::declaration_for(&primitive.slot_shape(idx));
            decl.default = primitive.defaults.get(idx).cloned().unwrap_or_default();
            tokens.push(spec::input_token(&name));
            declarations.insert(name, decl);
            idx += 1;
        }

        let id = self.allocate_definition_id();
        let mut def = BlockDefinition::with_header(id, tokens.join(" "), declarations);
        def.kind = primitive.kind;
        def.category = primitive.category.clone();
        def.is_global = true;
        def.selector = Some(selector.to_string());
        let body = Block::command(DO_PRIMITIVE).with_inputs(vec![Input::Boolean(Some(true)), Input::text(selector)]);
        def.set_body_expression(Some(body), &self.registry);
        self.add_definition(def)?;
        self.bootstrap(id)?;
        info!(definition = %id, %selector, "customized primitive");
        Ok(id)
    }

    // -- slot events -------------------------------------------------------------

    /// Launches every `receiveSlotEvent(<input>, "edited")` helper script
    /// of the block's definition as its own process, with the block's
    /// inputs bound by name. Nothing is awaited.
    pub fn fire_slot_edited_event(
        &self,
        block: &Block,
        receiver: ReceiverId,
        slot: usize,
        scheduler: &mut impl Scheduler,
    ) -> Result<Vec<ProcessHandle>, EditorError> {
        let call = block
            .as_custom()
            .ok_or_else(|| EditorError::NotACustomBlock(block.selector().unwrap_or_default().to_string()))?;
        let Some(id) = self.resolve_call(Some(receiver), call) else {
            return Ok(Vec::new());
        };
        let def = self.definition(id)?;
        let Some(name) = def.input_name_at(slot) else {
            return Ok(Vec::new());
        };
        let names = def.input_names();
        let mut bindings = block.input_values(&names);
        bindings.merge(&call.variables);

        let handles: Vec<ProcessHandle> = def
            .scripts
            .iter()
            .filter_map(ScriptElement::block)
            .filter(|hat| hat.selector() == Some(RECEIVE_SLOT_EVENT))
            .filter(|hat| hat.inputs.first().and_then(Input::literal) == Some(name.as_str()))
            .filter(|hat| hat.inputs.get(1).and_then(Input::literal) == Some("edited"))
            .map(|hat| {
                let script = ReifiedScript::reify(hat.clone(), names.clone());
                scheduler.start_process(script, receiver, bindings.clone())
            })
            .collect();
        debug!(definition = %id, input = %name, launched = handles.len(), "fired slot edited event");
        Ok(handles)
    }
}
