//! The project: receivers, definition tables and the primitive registry.
//!
//! A [`Project`] owns every [`BlockDefinition`] in one arena keyed by id.
//! Global definitions shown in the palette are listed in `global_blocks`
//! (bootstrapped ones are not); sprite-local definitions are listed by their
//! owning [`Receiver`]. Scripts live in receivers and in definitions.
//!
//! Structural edits go through the operations in this crate. Each of them
//! ends by telling the [`PaletteHost`] that its cached palette is stale.

use indexmap::{IndexMap, IndexSet};
use petgraph::graphmap::DiGraphMap;
use petgraph::visit::Dfs;
use petgraph::Direction;
use tracing::debug;

use byob_core::definition::{BlockDefinition, DefinitionResolver};
use byob_core::id::{DefinitionId, ReceiverId};
use byob_core::instance::CustomBlock;
use byob_core::registry::PrimitiveRegistry;
use byob_core::script::{Block, Input, LiteralSlot, Position, ReifiedScript, ScriptElement};
use byob_core::variables::VariableFrame;

use crate::error::EditorError;
use crate::host::{PaletteHost, RecordingHost};
use crate::settings::ProjectSettings;

/// The stage or a sprite.
#[derive(Debug, Clone, PartialEq)]
pub struct Receiver {
    pub id: ReceiverId,
    pub name: String,
    /// The sprite this one inherits methods from.
    pub exemplar: Option<ReceiverId>,
    /// Sprite-local definitions, in palette order.
    pub custom_blocks: Vec<DefinitionId>,
    pub scripts: Vec<ScriptElement>,
    /// Sprite-local variables.
    pub variables: VariableFrame,
}

impl Receiver {
    pub fn new(id: ReceiverId, name: impl Into<String>) -> Self {
        Receiver {
            id,
            name: name.into(),
            exemplar: None,
            custom_blocks: Vec::new(),
            scripts: Vec::new(),
            variables: VariableFrame::new(),
        }
    }
}

/// A node of the project-wide call graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CallNode {
    Receiver(ReceiverId),
    Definition(DefinitionId),
}

/// A project and its palette host.
#[derive(Debug)]
pub struct Project<H: PaletteHost = RecordingHost> {
    definitions: IndexMap<DefinitionId, BlockDefinition>,
    global_blocks: Vec<DefinitionId>,
    receivers: IndexMap<ReceiverId, Receiver>,
    pub registry: PrimitiveRegistry,
    /// Selectors of primitives hidden from the palette.
    pub hidden_primitives: IndexSet<String>,
    /// Names of variables hidden from the palette.
    pub hidden_variables: IndexSet<String>,
    /// Stage-level variables.
    pub global_variables: VariableFrame,
    pub settings: ProjectSettings,
    pub host: H,
    next_definition: u32,
    next_receiver: u32,
}

impl Project<RecordingHost> {
    pub fn new(settings: ProjectSettings) -> Self {
        Project::with_host(settings, RecordingHost::default())
    }
}

// ---------------------------------------------------------------------------
// Receivers and definition tables
// ---------------------------------------------------------------------------

impl<H: PaletteHost> Project<H> {
    /// An empty project with a stage.
    pub fn with_host(settings: ProjectSettings, host: H) -> Self {
        let mut receivers = IndexMap::new();
        receivers.insert(ReceiverId::STAGE, Receiver::new(ReceiverId::STAGE, "Stage"));
        Project {
            definitions: IndexMap::new(),
            global_blocks: Vec::new(),
            receivers,
            registry: PrimitiveRegistry::new(),
            hidden_primitives: IndexSet::new(),
            hidden_variables: IndexSet::new(),
            global_variables: VariableFrame::new(),
            settings,
            host,
            next_definition: 1,
            next_receiver: 1,
        }
    }

    pub fn language(&self) -> &str {
        &self.settings.language
    }

    /// Adds a sprite, optionally inheriting from `exemplar`.
    pub fn add_sprite(
        &mut self,
        name: impl Into<String>,
        exemplar: Option<ReceiverId>,
    ) -> Result<ReceiverId, EditorError> {
        if let Some(parent) = exemplar {
            self.receiver(parent)?;
        }
        let id = ReceiverId(self.next_receiver);
        self.next_receiver += 1;
        let mut sprite = Receiver::new(id, name);
        sprite.exemplar = exemplar;
        self.receivers.insert(id, sprite);
        Ok(id)
    }

    pub fn receiver(&self, id: ReceiverId) -> Result<&Receiver, EditorError> {
        self.receivers.get(&id).ok_or(EditorError::ReceiverNotFound(id))
    }

    pub fn receiver_mut(&mut self, id: ReceiverId) -> Result<&mut Receiver, EditorError> {
        self.receivers.get_mut(&id).ok_or(EditorError::ReceiverNotFound(id))
    }

    pub fn receivers(&self) -> impl Iterator<Item = &Receiver> {
        self.receivers.values()
    }

    /// Appends a top-level script to a receiver, returning its index.
    pub fn add_script(
        &mut self,
        receiver: ReceiverId,
        block: Block,
        position: Position,
    ) -> Result<usize, EditorError> {
        let scripts = &mut self.receiver_mut(receiver)?.scripts;
        scripts.push(ScriptElement::Script { block, position });
        Ok(scripts.len() - 1)
    }

    pub fn allocate_definition_id(&mut self) -> DefinitionId {
        let id = DefinitionId(self.next_definition);
        self.next_definition += 1;
        id
    }

    pub fn definition(&self, id: DefinitionId) -> Result<&BlockDefinition, EditorError> {
        self.definitions.get(&id).ok_or(EditorError::DefinitionNotFound(id))
    }

    pub fn definition_mut(&mut self, id: DefinitionId) -> Result<&mut BlockDefinition, EditorError> {
        self.definitions
            .get_mut(&id)
            .ok_or(EditorError::DefinitionNotFound(id))
    }

    /// A definition together with the registry, for binding primitives.
    pub(crate) fn definition_with_registry(
        &mut self,
        id: DefinitionId,
    ) -> Result<(&mut BlockDefinition, &PrimitiveRegistry), EditorError> {
        let def = self
            .definitions
            .get_mut(&id)
            .ok_or(EditorError::DefinitionNotFound(id))?;
        Ok((def, &self.registry))
    }

    /// Every definition in the arena, bootstrapped and superseded ones
    /// included.
    pub fn definitions(&self) -> impl Iterator<Item = &BlockDefinition> {
        self.definitions.values()
    }

    /// Files a definition under its id. Global definitions join the global
    /// palette list; local ones join their receiver's (the stage if unset).
    pub fn add_definition(&mut self, mut def: BlockDefinition) -> Result<DefinitionId, EditorError> {
        let id = def.id;
        self.next_definition = self.next_definition.max(id.0 + 1);
        if def.is_global {
            self.global_blocks.push(id);
        } else {
            let owner = *def.receiver.get_or_insert(ReceiverId::STAGE);
            self.receiver_mut(owner)?.custom_blocks.push(id);
        }
        self.definitions.insert(id, def);
        Ok(id)
    }

    /// Drops a definition from the arena and every table listing it.
    pub(crate) fn remove_definition(&mut self, id: DefinitionId) -> Option<BlockDefinition> {
        self.global_blocks.retain(|each| *each != id);
        for receiver in self.receivers.values_mut() {
            receiver.custom_blocks.retain(|each| *each != id);
        }
        self.definitions.shift_remove(&id)
    }

    /// Takes a global definition out of the palette list, keeping it in the
    /// arena for the calls still bound to it.
    pub(crate) fn unlist_global(&mut self, id: DefinitionId) -> bool {
        let before = self.global_blocks.len();
        self.global_blocks.retain(|each| *each != id);
        before != self.global_blocks.len()
    }

    /// Takes a local definition out of its receiver's palette list.
    pub(crate) fn unlist_local(&mut self, receiver: ReceiverId, id: DefinitionId) -> bool {
        let Some(owner) = self.receivers.get_mut(&receiver) else {
            return false;
        };
        let before = owner.custom_blocks.len();
        owner.custom_blocks.retain(|each| *each != id);
        before != owner.custom_blocks.len()
    }

    pub(crate) fn list_global(&mut self, id: DefinitionId) {
        if !self.global_blocks.contains(&id) {
            self.global_blocks.push(id);
        }
    }

    /// Ids of the global definitions shown in the palette.
    pub fn global_blocks(&self) -> &[DefinitionId] {
        &self.global_blocks
    }

    pub fn global_definitions(&self) -> impl Iterator<Item = &BlockDefinition> {
        self.global_blocks
            .iter()
            .filter_map(|id| self.definitions.get(id))
    }

    pub fn local_definitions(&self, receiver: ReceiverId) -> Result<Vec<&BlockDefinition>, EditorError> {
        Ok(self
            .receiver(receiver)?
            .custom_blocks
            .iter()
            .filter_map(|id| self.definitions.get(id))
            .collect())
    }

    /// The receiver's own definition with this semantic spec.
    pub fn get_local_method(&self, receiver: ReceiverId, spec: &str) -> Option<&BlockDefinition> {
        self.receivers
            .get(&receiver)?
            .custom_blocks
            .iter()
            .filter_map(|id| self.definitions.get(id))
            .find(|def| def.block_spec() == spec)
    }

    /// The definition a local call with this semantic spec resolves to,
    /// searching the receiver and then its exemplar chain.
    pub fn get_method(&self, receiver: ReceiverId, spec: &str) -> Option<&BlockDefinition> {
        self.lineage(receiver)
            .into_iter()
            .find_map(|each| self.get_local_method(each, spec))
    }

    /// Header-only copies of the methods a sprite inherits and does not
    /// shadow, nearest exemplar first.
    pub fn inherited_methods(&self, receiver: ReceiverId) -> Vec<BlockDefinition> {
        let mut seen: Vec<String> = Vec::new();
        let mut headers = Vec::new();
        for (depth, each) in self.lineage(receiver).into_iter().enumerate() {
            for def in self.local_definitions(each).unwrap_or_default() {
                let spec = def.block_spec();
                if seen.contains(&spec) {
                    continue;
                }
                seen.push(spec);
                if depth > 0 {
                    headers.push(def.copy_and_bind_to(def.id, Some(receiver), true));
                }
            }
        }
        headers
    }

    /// The receiver followed by its exemplar chain. Cycles end the chain.
    pub fn lineage(&self, receiver: ReceiverId) -> Vec<ReceiverId> {
        let mut chain = Vec::new();
        let mut current = self.receivers.get(&receiver);
        while let Some(each) = current {
            if chain.contains(&each.id) {
                break;
            }
            chain.push(each.id);
            current = each.exemplar.and_then(|parent| self.receivers.get(&parent));
        }
        chain
    }

    /// Receivers whose local calls with `spec` resolve to `def`.
    pub fn local_scope(&self, def: &BlockDefinition, spec: &str) -> Vec<ReceiverId> {
        let Some(owner) = def.receiver else {
            return Vec::new();
        };
        self.receivers
            .keys()
            .copied()
            .filter(|each| {
                for step in self.lineage(*each) {
                    if step == owner {
                        return true;
                    }
                    if self.get_local_method(step, spec).is_some_and(|m| m.id != def.id) {
                        return false;
                    }
                }
                false
            })
            .collect()
    }

    /// Definitions in the same scope as `id` with the same semantic spec.
    pub fn double_definitions_for(&self, id: DefinitionId) -> Result<Vec<DefinitionId>, EditorError> {
        let def = self.definition(id)?;
        let spec = def.block_spec();
        let siblings: Vec<&BlockDefinition> = if def.is_global {
            self.global_definitions().collect()
        } else {
            match def.receiver {
                Some(owner) => self.local_definitions(owner)?,
                None => Vec::new(),
            }
        };
        Ok(siblings
            .into_iter()
            .filter(|other| other.id != id && other.block_spec() == spec)
            .map(|other| other.id)
            .collect())
    }

    /// Tells the host that the palette is stale.
    pub(crate) fn invalidate_palette(&mut self) {
        debug!("flushing palette cache");
        self.host.flush_palette_cache();
        self.host.refresh_empty_categories();
        if self.settings.refresh_palette {
            self.host.refresh_palette();
        }
    }
}

impl<H: PaletteHost> DefinitionResolver for Project<H> {
    fn definition(&self, id: DefinitionId) -> Option<&BlockDefinition> {
        self.definitions.get(&id)
    }

    fn method(&self, receiver: ReceiverId, spec: &str) -> Option<&BlockDefinition> {
        self.get_method(receiver, spec)
    }
}

// ---------------------------------------------------------------------------
// Instance propagation
// ---------------------------------------------------------------------------

/// Refreshes matching instances in a scripting area. Displaced slot
/// contents become loose scripts next to the script they came from.
/// Standalone instances whose shape changed are rebuilt in the new shape
/// and keep their slot contents.
fn refresh_area(
    elements: &mut Vec<ScriptElement>,
    def: &BlockDefinition,
    language: &str,
    relocation: (f64, f64),
    is_match: &dyn Fn(&CustomBlock) -> bool,
) -> usize {
    let mut count = 0;
    let mut loose = Vec::new();
    for element in elements.iter_mut() {
        let position = element.position();
        let Some(root) = element.block_mut() else { continue };
        let replace = root.next.is_none()
            && root
                .as_custom()
                .is_some_and(|c| is_match(c) && c.kind.is_major_change_to(def.kind));
        let mut displaced = Vec::new();
        root.for_each_mut(&mut |block: &mut Block| {
            if block.as_custom().is_some_and(|c| is_match(c)) {
                count += 1;
                displaced.extend(block.refresh(def, language, None));
            }
        });
        if replace {
            // The refreshed slots already fit the definition; only the
            // shape of the root changes.
            let mut fresh = def.block_instance(language);
            fresh.inputs = std::mem::take(&mut root.inputs);
            if let (Some(new), Some(old)) = (fresh.as_custom_mut(), root.as_custom()) {
                new.variables = old.variables.clone();
            }
            *root = fresh;
        }
        loose.extend(displaced.into_iter().enumerate().map(|(k, block)| {
            let step = (k + 1) as f64;
            ScriptElement::Script {
                block,
                position: position.offset(relocation.0 * step, relocation.1 * step),
            }
        }));
    }
    elements.extend(loose);
    count
}

/// Removes matching blocks from a stack. Command instances are spliced
/// out; reporter instances leave an empty slot behind.
fn strip_stack(
    stack: Option<Box<Block>>,
    is_match: &dyn Fn(&CustomBlock) -> bool,
    count: &mut usize,
) -> Option<Box<Block>> {
    let mut block = stack?;
    if block.as_custom().is_some_and(|c| is_match(c)) {
        *count += 1;
        return strip_stack(block.next.take(), is_match, count);
    }
    for input in &mut block.inputs {
        strip_input(input, is_match, count);
    }
    block.next = strip_stack(block.next.take(), is_match, count);
    Some(block)
}

fn strip_input(input: &mut Input, is_match: &dyn Fn(&CustomBlock) -> bool, count: &mut usize) {
    match input {
        Input::Reporter(reporter) => {
            if reporter.as_custom().is_some_and(|c| is_match(c)) {
                *count += 1;
                *input = Input::Literal(LiteralSlot::default());
            } else {
                for inner in &mut reporter.inputs {
                    strip_input(inner, is_match, count);
                }
            }
        }
        Input::Commands(stack) | Input::Ring(stack) => {
            *stack = strip_stack(stack.take(), is_match, count);
        }
        Input::Multi(multi) => {
            for item in &mut multi.items {
                strip_input(item, is_match, count);
            }
        }
        _ => {}
    }
}

fn strip_area(elements: &mut Vec<ScriptElement>, is_match: &dyn Fn(&CustomBlock) -> bool) -> usize {
    let mut count = 0;
    let old = std::mem::take(elements);
    for element in old {
        match element {
            ScriptElement::Script { block, position } => {
                if let Some(kept) = strip_stack(Some(Box::new(block)), is_match, &mut count) {
                    elements.push(ScriptElement::Script {
                        block: *kept,
                        position,
                    });
                }
            }
            comment => elements.push(comment),
        }
    }
    count
}

impl<H: PaletteHost> Project<H> {
    /// Refreshes every instance matched by `is_match` against `def`, in
    /// receiver scripts and in definition scripts and bodies. The matcher
    /// gets the receiver owning the scripting area.
    pub(crate) fn refresh_matching(
        &mut self,
        def: &BlockDefinition,
        is_match: impl Fn(Option<ReceiverId>, &CustomBlock) -> bool,
    ) -> usize {
        let language = self.settings.language.clone();
        let relocation = self.settings.relocation_offset;
        let mut count = 0;

        for receiver in self.receivers.values_mut() {
            let owner = Some(receiver.id);
            count += refresh_area(&mut receiver.scripts, def, &language, relocation, &|c: &CustomBlock| {
                is_match(owner, c)
            });
        }
        for other in self.definitions.values_mut() {
            let owner = other.receiver;
            let matcher = |c: &CustomBlock| is_match(owner, c);
            count += refresh_area(&mut other.scripts, def, &language, relocation, &matcher);

            let Some(mut body) = other.body().cloned() else { continue };
            let mut hits = 0;
            let mut displaced = Vec::new();
            body.expression.for_each_mut(&mut |block: &mut Block| {
                if block.as_custom().is_some_and(|c| matcher(c)) {
                    hits += 1;
                    displaced.extend(block.refresh(def, &language, None));
                }
            });
            if hits > 0 {
                count += hits;
                other.set_body(Some(body));
                let mut position = Position::default();
                for block in displaced {
                    position = position.offset(relocation.0, relocation.1);
                    other.scripts.push(ScriptElement::Script { block, position });
                }
            }
        }
        debug!(definition = %def.id, refreshed = count, "refreshed block instances");
        count
    }

    /// Deletes every instance matched by `is_match`.
    pub(crate) fn delete_matching(
        &mut self,
        is_match: impl Fn(Option<ReceiverId>, &CustomBlock) -> bool,
    ) -> usize {
        let mut count = 0;
        for receiver in self.receivers.values_mut() {
            let owner = Some(receiver.id);
            count += strip_area(&mut receiver.scripts, &|c: &CustomBlock| is_match(owner, c));
        }
        for other in self.definitions.values_mut() {
            let owner = other.receiver;
            let matcher = |c: &CustomBlock| is_match(owner, c);
            count += strip_area(&mut other.scripts, &matcher);
            let Some(body) = other.body().cloned() else { continue };
            let inputs = body.inputs.clone();
            let mut hits = 0;
            let kept = strip_stack(Some(Box::new(body.expression)), &matcher, &mut hits);
            if hits > 0 {
                count += hits;
                other.set_body(kept.map(|expression| ReifiedScript::reify(*expression, inputs)));
            }
        }
        count
    }

    /// Re-synchronizes every instance of a definition after its header
    /// changed. Global instances are found by identity, local ones by the
    /// semantic spec they had before the change.
    pub fn refresh_all_instances(&mut self, id: DefinitionId, old_spec: &str) -> Result<usize, EditorError> {
        let def = self.definition(id)?.clone();
        let count = if def.is_global {
            self.refresh_matching(&def, |_, c| c.is_global && c.definition == Some(id))
        } else {
            let scope = self.local_scope(&def, old_spec);
            self.refresh_matching(&def, |owner, c| {
                !c.is_global
                    && c.semantic_spec == old_spec
                    && owner.is_some_and(|r| scope.contains(&r))
            })
        };
        Ok(count)
    }

    /// Resolves a custom call found in an area owned by `owner`.
    pub fn resolve_call(&self, owner: Option<ReceiverId>, call: &CustomBlock) -> Option<DefinitionId> {
        if call.is_global {
            call.definition
        } else {
            owner
                .and_then(|r| self.get_method(r, &call.semantic_spec))
                .map(|def| def.id)
        }
    }

    // -- usage ---------------------------------------------------------------

    fn calls_from<'a>(
        &self,
        roots: impl Iterator<Item = &'a Block>,
        owner: Option<ReceiverId>,
    ) -> Vec<DefinitionId> {
        let mut calls = Vec::new();
        for root in roots {
            root.for_each(&mut |block: &Block| {
                if let Some(id) = block.as_custom().and_then(|c| self.resolve_call(owner, c)) {
                    calls.push(id);
                }
            });
        }
        calls
    }

    /// The call graph: edges from every receiver and definition to the
    /// definitions its scripts call.
    pub fn call_graph(&self) -> DiGraphMap<CallNode, ()> {
        let mut graph = DiGraphMap::new();
        for receiver in self.receivers.values() {
            let from = graph.add_node(CallNode::Receiver(receiver.id));
            let roots = receiver.scripts.iter().filter_map(ScriptElement::block);
            for callee in self.calls_from(roots, Some(receiver.id)) {
                graph.add_edge(from, CallNode::Definition(callee), ());
            }
        }
        for def in self.definitions.values() {
            let from = graph.add_node(CallNode::Definition(def.id));
            let roots = def
                .scripts
                .iter()
                .filter_map(ScriptElement::block)
                .chain(def.body().map(|b| &b.expression));
            for callee in self.calls_from(roots, def.receiver) {
                graph.add_edge(from, CallNode::Definition(callee), ());
            }
        }
        graph
    }

    /// Whether anything other than the definition itself calls it.
    pub fn is_in_use(&self, id: DefinitionId) -> Result<bool, EditorError> {
        self.definition(id)?;
        let node = CallNode::Definition(id);
        let graph = self.call_graph();
        Ok(graph.contains_node(node)
            && graph
                .neighbors_directed(node, Direction::Incoming)
                .any(|caller| caller != node))
    }

    /// Global palette definitions no receiver script reaches, directly or
    /// through other definitions.
    pub fn unused_global_blocks(&self) -> Vec<DefinitionId> {
        let graph = self.call_graph();
        let mut reached = IndexSet::new();
        for receiver in self.receivers.keys() {
            let mut dfs = Dfs::new(&graph, CallNode::Receiver(*receiver));
            while let Some(node) = dfs.next(&graph) {
                if let CallNode::Definition(id) = node {
                    reached.insert(id);
                }
            }
        }
        self.global_blocks
            .iter()
            .copied()
            .filter(|id| !reached.contains(id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byob_core::definition::BlockType;

    fn global(project: &mut Project, spec: &str) -> DefinitionId {
        let id = project.allocate_definition_id();
        let mut def = BlockDefinition::new(id, spec);
        def.is_global = true;
        project.add_definition(def).unwrap()
    }

    fn local(project: &mut Project, owner: ReceiverId, spec: &str) -> DefinitionId {
        let id = project.allocate_definition_id();
        let mut def = BlockDefinition::new(id, spec);
        def.receiver = Some(owner);
        project.add_definition(def).unwrap()
    }

    fn call(project: &Project, id: DefinitionId) -> Block {
        project.definition(id).unwrap().block_instance("en")
    }

    #[test]
    fn methods_resolve_through_the_exemplar_chain() {
        let mut project = Project::new(ProjectSettings::default());
        let parent = project.add_sprite("parent", None).unwrap();
        let child = project.add_sprite("child", Some(parent)).unwrap();
        let jump = local(&mut project, parent, "jump");

        assert_eq!(project.get_method(child, "jump").map(|d| d.id), Some(jump));
        assert!(project.get_local_method(child, "jump").is_none());
        let inherited = project.inherited_methods(child);
        assert_eq!(inherited.len(), 1);
        assert!(inherited[0].body().is_none());
        assert_eq!(project.local_scope(project.definition(jump).unwrap(), "jump"), vec![parent, child]);
    }

    #[test]
    fn shadowing_methods_narrow_the_scope() {
        let mut project = Project::new(ProjectSettings::default());
        let parent = project.add_sprite("parent", None).unwrap();
        let child = project.add_sprite("child", Some(parent)).unwrap();
        let jump = local(&mut project, parent, "jump");
        let own = local(&mut project, child, "jump");
        assert_eq!(project.get_method(child, "jump").map(|d| d.id), Some(own));
        assert_eq!(project.local_scope(project.definition(jump).unwrap(), "jump"), vec![parent]);
    }

    #[test]
    fn doubles_are_found_within_scope() {
        let mut project = Project::new(ProjectSettings::default());
        let a = global(&mut project, "foo");
        let b = global(&mut project, "foo");
        let sprite = project.add_sprite("s", None).unwrap();
        local(&mut project, sprite, "foo");
        assert_eq!(project.double_definitions_for(a).unwrap(), vec![b]);
    }

    #[test]
    fn refresh_relocates_displaced_reporters() {
        let mut project = Project::new(ProjectSettings::default());
        let sprite = project.add_sprite("s", None).unwrap();
        let id = global(&mut project, "say %msg");
        let mut block = call(&project, id);
        block.inputs[0] = Input::reporter(Block::variable("x"));
        project.add_script(sprite, block, Position::new(100.0, 50.0)).unwrap();

        let def = project.definition_mut(id).unwrap();
        let old = def.block_spec();
        def.set_header("say", IndexMap::new());
        assert_eq!(project.refresh_all_instances(id, &old).unwrap(), 1);

        let scripts = &project.receiver(sprite).unwrap().scripts;
        assert_eq!(scripts.len(), 2);
        assert!(scripts[0].block().unwrap().inputs.is_empty());
        assert_eq!(scripts[1].block(), Some(&Block::variable("x")));
        assert_eq!(scripts[1].position(), Position::new(120.0, 70.0));
    }

    #[test]
    fn standalone_instances_changing_shape_are_replaced() {
        let mut project = Project::new(ProjectSettings::default());
        let id = global(&mut project, "value");
        project.add_script(ReceiverId::STAGE, call(&project, id), Position::default()).unwrap();
        let nested = Block::command("bubble").with_inputs(vec![Input::reporter(call(&project, id))]);
        project.add_script(ReceiverId::STAGE, nested, Position::default()).unwrap();

        project.definition_mut(id).unwrap().kind = BlockType::Reporter;
        project.refresh_all_instances(id, "value").unwrap();

        let scripts = &project.receiver(ReceiverId::STAGE).unwrap().scripts;
        assert_eq!(scripts[0].block().unwrap().as_custom().unwrap().kind, BlockType::Reporter);
        let Input::Reporter(inner) = &scripts[1].block().unwrap().inputs[0] else {
            panic!("reporter expected")
        };
        assert_eq!(inner.as_custom().unwrap().kind, BlockType::Command);
    }

    #[test]
    fn reshaped_standalone_instances_keep_their_inputs() {
        let mut project = Project::new(ProjectSettings::default());
        let id = global(&mut project, "go %n");
        let mut block = call(&project, id);
        block.inputs[0] = Input::reporter(Block::variable("x"));
        project.add_script(ReceiverId::STAGE, block, Position::default()).unwrap();

        let def = project.definition_mut(id).unwrap();
        def.kind = BlockType::Reporter;
        let old = def.block_spec();
        assert_eq!(project.refresh_all_instances(id, &old).unwrap(), 1);

        let scripts = &project.receiver(ReceiverId::STAGE).unwrap().scripts;
        assert_eq!(scripts.len(), 1);
        let root = scripts[0].block().unwrap();
        assert_eq!(root.as_custom().unwrap().kind, BlockType::Reporter);
        assert_eq!(root.inputs, vec![Input::reporter(Block::variable("x"))]);
    }

    #[test]
    fn local_instances_refresh_by_old_spec_within_scope() {
        let mut project = Project::new(ProjectSettings::default());
        let a = project.add_sprite("a", None).unwrap();
        let b = project.add_sprite("b", None).unwrap();
        let jump_a = local(&mut project, a, "jump");
        local(&mut project, b, "jump");
        project.add_script(a, call(&project, jump_a), Position::default()).unwrap();
        let other = call(&project, jump_a);
        project.add_script(b, other, Position::default()).unwrap();

        project.definition_mut(jump_a).unwrap().set_spec("hop");
        assert_eq!(project.refresh_all_instances(jump_a, "jump").unwrap(), 1);
        let spec_in = |r: ReceiverId| {
            project.receiver(r).unwrap().scripts[0]
                .block()
                .unwrap()
                .as_custom()
                .unwrap()
                .semantic_spec
                .clone()
        };
        assert_eq!(spec_in(a), "hop");
        assert_eq!(spec_in(b), "jump");
    }

    #[test]
    fn unused_blocks_follow_the_call_graph() {
        let mut project = Project::new(ProjectSettings::default());
        let used = global(&mut project, "used");
        let helper = global(&mut project, "helper");
        let orphan = global(&mut project, "orphan");
        let body = call(&project, helper);
        project
            .definition_mut(used)
            .unwrap()
            .set_body(Some(ReifiedScript::reify(body, Vec::new())));
        project.add_script(ReceiverId::STAGE, call(&project, used), Position::default()).unwrap();

        assert_eq!(project.unused_global_blocks(), vec![orphan]);
        assert!(project.is_in_use(helper).unwrap());
        assert!(!project.is_in_use(orphan).unwrap());
    }

    #[test]
    fn recursion_alone_is_not_use() {
        let mut project = Project::new(ProjectSettings::default());
        let id = global(&mut project, "loop");
        let body = call(&project, id);
        project
            .definition_mut(id)
            .unwrap()
            .set_body(Some(ReifiedScript::reify(body, Vec::new())));
        assert!(!project.is_in_use(id).unwrap());
    }

    #[test]
    fn delete_matching_splices_commands_and_empties_slots() {
        let mut project = Project::new(ProjectSettings::default());
        let id = global(&mut project, "gone");
        let script = Block::command("first")
            .then(call(&project, id))
            .then(Block::command("last"));
        project.add_script(ReceiverId::STAGE, script, Position::default()).unwrap();
        let lone = call(&project, id);
        project.add_script(ReceiverId::STAGE, lone, Position::default()).unwrap();

        let removed = project.delete_matching(|_, c| c.definition == Some(id));
        assert_eq!(removed, 2);
        let scripts = &project.receiver(ReceiverId::STAGE).unwrap().scripts;
        assert_eq!(scripts.len(), 1);
        let root = scripts[0].block().unwrap();
        assert_eq!(root.next.as_deref().and_then(Block::selector), Some("last"));
    }
}
