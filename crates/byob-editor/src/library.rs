//! Export, import, unused-block removal and palette visibility.
//!
//! Each workflow is a picker: it computes a candidate set and an initial
//! selection, lets the caller toggle entries, and applies the final
//! selection in one step.

use indexmap::IndexSet;
use tracing::info;

use byob_core::definition::BlockDefinition;
use byob_core::id::{DefinitionId, ReceiverId};
use byob_core::script::{Block, BlockKind, ScriptElement};
use byob_core::variables::VariableFrame;
use byob_storage::LibraryBundle;

use crate::error::EditorError;
use crate::host::PaletteHost;
use crate::project::Project;

/// Dependencies of `id` that are not bootstrapped.
fn dependencies_of<H: PaletteHost>(
    project: &Project<H>,
    id: DefinitionId,
    receiver: ReceiverId,
) -> Result<Vec<DefinitionId>, EditorError> {
    let def = project.definition(id)?;
    let mut excluding = project.registry.delegates();
    let mut result = Vec::new();
    def.collect_dependencies(&mut excluding, &mut result, project, Some(receiver))?;
    Ok(result)
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

/// Picks definitions and the variables they read for a library bundle.
#[derive(Debug, Clone)]
pub struct ExportPicker {
    pub receiver: ReceiverId,
    candidates: Vec<DefinitionId>,
    selected: IndexSet<DefinitionId>,
    /// Sprite variables read by the selection.
    pub local_variables: Vec<String>,
    /// Stage variables read by the selection.
    pub global_variables: Vec<String>,
}

impl ExportPicker {
    /// Candidates are the palette's global definitions, the customized
    /// primitives and the receiver's own definitions; `seeds` are selected
    /// together with their dependencies.
    pub fn new<H: PaletteHost>(
        project: &Project<H>,
        seeds: &[DefinitionId],
        receiver: ReceiverId,
    ) -> Result<Self, EditorError> {
        let mut candidates: Vec<DefinitionId> = project.global_blocks().to_vec();
        candidates.extend(project.registry.delegates());
        candidates.extend(project.receiver(receiver)?.custom_blocks.iter().copied());
        let mut picker = ExportPicker {
            receiver,
            candidates,
            selected: IndexSet::new(),
            local_variables: Vec::new(),
            global_variables: Vec::new(),
        };
        for seed in seeds {
            picker.select_with_dependencies(project, *seed)?;
        }
        picker.collect_variables(project)?;
        Ok(picker)
    }

    pub fn candidates(&self) -> &[DefinitionId] {
        &self.candidates
    }

    pub fn is_selected(&self, id: DefinitionId) -> bool {
        self.selected.contains(&id)
    }

    /// The selection in candidate order.
    pub fn selection(&self) -> Vec<DefinitionId> {
        self.candidates
            .iter()
            .copied()
            .filter(|id| self.selected.contains(id))
            .collect()
    }

    fn select_with_dependencies<H: PaletteHost>(
        &mut self,
        project: &Project<H>,
        id: DefinitionId,
    ) -> Result<(), EditorError> {
        self.selected.insert(id);
        for dependency in dependencies_of(project, id, self.receiver)? {
            if self.candidates.contains(&dependency) {
                self.selected.insert(dependency);
            }
        }
        Ok(())
    }

    /// Toggles one candidate, then re-selects everything the selection
    /// depends on. A dependency of a selected definition cannot be
    /// deselected on its own.
    pub fn toggle<H: PaletteHost>(&mut self, project: &Project<H>, id: DefinitionId) -> Result<(), EditorError> {
        if !self.selected.shift_remove(&id) && self.candidates.contains(&id) {
            self.selected.insert(id);
        }
        let selected: Vec<DefinitionId> = self.selected.iter().copied().collect();
        for each in selected {
            self.select_with_dependencies(project, each)?;
        }
        self.collect_variables(project)
    }

    pub fn select_all<H: PaletteHost>(&mut self, project: &Project<H>) -> Result<(), EditorError> {
        self.selected = self.candidates.iter().copied().collect();
        self.collect_variables(project)
    }

    pub fn select_none(&mut self) {
        self.selected.clear();
        self.local_variables.clear();
        self.global_variables.clear();
    }

    /// Deselects customized primitives.
    pub fn no_prims<H: PaletteHost>(&mut self, project: &Project<H>) -> Result<(), EditorError> {
        self.selected
            .retain(|id| !project.definitions().any(|d| d.id == *id && d.is_bootstrapped(&project.registry)));
        self.collect_variables(project)
    }

    /// Splits the variables the selection reads into sprite and stage ones.
    fn collect_variables<H: PaletteHost>(&mut self, project: &Project<H>) -> Result<(), EditorError> {
        let sprite = &project.receiver(self.receiver)?.variables;
        let mut local = IndexSet::new();
        let mut global = IndexSet::new();
        for id in &self.selected {
            for name in project.definition(*id)?.data_dependencies() {
                if sprite.contains(&name) {
                    local.insert(name);
                } else if project.global_variables.contains(&name) {
                    global.insert(name);
                }
            }
        }
        self.local_variables = local.into_iter().collect();
        self.local_variables.sort();
        self.global_variables = global.into_iter().collect();
        self.global_variables.sort();
        Ok(())
    }

    /// Bundles the selection with snapshots of its variables.
    pub fn export<H: PaletteHost>(&self, project: &Project<H>, name: &str) -> Result<LibraryBundle, EditorError> {
        let selection = self.selection();
        if selection.is_empty() {
            return Err(EditorError::NothingSelected);
        }
        let definitions = selection
            .iter()
            .map(|id| project.definition(*id))
            .collect::<Result<Vec<_>, _>>()?;
        let sprite = &project.receiver(self.receiver)?.variables;
        let bundle = LibraryBundle::new(
            name,
            definitions,
            project.global_variables.fork(&self.global_variables),
            sprite.fork(&self.local_variables),
        )?;
        info!(library = %name, definitions = selection.len(), "exported blocks");
        Ok(bundle)
    }
}

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

/// Picks definitions out of a library bundle.
#[derive(Debug, Clone)]
pub struct ImportPicker {
    pub name: String,
    definitions: Vec<BlockDefinition>,
    selected: IndexSet<DefinitionId>,
    global_variables: VariableFrame,
    local_variables: VariableFrame,
}

impl ImportPicker {
    /// Unpacks a bundle under fresh project ids, everything selected.
    pub fn from_bundle<H: PaletteHost>(
        project: &mut Project<H>,
        bundle: LibraryBundle,
        receiver: ReceiverId,
    ) -> Result<Self, EditorError> {
        project.receiver(receiver)?;
        let name = bundle.name.clone();
        let global_variables = bundle.global_variables.clone();
        let local_variables = bundle.local_variables.clone();
        let definitions = bundle.into_definitions(|| project.allocate_definition_id(), Some(receiver))?;
        let selected = definitions.iter().map(|def| def.id).collect();
        Ok(ImportPicker {
            name,
            definitions,
            selected,
            global_variables,
            local_variables,
        })
    }

    pub fn definitions(&self) -> &[BlockDefinition] {
        &self.definitions
    }

    pub fn is_selected(&self, id: DefinitionId) -> bool {
        self.selected.contains(&id)
    }

    pub fn toggle(&mut self, id: DefinitionId) {
        if !self.selected.shift_remove(&id) && self.definitions.iter().any(|def| def.id == id) {
            self.selected.insert(id);
        }
    }

    pub fn select_all(&mut self) {
        self.selected = self.definitions.iter().map(|def| def.id).collect();
    }

    pub fn select_none(&mut self) {
        self.selected.clear();
    }

    /// Adds the selected definitions to the project. Same-named
    /// definitions already there leave the palette but keep serving the
    /// calls bound to them. Returns the new ids.
    pub fn import<H: PaletteHost>(
        self,
        project: &mut Project<H>,
        receiver: ReceiverId,
    ) -> Result<Vec<DefinitionId>, EditorError> {
        if self.selected.is_empty() {
            return Err(EditorError::NothingSelected);
        }
        let mut imported = Vec::new();
        for def in self.definitions {
            if !self.selected.contains(&def.id) {
                continue;
            }
            let spec = def.block_spec();
            if def.is_global {
                let superseded: Vec<DefinitionId> = project
                    .global_definitions()
                    .filter(|old| old.block_spec() == spec)
                    .map(|old| old.id)
                    .collect();
                for old in superseded {
                    project.unlist_global(old);
                }
            } else if let Some(old) = project.get_local_method(receiver, &spec).map(|old| old.id) {
                project.unlist_local(receiver, old);
            }
            imported.push(project.add_definition(def)?);
        }

        for id in &imported {
            bind_unresolved_calls(project, *id)?;
        }
        project.global_variables.merge(&self.global_variables);
        project.receiver_mut(receiver)?.variables.merge(&self.local_variables);
        project.invalidate_palette();
        info!(library = %self.name, definitions = imported.len(), "imported blocks");
        Ok(imported)
    }
}

/// Binds global calls in a definition whose target is not in the project
/// to a listed global definition with the same semantic spec.
fn bind_unresolved_calls<H: PaletteHost>(project: &mut Project<H>, id: DefinitionId) -> Result<(), EditorError> {
    let globals: Vec<BlockDefinition> = project.global_definitions().cloned().collect();
    let known: IndexSet<DefinitionId> = project.definitions().map(|def| def.id).collect();
    let language = project.settings.language.clone();
    let mut rebind = |block: &mut Block| {
        let Some(call) = block.as_custom() else { return };
        if !call.is_global || call.definition.is_some_and(|target| known.contains(&target)) {
            return;
        }
        if let Some(target) = globals.iter().find(|def| def.block_spec() == call.semantic_spec) {
            block.refresh(target, &language, None);
        }
    };
    let def = project.definition_mut(id)?;
    if let Some(mut body) = def.body().cloned() {
        body.expression.for_each_mut(&mut rebind);
        def.set_body(Some(body));
    }
    for element in def.scripts.iter_mut() {
        if let Some(root) = element.block_mut() {
            root.for_each_mut(&mut rebind);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Removal of unused blocks
// ---------------------------------------------------------------------------

/// Picks unused global definitions for deletion.
#[derive(Debug, Clone)]
pub struct RemovalPicker {
    candidates: Vec<DefinitionId>,
    selected: IndexSet<DefinitionId>,
}

impl RemovalPicker {
    /// Candidates are the global definitions no script reaches; all of them
    /// start selected.
    pub fn new<H: PaletteHost>(project: &Project<H>) -> Self {
        let candidates = project.unused_global_blocks();
        let selected = candidates.iter().copied().collect();
        RemovalPicker { candidates, selected }
    }

    pub fn candidates(&self) -> &[DefinitionId] {
        &self.candidates
    }

    pub fn is_selected(&self, id: DefinitionId) -> bool {
        self.selected.contains(&id)
    }

    /// Toggles one candidate. Candidates the selection depends on are
    /// selected again.
    pub fn toggle<H: PaletteHost>(&mut self, project: &Project<H>, id: DefinitionId) -> Result<(), EditorError> {
        if !self.selected.shift_remove(&id) && self.candidates.contains(&id) {
            self.selected.insert(id);
        }
        self.add_dependencies(project)
    }

    pub fn select_all<H: PaletteHost>(&mut self, project: &Project<H>) -> Result<(), EditorError> {
        self.selected = self.candidates.iter().copied().collect();
        self.add_dependencies(project)
    }

    pub fn select_none(&mut self) {
        self.selected.clear();
    }

    fn add_dependencies<H: PaletteHost>(&mut self, project: &Project<H>) -> Result<(), EditorError> {
        let selected: Vec<DefinitionId> = self.selected.iter().copied().collect();
        for id in selected {
            for dependency in dependencies_of(project, id, ReceiverId::STAGE)? {
                if self.candidates.contains(&dependency) {
                    self.selected.insert(dependency);
                }
            }
        }
        Ok(())
    }

    /// Takes the selected definitions out of the global palette list.
    /// Calls still bound to them keep working. Returns how many were
    /// removed.
    pub fn remove<H: PaletteHost>(self, project: &mut Project<H>) -> Result<usize, EditorError> {
        if self.selected.is_empty() {
            return Err(EditorError::NothingSelected);
        }
        let mut removed = 0;
        for id in &self.selected {
            if project.unlist_global(*id) {
                removed += 1;
            }
        }
        project.invalidate_palette();
        info!(removed, "removed unused blocks");
        Ok(removed)
    }
}

// ---------------------------------------------------------------------------
// Palette visibility
// ---------------------------------------------------------------------------

/// An entry of the palette that can be hidden.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PaletteBlock {
    Primitive(String),
    Custom(DefinitionId),
    Variable(String),
}

/// Picks the palette entries to hide. Selected means hidden.
#[derive(Debug, Clone)]
pub struct VisibilityPicker {
    blocks: Vec<PaletteBlock>,
    selected: IndexSet<PaletteBlock>,
}

impl VisibilityPicker {
    /// Every primitive, the custom blocks and variables visible from
    /// `receiver`, with the currently hidden ones selected.
    pub fn new<H: PaletteHost>(project: &Project<H>, receiver: ReceiverId) -> Result<Self, EditorError> {
        let mut blocks: Vec<PaletteBlock> = project
            .registry
            .selectors()
            .map(|selector| PaletteBlock::Primitive(selector.to_string()))
            .collect();
        blocks.extend(project.global_blocks().iter().map(|id| PaletteBlock::Custom(*id)));
        blocks.extend(
            project
                .receiver(receiver)?
                .custom_blocks
                .iter()
                .map(|id| PaletteBlock::Custom(*id)),
        );
        blocks.extend(
            project
                .global_variables
                .names()
                .chain(project.receiver(receiver)?.variables.names())
                .map(|name| PaletteBlock::Variable(name.to_string())),
        );

        let selected = blocks
            .iter()
            .filter(|block| match block {
                PaletteBlock::Primitive(selector) => project.hidden_primitives.contains(selector),
                PaletteBlock::Custom(id) => project.definition(*id).is_ok_and(|def| def.is_helper),
                PaletteBlock::Variable(name) => project.hidden_variables.contains(name),
            })
            .cloned()
            .collect();
        Ok(VisibilityPicker { blocks, selected })
    }

    pub fn blocks(&self) -> &[PaletteBlock] {
        &self.blocks
    }

    pub fn is_selected(&self, block: &PaletteBlock) -> bool {
        self.selected.contains(block)
    }

    pub fn toggle(&mut self, block: &PaletteBlock) {
        if !self.selected.shift_remove(block) && self.blocks.contains(block) {
            self.selected.insert(block.clone());
        }
    }

    pub fn select_all(&mut self) {
        self.selected = self.blocks.iter().cloned().collect();
    }

    pub fn select_none(&mut self) {
        self.selected.clear();
    }

    /// Selects exactly the entries the receiver's scripts never use.
    pub fn select_unused<H: PaletteHost>(&mut self, project: &Project<H>, receiver: ReceiverId) -> Result<(), EditorError> {
        let mut used = IndexSet::new();
        for root in project.receiver(receiver)?.scripts.iter().filter_map(ScriptElement::block) {
            root.for_each(&mut |block: &Block| match &block.kind {
                BlockKind::Primitive { selector, .. } => {
                    used.insert(PaletteBlock::Primitive(selector.clone()));
                }
                BlockKind::Variable { name } => {
                    used.insert(PaletteBlock::Variable(name.clone()));
                }
                BlockKind::Custom(call) => {
                    if let Some(id) = project.resolve_call(Some(receiver), call) {
                        used.insert(PaletteBlock::Custom(id));
                    }
                }
            });
        }
        self.selected = self
            .blocks
            .iter()
            .filter(|block| !used.contains(*block))
            .cloned()
            .collect();
        Ok(())
    }

    /// Hides the selected entries and shows the rest. With nothing
    /// selected, every hidden primitive is shown again.
    pub fn apply<H: PaletteHost>(self, project: &mut Project<H>) -> Result<(), EditorError> {
        if self.selected.is_empty() {
            project.hidden_primitives.clear();
        }
        for block in &self.blocks {
            let hidden = self.selected.contains(block);
            match block {
                PaletteBlock::Primitive(selector) => {
                    if hidden {
                        project.hidden_primitives.insert(selector.clone());
                    } else {
                        project.hidden_primitives.shift_remove(selector);
                    }
                }
                PaletteBlock::Custom(id) => project.definition_mut(*id)?.is_helper = hidden,
                PaletteBlock::Variable(name) => {
                    if hidden {
                        project.hidden_variables.insert(name.clone());
                    } else {
                        project.hidden_variables.shift_remove(name);
                    }
                }
            }
        }
        project.invalidate_palette();
        info!(hidden = self.selected.len(), "updated palette visibility");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::ProjectSettings;
    use byob_core::definition::BlockType;
    use byob_core::registry::PrimitiveBlock;
    use byob_core::script::{Input, Position};
    use byob_core::variables::VarValue;

    fn project() -> Project {
        let mut project = Project::new(ProjectSettings::default());
        project.registry.insert(PrimitiveBlock::command("forward", "move %n steps"));
        project.registry.insert(PrimitiveBlock::command("bubble", "say %s"));
        project
    }

    fn global(project: &mut Project, spec: &str) -> DefinitionId {
        project
            .new_block(spec, BlockType::Command, "other", true, ReceiverId::STAGE)
            .unwrap()
    }

    fn calling(project: &mut Project, caller: DefinitionId, callee: DefinitionId) {
        let call = project.definition(callee).unwrap().block_instance("en");
        let registry = project.registry.clone();
        project
            .definition_mut(caller)
            .unwrap()
            .set_body_expression(Some(call), &registry);
    }

    #[test]
    fn export_toggle_recollects_dependencies() {
        let mut project = project();
        let d = global(&mut project, "d");
        let e = global(&mut project, "e");
        global(&mut project, "f");
        calling(&mut project, d, e);

        let mut picker = ExportPicker::new(&project, &[], ReceiverId::STAGE).unwrap();
        assert!(picker.selection().is_empty());
        picker.toggle(&project, d).unwrap();
        assert_eq!(picker.selection(), vec![d, e]);
        picker.toggle(&project, e).unwrap();
        assert_eq!(picker.selection(), vec![d, e]);
        picker.toggle(&project, d).unwrap();
        assert_eq!(picker.selection(), vec![e]);
    }

    #[test]
    fn seeded_export_cannot_drop_a_dependency() {
        let mut project = project();
        let d = global(&mut project, "d");
        let e = global(&mut project, "e");
        calling(&mut project, d, e);

        let mut picker = ExportPicker::new(&project, &[d], ReceiverId::STAGE).unwrap();
        assert_eq!(picker.selection(), vec![d, e]);
        picker.toggle(&project, e).unwrap();
        assert!(picker.is_selected(e));
        let bundle = picker.export(&project, "lib").unwrap();
        assert_eq!(bundle.specs(), vec!["d", "e"]);
    }

    #[test]
    fn exporting_nothing_is_an_error() {
        let project = project();
        let picker = ExportPicker::new(&project, &[], ReceiverId::STAGE).unwrap();
        assert!(matches!(picker.export(&project, "lib"), Err(EditorError::NothingSelected)));
    }

    #[test]
    fn export_splits_sprite_and_stage_variables() {
        let mut project = project();
        let sprite = project.add_sprite("s", None).unwrap();
        project.global_variables.set_var("score", VarValue::Number(3.0));
        project.receiver_mut(sprite).unwrap().variables.set_var("speed", VarValue::Number(1.0));
        let id = global(&mut project, "tick");
        let body = Block::command("bubble").with_inputs(vec![
            Input::reporter(Block::variable("score")),
            Input::reporter(Block::variable("speed")),
        ]);
        let registry = project.registry.clone();
        project.definition_mut(id).unwrap().set_body_expression(Some(body), &registry);

        let picker = ExportPicker::new(&project, &[id], sprite).unwrap();
        assert_eq!(picker.global_variables, vec!["score".to_string()]);
        assert_eq!(picker.local_variables, vec!["speed".to_string()]);
        let bundle = picker.export(&project, "lib").unwrap();
        assert_eq!(bundle.global_variables.get("score"), Some(&VarValue::Number(3.0)));
        assert_eq!(bundle.local_variables.get("speed"), Some(&VarValue::Number(1.0)));
    }

    #[test]
    fn import_supersedes_same_named_blocks() {
        let mut project = project();
        let old = global(&mut project, "greet");
        let call = project.definition(old).unwrap().block_instance("en");
        project.add_script(ReceiverId::STAGE, call, Position::default()).unwrap();

        let mut source = Project::new(ProjectSettings::default());
        let greet = source
            .new_block("greet", BlockType::Command, "looks", true, ReceiverId::STAGE)
            .unwrap();
        let bundle = ExportPicker::new(&source, &[greet], ReceiverId::STAGE)
            .unwrap()
            .export(&source, "lib")
            .unwrap();

        let picker = ImportPicker::from_bundle(&mut project, bundle, ReceiverId::STAGE).unwrap();
        let imported = picker.import(&mut project, ReceiverId::STAGE).unwrap();
        assert_eq!(imported.len(), 1);
        assert_eq!(project.global_blocks(), &[imported[0]]);
        assert_eq!(project.definition(imported[0]).unwrap().category, "looks");
        let root = project.receiver(ReceiverId::STAGE).unwrap().scripts[0].block().unwrap();
        assert_eq!(root.as_custom().unwrap().definition, Some(old));
    }

    #[test]
    fn importing_nothing_is_an_error() {
        let mut source = Project::new(ProjectSettings::default());
        let id = global(&mut source, "x");
        let bundle = ExportPicker::new(&source, &[id], ReceiverId::STAGE)
            .unwrap()
            .export(&source, "lib")
            .unwrap();
        let mut project = project();
        let mut picker = ImportPicker::from_bundle(&mut project, bundle, ReceiverId::STAGE).unwrap();
        picker.select_none();
        assert!(matches!(
            picker.import(&mut project, ReceiverId::STAGE),
            Err(EditorError::NothingSelected)
        ));
    }

    #[test]
    fn removal_keeps_what_kept_blocks_need() {
        let mut project = project();
        let a = global(&mut project, "a");
        let b = global(&mut project, "b");
        calling(&mut project, a, b);

        let mut picker = RemovalPicker::new(&project);
        assert_eq!(picker.candidates(), &[a, b]);
        picker.toggle(&project, b).unwrap();
        assert!(picker.is_selected(a));
        assert!(picker.is_selected(b));

        picker.toggle(&project, a).unwrap();
        assert!(!picker.is_selected(a));
        assert!(picker.is_selected(b));
        picker.toggle(&project, b).unwrap();
        assert!(!picker.is_selected(b));
        picker.toggle(&project, a).unwrap();
        assert!(picker.is_selected(a));
        assert!(picker.is_selected(b));

        assert_eq!(picker.remove(&mut project).unwrap(), 2);
        assert!(project.global_blocks().is_empty());
    }

    #[test]
    fn removal_only_unlists_global_definitions() {
        let mut project = project();
        let a = global(&mut project, "a");
        let sprite = project.add_sprite("s", None).unwrap();
        let local = project
            .new_block("jump", BlockType::Command, "motion", false, sprite)
            .unwrap();

        let picker = RemovalPicker::new(&project);
        assert_eq!(picker.candidates(), &[a]);
        assert_eq!(picker.remove(&mut project).unwrap(), 1);
        assert!(project.global_blocks().is_empty());
        assert!(project.definition(a).is_ok());
        assert_eq!(project.receiver(sprite).unwrap().custom_blocks, vec![local]);
    }

    #[test]
    fn unused_entries_can_be_hidden() {
        let mut project = project();
        let used = global(&mut project, "used");
        let unused = global(&mut project, "unused");
        let script = Block::command("forward").then(project.definition(used).unwrap().block_instance("en"));
        project.add_script(ReceiverId::STAGE, script, Position::default()).unwrap();

        let mut picker = VisibilityPicker::new(&project, ReceiverId::STAGE).unwrap();
        picker.toggle(&PaletteBlock::Primitive("forward".to_string()));
        picker.toggle(&PaletteBlock::Custom(used));
        picker.select_unused(&project, ReceiverId::STAGE).unwrap();
        assert!(!picker.is_selected(&PaletteBlock::Primitive("forward".to_string())));
        assert!(picker.is_selected(&PaletteBlock::Primitive("bubble".to_string())));
        assert!(picker.is_selected(&PaletteBlock::Custom(unused)));
        assert!(!picker.is_selected(&PaletteBlock::Custom(used)));
        picker.apply(&mut project).unwrap();
        assert!(project.hidden_primitives.contains("bubble"));
        assert!(project.definition(unused).unwrap().is_helper);

        let mut picker = VisibilityPicker::new(&project, ReceiverId::STAGE).unwrap();
        picker.select_none();
        picker.apply(&mut project).unwrap();
        assert!(project.hidden_primitives.is_empty());
        assert!(!project.definition(unused).unwrap().is_helper);
    }
}
