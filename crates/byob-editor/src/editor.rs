//! The block editor surface.
//!
//! A [`BlockEditor`] holds a working copy of one definition: the prototype
//! being relabelled, the body hanging off it and the loose helper scripts
//! around it. Nothing reaches the definition until
//! [`BlockEditor::update_definition`] commits the surface.

use tracing::{debug, info, warn};

use byob_core::choices::SPECIAL_PREFIX;
use byob_core::definition::BlockType;
use byob_core::fragment::{LabelFragment, PrototypeBlock};
use byob_core::id::{DefinitionId, ReceiverId};
use byob_core::script::{Block, Position, ScriptElement, RECEIVE_SLOT_EVENT};

use crate::error::EditorError;
use crate::host::PaletteHost;
use crate::project::Project;

/// Where a freshly opened surface puts the prototype.
const SURFACE_ORIGIN: Position = Position { x: 10.0, y: 10.0 };

/// Result of trying to dismiss the surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseOutcome {
    Closed,
    /// A global definition calls a sprite-local block.
    Blocked { local_spec: String },
    /// Other definitions in scope share the semantic spec. The caller may
    /// consolidate them with [`BlockEditor::consolidate_doubles`].
    SameNamedBlocks { doubles: Vec<DefinitionId> },
}

/// An open block editor.
#[derive(Debug, Clone)]
pub struct BlockEditor {
    pub definition: DefinitionId,
    pub receiver: ReceiverId,
    pub prototype: PrototypeBlock,
    /// The script attached below the prototype.
    pub body: Option<Block>,
    /// Loose scripts and comments, at surface positions.
    pub scripts: Vec<ScriptElement>,
    pub origin: Position,
    /// Translations as `lang:spec` lines.
    pub translations: String,
    pub comment: Option<String>,
    pub is_helper: bool,
    pub selector: Option<String>,
    pub variable_names: Vec<String>,
    /// Semantic spec as of the last commit, used to find local instances.
    old_spec: String,
}

impl BlockEditor {
    /// Opens a surface on a definition.
    pub fn open<H: PaletteHost>(
        project: &Project<H>,
        definition: DefinitionId,
        receiver: ReceiverId,
    ) -> Result<Self, EditorError> {
        project.receiver(receiver)?;
        let def = project.definition(definition)?;
        let origin = SURFACE_ORIGIN;
        let scripts = def
            .scripts
            .iter()
            .cloned()
            .map(|element| shift(element, origin.x, origin.y))
            .collect();
        Ok(BlockEditor {
            definition,
            receiver,
            prototype: def.prototype_instance(),
            body: def.body().map(|b| b.expression.clone()),
            scripts,
            origin,
            translations: def.translations_as_text(),
            comment: def.comment.clone(),
            is_helper: def.is_helper,
            selector: def.selector.clone(),
            variable_names: def.variable_names.clone(),
            old_spec: def.block_spec(),
        })
    }

    // -- prototype edits -------------------------------------------------------

    /// Replaces a fragment with its edited copy.
    pub fn edit_fragment(&mut self, idx: usize, fragment: LabelFragment) -> Result<(), EditorError> {
        self.prototype = self.prototype.clone().replace_fragment(idx, fragment)?;
        Ok(())
    }

    /// Inserts a word or input fragment before `idx`.
    pub fn insert_fragment(&mut self, idx: usize, fragment: LabelFragment) -> Result<(), EditorError> {
        self.prototype = self.prototype.clone().insert_fragment(idx, fragment)?;
        Ok(())
    }

    pub fn delete_fragment(&mut self, idx: usize) -> Result<(), EditorError> {
        self.prototype = self.prototype.clone().delete_fragment(idx)?;
        Ok(())
    }

    /// The "change block" dialog: a new shape and category.
    pub fn change_block(&mut self, kind: BlockType, category: impl Into<String>) {
        self.prototype = self.prototype.clone().rebuilt_as(kind, category);
    }

    pub fn edit_translations(&mut self, text: impl Into<String>) {
        self.translations = text.into();
    }

    /// Adds a loose script to the surface.
    pub fn add_script(&mut self, block: Block, position: Position) {
        self.scripts.push(ScriptElement::Script { block, position });
    }

    // -- commit ------------------------------------------------------------------

    /// Writes the surface back into the definition and propagates the
    /// change to every instance.
    pub fn update_definition<H: PaletteHost>(&mut self, project: &mut Project<H>) -> Result<(), EditorError> {
        let id = self.definition;
        let spec = self.prototype.spec_from_fragments();
        let declarations = self.prototype.declarations_from_fragments();
        let (dx, dy) = (-self.origin.x, -self.origin.y);
        let scripts: Vec<ScriptElement> = self
            .scripts
            .iter()
            .cloned()
            .map(|element| shift(element, dx, dy))
            .collect();
        let menu_inputs = menu_event_inputs(&scripts);

        {
            let (def, registry) = project.definition_with_registry(id)?;
            def.set_header(spec, declarations);
            def.variable_names = self.variable_names.clone();
            def.category = self.prototype.category.clone();
            def.kind = self.prototype.kind;
            def.semantics = self.prototype.semantics;
            def.is_helper = self.is_helper;
            if def.is_global {
                def.selector = self.selector.clone();
            }
            def.comment = self.comment.clone();
            def.scripts = scripts;
            for name in menu_inputs {
                if let Some(decl) = def.declaration_mut(&name) {
                    if decl.options.is_empty() {
                        decl.options = format!("{SPECIAL_PREFIX}dynamicMenu");
                    }
                }
            }
            def.set_body_expression(self.body.clone(), registry);
            def.update_translations(&self.translations);
        }

        project.disambiguate(id)?;
        project.refresh_all_instances(id, &self.old_spec)?;
        project.invalidate_palette();

        let def = project.definition(id)?;
        self.old_spec = def.block_spec();
        self.prototype = def.prototype_instance();
        info!(definition = %id, spec = %def.spec(), "committed block definition");
        Ok(())
    }

    /// Checks whether the surface may be dismissed.
    pub fn close<H: PaletteHost>(&self, project: &Project<H>) -> Result<CloseOutcome, EditorError> {
        let def = project.definition(self.definition)?;
        if def.is_global {
            if let Some(local_spec) = def.calls_local_blocks() {
                warn!(definition = %def.id, %local_spec, "global block calls a sprite-only block");
                return Ok(CloseOutcome::Blocked { local_spec });
            }
        }
        let doubles = project.double_definitions_for(self.definition)?;
        if doubles.is_empty() {
            Ok(CloseOutcome::Closed)
        } else {
            Ok(CloseOutcome::SameNamedBlocks { doubles })
        }
    }

    /// Replaces the same-named definitions with this one.
    pub fn consolidate_doubles<H: PaletteHost>(&self, project: &mut Project<H>) -> Result<usize, EditorError> {
        project.replace_double_definitions_for(self.definition)
    }

    /// Commits and then tries to close.
    pub fn accept<H: PaletteHost>(&mut self, project: &mut Project<H>) -> Result<CloseOutcome, EditorError> {
        self.update_definition(project)?;
        self.close(project)
    }

    /// Drops the surface without committing it. Nothing reaches the
    /// definition before [`BlockEditor::update_definition`], so dropping
    /// is all that cancelling takes.
    pub fn cancel(self) {
        debug!(definition = %self.definition, "discarded block editor");
    }
}

fn shift(element: ScriptElement, dx: f64, dy: f64) -> ScriptElement {
    match element {
        ScriptElement::Script { block, position } => ScriptElement::Script {
            block,
            position: position.offset(dx, dy),
        },
        ScriptElement::Comment { text, position } => ScriptElement::Comment {
            text,
            position: position.offset(dx, dy),
        },
    }
}

/// Input names named by `receiveSlotEvent(<input>, "menu")` hats.
fn menu_event_inputs(scripts: &[ScriptElement]) -> Vec<String> {
    scripts
        .iter()
        .filter_map(ScriptElement::block)
        .filter(|root| root.selector() == Some(RECEIVE_SLOT_EVENT))
        .filter(|root| root.inputs.get(1).and_then(|i| i.literal()) == Some("menu"))
        .filter_map(|root| root.inputs.first().and_then(|i| i.literal()))
        .map(str::to_string)
        .collect()
}
