//! Script trees.
//!
//! A script is a stack of [`Block`]s linked through `next`; each block owns
//! its input slots, and slots may nest further blocks (reporters, C-slot
//! stacks, rings, variadic groups). The tree is a plain owned value: no
//! parent pointers, so upward questions (variable shadowing, relocation of
//! displaced inputs) are answered by threading context down the walk.

use serde::{Deserialize, Serialize};

use crate::instance::CustomBlock;

/// Selector of the "invoke primitive" block that binds a definition body to
/// a built-in operation.
pub const DO_PRIMITIVE: &str = "doPrimitive";
/// Selector of the "report" command.
pub const DO_REPORT: &str = "doReport";
/// Selector of the slot-event helper hat (`when slot <name> is <event>`).
pub const RECEIVE_SLOT_EVENT: &str = "receiveSlotEvent";
/// Selector of a variable read.
pub const REPORT_GET_VAR: &str = "reportGetVar";
/// Selector of the script-variables declaration.
pub const DECLARE_VARIABLES: &str = "doDeclareVariables";
pub const DO_BROADCAST: &str = "doBroadcast";
pub const DO_BROADCAST_AND_WAIT: &str = "doBroadcastAndWait";

/// What a block invokes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BlockKind {
    /// A built-in operation. `reports` is `true` for reporter/predicate
    /// shaped primitives.
    Primitive { selector: String, reports: bool },
    /// An invocation of a custom block.
    Custom(Box<CustomBlock>),
    /// A variable read (`reportGetVar`).
    Variable { name: String },
}

/// One block in a script, with the rest of its stack hanging off `next`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub kind: BlockKind,
    pub inputs: Vec<Input>,
    pub next: Option<Box<Block>>,
    /// Marked for deletion; removed by the next purge.
    #[serde(default)]
    pub is_corpse: bool,
}

/// An input slot and its contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Input {
    /// Editable text or number.
    Literal(LiteralSlot),
    /// Boolean toggle; `None` is the empty slot.
    Boolean(Option<bool>),
    /// A variable-name template (upvar, script variable, ring parameter).
    Template(String),
    /// A nested reporter call filling the slot.
    Reporter(Box<Block>),
    /// A C-slot holding a command stack.
    Commands(Option<Box<Block>>),
    /// A ring holding an unevaluated script.
    Ring(Option<Box<Block>>),
    /// A variadic group of sub-slots.
    Multi(MultiSlot),
}

/// Contents and settings of an editable slot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LiteralSlot {
    pub contents: String,
    pub numeric: bool,
    pub read_only: bool,
    /// Cannot be replaced by a reporter.
    pub is_static: bool,
    /// Encoded dropdown menu.
    pub options: String,
}

/// A variadic slot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MultiSlot {
    /// Spec of each element slot (`%n`, `%s`, ...).
    pub element_spec: String,
    pub items: Vec<Input>,
    pub infix: Option<String>,
    pub collapse: Option<String>,
    pub expand: Option<String>,
    /// Newline-separated positional defaults.
    pub default_value: String,
    pub initial_slots: u32,
    pub min_slots: u32,
    pub max_slots: u32,
    pub is_static: bool,
}

/// 2D position of a top-level script element in a scripting area.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Position { x, y }
    }

    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Position::new(self.x + dx, self.y + dy)
    }
}

/// A top-level element of a scripting area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScriptElement {
    Script { block: Block, position: Position },
    Comment { text: String, position: Position },
}

impl ScriptElement {
    pub fn block(&self) -> Option<&Block> {
        match self {
            ScriptElement::Script { block, .. } => Some(block),
            ScriptElement::Comment { .. } => None,
        }
    }

    pub fn block_mut(&mut self) -> Option<&mut Block> {
        match self {
            ScriptElement::Script { block, .. } => Some(block),
            ScriptElement::Comment { .. } => None,
        }
    }

    pub fn position(&self) -> Position {
        match self {
            ScriptElement::Script { position, .. } | ScriptElement::Comment { position, .. } => {
                *position
            }
        }
    }
}

/// A script boxed for later execution, bound to a parameter list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReifiedScript {
    pub expression: Block,
    pub inputs: Vec<String>,
}

impl ReifiedScript {
    /// Boxes `expression` with the given formal parameters.
    pub fn reify(expression: Block, inputs: Vec<String>) -> Self {
        ReifiedScript { expression, inputs }
    }
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

impl Block {
    fn with_kind(kind: BlockKind) -> Self {
        Block {
            kind,
            inputs: Vec::new(),
            next: None,
            is_corpse: false,
        }
    }

    /// A command-shaped primitive.
    pub fn command(selector: impl Into<String>) -> Self {
        Block::with_kind(BlockKind::Primitive {
            selector: selector.into(),
            reports: false,
        })
    }

    /// A reporter-shaped primitive.
    pub fn reporter(selector: impl Into<String>) -> Self {
        Block::with_kind(BlockKind::Primitive {
            selector: selector.into(),
            reports: true,
        })
    }

    /// A variable read.
    pub fn variable(name: impl Into<String>) -> Self {
        Block::with_kind(BlockKind::Variable { name: name.into() })
    }

    /// An invocation of a custom block.
    pub fn custom(block: CustomBlock) -> Self {
        Block::with_kind(BlockKind::Custom(Box::new(block)))
    }

    /// Builder-style inputs.
    pub fn with_inputs(mut self, inputs: Vec<Input>) -> Self {
        self.inputs = inputs;
        self
    }

    /// Appends `block` to the end of this stack.
    pub fn then(mut self, block: Block) -> Self {
        self.append(block);
        self
    }

    /// Appends `block` to the end of this stack in place.
    pub fn append(&mut self, block: Block) {
        match self.next {
            Some(ref mut next) => next.append(block),
            None => self.next = Some(Box::new(block)),
        }
    }
}

impl Input {
    /// An editable text slot.
    pub fn text(contents: impl Into<String>) -> Self {
        Input::Literal(LiteralSlot {
            contents: contents.into(),
            ..Default::default()
        })
    }

    /// An editable number slot.
    pub fn number(contents: impl Into<String>) -> Self {
        Input::Literal(LiteralSlot {
            contents: contents.into(),
            numeric: true,
            ..Default::default()
        })
    }

    pub fn reporter(block: Block) -> Self {
        Input::Reporter(Box::new(block))
    }

    /// The literal contents of an editable slot.
    pub fn literal(&self) -> Option<&str> {
        match self {
            Input::Literal(slot) => Some(&slot.contents),
            _ => None,
        }
    }

    /// Nested blocks held directly by this slot (not through `next`).
    fn nested(&self) -> Vec<&Block> {
        match self {
            Input::Reporter(block) => vec![&**block],
            Input::Commands(Some(block)) | Input::Ring(Some(block)) => vec![&**block],
            Input::Multi(multi) => multi.items.iter().flat_map(Input::nested).collect(),
            _ => Vec::new(),
        }
    }

    fn nested_mut(&mut self) -> Vec<&mut Block> {
        match self {
            Input::Reporter(block) => vec![&mut **block],
            Input::Commands(Some(block)) | Input::Ring(Some(block)) => vec![&mut **block],
            Input::Multi(multi) => multi.items.iter_mut().flat_map(Input::nested_mut).collect(),
            _ => Vec::new(),
        }
    }

    fn templates(&self) -> Vec<&str> {
        match self {
            Input::Template(name) => vec![name],
            Input::Multi(multi) => multi.items.iter().flat_map(Input::templates).collect(),
            _ => Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Queries and traversal
// ---------------------------------------------------------------------------

impl Block {
    /// Selector of a primitive block.
    pub fn selector(&self) -> Option<&str> {
        match &self.kind {
            BlockKind::Primitive { selector, .. } => Some(selector),
            BlockKind::Variable { .. } => Some(REPORT_GET_VAR),
            BlockKind::Custom(_) => None,
        }
    }

    /// The custom block invocation, if this block is one.
    pub fn as_custom(&self) -> Option<&CustomBlock> {
        match &self.kind {
            BlockKind::Custom(custom) => Some(custom),
            _ => None,
        }
    }

    pub fn as_custom_mut(&mut self) -> Option<&mut CustomBlock> {
        match &mut self.kind {
            BlockKind::Custom(custom) => Some(custom),
            _ => None,
        }
    }

    /// Returns `true` for reporter- and predicate-shaped blocks.
    pub fn is_reporter(&self) -> bool {
        match &self.kind {
            BlockKind::Primitive { reports, .. } => *reports,
            BlockKind::Variable { .. } => true,
            BlockKind::Custom(custom) => custom.kind.is_reporter(),
        }
    }

    /// Names declared as templates by this block's own inputs.
    pub fn templates(&self) -> Vec<&str> {
        self.inputs.iter().flat_map(Input::templates).collect()
    }

    /// Visits every block of the tree in pre-order: the block, its nested
    /// inputs, then the rest of its stack.
    pub fn for_each(&self, f: &mut impl FnMut(&Block)) {
        f(self);
        for input in &self.inputs {
            for nested in input.nested() {
                nested.for_each(f);
            }
        }
        if let Some(next) = &self.next {
            next.for_each(f);
        }
    }

    /// Mutable pre-order visit, same order as [`Block::for_each`].
    pub fn for_each_mut(&mut self, f: &mut impl FnMut(&mut Block)) {
        f(self);
        for input in &mut self.inputs {
            for nested in input.nested_mut() {
                nested.for_each_mut(f);
            }
        }
        if let Some(next) = &mut self.next {
            next.for_each_mut(f);
        }
    }

    /// Returns `true` if any block of the tree satisfies `pred`.
    pub fn any(&self, pred: &impl Fn(&Block) -> bool) -> bool {
        if pred(self) {
            return true;
        }
        self.inputs
            .iter()
            .flat_map(Input::nested)
            .any(|nested| nested.any(pred))
            || self.next.as_ref().is_some_and(|next| next.any(pred))
    }

    /// Variable names read in the tree that are not declared by a template
    /// in scope at the read site. A template is in scope for the rest of
    /// the stack after the block that declares it and inside that block's
    /// nested inputs, mirroring lexical scoping of script variables and
    /// upvars.
    pub fn free_variables(&self) -> Vec<String> {
        let mut scope = Vec::new();
        let mut found = Vec::new();
        self.collect_free(&mut scope, &mut found);
        found
    }

    fn collect_free<'a>(&'a self, scope: &mut Vec<&'a str>, found: &mut Vec<String>) {
        let mark = scope.len();
        let mut current = Some(self);
        while let Some(block) = current {
            scope.extend(block.templates());
            if let BlockKind::Variable { name } = &block.kind {
                if !scope.contains(&name.as_str()) && !found.contains(name) {
                    found.push(name.clone());
                }
            }
            for input in &block.inputs {
                for nested in input.nested() {
                    nested.collect_free(scope, found);
                }
            }
            current = block.next.as_deref();
        }
        scope.truncate(mark);
    }

    /// Returns `true` if the tree broadcasts `message` as a literal.
    pub fn is_sending(&self, message: &str) -> bool {
        self.any(&|block: &Block| {
            matches!(block.selector(), Some(DO_BROADCAST | DO_BROADCAST_AND_WAIT))
                && block.inputs.first().and_then(Input::literal) == Some(message)
        })
    }
}
