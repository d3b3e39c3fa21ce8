pub mod choices;
pub mod definition;
pub mod error;
pub mod fragment;
pub mod id;
pub mod instance;
pub mod registry;
pub mod script;
pub mod slot;
pub mod spec;
pub mod variables;

// Re-export commonly used types
pub use choices::{Choice, ChoiceValue, Menu, MenuEntry};
pub use definition::{BlockDefinition, BlockType, DefaultValue, DefinitionResolver, HatSemantics};
pub use error::CoreError;
pub use fragment::{LabelFragment, PrototypeBlock};
pub use id::{DefinitionId, ReceiverId};
pub use instance::CustomBlock;
pub use registry::{PrimitiveBlock, PrimitiveRegistry, SlotMenu, SlotShape};
pub use script::{Block, BlockKind, Input, LiteralSlot, MultiSlot, Position, ReifiedScript, ScriptElement};
pub use slot::{InputSlotDecl, SlotKind, SlotType};
pub use variables::{VarValue, VariableFrame};
