//! The evaluated heap graph consumed by the materializer.

pub mod code;
pub mod graph;
pub mod scope;
pub mod value;

pub use code::{CodeBlock, CodeBlockId, Span};
pub use graph::{AdditionalFunction, Effect, HeapGraph};
pub use scope::{Scope, ScopeId};
pub use value::{
    ClassMethod, Constant, FunctionValue, HeapValue, IntegrityLevel, ObjectValue, Property,
    ValueId,
};
