pub mod entity;
pub mod error;
pub mod heap;
pub mod js_ast;
pub mod pipeline;
