use serde::{Deserialize, Serialize};

use crate::define_entity;
use crate::js_ast::{JsFunction, JsParam, JsStmt};

define_entity!(CodeBlockId);

/// Source extent of a code block, in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Absolute character span.
    pub fn len(&self) -> u32 {
        self.end.abs_diff(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// The static body shared by every instance of a function.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeBlock {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub params: Vec<JsParam>,
    #[serde(default)]
    pub body: Vec<JsStmt>,
    #[serde(default)]
    pub directives: Vec<String>,
    #[serde(default)]
    pub is_arrow: bool,
    #[serde(default)]
    pub is_generator: bool,
    #[serde(default)]
    pub is_async: bool,
    #[serde(default)]
    pub span: Span,
    /// Position in the original program's traversal; defaults to `span.start`.
    #[serde(default)]
    pub tag: Option<u32>,
}

impl CodeBlock {
    /// Total-order tag used to sort code blocks deterministically.
    pub fn order_tag(&self) -> u32 {
        self.tag.unwrap_or(self.span.start)
    }

    /// A fresh copy of the block as a function node.
    pub fn to_function(&self) -> JsFunction {
        JsFunction {
            name: self.name.clone(),
            params: self.params.clone(),
            body: self.body.clone(),
            directives: self.directives.clone(),
            is_arrow: self.is_arrow,
            is_generator: self.is_generator,
            is_async: self.is_async,
        }
    }
}
