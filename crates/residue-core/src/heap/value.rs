use serde::{Deserialize, Serialize};

use crate::define_entity;
use crate::js_ast::MethodKind;

use super::code::CodeBlockId;
use super::scope::ScopeId;

define_entity!(ValueId);

/// A primitive value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constant {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
}

/// A node of the evaluated heap. Identity is the `ValueId`; two distinct
/// ids are never unified even when structurally equal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum HeapValue {
    Primitive(Constant),
    Object(ObjectValue),
    Function(FunctionValue),
}

impl HeapValue {
    pub fn as_object(&self) -> Option<&ObjectValue> {
        match self {
            HeapValue::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionValue> {
        match self {
            HeapValue::Function(func) => Some(func),
            _ => None,
        }
    }

    pub fn is_function(&self) -> bool {
        matches!(self, HeapValue::Function(_))
    }
}

/// One own data property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub key: String,
    pub value: ValueId,
}

/// Integrity level applied after an object's properties are in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntegrityLevel {
    Sealed,
    Frozen,
}

/// A plain object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectValue {
    #[serde(default)]
    pub properties: Vec<Property>,
    /// Non-default prototype; `None` means `Object.prototype`.
    #[serde(default)]
    pub prototype: Option<ValueId>,
    /// Expression path that already denotes this object (intrinsics and
    /// pass-through wrappers). Aliased objects are never constructed.
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub integrity: Option<IntegrityLevel>,
    /// Selected for lazy materialization.
    #[serde(default)]
    pub lazy: bool,
    /// Construct this object in the delayed initializer of the given
    /// function instead of at startup.
    #[serde(default)]
    pub delay_into: Option<ValueId>,
}

/// A function closure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionValue {
    pub code: CodeBlockId,
    /// Innermost captured scope; `None` for functions closing only over globals.
    #[serde(default)]
    pub environment: Option<ScopeId>,
    #[serde(default)]
    pub properties: Vec<Property>,
    /// The `.prototype` object, when the heap holds on to it.
    #[serde(default)]
    pub prototype: Option<ValueId>,
    #[serde(default)]
    pub class_method: Option<ClassMethod>,
}

/// Class membership of a function value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMethod {
    pub kind: MethodKind,
    /// Member name, or the source of the key expression when `computed`.
    pub key: String,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub computed: bool,
    /// Prototype object of the class; keys the shared class node.
    pub class_prototype: ValueId,
    /// The class constructor function value.
    pub constructor: ValueId,
    #[serde(default)]
    pub super_class: Option<ValueId>,
}
