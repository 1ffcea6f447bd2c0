use std::collections::BTreeMap;

use indexmap::IndexMap;

use residue_core::error::CoreError;
use residue_core::heap::{CodeBlockId, ScopeId, ValueId};
use residue_core::js_ast::{ClassKey, JsExpr, JsStmt, MethodKind};

use crate::emitter::{BodyId, BodyReference};

/// A captured binding: the declaring scope and the name in it.
pub type BindingKey = (ScopeId, String);

/// How one free name of one instance resolves.
///
/// Exactly one of three shapes holds once serialization is over: a
/// referentialized slot, a shared hoisted identifier (`simple_capture`), or a
/// serialized value expression.
#[derive(Debug, Clone)]
pub struct ResidualFunctionBinding {
    pub scope: ScopeId,
    pub name: String,
    /// Value at the end of evaluation; `None` when never initialized.
    pub value: Option<ValueId>,
    /// Reassigned after capture, by any capturing code or an optimized root.
    pub modified: bool,
    pub referentialized: bool,
    pub simple_capture: Option<String>,
    pub serialized_value: Option<JsExpr>,
    /// The value was still under construction when the binding was captured.
    pub pending: bool,
}

impl ResidualFunctionBinding {
    pub fn new(scope: ScopeId, name: &str, value: Option<ValueId>, modified: bool) -> Self {
        Self {
            scope,
            name: name.to_string(),
            value,
            modified,
            referentialized: false,
            simple_capture: None,
            serialized_value: None,
            pending: false,
        }
    }

    pub fn set_serialized_value(&mut self, expr: JsExpr) -> Result<(), CoreError> {
        if self.referentialized {
            return Err(CoreError::internal(format!(
                "binding {} of scope s{} is referentialized and cannot take a direct value",
                self.name, self.scope
            )));
        }
        self.serialized_value = Some(expr);
        Ok(())
    }
}

/// Class membership of a function instance.
#[derive(Debug, Clone)]
pub struct ClassMethodInstance {
    pub kind: MethodKind,
    pub key: ClassKey,
    pub is_static: bool,
    /// Keys the shared class node.
    pub class_prototype: ValueId,
    pub constructor: ValueId,
    pub super_class: Option<JsExpr>,
}

/// Construction work moved into a function's first call.
#[derive(Debug, Clone)]
pub struct DelayedInit {
    pub body: BodyId,
    /// Guard variable declared next to the function.
    pub flag: String,
}

/// One function value to emit, with everything resolved for it.
#[derive(Debug, Clone)]
pub struct FunctionInstance {
    pub function: ValueId,
    pub code: CodeBlockId,
    /// Output identifier.
    pub name: String,
    /// Free name → captured binding, or `None` for a global left untouched.
    pub bindings: IndexMap<String, Option<BindingKey>>,
    /// Referentialized scopes in first-capture order; position `k` is held
    /// in the local `__scope_k`.
    pub scope_instances: Vec<ScopeId>,
    /// Module id → replacement for `require(id)`.
    pub requires: BTreeMap<String, JsExpr>,
    pub declaration_body: BodyId,
    /// Optimized root whose body declares this instance.
    pub root: Option<ValueId>,
    pub insertion_point: Option<BodyReference>,
    /// Order in which insertion points were recorded.
    pub serial: usize,
    pub first_usage: Option<BodyReference>,
    pub class_method: Option<ClassMethodInstance>,
    pub delayed: Option<DelayedInit>,
    pub has_prototype_alias: bool,
    /// Statements emitted right after the definition.
    pub extras: Vec<JsStmt>,
}

impl FunctionInstance {
    pub fn new(
        function: ValueId,
        code: CodeBlockId,
        name: String,
        declaration_body: BodyId,
        root: Option<ValueId>,
    ) -> Self {
        Self {
            function,
            code,
            name,
            bindings: IndexMap::new(),
            scope_instances: Vec::new(),
            requires: BTreeMap::new(),
            declaration_body,
            root,
            insertion_point: None,
            serial: 0,
            first_usage: None,
            class_method: None,
            delayed: None,
            has_prototype_alias: false,
            extras: Vec::new(),
        }
    }

    /// Position of `scope` among this instance's captured scopes, adding it
    /// if new.
    pub fn scope_local(&mut self, scope: ScopeId) -> usize {
        match self.scope_instances.iter().position(|s| *s == scope) {
            Some(k) => k,
            None => {
                self.scope_instances.push(scope);
                self.scope_instances.len() - 1
            }
        }
    }

    pub fn scope_position(&self, scope: ScopeId) -> Option<usize> {
        self.scope_instances.iter().position(|s| *s == scope)
    }

    pub fn insertion_point(&self) -> Result<BodyReference, CoreError> {
        self.insertion_point.ok_or_else(|| {
            CoreError::internal(format!(
                "function v{} has no insertion point",
                self.function
            ))
        })
    }

    /// First use is at a position that runs before the definition.
    pub fn used_before_definition(&self) -> Result<bool, CoreError> {
        let point = self.insertion_point()?;
        Ok(self
            .first_usage
            .is_some_and(|usage| !usage.is_not_earlier_than(&point)))
    }
}

/// An optimized root after serialization of its local values.
#[derive(Debug, Clone)]
pub struct AdditionalFunctionInfo {
    pub function: ValueId,
    /// Body holding the root's local value declarations.
    pub body: BodyId,
    pub parent: Option<ValueId>,
    /// Statements emitted verbatim after the local values.
    pub verbatim: Vec<JsStmt>,
    /// Captured name → value written back before returning.
    pub modified_bindings: Vec<(String, JsExpr)>,
    pub result: Option<JsExpr>,
    pub depth: usize,
}

/// `__scope_<k>`.
pub fn scope_local_name(k: usize) -> String {
    format!("__scope_{k}")
}

/// `__selector_<k>`.
pub fn selector_param_name(k: usize) -> String {
    format!("__selector_{k}")
}
