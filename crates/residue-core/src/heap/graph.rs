use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entity::PrimaryMap;
use crate::error::CoreError;
use crate::js_ast::JsStmt;

use super::code::{CodeBlock, CodeBlockId};
use super::scope::{Scope, ScopeId};
use super::value::{Constant, HeapValue, ValueId};

/// One entry of the ordered effect log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Effect {
    /// `globalThis.name = value;`
    GlobalAssign { name: String, value: ValueId },
    /// `object.key = value;` performed after `object` was constructed.
    PropertyAssign {
        object: ValueId,
        key: String,
        value: ValueId,
    },
    /// `callee(args...);`
    Call { callee: ValueId, args: Vec<ValueId> },
}

/// A function whose whole body was rewritten upstream (an optimized root).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdditionalFunction {
    pub function: ValueId,
    /// Final statements, emitted verbatim after the root's local values.
    #[serde(default)]
    pub body: Vec<JsStmt>,
    /// Values created inside the root; declared in the root's own body.
    #[serde(default)]
    pub values: Vec<ValueId>,
    /// Captured outer bindings the root writes back before returning.
    #[serde(default)]
    pub modified_bindings: Vec<(String, ValueId)>,
    #[serde(default)]
    pub result: Option<ValueId>,
    /// Enclosing optimized root, when nested.
    #[serde(default)]
    pub parent: Option<ValueId>,
}

/// The evaluator's snapshot: heap values, code, captured scopes and effects.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeapGraph {
    pub values: PrimaryMap<ValueId, HeapValue>,
    pub code_blocks: PrimaryMap<CodeBlockId, CodeBlock>,
    #[serde(default)]
    pub scopes: PrimaryMap<ScopeId, Scope>,
    #[serde(default)]
    pub effects: Vec<Effect>,
    #[serde(default)]
    pub additional_functions: Vec<AdditionalFunction>,
    /// Module id → value standing in for `require(id)`.
    #[serde(default)]
    pub module_replacements: BTreeMap<String, ValueId>,
}

impl HeapGraph {
    pub fn value(&self, id: ValueId) -> Result<&HeapValue, CoreError> {
        self.values
            .get(id)
            .ok_or_else(|| CoreError::internal(format!("unknown value v{id}")))
    }

    pub fn code_block(&self, id: CodeBlockId) -> Result<&CodeBlock, CoreError> {
        self.code_blocks
            .get(id)
            .ok_or_else(|| CoreError::internal(format!("unknown code block c{id}")))
    }

    pub fn scope(&self, id: ScopeId) -> Result<&Scope, CoreError> {
        self.scopes
            .get(id)
            .ok_or_else(|| CoreError::internal(format!("unknown scope s{id}")))
    }

    /// Innermost scope on the chain starting at `env` that declares `name`.
    pub fn declaring_scope(&self, env: Option<ScopeId>, name: &str) -> Option<ScopeId> {
        let mut current = env;
        while let Some(id) = current {
            let scope = self.scopes.get(id)?;
            if scope.declares(name) {
                return Some(id);
            }
            current = scope.parent;
        }
        None
    }

    pub fn additional_function(&self, function: ValueId) -> Option<&AdditionalFunction> {
        self.additional_functions
            .iter()
            .find(|root| root.function == function)
    }

    /// Check that every cross-reference points at an existing entity.
    pub fn validate(&self) -> Result<(), CoreError> {
        let value = |id: ValueId, what: &str| -> Result<(), CoreError> {
            if self.values.contains_key(id) {
                Ok(())
            } else {
                Err(CoreError::InvalidInput(format!("{what} references missing value v{id}")))
            }
        };
        let scope = |id: ScopeId, what: &str| -> Result<(), CoreError> {
            if self.scopes.contains_key(id) {
                Ok(())
            } else {
                Err(CoreError::InvalidInput(format!("{what} references missing scope s{id}")))
            }
        };

        for (id, heap_value) in self.values.iter() {
            let what = format!("value v{id}");
            match heap_value {
                HeapValue::Primitive(_) => {}
                HeapValue::Object(obj) => {
                    for prop in &obj.properties {
                        value(prop.value, &what)?;
                    }
                    if let Some(proto) = obj.prototype {
                        value(proto, &what)?;
                    }
                    if let Some(func) = obj.delay_into {
                        value(func, &what)?;
                        if !self.values[func].is_function() {
                            return Err(CoreError::InvalidInput(format!(
                                "{what} is delayed into v{func}, which is not a function"
                            )));
                        }
                    }
                }
                HeapValue::Function(func) => {
                    if !self.code_blocks.contains_key(func.code) {
                        return Err(CoreError::InvalidInput(format!(
                            "{what} references missing code block c{}",
                            func.code
                        )));
                    }
                    if let Some(env) = func.environment {
                        scope(env, &what)?;
                    }
                    for prop in &func.properties {
                        value(prop.value, &what)?;
                    }
                    if let Some(proto) = func.prototype {
                        value(proto, &what)?;
                    }
                    if let Some(method) = &func.class_method {
                        value(method.class_prototype, &what)?;
                        value(method.constructor, &what)?;
                        if let Some(sup) = method.super_class {
                            value(sup, &what)?;
                        }
                    }
                }
            }
        }

        for (id, s) in self.scopes.iter() {
            let what = format!("scope s{id}");
            if let Some(parent) = s.parent {
                scope(parent, &what)?;
            }
            for v in s.bindings.values().flatten() {
                value(*v, &what)?;
            }
            if let Some(root) = s.root {
                value(root, &what)?;
            }
        }

        for effect in &self.effects {
            match effect {
                Effect::GlobalAssign { value: v, .. } => value(*v, "effect")?,
                Effect::PropertyAssign { object, value: v, .. } => {
                    value(*object, "effect")?;
                    value(*v, "effect")?;
                }
                Effect::Call { callee, args } => {
                    value(*callee, "effect")?;
                    for arg in args {
                        value(*arg, "effect")?;
                    }
                }
            }
        }

        for root in &self.additional_functions {
            let what = format!("optimized root v{}", root.function);
            value(root.function, &what)?;
            if !self.values[root.function].is_function() {
                return Err(CoreError::InvalidInput(format!("{what} is not a function")));
            }
            for v in root.values.iter().chain(root.result.iter()) {
                value(*v, &what)?;
            }
            for (_, v) in &root.modified_bindings {
                value(*v, &what)?;
            }
            if let Some(parent) = root.parent {
                if self.additional_function(parent).is_none() {
                    return Err(CoreError::InvalidInput(format!(
                        "{what} is nested in v{parent}, which is not an optimized root"
                    )));
                }
            }
        }

        for (module, v) in &self.module_replacements {
            value(*v, &format!("module replacement {module:?}"))?;
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Display: human-readable dump for `residue print-heap`
// ---------------------------------------------------------------------------

fn fmt_constant(c: &Constant, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match c {
        Constant::Undefined => write!(f, "undefined"),
        Constant::Null => write!(f, "null"),
        Constant::Bool(b) => write!(f, "{b}"),
        Constant::Number(n) => write!(f, "{n}"),
        Constant::String(s) => write!(f, "{s:?}"),
    }
}

impl fmt::Display for HeapGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (id, value) in self.values.iter() {
            write!(f, "v{id} = ")?;
            match value {
                HeapValue::Primitive(c) => {
                    fmt_constant(c, f)?;
                    writeln!(f)?;
                }
                HeapValue::Object(obj) => {
                    if let Some(alias) = &obj.alias {
                        writeln!(f, "alias {alias}")?;
                        continue;
                    }
                    write!(f, "object")?;
                    if obj.lazy {
                        write!(f, " lazy")?;
                    }
                    if let Some(proto) = obj.prototype {
                        write!(f, " proto=v{proto}")?;
                    }
                    if let Some(func) = obj.delay_into {
                        write!(f, " delay_into=v{func}")?;
                    }
                    writeln!(f, " {{")?;
                    for prop in &obj.properties {
                        writeln!(f, "  {}: v{}", prop.key, prop.value)?;
                    }
                    writeln!(f, "}}")?;
                }
                HeapValue::Function(func) => {
                    write!(f, "function c{}", func.code)?;
                    if let Some(env) = func.environment {
                        write!(f, " env=s{env}")?;
                    }
                    if let Some(method) = &func.class_method {
                        write!(
                            f,
                            " {:?} {}{} of v{}",
                            method.kind,
                            if method.is_static { "static " } else { "" },
                            method.key,
                            method.class_prototype
                        )?;
                    }
                    writeln!(f)?;
                }
            }
        }
        for (id, scope) in self.scopes.iter() {
            write!(f, "s{id}")?;
            if let Some(parent) = scope.parent {
                write!(f, " parent=s{parent}")?;
            }
            write!(f, " [")?;
            for (i, (name, value)) in scope.bindings.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                let marker = if scope.modified.contains(name) { "*" } else { "" };
                match value {
                    Some(v) => write!(f, "{name}{marker}=v{v}")?,
                    None => write!(f, "{name}{marker}")?,
                }
            }
            writeln!(f, "]")?;
        }
        for (id, code) in self.code_blocks.iter() {
            writeln!(
                f,
                "c{id} {} tag={} span={}..{}",
                code.name.as_deref().unwrap_or("<anonymous>"),
                code.order_tag(),
                code.span.start,
                code.span.end
            )?;
        }
        for effect in &self.effects {
            match effect {
                Effect::GlobalAssign { name, value } => writeln!(f, "effect global {name} = v{value}")?,
                Effect::PropertyAssign { object, key, value } => {
                    writeln!(f, "effect v{object}.{key} = v{value}")?
                }
                Effect::Call { callee, args } => {
                    let args: Vec<String> = args.iter().map(|a| format!("v{a}")).collect();
                    writeln!(f, "effect call v{callee}({})", args.join(", "))?
                }
            }
        }
        for root in &self.additional_functions {
            writeln!(
                f,
                "root v{} ({} values, {} modified bindings)",
                root.function,
                root.values.len(),
                root.modified_bindings.len()
            )?;
        }
        Ok(())
    }
}
