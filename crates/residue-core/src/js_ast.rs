//! JavaScript AST shared by the heap graph and the materializer.
//!
//! Code blocks arrive from the evaluator as `JsFunction` trees; the
//! materializer clones and rewrites them, builds new statements around them
//! and hands the result to the printer in the backend crate. The tree is
//! deliberately small: it covers what residual programs contain, not the
//! whole language.

use serde::{Deserialize, Serialize};

use crate::heap::Constant;

// ---------------------------------------------------------------------------
// Operators
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    UShr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmpKind {
    Eq,
    Ne,
    LooseEq,
    LooseNe,
    Lt,
    Le,
    Gt,
    Ge,
    InstanceOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Plus,
    BitNot,
    Void,
}

/// `var` / `let` / `const`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DeclKind {
    #[default]
    Var,
    Let,
    Const,
}

/// Kind of class member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MethodKind {
    Constructor,
    #[default]
    Method,
    Getter,
    Setter,
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

/// A JavaScript expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JsExpr {
    /// Literal constant.
    Literal(Constant),
    /// Variable reference.
    Var(String),
    /// `this`.
    This,
    /// `super` (only as a callee or member object).
    Super,
    /// Arithmetic/bitwise operation: `lhs op rhs`.
    Binary {
        op: BinOp,
        lhs: Box<JsExpr>,
        rhs: Box<JsExpr>,
    },
    /// Unary operation: `op expr`.
    Unary { op: UnaryOp, expr: Box<JsExpr> },
    /// Comparison: `lhs cmp rhs`.
    Cmp {
        kind: CmpKind,
        lhs: Box<JsExpr>,
        rhs: Box<JsExpr>,
    },
    /// Field access: `object.field`.
    Field { object: Box<JsExpr>, field: String },
    /// Index access: `collection[index]`.
    Index {
        collection: Box<JsExpr>,
        index: Box<JsExpr>,
    },
    /// Call: `callee(args...)`. Method calls use a `Field` callee.
    Call { callee: Box<JsExpr>, args: Vec<JsExpr> },
    /// `new callee(args...)`.
    New { callee: Box<JsExpr>, args: Vec<JsExpr> },
    /// Ternary: `cond ? then_val : else_val`.
    Ternary {
        cond: Box<JsExpr>,
        then_val: Box<JsExpr>,
        else_val: Box<JsExpr>,
    },
    /// Short-circuit OR: `lhs || rhs`.
    LogicalOr { lhs: Box<JsExpr>, rhs: Box<JsExpr> },
    /// Short-circuit AND: `lhs && rhs`.
    LogicalAnd { lhs: Box<JsExpr>, rhs: Box<JsExpr> },
    /// Array literal.
    ArrayInit(Vec<JsExpr>),
    /// Object literal with plain keys.
    ObjectInit(Vec<(String, JsExpr)>),
    /// `!expr`.
    Not(Box<JsExpr>),
    /// `typeof expr`.
    TypeOf(Box<JsExpr>),
    /// `key in object`.
    In { key: Box<JsExpr>, object: Box<JsExpr> },
    /// `expr++`.
    PostIncrement(Box<JsExpr>),
    /// `expr--`.
    PostDecrement(Box<JsExpr>),
    /// `...expr` in argument or array position.
    Spread(Box<JsExpr>),
    /// Function or arrow function expression.
    Function(Box<JsFunction>),
    /// Class expression.
    Class(Box<JsClass>),
}

impl JsExpr {
    pub fn var(name: impl Into<String>) -> Self {
        JsExpr::Var(name.into())
    }

    pub fn num(n: f64) -> Self {
        JsExpr::Literal(Constant::Number(n))
    }

    pub fn str(s: impl Into<String>) -> Self {
        JsExpr::Literal(Constant::String(s.into()))
    }

    pub fn undefined() -> Self {
        JsExpr::Literal(Constant::Undefined)
    }

    pub fn null() -> Self {
        JsExpr::Literal(Constant::Null)
    }

    pub fn field(object: JsExpr, field: impl Into<String>) -> Self {
        JsExpr::Field {
            object: Box::new(object),
            field: field.into(),
        }
    }

    pub fn index(collection: JsExpr, index: JsExpr) -> Self {
        JsExpr::Index {
            collection: Box::new(collection),
            index: Box::new(index),
        }
    }

    pub fn call(callee: JsExpr, args: Vec<JsExpr>) -> Self {
        JsExpr::Call {
            callee: Box::new(callee),
            args,
        }
    }

    /// `object.method(args...)`.
    pub fn method_call(object: JsExpr, method: &str, args: Vec<JsExpr>) -> Self {
        JsExpr::call(JsExpr::field(object, method), args)
    }

    /// Build a member chain from a dotted path such as `globalThis.console.log`.
    pub fn path(path: &str) -> Self {
        let mut segments = path.split('.');
        let root = segments.next().unwrap_or(path);
        segments.fold(JsExpr::var(root), JsExpr::field)
    }

    /// The variable name, if this is a plain variable reference.
    pub fn as_var(&self) -> Option<&str> {
        match self {
            JsExpr::Var(name) => Some(name),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------------

/// A JavaScript statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JsStmt {
    /// `var/let/const name [= init];`.
    VarDecl {
        kind: DeclKind,
        name: String,
        init: Option<JsExpr>,
    },
    /// `target = value;`.
    Assign { target: JsExpr, value: JsExpr },
    /// `target op= value;`.
    CompoundAssign {
        target: JsExpr,
        op: BinOp,
        value: JsExpr,
    },
    /// Expression statement.
    Expr(JsExpr),
    /// If/else.
    If {
        cond: JsExpr,
        then_body: Vec<JsStmt>,
        else_body: Vec<JsStmt>,
    },
    /// While loop.
    While { cond: JsExpr, body: Vec<JsStmt> },
    /// `for (const binding of iterable)`; `declare` adds the `const`.
    ForOf {
        binding: String,
        declare: bool,
        iterable: JsExpr,
        body: Vec<JsStmt>,
    },
    /// Nested block `{ ... }`.
    Block(Vec<JsStmt>),
    /// Return.
    Return(Option<JsExpr>),
    /// Break.
    Break,
    /// Continue.
    Continue,
    /// Switch. Case bodies are printed verbatim; they carry their own `break`.
    Switch {
        value: JsExpr,
        cases: Vec<(JsExpr, Vec<JsStmt>)>,
        default_body: Option<Vec<JsStmt>>,
    },
    /// `throw expr;`.
    Throw(JsExpr),
    /// Hoisted function declaration.
    FunctionDecl(JsFunction),
}

impl JsStmt {
    /// `var name = init;`.
    pub fn var(name: impl Into<String>, init: JsExpr) -> Self {
        JsStmt::VarDecl {
            kind: DeclKind::Var,
            name: name.into(),
            init: Some(init),
        }
    }

    pub fn assign(target: JsExpr, value: JsExpr) -> Self {
        JsStmt::Assign { target, value }
    }

    /// `throw new Error(message);`.
    pub fn throw_error(message: &str) -> Self {
        JsStmt::Throw(JsExpr::New {
            callee: Box::new(JsExpr::var("Error")),
            args: vec![JsExpr::str(message)],
        })
    }
}

// ---------------------------------------------------------------------------
// Functions and classes
// ---------------------------------------------------------------------------

/// A formal parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JsParam {
    /// Plain identifier.
    Ident(String),
    /// `...name`.
    Rest(String),
    /// `name = value`.
    Default { name: String, value: JsExpr },
    /// Destructuring pattern written as an array or object literal of names.
    Pattern(JsExpr),
}

impl JsParam {
    /// Names this parameter binds in the function scope.
    pub fn bound_names(&self) -> Vec<String> {
        match self {
            JsParam::Ident(name) | JsParam::Rest(name) | JsParam::Default { name, .. } => {
                vec![name.clone()]
            }
            JsParam::Pattern(pattern) => {
                let mut names = Vec::new();
                collect_pattern_names(pattern, &mut names);
                names
            }
        }
    }
}

fn collect_pattern_names(pattern: &JsExpr, out: &mut Vec<String>) {
    match pattern {
        JsExpr::Var(name) => out.push(name.clone()),
        JsExpr::ArrayInit(elems) => {
            for elem in elems {
                collect_pattern_names(elem, out);
            }
        }
        JsExpr::ObjectInit(pairs) => {
            for (_, value) in pairs {
                collect_pattern_names(value, out);
            }
        }
        JsExpr::Spread(inner) => collect_pattern_names(inner, out),
        _ => {}
    }
}

/// A function (declaration, expression or arrow).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JsFunction {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub params: Vec<JsParam>,
    #[serde(default)]
    pub body: Vec<JsStmt>,
    /// Directive prologue (`"use strict"`), printed before the body.
    #[serde(default)]
    pub directives: Vec<String>,
    #[serde(default)]
    pub is_arrow: bool,
    #[serde(default)]
    pub is_generator: bool,
    #[serde(default)]
    pub is_async: bool,
}

/// Key of a class member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClassKey {
    Named(String),
    Computed(JsExpr),
}

/// One class member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsClassMember {
    pub kind: MethodKind,
    pub key: ClassKey,
    pub is_static: bool,
    pub function: JsFunction,
}

/// A class expression.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JsClass {
    pub name: Option<String>,
    pub super_class: Option<Box<JsExpr>>,
    pub members: Vec<JsClassMember>,
}
