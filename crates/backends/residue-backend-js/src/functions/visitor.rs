//! Scope-aware walk over a code block.
//!
//! The same walker runs in two modes. Analysis collects the block's
//! `FunctionInfo`: unbound names, reassignments, `this` / `arguments` use and
//! `require("<id>")` call sites. Rewriting replaces unbound occurrences with
//! per-instance expressions; shadowed occurrences are left alone.

use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexMap;

use residue_core::heap::{CodeBlock, Constant};
use residue_core::js_ast::{ClassKey, DeclKind, JsClass, JsExpr, JsFunction, JsParam, JsStmt};

/// Static facts shared by every instance of one code block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FunctionInfo {
    /// Free names in first-occurrence order, with occurrence counts.
    pub unbound: IndexMap<String, usize>,
    /// Free names the block assigns to.
    pub modified: BTreeSet<String>,
    pub uses_arguments: bool,
    pub uses_this: bool,
    /// The block refers to itself through its own function name.
    pub self_reference: bool,
    /// Module ids of `require("<id>")` calls whose callee is the free `require`.
    pub requires: Vec<String>,
    /// Every identifier declared or referenced anywhere in the block.
    pub identifiers: BTreeSet<String>,
}

/// Replacement expressions for one instance.
#[derive(Debug, Default)]
pub struct Replacements {
    pub names: BTreeMap<String, JsExpr>,
    /// Module id → replacement for the whole `require(id)` call.
    pub requires: BTreeMap<String, JsExpr>,
}

const FOR_OF_TEMP: &str = "__for_of_value";

pub fn analyze(code: &CodeBlock) -> FunctionInfo {
    let mut func = code.to_function();
    let mut walker = Walker::new(None, own_name(&func));
    walker.walk_root(&mut func);
    walker.info
}

/// Every identifier mentioned in a statement list.
pub fn collect_identifiers(stmts: &[JsStmt]) -> BTreeSet<String> {
    let mut func = JsFunction {
        body: stmts.to_vec(),
        ..Default::default()
    };
    let mut walker = Walker::new(None, None);
    walker.walk_root(&mut func);
    walker.info.identifiers
}

/// Rewrite the free occurrences in a clone of a code block.
pub fn rewrite_function(func: &mut JsFunction, replacements: &Replacements) {
    let self_name = own_name(func);
    let mut walker = Walker::new(Some(replacements), self_name);
    walker.walk_root(func);
}

fn own_name(func: &JsFunction) -> Option<String> {
    if func.is_arrow {
        None
    } else {
        func.name.clone()
    }
}

struct Walker<'r> {
    scopes: Vec<BTreeSet<String>>,
    /// Non-arrow function boundaries entered below the root.
    function_depth: usize,
    self_name: Option<String>,
    replacements: Option<&'r Replacements>,
    info: FunctionInfo,
}

impl<'r> Walker<'r> {
    fn new(replacements: Option<&'r Replacements>, self_name: Option<String>) -> Self {
        Self {
            scopes: Vec::new(),
            function_depth: 0,
            self_name,
            replacements,
            info: FunctionInfo::default(),
        }
    }

    fn analyzing(&self) -> bool {
        self.replacements.is_none()
    }

    fn push_scope(&mut self, names: BTreeSet<String>) {
        if self.analyzing() {
            self.info.identifiers.extend(names.iter().cloned());
        }
        self.scopes.push(names);
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn is_bound(&self, name: &str) -> bool {
        self.scopes.iter().any(|scope| scope.contains(name))
    }

    fn walk_root(&mut self, func: &mut JsFunction) {
        let mut names = function_scope_names(func);
        if let Some(name) = self.self_name.clone() {
            if self.analyzing() {
                self.info.identifiers.insert(name.clone());
            }
            // A parameter or local of the same name shadows the function.
            if names.contains(&name) {
                self.self_name = None;
            }
        }
        names.remove("arguments");
        self.push_scope(names);
        self.walk_params(&mut func.params);
        self.walk_stmts(&mut func.body);
        self.pop_scope();
    }

    // -- references -------------------------------------------------------

    /// A read of `name`; returns the replacement, if any.
    fn reference(&mut self, name: &str) -> Option<JsExpr> {
        if self.analyzing() {
            self.info.identifiers.insert(name.to_string());
        }
        if self.is_bound(name) {
            return None;
        }
        if name == "arguments" && self.function_depth == 0 {
            self.info.uses_arguments = true;
            return None;
        }
        if self.self_name.as_deref() == Some(name) {
            self.info.self_reference = true;
            return None;
        }
        match self.replacements {
            None => {
                *self.info.unbound.entry(name.to_string()).or_insert(0) += 1;
                None
            }
            Some(replacements) => replacements.names.get(name).cloned(),
        }
    }

    /// A write of `name`.
    fn assignment(&mut self, name: &str) -> Option<JsExpr> {
        let replacement = self.reference(name);
        if self.analyzing() && !self.is_bound(name) && self.info.unbound.contains_key(name) {
            self.info.modified.insert(name.to_string());
        }
        replacement
    }

    fn walk_target(&mut self, target: &mut JsExpr) {
        match target {
            JsExpr::Var(name) => {
                if let Some(replacement) = self.assignment(&name.clone()) {
                    *target = replacement;
                }
            }
            JsExpr::ArrayInit(elems) => {
                for elem in elems {
                    self.walk_target(elem);
                }
            }
            JsExpr::ObjectInit(pairs) => {
                for (_, value) in pairs {
                    self.walk_target(value);
                }
            }
            JsExpr::Spread(inner) => self.walk_target(inner),
            other => self.walk_expr(other),
        }
    }

    // -- statements -------------------------------------------------------

    fn walk_stmts(&mut self, stmts: &mut [JsStmt]) {
        for stmt in stmts {
            self.walk_stmt(stmt);
        }
    }

    fn walk_block(&mut self, stmts: &mut [JsStmt]) {
        self.push_scope(lexical_names(stmts));
        self.walk_stmts(stmts);
        self.pop_scope();
    }

    fn walk_stmt(&mut self, stmt: &mut JsStmt) {
        match stmt {
            JsStmt::VarDecl { init, .. } => {
                if let Some(init) = init {
                    self.walk_expr(init);
                }
            }
            JsStmt::Assign { target, value } => {
                self.walk_target(target);
                self.walk_expr(value);
            }
            JsStmt::CompoundAssign { target, value, .. } => {
                self.walk_target(target);
                self.walk_expr(value);
            }
            JsStmt::Expr(expr) | JsStmt::Throw(expr) => self.walk_expr(expr),
            JsStmt::Return(expr) => {
                if let Some(expr) = expr {
                    self.walk_expr(expr);
                }
            }
            JsStmt::If {
                cond,
                then_body,
                else_body,
            } => {
                self.walk_expr(cond);
                self.walk_block(then_body);
                self.walk_block(else_body);
            }
            JsStmt::While { cond, body } => {
                self.walk_expr(cond);
                self.walk_block(body);
            }
            JsStmt::ForOf {
                binding,
                declare,
                iterable,
                body,
            } => {
                self.walk_expr(iterable);
                if *declare {
                    self.push_scope(BTreeSet::from([binding.clone()]));
                    self.walk_block(body);
                    self.pop_scope();
                } else {
                    let replacement = self.assignment(&binding.clone());
                    self.walk_block(body);
                    match replacement {
                        Some(JsExpr::Var(name)) => *binding = name,
                        Some(target) => {
                            // The loop head only takes a name; assign through a temporary.
                            body.insert(0, JsStmt::assign(target, JsExpr::var(FOR_OF_TEMP)));
                            *binding = FOR_OF_TEMP.to_string();
                            *declare = true;
                        }
                        None => {}
                    }
                }
            }
            JsStmt::Block(body) => self.walk_block(body),
            JsStmt::Switch {
                value,
                cases,
                default_body,
            } => {
                self.walk_expr(value);
                let mut names = BTreeSet::new();
                for (_, body) in cases.iter() {
                    names.extend(lexical_names(body));
                }
                if let Some(body) = default_body.as_ref() {
                    names.extend(lexical_names(body));
                }
                self.push_scope(names);
                for (test, body) in cases.iter_mut() {
                    self.walk_expr(test);
                    self.walk_stmts(body);
                }
                if let Some(body) = default_body {
                    self.walk_stmts(body);
                }
                self.pop_scope();
            }
            JsStmt::FunctionDecl(func) => self.walk_function(func, false),
            JsStmt::Break | JsStmt::Continue => {}
        }
    }

    // -- expressions ------------------------------------------------------

    fn walk_expr(&mut self, expr: &mut JsExpr) {
        if let Some(module) = free_require_call(expr) {
            if !self.is_bound("require") {
                if let Some(replacement) = self.require_site(module) {
                    *expr = replacement;
                    return;
                }
            }
        }
        match expr {
            JsExpr::Var(name) => {
                if let Some(replacement) = self.reference(&name.clone()) {
                    *expr = replacement;
                }
            }
            JsExpr::This => {
                if self.function_depth == 0 {
                    self.info.uses_this = true;
                }
            }
            JsExpr::Literal(_) | JsExpr::Super => {}
            JsExpr::Binary { lhs, rhs, .. }
            | JsExpr::Cmp { lhs, rhs, .. }
            | JsExpr::LogicalOr { lhs, rhs }
            | JsExpr::LogicalAnd { lhs, rhs } => {
                self.walk_expr(lhs);
                self.walk_expr(rhs);
            }
            JsExpr::Unary { expr: inner, .. }
            | JsExpr::Not(inner)
            | JsExpr::TypeOf(inner)
            | JsExpr::Spread(inner) => self.walk_expr(inner),
            JsExpr::PostIncrement(inner) | JsExpr::PostDecrement(inner) => {
                self.walk_target(inner)
            }
            JsExpr::Field { object, .. } => self.walk_expr(object),
            JsExpr::Index { collection, index } => {
                self.walk_expr(collection);
                self.walk_expr(index);
            }
            JsExpr::Call { callee, args } | JsExpr::New { callee, args } => {
                self.walk_expr(callee);
                for arg in args {
                    self.walk_expr(arg);
                }
            }
            JsExpr::Ternary {
                cond,
                then_val,
                else_val,
            } => {
                self.walk_expr(cond);
                self.walk_expr(then_val);
                self.walk_expr(else_val);
            }
            JsExpr::In { key, object } => {
                self.walk_expr(key);
                self.walk_expr(object);
            }
            JsExpr::ArrayInit(elems) => {
                for elem in elems {
                    self.walk_expr(elem);
                }
            }
            JsExpr::ObjectInit(pairs) => {
                for (_, value) in pairs {
                    self.walk_expr(value);
                }
            }
            JsExpr::Function(func) => self.walk_function(func, true),
            JsExpr::Class(class) => self.walk_class(class),
        }
    }

    /// Record or rewrite a `require("<module>")` call with a free callee.
    fn require_site(&mut self, module: String) -> Option<JsExpr> {
        match self.replacements {
            None => {
                if !self.info.requires.contains(&module) {
                    self.info.requires.push(module);
                }
                None
            }
            Some(replacements) => replacements.requires.get(&module).cloned(),
        }
    }

    fn walk_params(&mut self, params: &mut [JsParam]) {
        for param in params {
            if let JsParam::Default { value, .. } = param {
                self.walk_expr(value);
            }
        }
    }

    fn walk_function(&mut self, func: &mut JsFunction, expression: bool) {
        let mut names = function_scope_names(func);
        if expression && !func.is_arrow {
            if let Some(name) = &func.name {
                names.insert(name.clone());
            }
        }
        if !func.is_arrow {
            self.function_depth += 1;
        }
        self.push_scope(names);
        self.walk_params(&mut func.params);
        self.walk_stmts(&mut func.body);
        self.pop_scope();
        if !func.is_arrow {
            self.function_depth -= 1;
        }
    }

    fn walk_class(&mut self, class: &mut JsClass) {
        if let Some(sup) = &mut class.super_class {
            self.walk_expr(sup);
        }
        let names: BTreeSet<String> = class.name.iter().cloned().collect();
        self.push_scope(names);
        for member in &mut class.members {
            if let ClassKey::Computed(key) = &mut member.key {
                self.walk_expr(key);
            }
            self.walk_function(&mut member.function, false);
        }
        self.pop_scope();
    }
}

/// `require("<literal>")` with a plain `require` callee.
fn free_require_call(expr: &JsExpr) -> Option<String> {
    let JsExpr::Call { callee, args } = expr else {
        return None;
    };
    if callee.as_var() != Some("require") || args.len() != 1 {
        return None;
    }
    match &args[0] {
        JsExpr::Literal(Constant::String(module)) => Some(module.clone()),
        _ => None,
    }
}

/// Names a function binds in its own scope: parameters, `arguments`, hoisted
/// `var`s and function declarations, and top-level `let`/`const`.
fn function_scope_names(func: &JsFunction) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    for param in &func.params {
        names.extend(param.bound_names());
    }
    if !func.is_arrow {
        names.insert("arguments".to_string());
    }
    collect_var_names(&func.body, &mut names);
    names.extend(lexical_names(&func.body));
    names
}

fn collect_var_names(stmts: &[JsStmt], out: &mut BTreeSet<String>) {
    for stmt in stmts {
        match stmt {
            JsStmt::VarDecl {
                kind: DeclKind::Var,
                name,
                ..
            } => {
                out.insert(name.clone());
            }
            JsStmt::FunctionDecl(func) => {
                if let Some(name) = &func.name {
                    out.insert(name.clone());
                }
            }
            JsStmt::If {
                then_body,
                else_body,
                ..
            } => {
                collect_var_names(then_body, out);
                collect_var_names(else_body, out);
            }
            JsStmt::While { body, .. } | JsStmt::ForOf { body, .. } | JsStmt::Block(body) => {
                collect_var_names(body, out)
            }
            JsStmt::Switch {
                cases,
                default_body,
                ..
            } => {
                for (_, body) in cases {
                    collect_var_names(body, out);
                }
                if let Some(body) = default_body {
                    collect_var_names(body, out);
                }
            }
            _ => {}
        }
    }
}

fn lexical_names(stmts: &[JsStmt]) -> BTreeSet<String> {
    stmts
        .iter()
        .filter_map(|stmt| match stmt {
            JsStmt::VarDecl {
                kind: DeclKind::Let | DeclKind::Const,
                name,
                ..
            } => Some(name.clone()),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use residue_core::heap::Span;
    use residue_core::js_ast::BinOp;

    fn var(name: &str) -> JsExpr {
        JsExpr::var(name)
    }

    fn add(lhs: JsExpr, rhs: JsExpr) -> JsExpr {
        JsExpr::Binary {
            op: BinOp::Add,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    fn code(name: Option<&str>, params: &[&str], body: Vec<JsStmt>) -> CodeBlock {
        CodeBlock {
            name: name.map(str::to_string),
            params: params.iter().map(|p| JsParam::Ident((*p).into())).collect(),
            body,
            directives: Vec::new(),
            is_arrow: false,
            is_generator: false,
            is_async: false,
            span: Span::new(0, 100),
            tag: None,
        }
    }

    #[test]
    fn finds_free_names_in_order() {
        let block = code(
            None,
            &["a"],
            vec![
                JsStmt::var("local", add(var("x"), var("a"))),
                JsStmt::Return(Some(add(add(var("local"), var("y")), var("x")))),
            ],
        );
        let info = analyze(&block);
        let names: Vec<_> = info.unbound.iter().map(|(n, c)| (n.as_str(), *c)).collect();
        assert_eq!(names, vec![("x", 2), ("y", 1)]);
        assert!(info.modified.is_empty());
        assert!(!info.uses_this);
        assert!(!info.uses_arguments);
    }

    #[test]
    fn nested_functions_shadow_and_hide_this() {
        let inner = JsFunction {
            params: vec![JsParam::Ident("x".into())],
            body: vec![
                JsStmt::Expr(JsExpr::This),
                JsStmt::Expr(var("arguments")),
                JsStmt::Return(Some(add(var("x"), var("z")))),
            ],
            ..Default::default()
        };
        let block = code(
            None,
            &[],
            vec![JsStmt::Return(Some(JsExpr::Function(Box::new(inner))))],
        );
        let info = analyze(&block);
        assert_eq!(info.unbound.keys().collect::<Vec<_>>(), vec!["z"]);
        assert!(!info.uses_this);
        assert!(!info.uses_arguments);
    }

    #[test]
    fn arrows_are_transparent_for_this_and_arguments() {
        let arrow = JsFunction {
            is_arrow: true,
            body: vec![JsStmt::Return(Some(JsExpr::index(
                var("arguments"),
                JsExpr::field(JsExpr::This, "n"),
            )))],
            ..Default::default()
        };
        let block = code(None, &[], vec![JsStmt::Expr(JsExpr::Function(Box::new(arrow)))]);
        let info = analyze(&block);
        assert!(info.uses_this);
        assert!(info.uses_arguments);
        assert!(info.unbound.is_empty());
    }

    #[test]
    fn assignments_mark_free_names_modified() {
        let block = code(
            None,
            &[],
            vec![
                JsStmt::assign(var("counter"), add(var("counter"), JsExpr::num(1.0))),
                JsStmt::Expr(JsExpr::PostIncrement(Box::new(var("hits")))),
                JsStmt::VarDecl {
                    kind: DeclKind::Let,
                    name: "local".into(),
                    init: None,
                },
                JsStmt::assign(var("local"), JsExpr::num(2.0)),
            ],
        );
        let info = analyze(&block);
        assert_eq!(
            info.modified.iter().collect::<Vec<_>>(),
            vec!["counter", "hits"]
        );
    }

    #[test]
    fn own_name_is_a_self_reference() {
        let block = code(
            Some("fact"),
            &["n"],
            vec![JsStmt::Return(Some(JsExpr::call(var("fact"), vec![var("n")])))],
        );
        let info = analyze(&block);
        assert!(info.self_reference);
        assert!(info.unbound.is_empty());
    }

    #[test]
    fn require_sites_are_recorded_and_rewritten() {
        let call = JsExpr::call(var("require"), vec![JsExpr::str("fs")]);
        let block = code(None, &[], vec![JsStmt::Return(Some(call))]);
        let info = analyze(&block);
        assert_eq!(info.requires, vec!["fs".to_string()]);
        assert!(info.unbound.contains_key("require"));

        let mut func = block.to_function();
        let mut replacements = Replacements::default();
        replacements.requires.insert("fs".into(), var("_3"));
        rewrite_function(&mut func, &replacements);
        assert_eq!(func.body, vec![JsStmt::Return(Some(var("_3")))]);
    }

    #[test]
    fn rewrite_skips_shadowed_occurrences() {
        let inner = JsFunction {
            params: vec![JsParam::Ident("x".into())],
            body: vec![JsStmt::Return(Some(var("x")))],
            ..Default::default()
        };
        let block = code(
            None,
            &[],
            vec![
                JsStmt::Expr(var("x")),
                JsStmt::Expr(JsExpr::Function(Box::new(inner.clone()))),
            ],
        );
        let mut func = block.to_function();
        let mut replacements = Replacements::default();
        replacements
            .names
            .insert("x".into(), JsExpr::index(var("__scope_0"), JsExpr::num(1.0)));
        rewrite_function(&mut func, &replacements);
        assert_eq!(
            func.body,
            vec![
                JsStmt::Expr(JsExpr::index(var("__scope_0"), JsExpr::num(1.0))),
                JsStmt::Expr(JsExpr::Function(Box::new(inner))),
            ]
        );
    }

    #[test]
    fn for_of_over_a_slot_goes_through_a_temporary() {
        let block = code(
            None,
            &[],
            vec![JsStmt::ForOf {
                binding: "item".into(),
                declare: false,
                iterable: var("list"),
                body: vec![],
            }],
        );
        let mut func = block.to_function();
        let mut replacements = Replacements::default();
        let slot = JsExpr::index(var("__scope_0"), JsExpr::num(0.0));
        replacements.names.insert("item".into(), slot.clone());
        rewrite_function(&mut func, &replacements);
        assert_eq!(
            func.body,
            vec![JsStmt::ForOf {
                binding: FOR_OF_TEMP.into(),
                declare: true,
                iterable: var("list"),
                body: vec![JsStmt::assign(slot, var(FOR_OF_TEMP))],
            }]
        );
    }
}
