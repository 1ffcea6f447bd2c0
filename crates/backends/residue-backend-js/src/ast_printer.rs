//! JavaScript AST printer.
//!
//! Prints `JsStmt` / `JsExpr` trees as JavaScript source. Handles identifier
//! quoting, precedence-based parenthesization and indentation of nested
//! function and class bodies. Contains no knowledge of the heap graph.

use std::fmt::Write;

use residue_core::heap::Constant;
use residue_core::js_ast::{
    BinOp, ClassKey, CmpKind, DeclKind, JsClass, JsExpr, JsFunction, JsParam, JsStmt, MethodKind,
    UnaryOp,
};

/// Print a complete program: directive prologue followed by statements.
pub fn print_program(directives: &[String], stmts: &[JsStmt]) -> String {
    let mut out = String::new();
    for directive in directives {
        let _ = writeln!(out, "\"{}\";", escape_js_string(directive));
    }
    print_stmts(stmts, &mut out, "");
    out
}

/// Print a single expression at top-level indentation.
pub fn expr_to_string(expr: &JsExpr) -> String {
    print_expr(expr, "")
}

/// Print a statement list at top-level indentation.
pub fn stmts_to_string(stmts: &[JsStmt]) -> String {
    let mut out = String::new();
    print_stmts(stmts, &mut out, "");
    out
}

// ---------------------------------------------------------------------------
// Statement printing
// ---------------------------------------------------------------------------

fn print_stmts(stmts: &[JsStmt], out: &mut String, indent: &str) {
    for stmt in stmts {
        print_stmt(stmt, out, indent);
    }
}

fn print_stmt(stmt: &JsStmt, out: &mut String, indent: &str) {
    match stmt {
        JsStmt::VarDecl { kind, name, init } => {
            let kw = decl_keyword(*kind);
            match init {
                Some(init) => {
                    let _ = writeln!(out, "{indent}{kw} {name} = {};", print_expr(init, indent));
                }
                None => {
                    let _ = writeln!(out, "{indent}{kw} {name};");
                }
            }
        }

        JsStmt::Assign { target, value } => {
            let tgt = print_expr(target, indent);
            let val = print_expr(value, indent);
            if tgt.starts_with('{') {
                let _ = writeln!(out, "{indent}({tgt} = {val});");
            } else {
                let _ = writeln!(out, "{indent}{tgt} = {val};");
            }
        }

        JsStmt::CompoundAssign { target, op, value } => {
            let _ = writeln!(
                out,
                "{indent}{} {}= {};",
                print_expr(target, indent),
                binop_str(*op),
                print_expr(value, indent),
            );
        }

        JsStmt::Expr(expr) => {
            let s = print_expr(expr, indent);
            // A leading `{`, `function` or `class` would parse as a statement.
            if s.starts_with('{') || s.starts_with("function") || s.starts_with("class") {
                let _ = writeln!(out, "{indent}({s});");
            } else {
                let _ = writeln!(out, "{indent}{s};");
            }
        }

        JsStmt::If {
            cond,
            then_body,
            else_body,
        } => {
            let inner = format!("{indent}  ");
            let _ = writeln!(out, "{indent}if ({}) {{", print_expr(cond, indent));
            print_stmts(then_body, out, &inner);
            if else_body.is_empty() {
                let _ = writeln!(out, "{indent}}}");
            } else {
                let _ = writeln!(out, "{indent}}} else {{");
                print_stmts(else_body, out, &inner);
                let _ = writeln!(out, "{indent}}}");
            }
        }

        JsStmt::While { cond, body } => {
            let _ = writeln!(out, "{indent}while ({}) {{", print_expr(cond, indent));
            let inner = format!("{indent}  ");
            print_stmts(body, out, &inner);
            let _ = writeln!(out, "{indent}}}");
        }

        JsStmt::ForOf {
            binding,
            declare,
            iterable,
            body,
        } => {
            let inner = format!("{indent}  ");
            let decl = if *declare { "const " } else { "" };
            let _ = writeln!(
                out,
                "{indent}for ({decl}{binding} of {}) {{",
                print_expr(iterable, indent),
            );
            print_stmts(body, out, &inner);
            let _ = writeln!(out, "{indent}}}");
        }

        JsStmt::Block(body) => {
            let _ = writeln!(out, "{indent}{{");
            let inner = format!("{indent}  ");
            print_stmts(body, out, &inner);
            let _ = writeln!(out, "{indent}}}");
        }

        JsStmt::Return(expr) => {
            if let Some(e) = expr {
                let _ = writeln!(out, "{indent}return {};", print_expr(e, indent));
            } else {
                let _ = writeln!(out, "{indent}return;");
            }
        }

        JsStmt::Break => {
            let _ = writeln!(out, "{indent}break;");
        }

        JsStmt::Continue => {
            let _ = writeln!(out, "{indent}continue;");
        }

        JsStmt::Switch {
            value,
            cases,
            default_body,
        } => {
            let _ = writeln!(out, "{indent}switch ({}) {{", print_expr(value, indent));
            let case_indent = format!("{indent}    ");
            for (test, case_stmts) in cases {
                let _ = writeln!(out, "{indent}  case {}:", print_expr(test, indent));
                print_stmts(case_stmts, out, &case_indent);
            }
            if let Some(default_body) = default_body {
                let _ = writeln!(out, "{indent}  default:");
                print_stmts(default_body, out, &case_indent);
            }
            let _ = writeln!(out, "{indent}}}");
        }

        JsStmt::Throw(expr) => {
            let _ = writeln!(out, "{indent}throw {};", print_expr(expr, indent));
        }

        JsStmt::FunctionDecl(func) => {
            let _ = writeln!(out, "{indent}{}", print_function(func, indent));
        }
    }
}

fn decl_keyword(kind: DeclKind) -> &'static str {
    match kind {
        DeclKind::Var => "var",
        DeclKind::Let => "let",
        DeclKind::Const => "const",
    }
}

// ---------------------------------------------------------------------------
// Functions and classes
// ---------------------------------------------------------------------------

/// Print a function as an expression (or declaration, when named and placed
/// in statement position). The closing brace is at `indent`.
fn print_function(func: &JsFunction, indent: &str) -> String {
    let params = print_params(&func.params, indent);
    let async_kw = if func.is_async { "async " } else { "" };
    let mut out = if func.is_arrow {
        format!("{async_kw}({params}) => {{\n")
    } else {
        let star = if func.is_generator { "*" } else { "" };
        match &func.name {
            Some(name) => format!("{async_kw}function{star} {name}({params}) {{\n"),
            None => format!("{async_kw}function{star} ({params}) {{\n"),
        }
    };
    print_body(func, &mut out, indent);
    out.push_str(indent);
    out.push('}');
    out
}

fn print_body(func: &JsFunction, out: &mut String, indent: &str) {
    let inner = format!("{indent}  ");
    for directive in &func.directives {
        let _ = writeln!(out, "{inner}\"{}\";", escape_js_string(directive));
    }
    print_stmts(&func.body, out, &inner);
}

fn print_params(params: &[JsParam], indent: &str) -> String {
    params
        .iter()
        .map(|param| match param {
            JsParam::Ident(name) => name.clone(),
            JsParam::Rest(name) => format!("...{name}"),
            JsParam::Default { name, value } => format!("{name} = {}", print_expr(value, indent)),
            JsParam::Pattern(pattern) => print_expr(pattern, indent),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_class(class: &JsClass, indent: &str) -> String {
    let mut out = String::from("class");
    if let Some(name) = &class.name {
        let _ = write!(out, " {name}");
    }
    if let Some(sup) = &class.super_class {
        let _ = write!(out, " extends {}", print_expr_operand(sup, indent));
    }
    out.push_str(" {\n");
    let member_indent = format!("{indent}  ");
    for member in &class.members {
        let key = match &member.key {
            ClassKey::Named(name) if is_valid_js_ident(name) => name.clone(),
            ClassKey::Named(name) => format!("\"{}\"", escape_js_string(name)),
            ClassKey::Computed(expr) => format!("[{}]", print_expr(expr, &member_indent)),
        };
        let static_kw = if member.is_static { "static " } else { "" };
        let async_kw = if member.function.is_async { "async " } else { "" };
        let star = if member.function.is_generator { "*" } else { "" };
        let head = match member.kind {
            MethodKind::Constructor => "constructor".to_string(),
            MethodKind::Getter => format!("{static_kw}get {key}"),
            MethodKind::Setter => format!("{static_kw}set {key}"),
            MethodKind::Method => format!("{static_kw}{async_kw}{star}{key}"),
        };
        let params = print_params(&member.function.params, &member_indent);
        let _ = writeln!(out, "{member_indent}{head}({params}) {{");
        print_body(&member.function, &mut out, &member_indent);
        let _ = writeln!(out, "{member_indent}}}");
    }
    out.push_str(indent);
    out.push('}');
    out
}

// ---------------------------------------------------------------------------
// Expression printing
// ---------------------------------------------------------------------------

fn print_expr(expr: &JsExpr, indent: &str) -> String {
    match expr {
        JsExpr::Literal(c) => emit_constant(c),

        JsExpr::Var(name) => name.clone(),

        JsExpr::This => "this".into(),

        JsExpr::Super => "super".into(),

        JsExpr::Binary { op, lhs, rhs } => format!(
            "{} {} {}",
            print_expr_operand(lhs, indent),
            binop_str(*op),
            print_expr_operand(rhs, indent),
        ),

        JsExpr::Unary { op, expr: inner } => {
            let op_str = match op {
                UnaryOp::Neg => "-",
                UnaryOp::Plus => "+",
                UnaryOp::BitNot => "~",
                UnaryOp::Void => "void ",
            };
            format!("{op_str}{}", print_expr_operand(inner, indent))
        }

        JsExpr::Cmp { kind, lhs, rhs } => format!(
            "{} {} {}",
            print_expr_operand(lhs, indent),
            cmp_str(*kind),
            print_expr_operand(rhs, indent),
        ),

        JsExpr::Field { object, field } => {
            let obj = if is_number_literal(object) {
                format!("({})", print_expr(object, indent))
            } else {
                print_expr_operand(object, indent)
            };
            if is_valid_js_ident(field) {
                format!("{obj}.{field}")
            } else {
                format!("{obj}[\"{}\"]", escape_js_string(field))
            }
        }

        JsExpr::Index { collection, index } => format!(
            "{}[{}]",
            print_expr_operand(collection, indent),
            print_expr(index, indent),
        ),

        JsExpr::Call { callee, args } => format!(
            "{}({})",
            print_expr_operand(callee, indent),
            print_args(args, indent),
        ),

        JsExpr::New { callee, args } => {
            // `new f(a)()` parses as `(new f(a))()`; keep call callees wrapped.
            let callee_str = match callee.as_ref() {
                JsExpr::Call { .. } => format!("({})", print_expr(callee, indent)),
                _ => print_expr_operand(callee, indent),
            };
            format!("new {callee_str}({})", print_args(args, indent))
        }

        JsExpr::Ternary {
            cond,
            then_val,
            else_val,
        } => format!(
            "{} ? {} : {}",
            print_expr_operand(cond, indent),
            print_expr_operand(then_val, indent),
            print_expr_operand(else_val, indent),
        ),

        JsExpr::LogicalOr { lhs, rhs } => format!(
            "{} || {}",
            print_expr_operand(lhs, indent),
            print_expr_operand(rhs, indent),
        ),

        JsExpr::LogicalAnd { lhs, rhs } => format!(
            "{} && {}",
            print_expr_operand(lhs, indent),
            print_expr_operand(rhs, indent),
        ),

        JsExpr::ArrayInit(elems) => format!("[{}]", print_args(elems, indent)),

        JsExpr::ObjectInit(pairs) => {
            if pairs.is_empty() {
                return "{}".to_string();
            }
            let fields: Vec<_> = pairs
                .iter()
                .map(|(name, val)| {
                    if is_valid_js_ident(name) {
                        format!("{name}: {}", print_expr(val, indent))
                    } else {
                        format!("\"{}\": {}", escape_js_string(name), print_expr(val, indent))
                    }
                })
                .collect();
            format!("{{ {} }}", fields.join(", "))
        }

        JsExpr::Not(inner) => format!("!{}", print_expr_operand(inner, indent)),

        JsExpr::TypeOf(inner) => format!("typeof {}", print_expr_operand(inner, indent)),

        JsExpr::In { key, object } => format!(
            "{} in {}",
            print_expr_operand(key, indent),
            print_expr_operand(object, indent),
        ),

        JsExpr::PostIncrement(inner) => format!("{}++", print_expr_operand(inner, indent)),

        JsExpr::PostDecrement(inner) => format!("{}--", print_expr_operand(inner, indent)),

        JsExpr::Spread(inner) => format!("...{}", print_expr_operand(inner, indent)),

        JsExpr::Function(func) => print_function(func, indent),

        JsExpr::Class(class) => print_class(class, indent),
    }
}

fn print_args(args: &[JsExpr], indent: &str) -> String {
    args.iter()
        .map(|arg| print_expr(arg, indent))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Print an expression as an operand (may need parenthesization).
fn print_expr_operand(expr: &JsExpr, indent: &str) -> String {
    if needs_parens(expr) {
        format!("({})", print_expr(expr, indent))
    } else {
        print_expr(expr, indent)
    }
}

/// Whether an expression needs parentheses when used as an operand.
fn needs_parens(expr: &JsExpr) -> bool {
    match expr {
        JsExpr::Literal(Constant::Number(n)) => n.is_sign_negative(),
        JsExpr::Binary { .. }
        | JsExpr::Cmp { .. }
        | JsExpr::Ternary { .. }
        | JsExpr::LogicalOr { .. }
        | JsExpr::LogicalAnd { .. }
        | JsExpr::Unary { .. }
        | JsExpr::Not(_)
        | JsExpr::TypeOf(_)
        | JsExpr::In { .. }
        | JsExpr::Function(_)
        | JsExpr::Class(_) => true,
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn is_number_literal(expr: &JsExpr) -> bool {
    matches!(expr, JsExpr::Literal(Constant::Number(_)))
}

fn binop_str(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Rem => "%",
        BinOp::BitAnd => "&",
        BinOp::BitOr => "|",
        BinOp::BitXor => "^",
        BinOp::Shl => "<<",
        BinOp::Shr => ">>",
        BinOp::UShr => ">>>",
    }
}

fn cmp_str(kind: CmpKind) -> &'static str {
    match kind {
        CmpKind::Eq => "===",
        CmpKind::Ne => "!==",
        CmpKind::Lt => "<",
        CmpKind::Le => "<=",
        CmpKind::Gt => ">",
        CmpKind::Ge => ">=",
        CmpKind::LooseEq => "==",
        CmpKind::LooseNe => "!=",
        CmpKind::InstanceOf => "instanceof",
    }
}

pub fn is_valid_js_ident(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

pub(crate) fn emit_constant(c: &Constant) -> String {
    match c {
        Constant::Undefined => "undefined".into(),
        Constant::Null => "null".into(),
        Constant::Bool(b) => b.to_string(),
        Constant::Number(n) => format_number(*n),
        Constant::String(s) => format!("\"{}\"", escape_js_string(s)),
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".into()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity".into() } else { "-Infinity".into() }
    } else {
        format!("{n}")
    }
}

pub fn escape_js_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            _ => out.push(ch),
        }
    }
    out
}
