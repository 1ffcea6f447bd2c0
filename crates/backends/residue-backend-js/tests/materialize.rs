use residue_backend_js::ast_printer::stmts_to_string;
use residue_backend_js::{materialize, JsBackend, ResidualProgram};
use residue_core::error::CoreError;
use residue_core::heap::{
    AdditionalFunction, ClassMethod, CodeBlock, CodeBlockId, Constant, Effect, FunctionValue,
    HeapGraph, HeapValue, IntegrityLevel, ObjectValue, Property, Scope, ScopeId, Span, ValueId,
};
use residue_core::js_ast::{BinOp, JsExpr, JsParam, JsStmt, MethodKind};
use residue_core::pipeline::{Backend, BackendInput, LazyObjectsConfig, SerializerConfig};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Small builder over a heap graph.
#[derive(Default)]
struct Heap {
    graph: HeapGraph,
}

impl Heap {
    fn num(&mut self, n: f64) -> ValueId {
        self.graph
            .values
            .push(HeapValue::Primitive(Constant::Number(n)))
    }

    fn object(&mut self, obj: ObjectValue) -> ValueId {
        self.graph.values.push(HeapValue::Object(obj))
    }

    fn set_properties(&mut self, id: ValueId, props: &[(&str, ValueId)]) {
        let props: Vec<Property> = props
            .iter()
            .map(|(key, value)| Property {
                key: key.to_string(),
                value: *value,
            })
            .collect();
        match self.graph.values.get_mut(id) {
            Some(HeapValue::Object(obj)) => obj.properties = props,
            Some(HeapValue::Function(func)) => func.properties = props,
            other => panic!("v{id} cannot hold properties: {other:?}"),
        }
    }

    fn code(&mut self, block: CodeBlock) -> CodeBlockId {
        self.graph.code_blocks.push(block)
    }

    fn function(&mut self, code: CodeBlockId, environment: Option<ScopeId>) -> ValueId {
        self.graph.values.push(HeapValue::Function(FunctionValue {
            code,
            environment,
            properties: Vec::new(),
            prototype: None,
            class_method: None,
        }))
    }

    fn scope(&mut self, bindings: &[(&str, Option<ValueId>)], modified: &[&str]) -> ScopeId {
        let mut scope = Scope::default();
        for (name, value) in bindings {
            scope.bindings.insert(name.to_string(), *value);
        }
        scope.modified = modified.iter().map(|name| name.to_string()).collect();
        self.graph.scopes.push(scope)
    }

    fn global(&mut self, name: &str, value: ValueId) {
        self.graph.effects.push(Effect::GlobalAssign {
            name: name.into(),
            value,
        });
    }
}

fn block(name: &str, params: &[&str], body: Vec<JsStmt>, span: (u32, u32)) -> CodeBlock {
    CodeBlock {
        name: Some(name.into()),
        params: params.iter().map(|p| JsParam::Ident(p.to_string())).collect(),
        body,
        directives: Vec::new(),
        is_arrow: false,
        is_generator: false,
        is_async: false,
        span: Span::new(span.0, span.1),
        tag: None,
    }
}

fn ret(expr: JsExpr) -> JsStmt {
    JsStmt::Return(Some(expr))
}

fn add(lhs: JsExpr, rhs: JsExpr) -> JsExpr {
    JsExpr::Binary {
        op: BinOp::Add,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

fn var(name: &str) -> JsExpr {
    JsExpr::var(name)
}

fn plain_config() -> SerializerConfig {
    SerializerConfig {
        wrap_iife: false,
        ..Default::default()
    }
}

fn lazy_config() -> SerializerConfig {
    SerializerConfig {
        lazy_objects: Some(LazyObjectsConfig::default()),
        ..plain_config()
    }
}

fn run(heap: &Heap, config: &SerializerConfig) -> ResidualProgram {
    init_logger();
    materialize(&heap.graph, config).unwrap()
}

fn position(haystack: &str, needle: &str) -> usize {
    haystack
        .find(needle)
        .unwrap_or_else(|| panic!("{needle:?} not found in:\n{haystack}"))
}

// ---------------------------------------------------------------------------
// Function instances
// ---------------------------------------------------------------------------

#[test]
fn five_instances_share_one_bound_factory() {
    let mut heap = Heap::default();
    let code = heap.code(block(
        "counter",
        &["step"],
        vec![ret(add(var("base"), var("step")))],
        (0, 100),
    ));
    for i in 0..5 {
        let base = heap.num(i as f64);
        let scope = heap.scope(&[("base", Some(base))], &[]);
        let f = heap.function(code, Some(scope));
        heap.global(&format!("f{i}"), f);
    }

    let program = run(&heap, &plain_config());
    let prelude = stmts_to_string(&program.prelude);
    let body = stmts_to_string(&program.body);

    assert!(prelude.contains("function $f_0(base, step) {"), "{prelude}");
    assert!(prelude.contains("return base + step;"), "{prelude}");
    assert_eq!(prelude.matches("function $f_").count(), 1, "{prelude}");
    for i in 0..5 {
        assert!(
            body.contains(&format!("= $f_0.bind(null, {i});")),
            "{body}"
        );
    }
    assert!(!body.contains(".call("), "{body}");
    assert_eq!(program.stats.factory_blocks, 1);
    assert_eq!(program.stats.bind_stubs, 5);
    assert_eq!(program.stats.call_stubs, 0);

    // Every stub precedes the global write that uses it.
    let first_def = position(&body, "var _0 = $f_0.bind(null, 0);");
    let first_use = position(&body, "globalThis.f0 = _0;");
    assert!(first_def < first_use, "{body}");
}

#[test]
fn function_valued_arguments_get_call_wrappers() {
    let mut heap = Heap::default();
    let leaf = heap.code(block("leaf", &[], vec![ret(JsExpr::num(1.0))], (0, 20)));
    let wrap = heap.code(block(
        "wrap",
        &[],
        vec![ret(JsExpr::call(var("inner"), vec![]))],
        (100, 200),
    ));
    for i in 0..2 {
        let inner = heap.function(leaf, None);
        let scope = heap.scope(&[("inner", Some(inner))], &[]);
        let f = heap.function(wrap, Some(scope));
        heap.global(&format!("w{i}"), f);
    }

    let program = run(&heap, &plain_config());
    let out = program.to_source();
    assert!(out.contains("return $f_0.call(this, "), "{out}");
    assert!(!out.contains(".bind(null"), "{out}");
    assert_eq!(program.stats.call_stubs, 2);
    assert_eq!(program.stats.inlined_blocks, 1);
}

#[test]
fn pattern_parameter_in_call_wrapper_is_unsupported() {
    init_logger();
    let mut heap = Heap::default();
    let mut code = block(
        "pick",
        &[],
        vec![ret(add(JsExpr::field(JsExpr::This, "k"), add(var("a"), var("base"))))],
        (0, 100),
    );
    code.params = vec![JsParam::Pattern(JsExpr::ObjectInit(vec![(
        "a".into(),
        var("a"),
    )]))];
    let code = heap.code(code);
    for i in 0..2 {
        let base = heap.num(i as f64);
        let scope = heap.scope(&[("base", Some(base))], &[]);
        let f = heap.function(code, Some(scope));
        heap.global(&format!("p{i}"), f);
    }

    let err = materialize(&heap.graph, &plain_config()).unwrap_err();
    assert!(matches!(err, CoreError::Unsupported(_)), "{err}");
}

#[test]
fn call_wrapper_leaves_defaults_to_the_factory() {
    let mut heap = Heap::default();
    let mut code = block(
        "scale",
        &[],
        vec![ret(add(JsExpr::field(JsExpr::This, "k"), var("a")))],
        (0, 100),
    );
    code.params = vec![JsParam::Default {
        name: "a".into(),
        value: var("base"),
    }];
    let code = heap.code(code);
    for i in 0..2 {
        let base = heap.num(i as f64);
        let scope = heap.scope(&[("base", Some(base))], &[]);
        let f = heap.function(code, Some(scope));
        heap.global(&format!("s{i}"), f);
    }

    let program = run(&heap, &plain_config());
    let prelude = stmts_to_string(&program.prelude);
    let body = stmts_to_string(&program.body);
    assert!(prelude.contains("function $f_0(base, a = base) {"), "{prelude}");
    for i in 0..2 {
        assert!(body.contains(&format!("function _{i}(a) {{")), "{body}");
        assert!(
            body.contains(&format!("return $f_0.call(this, {i}, a);")),
            "{body}"
        );
    }
    assert!(!body.contains("a = base"), "{body}");
    assert_eq!(program.stats.call_stubs, 2);
}

#[test]
fn factory_order_follows_code_block_tags() {
    let mut heap = Heap::default();
    let mut late = block("late", &[], vec![ret(var("a"))], (0, 100));
    late.tag = Some(50);
    let mut early = block("early", &[], vec![ret(var("b"))], (200, 300));
    early.tag = Some(10);
    let late = heap.code(late);
    let early = heap.code(early);
    for (code, name) in [(late, "a"), (early, "b")] {
        for i in 0..2 {
            let value = heap.num(i as f64);
            let scope = heap.scope(&[(name, Some(value))], &[]);
            let f = heap.function(code, Some(scope));
            heap.global(&format!("{name}{i}"), f);
        }
    }

    let program = run(&heap, &plain_config());
    let prelude = stmts_to_string(&program.prelude);
    assert!(
        position(&prelude, "function $f_0(b)") < position(&prelude, "function $f_1(a)"),
        "{prelude}"
    );
    assert_eq!(run(&heap, &plain_config()).to_source(), program.to_source());
}

#[test]
fn modified_binding_lives_in_a_scope_slot() {
    let mut heap = Heap::default();
    let zero = heap.num(0.0);
    let scope = heap.scope(&[("count", Some(zero))], &["count"]);
    let code = heap.code(block(
        "inc",
        &[],
        vec![
            JsStmt::assign(var("count"), add(var("count"), JsExpr::num(1.0))),
            ret(var("count")),
        ],
        (0, 20),
    ));
    let f = heap.function(code, Some(scope));
    heap.global("inc", f);

    let program = run(&heap, &plain_config());
    let out = program.to_source();
    assert!(out.contains("var __captured_scopes = Array(1);"), "{out}");
    assert!(out.contains("function __get_scope_binding(__selector) {"), "{out}");
    assert!(out.contains("__captured = [0];"), "{out}");
    assert!(
        out.contains("var __scope_0 = __captured_scopes[0] || __get_scope_binding(0);"),
        "{out}"
    );
    assert!(out.contains("__scope_0[0] = __scope_0[0] + 1;"), "{out}");
    assert!(out.contains("return __scope_0[0];"), "{out}");
    assert!(!out.contains("count"), "{out}");
    assert_eq!(program.stats.referentialized_scopes, 1);
    assert_eq!(program.stats.cloned_blocks, 1);
}

#[test]
fn factory_takes_scope_selectors_before_varying_values() {
    let mut heap = Heap::default();
    let code = heap.code(block(
        "tick",
        &[],
        vec![
            JsStmt::assign(var("count"), add(var("count"), var("base"))),
            ret(var("count")),
        ],
        (0, 100),
    ));
    for i in 0..2 {
        let zero = heap.num(0.0);
        let base = heap.num(10.0 * (i + 1) as f64);
        let scope = heap.scope(&[("count", Some(zero)), ("base", Some(base))], &["count"]);
        let f = heap.function(code, Some(scope));
        heap.global(&format!("t{i}"), f);
    }

    let program = run(&heap, &plain_config());
    let prelude = stmts_to_string(&program.prelude);
    let body = stmts_to_string(&program.body);
    assert!(prelude.contains("var __captured_scopes = Array(2);"), "{prelude}");
    assert!(prelude.contains("function $f_0(__selector_0, base) {"), "{prelude}");
    assert!(
        prelude.contains(
            "var __scope_0 = __captured_scopes[__selector_0] || __get_scope_binding(__selector_0);"
        ),
        "{prelude}"
    );
    assert!(prelude.contains("__scope_0[0] = __scope_0[0] + base;"), "{prelude}");
    assert!(
        position(&prelude, "var __captured_scopes") < position(&prelude, "function $f_0"),
        "{prelude}"
    );
    assert!(body.contains("var _0 = $f_0.bind(null, 0, 10);"), "{body}");
    assert!(body.contains("var _1 = $f_0.bind(null, 1, 20);"), "{body}");
    assert_eq!(program.stats.factory_blocks, 1);
    assert_eq!(program.stats.referentialized_scopes, 2);
}

#[test]
fn simple_closures_hoist_one_shared_variable() {
    let mut heap = Heap::default();
    let zero = heap.num(0.0);
    let scope = heap.scope(&[("count", Some(zero))], &["count"]);
    let code = heap.code(block(
        "inc",
        &[],
        vec![JsStmt::assign(var("count"), add(var("count"), JsExpr::num(1.0)))],
        (0, 20),
    ));
    let f = heap.function(code, Some(scope));
    heap.global("inc", f);

    let config = SerializerConfig {
        simple_closures: true,
        ..plain_config()
    };
    let out = run(&heap, &config).to_source();
    assert!(out.contains("var __captured_0 = 0;"), "{out}");
    assert!(out.contains("__captured_0 = __captured_0 + 1;"), "{out}");
    assert!(!out.contains("__get_scope_binding"), "{out}");
    assert!(position(&out, "var __captured_0 = 0;") < position(&out, "var _0 = function inc"));
}

#[test]
fn definitions_are_spliced_before_first_use() {
    let mut heap = Heap::default();
    let cfg = heap.object(ObjectValue {
        integrity: Some(IntegrityLevel::Frozen),
        ..Default::default()
    });
    let scope = heap.scope(&[("cfg", Some(cfg))], &[]);
    let code = heap.code(block("f", &[], vec![ret(var("cfg"))], (0, 10)));
    let f = heap.function(code, Some(scope));
    heap.set_properties(cfg, &[("handler", f)]);
    heap.global("f", f);

    let out = run(&heap, &plain_config()).to_source();
    let decl_cfg = position(&out, "var _1 = {};");
    let decl_f = position(&out, "var _0 = function f() {");
    let handler = position(&out, "_1.handler = _0;");
    let freeze = position(&out, "Object.freeze(_1);");
    let global = position(&out, "globalThis.f = _0;");
    assert!(decl_cfg < decl_f, "{out}");
    assert!(decl_f < handler, "{out}");
    assert!(handler < freeze, "{out}");
    assert!(freeze < global, "{out}");
    assert!(out.contains("return _1;"), "{out}");
}

fn delayed_object(heap: &mut Heap, v: f64) -> ValueId {
    let n = heap.num(v);
    let obj = heap.object(ObjectValue::default());
    heap.set_properties(obj, &[("v", n)]);
    obj
}

fn delay_into(heap: &mut Heap, obj: ValueId, function: ValueId) {
    if let Some(HeapValue::Object(obj)) = heap.graph.values.get_mut(obj) {
        obj.delay_into = Some(function);
    }
}

#[test]
fn delayed_initializer_forces_a_call_stub() {
    let mut heap = Heap::default();
    let code = heap.code(block("get", &[], vec![ret(var("cfg"))], (0, 100)));
    let mut functions = Vec::new();
    for i in 0..2 {
        let cfg = delayed_object(&mut heap, (i + 1) as f64);
        let scope = heap.scope(&[("cfg", Some(cfg))], &[]);
        let f = heap.function(code, Some(scope));
        functions.push((cfg, f));
        heap.global(&format!("g{i}"), f);
    }
    let (cfg, f) = functions[0];
    delay_into(&mut heap, cfg, f);

    let program = run(&heap, &plain_config());
    let body = stmts_to_string(&program.body);
    assert!(body.contains("var _1;"), "{body}");
    assert!(body.contains("function _0() {\n  if (!__init_0) {"), "{body}");
    let init = position(&body, "if (!__init_0) {");
    let flag = position(&body, "__init_0 = true;");
    let construct = position(&body, "_1 = {};");
    let property = position(&body, "_1.v = 1;");
    let call = position(&body, "return $f_0.call(this, _1);");
    assert!(init < flag && flag < construct && construct < property && property < call, "{body}");
    assert!(body.contains("var __init_0;"), "{body}");
    assert!(body.contains("var _2 = $f_0.bind(null, _3);"), "{body}");
    assert_eq!(program.stats.call_stubs, 1);
    assert_eq!(program.stats.bind_stubs, 1);
}

#[test]
fn delayed_initializer_runs_before_scope_setup() {
    let mut heap = Heap::default();
    let zero = heap.num(0.0);
    let cfg = delayed_object(&mut heap, 1.0);
    let scope = heap.scope(&[("n", Some(zero)), ("cfg", Some(cfg))], &["n"]);
    let code = heap.code(block(
        "get",
        &[],
        vec![
            JsStmt::assign(var("n"), add(var("n"), JsExpr::num(1.0))),
            ret(var("cfg")),
        ],
        (0, 100),
    ));
    let f = heap.function(code, Some(scope));
    delay_into(&mut heap, cfg, f);
    heap.global("get", f);

    let out = run(&heap, &plain_config()).to_source();
    assert!(out.contains("var _0 = function get() {\n  if (!__init_0) {"), "{out}");
    assert!(
        position(&out, "_1.v = 1;") < position(&out, "var __scope_0 = "),
        "{out}"
    );
    assert!(out.contains("return _1;"), "{out}");
}

#[test]
fn prototype_alias_forces_a_call_stub() {
    let mut heap = Heap::default();
    let code = heap.code(block("Base", &[], vec![ret(var("base"))], (0, 100)));
    for i in 0..2 {
        let base = heap.num((i + 1) as f64);
        let scope = heap.scope(&[("base", Some(base))], &[]);
        let f = heap.function(code, Some(scope));
        heap.global(&format!("c{i}"), f);
        if i == 0 {
            let proto = heap.object(ObjectValue::default());
            if let Some(HeapValue::Function(func)) = heap.graph.values.get_mut(f) {
                func.prototype = Some(proto);
            }
            heap.global("p0", proto);
        }
    }

    let program = run(&heap, &plain_config());
    let body = stmts_to_string(&program.body);
    let stub = position(&body, "function _0() {");
    let call = position(&body, "return $f_0.call(this, 1);");
    let alias = position(&body, "var _1 = _0.prototype;");
    let global = position(&body, "globalThis.p0 = _1;");
    assert!(stub < call && call < alias && alias < global, "{body}");
    assert!(body.contains("var _2 = $f_0.bind(null, 2);"), "{body}");
    assert_eq!(program.stats.call_stubs, 1);
    assert_eq!(program.stats.bind_stubs, 1);
}

#[test]
fn require_calls_use_module_replacements() {
    let mut heap = Heap::default();
    let lib = heap.num(5.0);
    heap.graph.module_replacements.insert("lib".into(), lib);
    let require_lib = || JsExpr::call(var("require"), vec![JsExpr::str("lib")]);

    let load = heap.code(block("load", &[], vec![ret(require_lib())], (0, 10)));
    let f = heap.function(load, None);
    heap.global("load", f);

    let own = heap.code(block(
        "own",
        &[],
        vec![
            JsStmt::assign(var("require"), var("myRequire")),
            ret(require_lib()),
        ],
        (20, 30),
    ));
    let g = heap.function(own, None);
    heap.global("own", g);

    let out = run(&heap, &plain_config()).to_source();
    assert!(out.contains("var _0 = function load() {\n  return 5;\n};"), "{out}");
    assert!(out.contains("require = myRequire;"), "{out}");
    assert!(out.contains("return require(\"lib\");"), "{out}");
    assert_eq!(out.matches("require(").count(), 1, "{out}");
}

/// `class Point { constructor(x) { this.x = x; } norm() { return this.x; } }`
/// with `Point` written to a global; returns `(constructor, norm)`.
fn point_class(heap: &mut Heap, norm_body: Vec<JsStmt>) -> (ValueId, ValueId) {
    let proto = heap.object(ObjectValue::default());
    let ctor_code = heap.code(block(
        "Point",
        &["x"],
        vec![JsStmt::assign(JsExpr::field(JsExpr::This, "x"), var("x"))],
        (0, 40),
    ));
    let norm_code = heap.code(block("norm", &[], norm_body, (50, 80)));
    let ctor = heap.function(ctor_code, None);
    let norm = heap.function(norm_code, None);
    let method = |kind, key: &str| ClassMethod {
        kind,
        key: key.into(),
        is_static: false,
        computed: false,
        class_prototype: proto,
        constructor: ctor,
        super_class: None,
    };
    if let Some(HeapValue::Function(func)) = heap.graph.values.get_mut(ctor) {
        func.class_method = Some(method(MethodKind::Constructor, "constructor"));
    }
    if let Some(HeapValue::Function(func)) = heap.graph.values.get_mut(norm) {
        func.class_method = Some(method(MethodKind::Method, "norm"));
    }
    heap.set_properties(proto, &[("norm", norm)]);
    heap.global("Point", ctor);
    (ctor, norm)
}

fn optimized_root(
    function: ValueId,
    result: Option<ValueId>,
    parent: Option<ValueId>,
) -> AdditionalFunction {
    AdditionalFunction {
        function,
        body: Vec::new(),
        values: Vec::new(),
        modified_bindings: Vec::new(),
        result,
        parent,
    }
}

#[test]
fn class_members_are_emitted_as_one_class() {
    let mut heap = Heap::default();
    point_class(&mut heap, vec![ret(JsExpr::field(JsExpr::This, "x"))]);

    let out = run(&heap, &plain_config()).to_source();
    let class = position(&out, "var _0 = class Point {");
    let alias = position(&out, "var _1 = _0.prototype.norm;");
    assert!(class < alias, "{out}");
    assert!(out.contains("constructor(x) {"), "{out}");
    assert!(out.contains("norm() {"), "{out}");
    assert!(!out.contains(".norm = "), "{out}");
}

#[test]
fn optimized_root_method_joins_its_class() {
    let mut heap = Heap::default();
    let (_, norm) = point_class(&mut heap, Vec::new());
    let answer = heap.num(42.0);
    heap.graph.additional_functions.push(optimized_root(norm, Some(answer), None));

    let program = run(&heap, &plain_config());
    let out = program.to_source();
    let class = position(&out, "var _0 = class Point {");
    let member = position(&out, "norm() {");
    let result = position(&out, "return 42;");
    let alias = position(&out, "var _1 = _0.prototype.norm;");
    let global = position(&out, "globalThis.Point = _0;");
    assert!(class < member && member < result && result < alias && alias < global, "{out}");
    assert!(!out.contains("function norm"), "{out}");
    assert_eq!(out.matches("class Point").count(), 1, "{out}");
    assert_eq!(program.stats.optimized_roots, 1);
}

#[test]
fn optimized_root_constructor_defines_its_class() {
    let mut heap = Heap::default();
    let (ctor, _) = point_class(&mut heap, vec![ret(JsExpr::field(JsExpr::This, "x"))]);
    let mut ctor_root = optimized_root(ctor, None, None);
    ctor_root.body = vec![JsStmt::assign(
        JsExpr::field(JsExpr::This, "y"),
        JsExpr::num(0.0),
    )];
    heap.graph.additional_functions.push(ctor_root);

    let out = run(&heap, &plain_config()).to_source();
    let class = position(&out, "var _0 = class Point {");
    let ctor_body = position(&out, "this.y = 0;");
    let method = position(&out, "norm() {");
    let alias = position(&out, "var _1 = _0.prototype.norm;");
    assert!(class < ctor_body && ctor_body < method && method < alias, "{out}");
    assert!(out.contains("constructor(x) {"), "{out}");
    assert!(!out.contains("this.x = x;"), "{out}");
}

// ---------------------------------------------------------------------------
// Lazy objects
// ---------------------------------------------------------------------------

fn lazy_pair(heap: &mut Heap) -> (ValueId, ValueId) {
    let a = heap.object(ObjectValue {
        lazy: true,
        ..Default::default()
    });
    let b = heap.object(ObjectValue {
        lazy: true,
        ..Default::default()
    });
    heap.set_properties(a, &[("self", a), ("other", b)]);
    heap.set_properties(b, &[("back", a)]);
    heap.global("a", a);
    heap.global("b", b);
    (a, b)
}

#[test]
fn lazy_ids_are_stable_across_runs() {
    let mut heap = Heap::default();
    lazy_pair(&mut heap);

    let first = run(&heap, &lazy_config());
    let second = run(&heap, &lazy_config());
    assert_eq!(first.to_source(), second.to_source());

    let out = first.to_source();
    assert!(out.contains("var _0 = __lazyObjectsRuntime.createLazyObject(1);"), "{out}");
    assert!(out.contains("var _1 = __lazyObjectsRuntime.createLazyObject(2);"), "{out}");
    assert!(
        out.contains("__lazyObjectsRuntime.setLazyObjectInitializer(__lazyObjectInitializer);"),
        "{out}"
    );
    assert!(out.contains("throw new Error(\"Unknown lazy id\");"), "{out}");
    assert_eq!(first.stats.lazy_objects, 2);
}

#[test]
fn lazy_initializer_uses_obj_only_for_itself() {
    let mut heap = Heap::default();
    lazy_pair(&mut heap);

    let out = run(&heap, &lazy_config()).to_source();
    let case_one = position(&out, "case 1:");
    let case_two = position(&out, "case 2:");
    let self_ref = position(&out, "obj.self = obj;");
    let other = position(&out, "obj.other = _1;");
    let back = position(&out, "obj.back = _0;");
    assert!(case_one < self_ref && self_ref < case_two, "{out}");
    assert!(case_one < other && other < case_two, "{out}");
    assert!(case_two < back, "{out}");
    assert!(!out.contains("_0.self"), "{out}");
}

#[test]
fn no_lazy_objects_means_no_runtime_calls() {
    let mut heap = Heap::default();
    let one = heap.num(1.0);
    let o = heap.object(ObjectValue::default());
    heap.set_properties(o, &[("x", one)]);
    heap.global("o", o);

    let program = run(&heap, &lazy_config());
    let out = program.to_source();
    assert!(!out.contains("__lazyObjectsRuntime"), "{out}");
    assert!(!out.contains("__lazyObjectInitializer"), "{out}");
    assert!(out.contains("var _0 = {};"), "{out}");
    assert!(out.contains("_0.x = 1;"), "{out}");
    assert_eq!(program.stats.lazy_objects, 0);
}

// ---------------------------------------------------------------------------
// Optimized roots
// ---------------------------------------------------------------------------

#[test]
fn optimized_root_declares_its_values_inside() {
    let mut heap = Heap::default();
    let code = heap.code(block("compute", &[], Vec::new(), (0, 50)));
    let root = heap.function(code, None);
    let answer = heap.num(42.0);
    let local = heap.object(ObjectValue::default());
    heap.set_properties(local, &[("v", answer)]);
    heap.global("compute", root);
    heap.graph.additional_functions.push(AdditionalFunction {
        function: root,
        body: Vec::new(),
        values: vec![local],
        modified_bindings: Vec::new(),
        result: Some(local),
        parent: None,
    });

    let program = run(&heap, &plain_config());
    let prelude = stmts_to_string(&program.prelude);
    let body = stmts_to_string(&program.body);
    assert!(prelude.contains("var _0 = function compute() {"), "{prelude}");
    assert!(prelude.contains("  var _1 = {};"), "{prelude}");
    assert!(prelude.contains("  _1.v = 42;"), "{prelude}");
    assert!(prelude.contains("  return _1;"), "{prelude}");
    assert!(!body.contains("_1"), "{body}");
    assert!(body.contains("globalThis.compute = _0;"), "{body}");
    assert_eq!(program.stats.optimized_roots, 1);
}

#[test]
fn nested_root_is_defined_in_its_parent_prelude() {
    let mut heap = Heap::default();
    let outer_code = heap.code(block("outer", &[], Vec::new(), (0, 50)));
    let inner_code = heap.code(block("inner", &[], Vec::new(), (60, 90)));
    let outer = heap.function(outer_code, None);
    let inner = heap.function(inner_code, None);
    let seven = heap.num(7.0);
    heap.global("outer", outer);
    heap.graph
        .additional_functions
        .push(optimized_root(outer, Some(inner), None));
    heap.graph
        .additional_functions
        .push(optimized_root(inner, Some(seven), Some(outer)));

    let program = run(&heap, &plain_config());
    let prelude = stmts_to_string(&program.prelude);
    let body = stmts_to_string(&program.body);
    let outer_def = position(&prelude, "var _0 = function outer() {");
    let inner_def = position(&prelude, "  var _1 = function inner() {");
    let inner_result = position(&prelude, "    return 7;");
    let outer_result = position(&prelude, "  return _1;");
    assert!(
        outer_def < inner_def && inner_def < inner_result && inner_result < outer_result,
        "{prelude}"
    );
    assert!(!body.contains("inner"), "{body}");
    assert_eq!(body, "globalThis.outer = _0;\n");
    assert_eq!(program.stats.optimized_roots, 2);
}

#[test]
fn value_escaping_its_root_is_internal() {
    init_logger();
    let mut heap = Heap::default();
    let helper_code = heap.code(block("helper", &[], vec![ret(JsExpr::num(1.0))], (0, 10)));
    let helper = heap.function(helper_code, None);
    for (name, span) in [("first", (20, 60)), ("second", (70, 110))] {
        let code = heap.code(block(name, &[], Vec::new(), span));
        let root = heap.function(code, None);
        heap.global(name, root);
        heap.graph.additional_functions.push(AdditionalFunction {
            function: root,
            body: Vec::new(),
            values: vec![helper],
            modified_bindings: Vec::new(),
            result: None,
            parent: None,
        });
    }

    let err = materialize(&heap.graph, &plain_config()).unwrap_err();
    assert!(matches!(err, CoreError::Internal(_)), "{err}");
}

// ---------------------------------------------------------------------------
// Program shape
// ---------------------------------------------------------------------------

#[test]
fn backend_wraps_program_in_strict_iife() {
    let mut heap = Heap::default();
    let one = heap.num(1.0);
    heap.global("one", one);

    let output = JsBackend
        .emit(BackendInput {
            graph: heap.graph,
            config: SerializerConfig {
                strict: true,
                ..Default::default()
            },
        })
        .unwrap();
    assert_eq!(
        output.source,
        "(function () {\n  \"use strict\";\n  globalThis.one = 1;\n}).call(this);\n"
    );
}

#[test]
fn graph_from_json_materializes() {
    let json = r#"{
        "values": [
            {"Primitive": {"String": "hi"}},
            {"Object": {"properties": [{"key": "greeting", "value": 0}], "integrity": "Sealed"}}
        ],
        "code_blocks": [],
        "effects": [{"GlobalAssign": {"name": "o", "value": 1}}]
    }"#;
    let graph: HeapGraph = serde_json::from_str(json).unwrap();
    let out = materialize(&graph, &plain_config()).unwrap().to_source();
    assert_eq!(
        out,
        "var _0 = {};\n_0.greeting = \"hi\";\nObject.seal(_0);\nglobalThis.o = _0;\n"
    );
}
