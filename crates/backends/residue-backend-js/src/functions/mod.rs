//! Residual functions: turning function instances into definitions.
//!
//! Runs once every value is serialized. Instances are grouped by code block
//! and each group is emitted in one of three shapes:
//!
//! * **inline**: small blocks with no referentialized scope get a rewritten
//!   clone per instance;
//! * **naive clone**: the same, for blocks that cannot share a factory;
//! * **factory**: one shared `$f_n` definition taking the varying captured
//!   values as leading parameters, and per instance either a
//!   `$f_n.bind(null, ...)` stub or, when a bound stub could observe
//!   something too early, a forwarding `function` that calls through.
//!
//! Definitions are spliced into their declaration bodies at the recorded
//! insertion points. An optimized-root body receives its definitions right
//! before the root itself is built.

pub mod instance;
pub mod splice;
pub mod visitor;

use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexMap;
use log::debug;

use residue_core::error::CoreError;
use residue_core::heap::{CodeBlock, CodeBlockId, Constant, ValueId};
use residue_core::js_ast::{
    ClassKey, JsClass, JsClassMember, JsExpr, JsFunction, JsParam, JsStmt, MethodKind,
};

use crate::emitter::{BodyId, BodyReference};
use crate::serializer::ResidualHeapSerializer;
use instance::{
    scope_local_name, selector_param_name, ClassMethodInstance, FunctionInstance,
    ResidualFunctionBinding,
};
use splice::Splicer;
use visitor::{rewrite_function, FunctionInfo, Replacements};

/// Members collected for one class, keyed by its prototype.
#[derive(Debug)]
struct ClassNode {
    name: Option<String>,
    constructor: ValueId,
    has_constructor: bool,
    super_class: Option<JsExpr>,
    members: Vec<JsClassMember>,
}

/// What the instances of one code block share.
#[derive(Debug, Default)]
struct FactoryPlan {
    /// Names resolving identically everywhere, baked into the factory.
    same: BTreeMap<String, JsExpr>,
    /// Names passed as leading parameters, in parameter order.
    varying: Vec<String>,
    /// Per instance, the arguments for `varying`.
    args: Vec<Vec<JsExpr>>,
    /// Per instance, whether an argument may be an unfinished function.
    function_valued: Vec<bool>,
    scope_count: usize,
    requires: BTreeMap<String, JsExpr>,
    /// Optimized root whose body holds the instances.
    placement: Option<ValueId>,
}

pub struct ResidualFunctions<'s, 'a> {
    ser: &'s mut ResidualHeapSerializer<'a>,
    splicer: Splicer,
    class_nodes: IndexMap<ValueId, ClassNode>,
    global_prelude: Vec<JsStmt>,
    root_preludes: BTreeMap<ValueId, Vec<JsStmt>>,
    /// Optimized-root bodies already moved into their definitions.
    taken_bodies: BTreeSet<BodyId>,
    factory_count: usize,
}

impl<'s, 'a> ResidualFunctions<'s, 'a> {
    pub fn new(ser: &'s mut ResidualHeapSerializer<'a>) -> Self {
        Self {
            ser,
            splicer: Splicer::new(),
            class_nodes: IndexMap::new(),
            global_prelude: Vec::new(),
            root_preludes: BTreeMap::new(),
            taken_bodies: BTreeSet::new(),
            factory_count: 0,
        }
    }

    /// Emit every function; returns the global prelude.
    pub fn spawn(mut self) -> Result<Vec<JsStmt>, CoreError> {
        let graph = self.ser.graph;
        let roots: Vec<ValueId> = self.ser.roots.iter().map(|root| root.function).collect();

        let mut blocks: BTreeMap<(u32, CodeBlockId), Vec<ValueId>> = BTreeMap::new();
        for (id, instance) in &self.ser.instances {
            if roots.contains(id) {
                continue;
            }
            let tag = graph.code_block(instance.code)?.order_tag();
            blocks.entry((tag, instance.code)).or_default().push(*id);
        }
        for ((_, code), mut ids) in blocks {
            ids.sort();
            self.spawn_code_block(code, &ids)?;
        }

        // Classes with optimized-root members are defined once those roots
        // are built.
        let mut pending_members: BTreeMap<ValueId, usize> = BTreeMap::new();
        for root in &self.ser.roots {
            if let Some(method) = &self.instance(root.function)?.class_method {
                *pending_members.entry(method.class_prototype).or_default() += 1;
            }
        }
        let ready: Vec<ValueId> = self
            .class_nodes
            .keys()
            .filter(|prototype| !pending_members.contains_key(prototype))
            .copied()
            .collect();
        for prototype in ready {
            self.define_class(prototype)?;
        }
        self.spawn_roots(&mut pending_members)?;
        if let Some(prototype) = self.class_nodes.keys().next() {
            return Err(CoreError::internal(format!(
                "class with prototype v{prototype} was never defined"
            )));
        }

        let splicer = std::mem::take(&mut self.splicer);
        splicer.apply(&mut self.ser.emitter)?;

        let mut prelude = self.ser.referentializer.bootstrap(None);
        prelude.append(&mut self.global_prelude);
        Ok(prelude)
    }

    fn instance(&self, id: ValueId) -> Result<&FunctionInstance, CoreError> {
        self.ser.instance(id)
    }

    fn info(&self, code: CodeBlockId) -> Result<FunctionInfo, CoreError> {
        self.ser.infos.get(code).cloned().ok_or_else(|| {
            CoreError::internal(format!("code block c{code} has no function info"))
        })
    }

    fn binding_of(&self, instance: &FunctionInstance, name: &str) -> Option<&ResidualFunctionBinding> {
        let key = instance.bindings.get(name)?.as_ref()?;
        self.ser.bindings.get(key)
    }

    /// What free `name` becomes inside `instance`; `None` leaves it global.
    fn replacement_for(
        &self,
        instance: &FunctionInstance,
        name: &str,
    ) -> Result<Option<JsExpr>, CoreError> {
        let Some(Some(key)) = instance.bindings.get(name) else {
            return Ok(None);
        };
        let binding = self.ser.bindings.get(key).ok_or_else(|| {
            CoreError::internal(format!("function v{} lost its binding {name}", instance.function))
        })?;
        if binding.referentialized {
            let graph = self.ser.graph;
            let k = instance.scope_position(binding.scope).ok_or_else(|| {
                CoreError::internal(format!(
                    "scope s{} is not captured by function v{}",
                    binding.scope, instance.function
                ))
            })?;
            let slot = graph.scope(binding.scope)?.slot_of(name).ok_or_else(|| {
                CoreError::internal(format!("scope s{} does not declare {name}", binding.scope))
            })?;
            return Ok(Some(JsExpr::index(
                JsExpr::var(scope_local_name(k)),
                JsExpr::num(slot as f64),
            )));
        }
        if let Some(ident) = &binding.simple_capture {
            return Ok(Some(JsExpr::var(ident)));
        }
        binding.serialized_value.clone().map(Some).ok_or_else(|| {
            CoreError::internal(format!(
                "binding {name} of function v{} was never resolved",
                instance.function
            ))
        })
    }

    fn replacements_for(&self, instance: &FunctionInstance) -> Result<Replacements, CoreError> {
        let mut names = BTreeMap::new();
        for name in instance.bindings.keys() {
            if let Some(expr) = self.replacement_for(instance, name)? {
                names.insert(name.clone(), expr);
            }
        }
        Ok(Replacements {
            names,
            requires: instance.requires.clone(),
        })
    }

    /// `var __scope_k = ...;` for each captured scope, selector as a literal.
    fn scope_prologue(&self, instance: &FunctionInstance) -> Result<Vec<JsStmt>, CoreError> {
        let referentializer = &self.ser.referentializer;
        instance
            .scope_instances
            .iter()
            .enumerate()
            .map(|(k, scope)| {
                let selector = referentializer.selector(*scope)?;
                referentializer.scope_initialization(
                    &scope_local_name(k),
                    *scope,
                    JsExpr::num(selector as f64),
                )
            })
            .collect()
    }

    /// `if (!__init_n) { __init_n = true; ... }`, taking the delayed body.
    fn delayed_init(&mut self, instance: &FunctionInstance) -> Option<JsStmt> {
        let delayed = instance.delayed.as_ref()?;
        let flag = JsExpr::var(&delayed.flag);
        let mut then_body = vec![JsStmt::assign(
            flag.clone(),
            JsExpr::Literal(Constant::Bool(true)),
        )];
        then_body.extend(self.ser.emitter.take(delayed.body));
        Some(JsStmt::If {
            cond: JsExpr::Not(Box::new(flag)),
            then_body,
            else_body: Vec::new(),
        })
    }

    fn prelude_for(&mut self, placement: Option<ValueId>) -> &mut Vec<JsStmt> {
        match placement {
            Some(root) => self.root_preludes.entry(root).or_default(),
            None => &mut self.global_prelude,
        }
    }

    // -----------------------------------------------------------------------
    // Code blocks
    // -----------------------------------------------------------------------

    fn spawn_code_block(&mut self, code_id: CodeBlockId, ids: &[ValueId]) -> Result<(), CoreError> {
        let graph = self.ser.graph;
        let config = self.ser.config;
        let code = graph.code_block(code_id)?;
        let info = self.info(code_id)?;

        let mut has_scope_capture = false;
        let mut has_class_method = false;
        for id in ids {
            let instance = self.instance(*id)?;
            has_scope_capture |= !instance.scope_instances.is_empty();
            has_class_method |= instance.class_method.is_some();
        }
        let should_inline = !has_scope_capture && code.span.len() <= config.inline_threshold;
        let shareable = !should_inline
            && ids.len() > 1
            && config.factories
            && !info.uses_arguments
            && !has_class_method
            && !(code.is_arrow && info.uses_this);

        let plan = if shareable {
            self.plan_factory(code, &info, ids)?
        } else {
            None
        };
        match plan {
            Some(plan) => {
                debug!("c{code_id}: one factory for {} instances", ids.len());
                self.ser.stats.factory_blocks += 1;
                self.emit_factory(code, &info, ids, plan)
            }
            None => {
                if should_inline {
                    debug!("c{code_id}: inlining {} instances", ids.len());
                    self.ser.stats.inlined_blocks += 1;
                } else {
                    debug!("c{code_id}: cloning {} instances", ids.len());
                    self.ser.stats.cloned_blocks += 1;
                }
                for id in ids {
                    self.emit_clone(*id, code)?;
                }
                Ok(())
            }
        }
    }

    /// Decide what the instances share. `None` when they cannot share one
    /// definition.
    fn plan_factory(
        &self,
        code: &CodeBlock,
        info: &FunctionInfo,
        ids: &[ValueId],
    ) -> Result<Option<FactoryPlan>, CoreError> {
        let instances = ids
            .iter()
            .map(|id| self.instance(*id))
            .collect::<Result<Vec<_>, _>>()?;
        let Some(first) = instances.first() else {
            return Ok(None);
        };
        if instances.iter().any(|i| i.root != first.root || i.requires != first.requires) {
            return Ok(None);
        }

        let referentializer = &self.ser.referentializer;
        let scope_count = first.scope_instances.len();
        for instance in &instances {
            if instance.scope_instances.len() != scope_count {
                return Ok(None);
            }
            for (scope, first_scope) in instance.scope_instances.iter().zip(&first.scope_instances) {
                if referentializer.owner(*scope)? != referentializer.owner(*first_scope)? {
                    return Ok(None);
                }
            }
        }

        let mut plan = FactoryPlan {
            args: vec![Vec::new(); instances.len()],
            function_valued: vec![false; instances.len()],
            scope_count,
            requires: first.requires.clone(),
            placement: first.root,
            ..Default::default()
        };

        for name in info.unbound.keys() {
            let mut resolved = Vec::with_capacity(instances.len());
            for instance in &instances {
                let Some(expr) = self.replacement_for(instance, name)? else {
                    resolved.push(None);
                    continue;
                };
                resolved.push(Some((expr, self.binding_of(instance, name))));
            }
            if resolved.iter().all(Option::is_none) {
                continue;
            }
            let Some(resolved) = resolved.into_iter().collect::<Option<Vec<_>>>() else {
                debug!("{name} is global for some instances only");
                return Ok(None);
            };

            let shared_slot = resolved.iter().any(|(_, binding)| {
                binding.is_some_and(|b| b.referentialized || b.simple_capture.is_some())
            });
            // Slot and hoisted-capture expressions are only shareable verbatim.
            let same = if shared_slot {
                resolved.windows(2).all(|pair| pair[0].0 == pair[1].0)
            } else {
                resolved.windows(2).all(|pair| same_binding_value(&pair[0], &pair[1]))
            };
            if same {
                plan.same.insert(name.clone(), resolved[0].0.clone());
                continue;
            }
            if shared_slot {
                return Ok(None);
            }

            plan.varying.push(name.clone());
            for (i, (expr, binding)) in resolved.into_iter().enumerate() {
                let graph = self.ser.graph;
                let risky = binding.is_some_and(|b| {
                    b.pending
                        || b.value
                            .is_some_and(|v| graph.value(v).is_ok_and(|value| value.is_function()))
                });
                plan.function_valued[i] |= risky;
                plan.args[i].push(expr);
            }
        }

        if info.self_reference {
            let Some(own) = &code.name else {
                return Ok(None);
            };
            plan.varying.push(own.clone());
            for (i, instance) in instances.iter().enumerate() {
                plan.args[i].push(JsExpr::var(&instance.name));
                plan.function_valued[i] = true;
            }
        }
        Ok(Some(plan))
    }

    fn emit_factory(
        &mut self,
        code: &CodeBlock,
        info: &FunctionInfo,
        ids: &[ValueId],
        plan: FactoryPlan,
    ) -> Result<(), CoreError> {
        let factory_name = format!("$f_{}", self.factory_count);
        self.factory_count += 1;

        let mut func = code.to_function();
        rewrite_function(
            &mut func,
            &Replacements {
                names: plan.same.clone(),
                requires: plan.requires.clone(),
            },
        );

        let mut params: Vec<JsParam> = (0..plan.scope_count)
            .map(|k| JsParam::Ident(selector_param_name(k)))
            .collect();
        params.extend(plan.varying.iter().cloned().map(JsParam::Ident));
        params.append(&mut func.params);

        let mut body = Vec::new();
        let first = self.instance(ids[0])?;
        for (k, scope) in first.scope_instances.iter().enumerate() {
            body.push(self.ser.referentializer.scope_initialization(
                &scope_local_name(k),
                *scope,
                JsExpr::var(selector_param_name(k)),
            )?);
        }
        body.append(&mut func.body);

        let factory = JsFunction {
            name: Some(factory_name.clone()),
            params,
            body,
            directives: func.directives,
            is_arrow: false,
            is_generator: func.is_generator,
            is_async: func.is_async,
        };
        self.prelude_for(plan.placement)
            .push(JsStmt::FunctionDecl(factory));

        for (i, id) in ids.iter().enumerate() {
            let instance = self.instance(*id)?.clone();
            let point = instance.insertion_point()?;

            let mut args = instance
                .scope_instances
                .iter()
                .map(|scope| {
                    self.ser
                        .referentializer
                        .selector(*scope)
                        .map(|selector| JsExpr::num(selector as f64))
                })
                .collect::<Result<Vec<_>, _>>()?;
            args.extend(plan.args[i].iter().cloned());

            let needs_call = instance.delayed.is_some()
                || info.uses_this
                || plan.function_valued[i]
                || instance.used_before_definition()?
                || instance.has_prototype_alias;
            let stub = if needs_call {
                self.ser.stats.call_stubs += 1;
                self.call_wrapper(&instance, code, &factory_name, args)?
            } else {
                self.ser.stats.bind_stubs += 1;
                let mut bind_args = vec![JsExpr::null()];
                bind_args.extend(args);
                JsStmt::var(
                    &instance.name,
                    JsExpr::method_call(JsExpr::var(&factory_name), "bind", bind_args),
                )
            };

            let mut group = vec![stub];
            group.extend(instance.extras.iter().cloned());
            self.splicer.add(point, instance.serial, group);
        }
        Ok(())
    }

    /// `function _F(params) { return $f.call(this, leading..., params...); }`
    fn call_wrapper(
        &mut self,
        instance: &FunctionInstance,
        code: &CodeBlock,
        factory: &str,
        leading: Vec<JsExpr>,
    ) -> Result<JsStmt, CoreError> {
        let mut call_args = vec![JsExpr::This];
        call_args.extend(leading);
        // Defaults stay on the factory, where captured names resolve.
        let mut params = Vec::with_capacity(code.params.len());
        for param in &code.params {
            match param {
                JsParam::Ident(name) | JsParam::Default { name, .. } => {
                    call_args.push(JsExpr::var(name));
                    params.push(JsParam::Ident(name.clone()));
                }
                JsParam::Rest(name) => {
                    call_args.push(JsExpr::Spread(Box::new(JsExpr::var(name))));
                    params.push(param.clone());
                }
                JsParam::Pattern(_) => {
                    return Err(CoreError::unsupported(format!(
                        "destructuring parameter on function v{} cannot be forwarded",
                        instance.function
                    )))
                }
            }
        }

        let mut body = Vec::new();
        if let Some(init) = self.delayed_init(instance) {
            body.push(init);
        }
        body.push(JsStmt::Return(Some(JsExpr::method_call(
            JsExpr::var(factory),
            "call",
            call_args,
        ))));
        Ok(JsStmt::FunctionDecl(JsFunction {
            name: Some(instance.name.clone()),
            params,
            body,
            ..Default::default()
        }))
    }

    /// A rewritten copy of the code block for one instance.
    fn emit_clone(&mut self, id: ValueId, code: &CodeBlock) -> Result<(), CoreError> {
        let instance = self.instance(id)?.clone();
        let point = instance.insertion_point()?;

        let mut func = code.to_function();
        rewrite_function(&mut func, &self.replacements_for(&instance)?);
        let mut body = self.scope_prologue(&instance)?;
        body.append(&mut func.body);
        if let Some(init) = self.delayed_init(&instance) {
            body.insert(0, init);
        }
        func.body = body;

        match &instance.class_method {
            Some(method) => {
                self.add_class_member(method, code, func);
                if method.kind != MethodKind::Constructor {
                    let mut group = vec![self.method_alias(&instance, method)?];
                    group.extend(instance.extras.iter().cloned());
                    self.splicer.add(point, instance.serial, group);
                }
            }
            None => {
                let mut group = vec![JsStmt::var(&instance.name, JsExpr::Function(Box::new(func)))];
                group.extend(instance.extras.iter().cloned());
                self.splicer.add(point, instance.serial, group);
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Classes
    // -----------------------------------------------------------------------

    fn add_class_member(&mut self, method: &ClassMethodInstance, code: &CodeBlock, func: JsFunction) {
        let node = self
            .class_nodes
            .entry(method.class_prototype)
            .or_insert_with(|| ClassNode {
                name: None,
                constructor: method.constructor,
                has_constructor: false,
                super_class: None,
                members: Vec::new(),
            });
        let member = JsClassMember {
            kind: method.kind,
            key: method.key.clone(),
            is_static: method.is_static,
            function: JsFunction { name: None, ..func },
        };
        if method.kind == MethodKind::Constructor {
            node.has_constructor = true;
            node.name = code.name.clone();
            node.super_class = method.super_class.clone();
            node.members.insert(0, member);
        } else {
            node.members.push(member);
        }
    }

    /// `var _m = _C.prototype.key;` (or the accessor half of a descriptor).
    fn method_alias(
        &self,
        instance: &FunctionInstance,
        method: &ClassMethodInstance,
    ) -> Result<JsStmt, CoreError> {
        let class_name = &self.instance(method.constructor)?.name;
        let holder = if method.is_static {
            JsExpr::var(class_name)
        } else {
            JsExpr::field(JsExpr::var(class_name), "prototype")
        };
        let value = match (method.kind, &method.key) {
            (MethodKind::Getter | MethodKind::Setter, key) => {
                let key = match key {
                    ClassKey::Named(name) => JsExpr::str(name),
                    ClassKey::Computed(expr) => expr.clone(),
                };
                let descriptor = JsExpr::method_call(
                    JsExpr::var("Object"),
                    "getOwnPropertyDescriptor",
                    vec![holder, key],
                );
                let half = if method.kind == MethodKind::Getter { "get" } else { "set" };
                JsExpr::field(descriptor, half)
            }
            (_, ClassKey::Named(name)) => JsExpr::field(holder, name.clone()),
            (_, ClassKey::Computed(expr)) => JsExpr::index(holder, expr.clone()),
        };
        Ok(JsStmt::var(&instance.name, value))
    }

    /// `var _C = class Name extends S { ... };` at the constructor's point.
    fn define_class(&mut self, prototype: ValueId) -> Result<(), CoreError> {
        let Some(node) = self.class_nodes.shift_remove(&prototype) else {
            return Ok(());
        };
        if !node.has_constructor {
            return Err(CoreError::internal(format!(
                "class with prototype v{prototype} has no constructor"
            )));
        }
        let constructor = self.instance(node.constructor)?;
        let point = constructor.insertion_point()?;
        let class = JsClass {
            name: node.name,
            super_class: node.super_class.map(Box::new),
            members: node.members,
        };
        let mut group = vec![JsStmt::var(&constructor.name, JsExpr::Class(Box::new(class)))];
        group.extend(constructor.extras.iter().cloned());
        let serial = constructor.serial;
        self.splice_late(point, serial, group)
    }

    /// Record a group once optimized roots may already have been built.
    fn splice_late(
        &mut self,
        point: BodyReference,
        order: usize,
        group: Vec<JsStmt>,
    ) -> Result<(), CoreError> {
        if self.taken_bodies.contains(&point.body) {
            return Err(CoreError::unsupported(format!(
                "definition needed in body {} after its optimized root was built",
                point.body
            )));
        }
        self.splicer.add(point, order, group);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Optimized roots
    // -----------------------------------------------------------------------

    /// Build root definitions innermost first, so each nested definition is
    /// in its parent's prelude before the parent is built. A root that is a
    /// class member becomes a member of its class node instead; the class is
    /// defined once its last such member is built.
    fn spawn_roots(&mut self, pending_members: &mut BTreeMap<ValueId, usize>) -> Result<(), CoreError> {
        let graph = self.ser.graph;
        let mut roots = self.ser.roots.clone();
        roots.sort_by(|a, b| b.depth.cmp(&a.depth));

        for root in roots {
            let instance = self.instance(root.function)?.clone();
            let code = graph.code_block(instance.code)?;

            self.splicer.apply_body(root.body, &mut self.ser.emitter)?;
            self.taken_bodies.insert(root.body);

            let mut body = self.ser.referentializer.bootstrap(Some(root.function));
            body.extend(self.root_preludes.remove(&root.function).unwrap_or_default());
            body.extend(self.scope_prologue(&instance)?);
            body.extend(self.ser.emitter.take(root.body));
            body.extend(root.verbatim.iter().cloned());
            for (name, value) in &root.modified_bindings {
                let target = self
                    .replacement_for(&instance, name)?
                    .unwrap_or_else(|| JsExpr::var(name));
                body.push(JsStmt::assign(target, value.clone()));
            }
            if let Some(result) = &root.result {
                body.push(JsStmt::Return(Some(result.clone())));
            }
            if let Some(init) = self.delayed_init(&instance) {
                body.insert(0, init);
            }

            let func = JsFunction {
                body,
                ..code.to_function()
            };
            self.ser.stats.optimized_roots += 1;

            let Some(method) = &instance.class_method else {
                debug!("optimized root v{} defined as {}", root.function, instance.name);
                let mut stmts = vec![JsStmt::var(&instance.name, JsExpr::Function(Box::new(func)))];
                stmts.extend(instance.extras.iter().cloned());
                self.prelude_for(root.parent).extend(stmts);
                continue;
            };

            debug!(
                "optimized root v{} defined as a member of class v{}",
                root.function, method.class_prototype
            );
            self.add_class_member(method, code, func);
            if method.kind != MethodKind::Constructor {
                let mut group = vec![self.method_alias(&instance, method)?];
                group.extend(instance.extras.iter().cloned());
                self.splice_late(instance.insertion_point()?, instance.serial, group)?;
            }
            let remaining = pending_members.entry(method.class_prototype).or_default();
            *remaining = remaining.saturating_sub(1);
            if *remaining == 0 {
                self.define_class(method.class_prototype)?;
            }
        }
        Ok(())
    }
}

/// Same value for two instances: one heap value, equal constants, or the
/// same expression.
fn same_binding_value(
    a: &(JsExpr, Option<&ResidualFunctionBinding>),
    b: &(JsExpr, Option<&ResidualFunctionBinding>),
) -> bool {
    let same_heap_value = match (a.1, b.1) {
        (Some(x), Some(y)) => x.value.is_some() && x.value == y.value,
        _ => false,
    };
    same_heap_value || a.0 == b.0
}
