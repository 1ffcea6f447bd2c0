//! Value/object serializer.
//!
//! One `ResidualHeapSerializer` is one materialization session: it walks the
//! effect log and the optimized roots, gives every reached heap value a
//! stable identifier and emits the statements that construct it. Plain
//! objects go through the session's [`ObjectStrategy`]; functions become
//! [`FunctionInstance`]s that the residual-functions phase turns into code.

pub mod lazy;
pub mod strategy;

use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use indexmap::IndexMap;
use log::{debug, trace};

use residue_core::entity::SecondaryMap;
use residue_core::error::CoreError;
use residue_core::heap::{
    AdditionalFunction, CodeBlockId, Effect, FunctionValue, HeapGraph, HeapValue, IntegrityLevel,
    ObjectValue, Property, ScopeId, ValueId,
};
use residue_core::js_ast::{ClassKey, DeclKind, JsExpr, JsStmt, MethodKind};
use residue_core::pipeline::{MaterializationStats, SerializerConfig};

use crate::emitter::{BodyId, BodyKind, Emitter};
use crate::functions::instance::{
    AdditionalFunctionInfo, BindingKey, ClassMethodInstance, DelayedInit, FunctionInstance,
    ResidualFunctionBinding,
};
use crate::functions::visitor::{analyze, collect_identifiers, FunctionInfo};
use crate::functions::ResidualFunctions;
use crate::names::NameGenerator;
use crate::referentializer::Referentializer;
use crate::ResidualProgram;

pub use lazy::LazyObjectsStrategy;
pub use strategy::{DefaultStrategy, ObjectStrategy};

/// Work parked until a value under construction is finished.
#[derive(Debug)]
enum Deferred {
    /// Append `stmt` to `body`; counts towards `object`'s integrity lock.
    Stmt {
        body: BodyId,
        stmt: JsStmt,
        object: Option<ValueId>,
    },
    /// A prototype alias waiting on its owning function.
    Alias { object: ValueId },
}

/// `Object.freeze` / `Object.seal` held back until deferred properties land.
#[derive(Debug)]
struct PendingLock {
    remaining: usize,
    body: BodyId,
    stmt: JsStmt,
}

#[derive(Debug, Clone, Copy)]
struct LazyObject {
    id: u32,
    body: Option<BodyId>,
}

pub struct ResidualHeapSerializer<'a> {
    pub(crate) graph: &'a HeapGraph,
    pub(crate) config: &'a SerializerConfig,
    pub(crate) emitter: Emitter,
    names: NameGenerator,
    strategy: Rc<dyn ObjectStrategy>,

    ids: SecondaryMap<ValueId, String>,
    declared_in: SecondaryMap<ValueId, BodyId>,
    in_progress: BTreeSet<ValueId>,
    deferred: BTreeMap<ValueId, Vec<Deferred>>,
    pending_locks: BTreeMap<ValueId, PendingLock>,
    function_stack: Vec<ValueId>,

    pub(crate) infos: SecondaryMap<CodeBlockId, FunctionInfo>,
    pub(crate) instances: IndexMap<ValueId, FunctionInstance>,
    pub(crate) bindings: BTreeMap<BindingKey, ResidualFunctionBinding>,
    modified_bindings: BTreeSet<BindingKey>,
    pub(crate) referentializer: Referentializer,

    /// Prototype object → function whose `.prototype` it is.
    prototype_owners: BTreeMap<ValueId, ValueId>,
    /// Class prototype → non-constructor members.
    class_members: BTreeMap<ValueId, Vec<ValueId>>,
    delayed_bodies: BTreeMap<ValueId, BodyId>,
    lazy_objects: IndexMap<ValueId, LazyObject>,
    pub(crate) roots: Vec<AdditionalFunctionInfo>,
    root_bodies: BTreeMap<ValueId, BodyId>,

    serial: usize,
    init_flags: usize,
    captures: usize,
    pub(crate) stats: MaterializationStats,
}

impl<'a> ResidualHeapSerializer<'a> {
    /// Session with the strategy the config asks for.
    pub fn new(graph: &'a HeapGraph, config: &'a SerializerConfig) -> Result<Self, CoreError> {
        let strategy: Rc<dyn ObjectStrategy> = match &config.lazy_objects {
            Some(lazy) => Rc::new(LazyObjectsStrategy::new(lazy.clone())),
            None => Rc::new(DefaultStrategy),
        };
        Self::with_strategy(graph, config, strategy)
    }

    pub fn with_strategy(
        graph: &'a HeapGraph,
        config: &'a SerializerConfig,
        strategy: Rc<dyn ObjectStrategy>,
    ) -> Result<Self, CoreError> {
        graph.validate()?;
        debug!("serializing with the {} object strategy", strategy.name());

        let mut names = NameGenerator::new("_");
        let mut infos = SecondaryMap::new();
        for (code_id, code) in graph.code_blocks.iter() {
            let info = analyze(code);
            names.reserve(info.identifiers.iter().cloned());
            infos.insert(code_id, info);
        }
        for root in &graph.additional_functions {
            names.reserve(collect_identifiers(&root.body));
        }

        let mut prototype_owners = BTreeMap::new();
        let mut class_members: BTreeMap<ValueId, Vec<ValueId>> = BTreeMap::new();
        for (id, value) in graph.values.iter() {
            let HeapValue::Function(func) = value else {
                continue;
            };
            if let Some(proto) = func.prototype {
                prototype_owners.entry(proto).or_insert(id);
            }
            if let Some(method) = &func.class_method {
                if method.kind == MethodKind::Constructor {
                    prototype_owners.entry(method.class_prototype).or_insert(id);
                } else {
                    class_members.entry(method.class_prototype).or_default().push(id);
                }
            }
        }

        let root_suffixes = graph
            .additional_functions
            .iter()
            .enumerate()
            .map(|(index, root)| (root.function, index))
            .collect();

        let mut serializer = Self {
            graph,
            config,
            emitter: Emitter::new(),
            names,
            strategy,
            ids: SecondaryMap::new(),
            declared_in: SecondaryMap::new(),
            in_progress: BTreeSet::new(),
            deferred: BTreeMap::new(),
            pending_locks: BTreeMap::new(),
            function_stack: Vec::new(),
            infos,
            instances: IndexMap::new(),
            bindings: BTreeMap::new(),
            modified_bindings: BTreeSet::new(),
            referentializer: Referentializer::new(root_suffixes),
            prototype_owners,
            class_members,
            delayed_bodies: BTreeMap::new(),
            lazy_objects: IndexMap::new(),
            roots: Vec::new(),
            root_bodies: BTreeMap::new(),
            serial: 0,
            init_flags: 0,
            captures: 0,
            stats: MaterializationStats::default(),
        };
        serializer.mark_modified_bindings()?;
        Ok(serializer)
    }

    /// Run the whole pass and assemble the program.
    pub fn serialize(mut self) -> Result<ResidualProgram, CoreError> {
        self.serialize_effects()?;
        self.serialize_roots()?;

        let strategy = Rc::clone(&self.strategy);
        let lazy_prelude = strategy.on_pass_complete(&mut self)?;
        let mut prelude = ResidualFunctions::new(&mut self).spawn()?;
        prelude.extend(lazy_prelude);

        if self.emitter.depth() != 1 {
            return Err(CoreError::internal(format!(
                "emitter left {} bodies open",
                self.emitter.depth() - 1
            )));
        }
        if !self.in_progress.is_empty() || !self.deferred.is_empty() {
            return Err(CoreError::internal("values left under construction"));
        }

        self.stats.referentialized_scopes = self.referentializer.len();
        let global = self.emitter.global();
        let mut directives = Vec::new();
        if self.config.strict {
            directives.push("use strict".to_string());
        }
        Ok(ResidualProgram {
            directives,
            prelude,
            body: self.emitter.take(global),
            wrap_iife: self.config.wrap_iife,
            stats: self.stats,
        })
    }

    // -----------------------------------------------------------------------
    // Pass drivers
    // -----------------------------------------------------------------------

    /// A captured binding is modified when its scope says so, when any code
    /// closing over it assigns it, or when an optimized root writes it back.
    fn mark_modified_bindings(&mut self) -> Result<(), CoreError> {
        let graph = self.graph;
        let mut marked = BTreeSet::new();
        for (_, value) in graph.values.iter() {
            let HeapValue::Function(func) = value else {
                continue;
            };
            let Some(env) = func.environment else {
                continue;
            };
            let info = self.info(func.code)?;
            for name in info.unbound.keys() {
                if let Some(scope_id) = graph.declaring_scope(Some(env), name) {
                    let scope = graph.scope(scope_id)?;
                    if scope.modified.contains(name) || info.modified.contains(name) {
                        marked.insert((scope_id, name.clone()));
                    }
                }
            }
        }
        for root in &graph.additional_functions {
            let env = graph.value(root.function)?.as_function().and_then(|f| f.environment);
            for (name, _) in &root.modified_bindings {
                if let Some(scope_id) = graph.declaring_scope(env, name) {
                    marked.insert((scope_id, name.clone()));
                }
            }
        }
        debug!("{} captured bindings are modified", marked.len());
        self.modified_bindings = marked;
        Ok(())
    }

    fn serialize_effects(&mut self) -> Result<(), CoreError> {
        let graph = self.graph;
        for effect in &graph.effects {
            let stmt = match effect {
                Effect::GlobalAssign { name, value } => {
                    let value = self.serialize_value(*value)?;
                    JsStmt::assign(JsExpr::field(JsExpr::var("globalThis"), name.clone()), value)
                }
                Effect::PropertyAssign { object, key, value } => {
                    let object = self.serialize_value(*object)?;
                    let value = self.serialize_value(*value)?;
                    JsStmt::assign(JsExpr::field(object, key.clone()), value)
                }
                Effect::Call { callee, args } => {
                    let callee = self.serialize_value(*callee)?;
                    let args = args
                        .iter()
                        .map(|arg| self.serialize_value(*arg))
                        .collect::<Result<Vec<_>, _>>()?;
                    JsStmt::Expr(JsExpr::call(callee, args))
                }
            };
            self.emitter.emit(stmt);
        }
        Ok(())
    }

    fn root_depth(&self, root: &AdditionalFunction) -> usize {
        let limit = self.graph.additional_functions.len();
        let mut depth = 0;
        let mut parent = root.parent;
        while let Some(p) = parent {
            depth += 1;
            if depth > limit {
                break;
            }
            parent = self.graph.additional_function(p).and_then(|r| r.parent);
        }
        depth
    }

    /// Declare each optimized root's local values in a body of its own.
    fn serialize_roots(&mut self) -> Result<(), CoreError> {
        let graph = self.graph;
        let mut order: Vec<(usize, usize)> = graph
            .additional_functions
            .iter()
            .enumerate()
            .map(|(index, root)| (self.root_depth(root), index))
            .collect();
        order.sort();

        for (depth, index) in order {
            let root = &graph.additional_functions[index];
            let function = root.function;
            let parent_body = match root.parent {
                Some(parent) => *self.root_bodies.get(&parent).ok_or_else(|| {
                    CoreError::internal(format!("optimized root v{parent} has no body"))
                })?,
                None => self.emitter.global(),
            };
            self.in_body(parent_body, |ser| ser.serialize_value(function).map(drop))?;

            let env = graph
                .value(function)?
                .as_function()
                .ok_or_else(|| {
                    CoreError::InvalidInput(format!("optimized root v{function} is not a function"))
                })?
                .environment;
            let declaration = self.instance(function)?.declaration_body;
            self.in_body(declaration, |ser| {
                for (name, _) in &root.modified_bindings {
                    let key = ser.capture_binding(function, env, name)?;
                    ser.instance_mut(function)?
                        .bindings
                        .entry(name.clone())
                        .or_insert(key);
                }
                Ok(())
            })?;

            let body = self
                .emitter
                .new_body(BodyKind::OptimizedRoot(function), parent_body);
            self.root_bodies.insert(function, body);
            let (modified_bindings, result) = self.in_body(body, |ser| {
                for value in &root.values {
                    ser.serialize_value(*value)?;
                }
                let modified = root
                    .modified_bindings
                    .iter()
                    .map(|(name, value)| Ok((name.clone(), ser.serialize_value(*value)?)))
                    .collect::<Result<Vec<_>, CoreError>>()?;
                let result = root.result.map(|v| ser.serialize_value(v)).transpose()?;
                Ok((modified, result))
            })?;
            debug!(
                "optimized root v{function}: {} local values, depth {depth}",
                root.values.len()
            );

            self.roots.push(AdditionalFunctionInfo {
                function,
                body,
                parent: root.parent,
                verbatim: root.body.clone(),
                modified_bindings,
                result,
                depth,
            });
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Values
    // -----------------------------------------------------------------------

    /// The expression for `id` at the cursor, constructing it on first reach.
    pub fn serialize_value(&mut self, id: ValueId) -> Result<JsExpr, CoreError> {
        let graph = self.graph;
        match graph.value(id)? {
            HeapValue::Primitive(c) => Ok(JsExpr::Literal(c.clone())),
            HeapValue::Object(ObjectValue {
                alias: Some(alias), ..
            }) => Ok(JsExpr::path(alias)),
            value => {
                if !self.ids.contains_key(id) {
                    let declaration = self.emitter.declaration_body();
                    self.in_body(declaration, |ser| match value {
                        HeapValue::Object(obj) => ser.serialize_object(id, obj),
                        HeapValue::Function(func) => ser.serialize_function(id, func),
                        HeapValue::Primitive(_) => Ok(()),
                    })?;
                }
                self.reference_existing(id)
            }
        }
    }

    /// Run `f` with `body` entered; the cursor is restored on every path.
    pub(crate) fn in_body<T>(
        &mut self,
        body: BodyId,
        f: impl FnOnce(&mut Self) -> Result<T, CoreError>,
    ) -> Result<T, CoreError> {
        self.emitter.enter(body);
        let result = f(self);
        self.emitter.leave()?;
        result
    }

    /// The plain identifier of an already allocated value.
    pub fn identifier(&self, id: ValueId) -> Result<JsExpr, CoreError> {
        self.ids
            .get(id)
            .map(|name| JsExpr::var(name.clone()))
            .ok_or_else(|| CoreError::internal(format!("value v{id} has no identifier")))
    }

    fn reference_existing(&mut self, id: ValueId) -> Result<JsExpr, CoreError> {
        if let Some(&body) = self.declared_in.get(id) {
            if matches!(self.emitter.kind(body), BodyKind::OptimizedRoot(_))
                && !self.emitter.current_is_offspring_of(body)
            {
                return Err(CoreError::internal(format!(
                    "value v{id} is declared inside an optimized root and referenced outside it"
                )));
            }
        }
        let current = self.emitter.current();
        let position = self.emitter.position();
        if let Some(instance) = self.instances.get_mut(&id) {
            // Nested bodies run after their declaration body; only uses in
            // the declaration body itself can come too early.
            if instance.first_usage.is_none() && instance.declaration_body == current {
                instance.first_usage = Some(position);
            }
        }
        let strategy = Rc::clone(&self.strategy);
        strategy.resolve_identifier_for(self, id)
    }

    fn allocate(&mut self, id: ValueId) -> String {
        let name = self.names.generate();
        trace!("v{id} -> {name}");
        self.ids.insert(id, name.clone());
        let declaration = self.emitter.declaration_body();
        self.declared_in.insert(id, declaration);
        name
    }

    fn defer(&mut self, waiting_on: ValueId, deferred: Deferred) {
        self.deferred.entry(waiting_on).or_default().push(deferred);
    }

    /// Mark `id` finished and flush everything that waited on it.
    fn complete(&mut self, id: ValueId) -> Result<(), CoreError> {
        self.in_progress.remove(&id);
        let Some(entries) = self.deferred.remove(&id) else {
            return Ok(());
        };
        for entry in entries {
            match entry {
                Deferred::Stmt { body, stmt, object } => {
                    self.emitter.emit_into(body, stmt);
                    if let Some(object) = object {
                        self.release_lock(object);
                    }
                }
                Deferred::Alias { object } => {
                    let graph = self.graph;
                    let obj = graph.value(object)?.as_object().ok_or_else(|| {
                        CoreError::internal(format!("prototype alias v{object} is not an object"))
                    })?;
                    self.complete(object)?;
                    self.emit_alias_properties(object, obj)?;
                }
            }
        }
        Ok(())
    }

    fn release_lock(&mut self, object: ValueId) {
        let Some(lock) = self.pending_locks.get_mut(&object) else {
            return;
        };
        lock.remaining = lock.remaining.saturating_sub(1);
        if lock.remaining == 0 {
            if let Some(lock) = self.pending_locks.remove(&object) {
                self.emitter.emit_into(lock.body, lock.stmt);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Objects
    // -----------------------------------------------------------------------

    fn serialize_object(&mut self, id: ValueId, obj: &ObjectValue) -> Result<(), CoreError> {
        if let Some(&owner) = self.prototype_owners.get(&id) {
            return self.serialize_prototype_alias(id, obj, owner);
        }
        if self.config.delay_initializations {
            if let Some(target) = obj.delay_into {
                if self.function_stack.last() == Some(&target) {
                    return self.serialize_delayed_object(id, obj, target);
                }
            }
        }
        self.allocate(id);
        let strategy = Rc::clone(&self.strategy);
        strategy.serialize_object(self, id, obj)
    }

    /// `{}` or `Object.create(<proto>)`. Keeps `id` under construction until
    /// [`Self::declare`].
    pub(crate) fn object_construction(
        &mut self,
        id: ValueId,
        obj: &ObjectValue,
    ) -> Result<JsExpr, CoreError> {
        let Some(proto) = obj.prototype else {
            return Ok(JsExpr::ObjectInit(Vec::new()));
        };
        self.in_progress.insert(id);
        let proto_expr = self.serialize_value(proto)?;
        if self.in_progress.contains(&proto) {
            let target = self.identifier(id)?;
            let body = self.emitter.current();
            self.defer(
                proto,
                Deferred::Stmt {
                    body,
                    stmt: set_prototype_of(target, proto_expr),
                    object: None,
                },
            );
            return Ok(JsExpr::ObjectInit(Vec::new()));
        }
        Ok(JsExpr::method_call(
            JsExpr::var("Object"),
            "create",
            vec![proto_expr],
        ))
    }

    /// `var <id> = <init>;` at the cursor, then finish `id`.
    pub(crate) fn declare(&mut self, id: ValueId, init: JsExpr) -> Result<(), CoreError> {
        let name = self
            .ids
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::internal(format!("value v{id} has no identifier")))?;
        self.emitter.emit(JsStmt::var(name, init));
        self.complete(id)
    }

    /// One assignment per property at the cursor, then the integrity lock.
    /// Assignments of unfinished values wait for them.
    pub(crate) fn emit_properties(
        &mut self,
        id: ValueId,
        properties: &[Property],
        integrity: Option<IntegrityLevel>,
    ) -> Result<(), CoreError> {
        let body = self.emitter.current();
        let mut waiting = 0;
        for prop in properties {
            let value = self.serialize_value(prop.value)?;
            let target = self.reference_existing(id)?;
            let stmt = JsStmt::assign(JsExpr::field(target, prop.key.clone()), value);
            if self.in_progress.contains(&prop.value) {
                self.defer(
                    prop.value,
                    Deferred::Stmt {
                        body,
                        stmt,
                        object: Some(id),
                    },
                );
                waiting += 1;
            } else {
                self.emitter.emit_into(body, stmt);
            }
        }
        if let Some(level) = integrity {
            let target = self.reference_existing(id)?;
            let method = match level {
                IntegrityLevel::Sealed => "seal",
                IntegrityLevel::Frozen => "freeze",
            };
            let stmt = JsStmt::Expr(JsExpr::method_call(JsExpr::var("Object"), method, vec![target]));
            if waiting > 0 {
                self.pending_locks.insert(
                    id,
                    PendingLock {
                        remaining: waiting,
                        body,
                        stmt,
                    },
                );
            } else {
                self.emitter.emit_into(body, stmt);
            }
        }
        Ok(())
    }

    /// `Object.setPrototypeOf(<id>, <proto>);` at the cursor.
    pub(crate) fn emit_prototype_assignment(
        &mut self,
        id: ValueId,
        proto: ValueId,
    ) -> Result<(), CoreError> {
        let proto_expr = self.serialize_value(proto)?;
        let target = self.reference_existing(id)?;
        let stmt = set_prototype_of(target, proto_expr);
        if self.in_progress.contains(&proto) {
            let body = self.emitter.current();
            self.defer(
                proto,
                Deferred::Stmt {
                    body,
                    stmt,
                    object: None,
                },
            );
        } else {
            self.emitter.emit(stmt);
        }
        Ok(())
    }

    /// A function's `.prototype` object: `var <id> = <fn>.prototype;` right
    /// after the function's definition.
    fn serialize_prototype_alias(
        &mut self,
        id: ValueId,
        obj: &ObjectValue,
        owner: ValueId,
    ) -> Result<(), CoreError> {
        let owner_expr = self.serialize_value(owner)?;
        if self.ids.contains_key(id) {
            return Ok(());
        }
        let name = self.allocate(id);
        let instance = self.instance_mut(owner)?;
        instance
            .extras
            .push(JsStmt::var(name, JsExpr::field(owner_expr, "prototype")));
        instance.has_prototype_alias = true;
        if self.in_progress.contains(&owner) {
            self.in_progress.insert(id);
            self.defer(owner, Deferred::Alias { object: id });
            Ok(())
        } else {
            self.emit_alias_properties(id, obj)
        }
    }

    fn emit_alias_properties(&mut self, id: ValueId, obj: &ObjectValue) -> Result<(), CoreError> {
        let properties: Vec<Property> = obj
            .properties
            .iter()
            .filter(|prop| !self.is_class_member_slot(id, prop, false))
            .cloned()
            .collect();
        self.emit_properties(id, &properties, obj.integrity)
    }

    /// Whether `prop` of `holder` is a method the class definition installs.
    fn is_class_member_slot(&self, holder: ValueId, prop: &Property, is_static: bool) -> bool {
        let Some(HeapValue::Function(func)) = self.graph.values.get(prop.value) else {
            return false;
        };
        func.class_method.as_ref().is_some_and(|method| {
            let owner = if is_static {
                method.constructor
            } else {
                method.class_prototype
            };
            method.is_static == is_static && method.key == prop.key && owner == holder
        })
    }

    /// `var <id>;` now, construction on the first call of `function`.
    fn serialize_delayed_object(
        &mut self,
        id: ValueId,
        obj: &ObjectValue,
        function: ValueId,
    ) -> Result<(), CoreError> {
        let name = self.allocate(id);
        self.emitter.emit(JsStmt::VarDecl {
            kind: DeclKind::Var,
            name: name.clone(),
            init: None,
        });
        let body = match self.delayed_bodies.get(&function) {
            Some(body) => *body,
            None => {
                let declaration = self.emitter.declaration_body();
                let body = self
                    .emitter
                    .new_body(BodyKind::DelayedInit(function), declaration);
                self.delayed_bodies.insert(function, body);
                body
            }
        };
        debug!("delaying v{id} into the first call of v{function}");
        self.in_body(body, |ser| {
            let init = ser.object_construction(id, obj)?;
            ser.emitter.emit(JsStmt::assign(JsExpr::var(name), init));
            ser.complete(id)?;
            ser.emit_properties(id, &obj.properties, obj.integrity)
        })
    }

    // -----------------------------------------------------------------------
    // Lazy objects
    // -----------------------------------------------------------------------

    /// The lazy id of `id`, assigned on first request starting at 1.
    pub fn lazy_id_for(&mut self, id: ValueId) -> u32 {
        let next = self.lazy_objects.len() as u32 + 1;
        self.lazy_objects
            .entry(id)
            .or_insert(LazyObject {
                id: next,
                body: None,
            })
            .id
    }

    pub(crate) fn set_lazy_body(&mut self, id: ValueId, body: BodyId) -> Result<(), CoreError> {
        let entry = self
            .lazy_objects
            .get_mut(&id)
            .ok_or_else(|| CoreError::internal(format!("v{id} has no lazy id")))?;
        entry.body = Some(body);
        Ok(())
    }

    pub fn lazy_body(&self, id: ValueId) -> Option<BodyId> {
        self.lazy_objects.get(&id).and_then(|entry| entry.body)
    }

    /// `(object, lazy id, initializer body)` in first-selection order.
    pub(crate) fn lazy_entries(&self) -> Vec<(ValueId, u32, Option<BodyId>)> {
        self.lazy_objects
            .iter()
            .map(|(object, entry)| (*object, entry.id, entry.body))
            .collect()
    }

    pub(crate) fn at_global_declaration_body(&self) -> bool {
        self.emitter.declaration_body() == self.emitter.global()
    }

    // -----------------------------------------------------------------------
    // Functions
    // -----------------------------------------------------------------------

    fn info(&self, code: CodeBlockId) -> Result<&FunctionInfo, CoreError> {
        self.infos
            .get(code)
            .ok_or_else(|| CoreError::internal(format!("code block c{code} has no function info")))
    }

    pub(crate) fn instance(&self, id: ValueId) -> Result<&FunctionInstance, CoreError> {
        self.instances
            .get(&id)
            .ok_or_else(|| CoreError::internal(format!("v{id} is not a function instance")))
    }

    fn instance_mut(&mut self, id: ValueId) -> Result<&mut FunctionInstance, CoreError> {
        self.instances
            .get_mut(&id)
            .ok_or_else(|| CoreError::internal(format!("v{id} is not a function instance")))
    }

    fn binding_mut(&mut self, key: &BindingKey) -> Result<&mut ResidualFunctionBinding, CoreError> {
        self.bindings.get_mut(key).ok_or_else(|| {
            CoreError::internal(format!("no binding {} in scope s{}", key.1, key.0))
        })
    }

    fn root_of_body(&self, body: BodyId) -> Option<ValueId> {
        match self.emitter.kind(body) {
            BodyKind::OptimizedRoot(root) => Some(root),
            _ => None,
        }
    }

    fn serialize_function(&mut self, id: ValueId, func: &'a FunctionValue) -> Result<(), CoreError> {
        self.graph.code_block(func.code)?;
        let name = self.allocate(id);
        let declaration = self.emitter.declaration_body();
        let root = self.root_of_body(declaration);
        self.in_progress.insert(id);
        self.instances.insert(
            id,
            FunctionInstance::new(id, func.code, name, declaration, root),
        );

        self.function_stack.push(id);
        let result = self.serialize_function_parts(id, func);
        self.function_stack.pop();
        result?;

        if let Some(body) = self.delayed_bodies.get(&id).copied() {
            let flag = format!("__init_{}", self.init_flags);
            self.init_flags += 1;
            let instance = self.instance_mut(id)?;
            instance.extras.insert(
                0,
                JsStmt::VarDecl {
                    kind: DeclKind::Var,
                    name: flag.clone(),
                    init: None,
                },
            );
            instance.delayed = Some(DelayedInit { body, flag });
        }

        let point = self.emitter.position();
        let serial = self.serial;
        self.serial += 1;
        let instance = self.instance_mut(id)?;
        instance.insertion_point = Some(point);
        instance.serial = serial;
        trace!("function v{id} inserted at {}:{}", point.body, point.index);
        self.complete(id)?;

        let properties: Vec<Property> = func
            .properties
            .iter()
            .filter(|prop| !self.is_class_member_slot(id, prop, true))
            .cloned()
            .collect();
        self.emit_properties(id, &properties, None)?;

        // A class constructor brings the whole class with it.
        if let Some(method) = &func.class_method {
            if method.kind == MethodKind::Constructor {
                let members = self
                    .class_members
                    .get(&method.class_prototype)
                    .cloned()
                    .unwrap_or_default();
                for member in members {
                    self.serialize_value(member)?;
                }
            }
        }
        Ok(())
    }

    /// Class wiring, captured bindings and `require` replacements.
    fn serialize_function_parts(
        &mut self,
        id: ValueId,
        func: &'a FunctionValue,
    ) -> Result<(), CoreError> {
        let graph = self.graph;
        if let Some(method) = &func.class_method {
            let mut super_class = None;
            if method.kind == MethodKind::Constructor {
                if let Some(sup) = method.super_class {
                    super_class = Some(self.serialize_value(sup)?);
                }
            } else {
                self.serialize_value(method.constructor)?;
            }
            let key = if method.computed {
                ClassKey::Computed(JsExpr::path(&method.key))
            } else {
                ClassKey::Named(method.key.clone())
            };
            self.instance_mut(id)?.class_method = Some(ClassMethodInstance {
                kind: method.kind,
                key,
                is_static: method.is_static,
                class_prototype: method.class_prototype,
                constructor: method.constructor,
                super_class,
            });
        }

        let info = self.info(func.code)?;
        let names: Vec<String> = info.unbound.keys().cloned().collect();
        let rewrite_requires = !info.modified.contains("require");
        let requires = info.requires.clone();

        for name in names {
            let key = self.capture_binding(id, func.environment, &name)?;
            self.instance_mut(id)?.bindings.insert(name, key);
        }

        if rewrite_requires {
            for module in requires {
                if let Some(&value) = graph.module_replacements.get(&module) {
                    let expr = self.serialize_value(value)?;
                    self.instance_mut(id)?.requires.insert(module, expr);
                }
            }
        }
        Ok(())
    }

    /// Resolve free `name` of `function`; `None` means a global.
    fn capture_binding(
        &mut self,
        function: ValueId,
        env: Option<ScopeId>,
        name: &str,
    ) -> Result<Option<BindingKey>, CoreError> {
        let graph = self.graph;
        let Some(scope_id) = graph.declaring_scope(env, name) else {
            return Ok(None);
        };
        let key = (scope_id, name.to_string());
        if !self.bindings.contains_key(&key) {
            let value = graph.scope(scope_id)?.bindings.get(name).copied().flatten();
            let modified = self.modified_bindings.contains(&key);
            self.bindings.insert(
                key.clone(),
                ResidualFunctionBinding::new(scope_id, name, value, modified),
            );
            if !modified {
                let expr = match value {
                    Some(v) => self.serialize_value(v)?,
                    None => JsExpr::undefined(),
                };
                let pending = value.is_some_and(|v| self.in_progress.contains(&v));
                let binding = self.binding_mut(&key)?;
                binding.pending = pending;
                binding.set_serialized_value(expr)?;
            } else if self.config.simple_closures {
                self.hoist_capture(&key, value)?;
            } else {
                self.referentialize_binding(&key, value)?;
            }
        }
        if self.bindings.get(&key).is_some_and(|b| b.referentialized) {
            self.instance_mut(function)?.scope_local(scope_id);
        }
        Ok(Some(key))
    }

    fn referentialize_binding(
        &mut self,
        key: &BindingKey,
        value: Option<ValueId>,
    ) -> Result<(), CoreError> {
        let graph = self.graph;
        let (scope_id, name) = key;
        let scope = graph.scope(*scope_id)?;
        let owner = scope
            .root
            .filter(|root| graph.additional_function(*root).is_some());
        self.referentializer
            .referentialize(*scope_id, owner, scope.bindings.len());
        self.binding_mut(key)?.referentialized = true;

        let slot = scope.slot_of(name).ok_or_else(|| {
            CoreError::internal(format!("scope s{scope_id} does not declare {name}"))
        })?;
        let expr = match value {
            Some(v) => self.serialize_value(v)?,
            None => JsExpr::undefined(),
        };
        self.referentializer.set_slot(*scope_id, slot, expr)
    }

    /// One shared variable for a modified binding, declared at the cursor.
    fn hoist_capture(&mut self, key: &BindingKey, value: Option<ValueId>) -> Result<(), CoreError> {
        let ident = format!("__captured_{}", self.captures);
        self.captures += 1;
        self.binding_mut(key)?.simple_capture = Some(ident.clone());
        let Some(value) = value else {
            self.emitter.emit(JsStmt::VarDecl {
                kind: DeclKind::Var,
                name: ident,
                init: None,
            });
            return Ok(());
        };
        let expr = self.serialize_value(value)?;
        if self.in_progress.contains(&value) {
            self.emitter.emit(JsStmt::VarDecl {
                kind: DeclKind::Var,
                name: ident.clone(),
                init: None,
            });
            let body = self.emitter.current();
            self.defer(
                value,
                Deferred::Stmt {
                    body,
                    stmt: JsStmt::assign(JsExpr::var(ident), expr),
                    object: None,
                },
            );
        } else {
            self.emitter.emit(JsStmt::var(ident, expr));
        }
        Ok(())
    }
}

fn set_prototype_of(target: JsExpr, proto: JsExpr) -> JsStmt {
    JsStmt::Expr(JsExpr::method_call(
        JsExpr::var("Object"),
        "setPrototypeOf",
        vec![target, proto],
    ))
}
