//! Lazy object materialization.
//!
//! A selected object is declared as a runtime placeholder,
//! `<runtime>.createLazyObject(id)`, and its property assignments are
//! recorded in an initializer body of their own. At the end of the pass all
//! initializer bodies become the cases of one hydration callback registered
//! with the runtime. Inside an object's own initializer the object is only
//! reachable as the callback's `obj` parameter.

use log::debug;

use residue_core::error::CoreError;
use residue_core::heap::{ObjectValue, ValueId};
use residue_core::js_ast::{JsExpr, JsFunction, JsParam, JsStmt};
use residue_core::pipeline::LazyObjectsConfig;

use super::strategy::{DefaultStrategy, ObjectStrategy};
use super::ResidualHeapSerializer;
use crate::emitter::BodyKind;

/// Parameter through which the initializer sees the object being hydrated.
pub const LAZY_OBJECT_PARAM: &str = "obj";
const LAZY_ID_PARAM: &str = "id";
const INITIALIZER_NAME: &str = "__lazyObjectInitializer";

pub struct LazyObjectsStrategy {
    config: LazyObjectsConfig,
}

impl LazyObjectsStrategy {
    pub fn new(config: LazyObjectsConfig) -> Self {
        Self { config }
    }

    fn selects(&self, obj: &ObjectValue) -> bool {
        obj.alias.is_none() && (obj.lazy || self.config.select_all)
    }

    fn runtime_call(&self, method: &str, args: Vec<JsExpr>) -> JsExpr {
        JsExpr::method_call(JsExpr::path(&self.config.runtime), method, args)
    }
}

impl ObjectStrategy for LazyObjectsStrategy {
    fn name(&self) -> &str {
        "lazy-objects"
    }

    fn serialize_object(
        &self,
        ser: &mut ResidualHeapSerializer<'_>,
        id: ValueId,
        obj: &ObjectValue,
    ) -> Result<(), CoreError> {
        // The callback is global; objects local to an optimized root stay eager.
        if !self.selects(obj) || !ser.at_global_declaration_body() {
            return DefaultStrategy.serialize_object(ser, id, obj);
        }

        let lazy_id = ser.lazy_id_for(id);
        debug!("lazy object v{id} -> id {lazy_id}");
        let placeholder = self.runtime_call("createLazyObject", vec![JsExpr::num(lazy_id as f64)]);
        ser.declare(id, placeholder)?;

        let parent = ser.emitter.declaration_body();
        let body = ser.emitter.new_body(BodyKind::LazyInitializer(id), parent);
        ser.set_lazy_body(id, body)?;
        ser.in_body(body, |ser| {
            if let Some(proto) = obj.prototype {
                ser.emit_prototype_assignment(id, proto)?;
            }
            ser.emit_properties(id, &obj.properties, obj.integrity)
        })
    }

    fn resolve_identifier_for(
        &self,
        ser: &ResidualHeapSerializer<'_>,
        id: ValueId,
    ) -> Result<JsExpr, CoreError> {
        if let Some(body) = ser.lazy_body(id) {
            if ser.emitter.current_is_offspring_of(body) {
                return Ok(JsExpr::var(LAZY_OBJECT_PARAM));
            }
        }
        ser.identifier(id)
    }

    fn on_pass_complete(
        &self,
        ser: &mut ResidualHeapSerializer<'_>,
    ) -> Result<Vec<JsStmt>, CoreError> {
        let entries = ser.lazy_entries();
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let mut cases = Vec::with_capacity(entries.len());
        for (object, lazy_id, body) in entries {
            let body = body.ok_or_else(|| {
                CoreError::internal(format!("lazy object v{object} has no initializer body"))
            })?;
            let mut stmts = ser.emitter.take(body);
            stmts.push(JsStmt::Break);
            cases.push((JsExpr::num(lazy_id as f64), stmts));
        }
        ser.stats.lazy_objects = cases.len();

        let callback = JsFunction {
            params: vec![
                JsParam::Ident(LAZY_OBJECT_PARAM.into()),
                JsParam::Ident(LAZY_ID_PARAM.into()),
            ],
            body: vec![JsStmt::Switch {
                value: JsExpr::var(LAZY_ID_PARAM),
                cases,
                default_body: Some(vec![JsStmt::throw_error("Unknown lazy id")]),
            }],
            ..Default::default()
        };
        Ok(vec![
            JsStmt::var(INITIALIZER_NAME, JsExpr::Function(Box::new(callback))),
            JsStmt::Expr(self.runtime_call(
                "setLazyObjectInitializer",
                vec![JsExpr::var(INITIALIZER_NAME)],
            )),
        ])
    }
}
