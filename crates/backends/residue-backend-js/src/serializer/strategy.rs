use residue_core::error::CoreError;
use residue_core::heap::{ObjectValue, ValueId};
use residue_core::js_ast::{JsExpr, JsStmt};

use super::ResidualHeapSerializer;

/// How plain objects are constructed and referred to.
///
/// The serializer owns all session state; strategies only decide what to
/// emit. One strategy is picked per run.
pub trait ObjectStrategy {
    fn name(&self) -> &str;

    /// Emit the statements that construct `obj`. Its identifier is already
    /// allocated and the cursor is at the declaration body.
    fn serialize_object(
        &self,
        ser: &mut ResidualHeapSerializer<'_>,
        id: ValueId,
        obj: &ObjectValue,
    ) -> Result<(), CoreError>;

    /// The expression a reference to `id` should use at the current cursor.
    fn resolve_identifier_for(
        &self,
        ser: &ResidualHeapSerializer<'_>,
        id: ValueId,
    ) -> Result<JsExpr, CoreError> {
        ser.identifier(id)
    }

    /// Statements appended to the prelude once every value is serialized.
    fn on_pass_complete(
        &self,
        _ser: &mut ResidualHeapSerializer<'_>,
    ) -> Result<Vec<JsStmt>, CoreError> {
        Ok(Vec::new())
    }
}

/// Eager construction: declaration, then property assignments inline.
#[derive(Debug, Default)]
pub struct DefaultStrategy;

impl ObjectStrategy for DefaultStrategy {
    fn name(&self) -> &str {
        "default"
    }

    fn serialize_object(
        &self,
        ser: &mut ResidualHeapSerializer<'_>,
        id: ValueId,
        obj: &ObjectValue,
    ) -> Result<(), CoreError> {
        let init = ser.object_construction(id, obj)?;
        ser.declare(id, init)?;
        ser.emit_properties(id, &obj.properties, obj.integrity)
    }
}
