//! Emission context: a tree of output bodies plus the cursor stack.
//!
//! Every statement the serializer produces lands in the body on top of the
//! stack. Bodies record their parent, so "is the cursor inside X" is a walk
//! up the parent chain. Pushes and pops must pair on every path; callers use
//! [`Emitter::enter`] / [`Emitter::leave`] only through the serializer's
//! scoped helper, which pops before propagating errors.

use residue_core::define_entity;
use residue_core::entity::PrimaryMap;
use residue_core::error::CoreError;
use residue_core::heap::ValueId;
use residue_core::js_ast::JsStmt;

define_entity!(BodyId);

/// What a body will become in the final program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// Top-level statements of the program.
    Global,
    /// Body of an optimized root function.
    OptimizedRoot(ValueId),
    /// Property hydration of one lazy object; ends up in a switch case.
    LazyInitializer(ValueId),
    /// Delayed construction run on the first call of a function.
    DelayedInit(ValueId),
}

impl BodyKind {
    /// Values are declared in global and optimized-root bodies only.
    pub fn declares_values(self) -> bool {
        matches!(self, BodyKind::Global | BodyKind::OptimizedRoot(_))
    }
}

#[derive(Debug)]
pub struct Body {
    pub kind: BodyKind,
    pub parent: Option<BodyId>,
    pub stmts: Vec<JsStmt>,
}

/// An exact `(body, index)` position in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BodyReference {
    pub body: BodyId,
    pub index: usize,
}

impl BodyReference {
    /// True when both positions are in the same body and `self` is at or
    /// after `other`. Positions in different bodies are never ordered.
    pub fn is_not_earlier_than(&self, other: &BodyReference) -> bool {
        self.body == other.body && self.index >= other.index
    }
}

#[derive(Debug)]
pub struct Emitter {
    bodies: PrimaryMap<BodyId, Body>,
    stack: Vec<BodyId>,
    global: BodyId,
}

impl Default for Emitter {
    fn default() -> Self {
        Self::new()
    }
}

impl Emitter {
    pub fn new() -> Self {
        let mut bodies = PrimaryMap::new();
        let global = bodies.push(Body {
            kind: BodyKind::Global,
            parent: None,
            stmts: Vec::new(),
        });
        Self {
            bodies,
            stack: vec![global],
            global,
        }
    }

    pub fn global(&self) -> BodyId {
        self.global
    }

    /// Allocate a body. It is not entered.
    pub fn new_body(&mut self, kind: BodyKind, parent: BodyId) -> BodyId {
        self.bodies.push(Body {
            kind,
            parent: Some(parent),
            stmts: Vec::new(),
        })
    }

    pub fn body(&self, id: BodyId) -> &Body {
        &self.bodies[id]
    }

    pub fn kind(&self, id: BodyId) -> BodyKind {
        self.bodies[id].kind
    }

    pub fn current(&self) -> BodyId {
        self.stack.last().copied().unwrap_or(self.global)
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn enter(&mut self, body: BodyId) {
        self.stack.push(body);
    }

    pub fn leave(&mut self) -> Result<BodyId, CoreError> {
        if self.stack.len() <= 1 {
            return Err(CoreError::internal("emitter stack underflow"));
        }
        self.stack
            .pop()
            .ok_or_else(|| CoreError::internal("emitter stack underflow"))
    }

    /// Append to the current body.
    pub fn emit(&mut self, stmt: JsStmt) {
        let current = self.current();
        self.bodies[current].stmts.push(stmt);
    }

    pub fn emit_into(&mut self, body: BodyId, stmt: JsStmt) {
        self.bodies[body].stmts.push(stmt);
    }

    /// Position just past the last statement of the current body.
    pub fn position(&self) -> BodyReference {
        self.end_of(self.current())
    }

    pub fn end_of(&self, body: BodyId) -> BodyReference {
        BodyReference {
            body,
            index: self.bodies[body].stmts.len(),
        }
    }

    /// Whether `body` is `ancestor` or nested (transitively) inside it.
    pub fn is_offspring_of(&self, body: BodyId, ancestor: BodyId) -> bool {
        let mut current = Some(body);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.bodies[id].parent;
        }
        false
    }

    pub fn current_is_offspring_of(&self, ancestor: BodyId) -> bool {
        self.is_offspring_of(self.current(), ancestor)
    }

    /// Nearest body, starting at `body`, that declares values.
    pub fn declaration_body_of(&self, body: BodyId) -> BodyId {
        let mut current = body;
        loop {
            let entry = &self.bodies[current];
            if entry.kind.declares_values() {
                return current;
            }
            match entry.parent {
                Some(parent) => current = parent,
                None => return self.global,
            }
        }
    }

    pub fn declaration_body(&self) -> BodyId {
        self.declaration_body_of(self.current())
    }

    pub fn stmts_mut(&mut self, body: BodyId) -> &mut Vec<JsStmt> {
        &mut self.bodies[body].stmts
    }

    /// Move the statements out of a body, leaving it empty.
    pub fn take(&mut self, body: BodyId) -> Vec<JsStmt> {
        std::mem::take(&mut self.bodies[body].stmts)
    }
}
