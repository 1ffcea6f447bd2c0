use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::define_entity;

use super::value::ValueId;

define_entity!(ScopeId);

/// One captured declarative environment record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scope {
    #[serde(default)]
    pub parent: Option<ScopeId>,
    /// Declared names in declaration order, with their value at the end of
    /// evaluation (`None` when never initialized).
    #[serde(default)]
    pub bindings: IndexMap<String, Option<ValueId>>,
    /// Names the evaluator saw reassigned after capture.
    #[serde(default)]
    pub modified: BTreeSet<String>,
    /// Optimized root whose invocation created this scope.
    #[serde(default)]
    pub root: Option<ValueId>,
}

impl Scope {
    /// Declaration position of `name`, which is also its slot index once the
    /// scope is referentialized.
    pub fn slot_of(&self, name: &str) -> Option<usize> {
        self.bindings.get_index_of(name)
    }

    pub fn declares(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }
}
