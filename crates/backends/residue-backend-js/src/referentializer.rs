//! Scope referentialization.
//!
//! A captured binding that is reassigned after capture cannot be folded into
//! each function body as a value; every instance closing over it must see the
//! same writes. Such a scope is promoted to an array of slots, one per declared
//! name, created on first access by an accessor function and cached by
//! selector. Selectors are dense per referentialization scope: the program
//! top level, or the body of one optimized root.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use log::debug;

use residue_core::error::CoreError;
use residue_core::heap::{ScopeId, ValueId};
use residue_core::js_ast::{JsExpr, JsFunction, JsParam, JsStmt};

/// Where a referentialized scope's bootstrap lives: `None` for the program
/// top level, or the optimized root that created the scope.
pub type ReferentializationScope = Option<ValueId>;

#[derive(Debug)]
struct ScopeRecord {
    selector: usize,
    owner: ReferentializationScope,
    slot_count: usize,
    slots: BTreeMap<usize, JsExpr>,
}

#[derive(Debug, Default)]
pub struct Referentializer {
    scopes: IndexMap<ScopeId, ScopeRecord>,
    counts: BTreeMap<ReferentializationScope, usize>,
    /// Optimized root → suffix used in its helper names.
    root_suffixes: BTreeMap<ValueId, usize>,
}

impl Referentializer {
    pub fn new(root_suffixes: BTreeMap<ValueId, usize>) -> Self {
        Self {
            root_suffixes,
            ..Default::default()
        }
    }

    /// Promote `scope`, returning its selector. Idempotent.
    pub fn referentialize(
        &mut self,
        scope: ScopeId,
        owner: ReferentializationScope,
        slot_count: usize,
    ) -> usize {
        if let Some(record) = self.scopes.get(&scope) {
            return record.selector;
        }
        let count = self.counts.entry(owner).or_insert(0);
        let selector = *count;
        *count += 1;
        debug!("referentialized scope s{scope} as selector {selector}");
        self.scopes.insert(
            scope,
            ScopeRecord {
                selector,
                owner,
                slot_count,
                slots: BTreeMap::new(),
            },
        );
        selector
    }

    pub fn is_referentialized(&self, scope: ScopeId) -> bool {
        self.scopes.contains_key(&scope)
    }

    pub fn selector(&self, scope: ScopeId) -> Result<usize, CoreError> {
        self.record(scope).map(|record| record.selector)
    }

    pub fn owner(&self, scope: ScopeId) -> Result<ReferentializationScope, CoreError> {
        self.record(scope).map(|record| record.owner)
    }

    /// Initial value of one slot.
    pub fn set_slot(&mut self, scope: ScopeId, slot: usize, value: JsExpr) -> Result<(), CoreError> {
        let record = self
            .scopes
            .get_mut(&scope)
            .ok_or_else(|| CoreError::internal(format!("scope s{scope} is not referentialized")))?;
        record.slots.insert(slot, value);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    fn record(&self, scope: ScopeId) -> Result<&ScopeRecord, CoreError> {
        self.scopes
            .get(&scope)
            .ok_or_else(|| CoreError::internal(format!("scope s{scope} is not referentialized")))
    }

    fn suffix(&self, owner: ReferentializationScope) -> String {
        match owner.and_then(|root| self.root_suffixes.get(&root)) {
            Some(index) => format!("_{index}"),
            None => String::new(),
        }
    }

    /// Name of the cache array for `owner`.
    pub fn captured_scopes_name(&self, owner: ReferentializationScope) -> String {
        format!("__captured_scopes{}", self.suffix(owner))
    }

    /// Name of the accessor function for `owner`.
    pub fn accessor_name(&self, owner: ReferentializationScope) -> String {
        format!("__get_scope_binding{}", self.suffix(owner))
    }

    /// `var <local> = <array>[<index>] || <accessor>(<index>);`
    pub fn scope_initialization(
        &self,
        local: &str,
        scope: ScopeId,
        index: JsExpr,
    ) -> Result<JsStmt, CoreError> {
        let owner = self.owner(scope)?;
        let cached = JsExpr::index(JsExpr::var(self.captured_scopes_name(owner)), index.clone());
        let fresh = JsExpr::call(JsExpr::var(self.accessor_name(owner)), vec![index]);
        Ok(JsStmt::var(
            local,
            JsExpr::LogicalOr {
                lhs: Box::new(cached),
                rhs: Box::new(fresh),
            },
        ))
    }

    fn scopes_of(&self, owner: ReferentializationScope) -> impl Iterator<Item = &ScopeRecord> {
        self.scopes.values().filter(move |record| record.owner == owner)
    }

    /// `var __captured_scopes = Array(N);`, or nothing when `owner` has no
    /// referentialized scopes.
    pub fn captured_scopes_array_initialization(
        &self,
        owner: ReferentializationScope,
    ) -> Option<JsStmt> {
        let count = self.counts.get(&owner).copied().unwrap_or(0);
        if count == 0 {
            return None;
        }
        Some(JsStmt::var(
            self.captured_scopes_name(owner),
            JsExpr::call(JsExpr::var("Array"), vec![JsExpr::num(count as f64)]),
        ))
    }

    /// The accessor that builds a scope's slot array by selector and caches it.
    pub fn capture_scope_access_function(&self, owner: ReferentializationScope) -> Option<JsStmt> {
        let mut records: Vec<&ScopeRecord> = self.scopes_of(owner).collect();
        if records.is_empty() {
            return None;
        }
        records.sort_by_key(|record| record.selector);

        let selector = JsExpr::var("__selector");
        let captured = JsExpr::var("__captured");
        let cases = records
            .iter()
            .map(|record| {
                let slots = (0..record.slot_count)
                    .map(|slot| {
                        record
                            .slots
                            .get(&slot)
                            .cloned()
                            .unwrap_or_else(JsExpr::undefined)
                    })
                    .collect();
                (
                    JsExpr::num(record.selector as f64),
                    vec![
                        JsStmt::assign(captured.clone(), JsExpr::ArrayInit(slots)),
                        JsStmt::Break,
                    ],
                )
            })
            .collect();

        let body = vec![
            JsStmt::VarDecl {
                kind: Default::default(),
                name: "__captured".into(),
                init: None,
            },
            JsStmt::Switch {
                value: selector.clone(),
                cases,
                default_body: Some(vec![JsStmt::throw_error("Unknown scope selector")]),
            },
            JsStmt::assign(
                JsExpr::index(JsExpr::var(self.captured_scopes_name(owner)), selector),
                captured.clone(),
            ),
            JsStmt::Return(Some(captured)),
        ];

        Some(JsStmt::FunctionDecl(JsFunction {
            name: Some(self.accessor_name(owner)),
            params: vec![JsParam::Ident("__selector".into())],
            body,
            ..Default::default()
        }))
    }

    /// Both bootstrap statements for `owner`, in prelude order.
    pub fn bootstrap(&self, owner: ReferentializationScope) -> Vec<JsStmt> {
        self.captured_scopes_array_initialization(owner)
            .into_iter()
            .chain(self.capture_scope_access_function(owner))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast_printer::stmts_to_string;
    use residue_core::entity::EntityRef;

    #[test]
    fn selectors_are_dense_per_owner() {
        let root = ValueId::new(9);
        let mut referentializer = Referentializer::new(BTreeMap::from([(root, 0)]));
        assert_eq!(referentializer.referentialize(ScopeId::new(3), None, 1), 0);
        assert_eq!(referentializer.referentialize(ScopeId::new(5), Some(root), 1), 0);
        assert_eq!(referentializer.referentialize(ScopeId::new(1), None, 1), 1);
        assert_eq!(referentializer.referentialize(ScopeId::new(3), None, 1), 0);
        assert_eq!(referentializer.len(), 3);
        assert_eq!(referentializer.captured_scopes_name(Some(root)), "__captured_scopes_0");
        assert_eq!(referentializer.accessor_name(None), "__get_scope_binding");
    }

    #[test]
    fn no_scopes_no_bootstrap() {
        let referentializer = Referentializer::default();
        assert!(referentializer.bootstrap(None).is_empty());
    }

    #[test]
    fn bootstrap_builds_slot_arrays() {
        let mut referentializer = Referentializer::default();
        let scope = ScopeId::new(0);
        referentializer.referentialize(scope, None, 2);
        referentializer.set_slot(scope, 1, JsExpr::num(5.0)).unwrap();

        let init = referentializer
            .scope_initialization("__scope_0", scope, JsExpr::num(0.0))
            .unwrap();
        assert_eq!(
            stmts_to_string(&[init]),
            "var __scope_0 = __captured_scopes[0] || __get_scope_binding(0);\n"
        );

        let printed = stmts_to_string(&referentializer.bootstrap(None));
        assert!(printed.starts_with("var __captured_scopes = Array(1);\n"), "{printed}");
        assert!(printed.contains("function __get_scope_binding(__selector) {"), "{printed}");
        assert!(printed.contains("__captured = [undefined, 5];"), "{printed}");
        assert!(printed.contains("throw new Error(\"Unknown scope selector\");"), "{printed}");
        assert!(printed.contains("__captured_scopes[__selector] = __captured;"), "{printed}");
    }

    #[test]
    fn unknown_scope_is_internal() {
        let mut referentializer = Referentializer::default();
        let err = referentializer
            .set_slot(ScopeId::new(4), 0, JsExpr::undefined())
            .unwrap_err();
        assert!(matches!(err, CoreError::Internal(_)));
    }
}
