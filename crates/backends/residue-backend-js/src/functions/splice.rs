use std::collections::BTreeMap;

use residue_core::error::CoreError;
use residue_core::js_ast::JsStmt;

use crate::emitter::{BodyId, BodyReference, Emitter};

#[derive(Debug)]
struct Group {
    index: usize,
    order: usize,
    stmts: Vec<JsStmt>,
}

/// Collects statement groups keyed by insertion point and splices them in
/// one pass.
///
/// Groups are applied per body from the highest index down, so splicing one
/// group never shifts the index of a group still to be applied. Groups
/// sharing an index end up in ascending `order`.
#[derive(Debug, Default)]
pub struct Splicer {
    groups: BTreeMap<BodyId, Vec<Group>>,
}

impl Splicer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, point: BodyReference, order: usize, stmts: Vec<JsStmt>) {
        if stmts.is_empty() {
            return;
        }
        self.groups.entry(point.body).or_default().push(Group {
            index: point.index,
            order,
            stmts,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn apply(self, emitter: &mut Emitter) -> Result<(), CoreError> {
        for (body, groups) in self.groups {
            splice_groups(emitter, body, groups)?;
        }
        Ok(())
    }

    /// Splice only the groups recorded for `body`; the rest stay pending.
    pub fn apply_body(&mut self, body: BodyId, emitter: &mut Emitter) -> Result<(), CoreError> {
        match self.groups.remove(&body) {
            Some(groups) => splice_groups(emitter, body, groups),
            None => Ok(()),
        }
    }
}

fn splice_groups(emitter: &mut Emitter, body: BodyId, mut groups: Vec<Group>) -> Result<(), CoreError> {
    groups.sort_by(|a, b| b.index.cmp(&a.index).then(b.order.cmp(&a.order)));
    let stmts = emitter.stmts_mut(body);
    for group in groups {
        if group.index > stmts.len() {
            return Err(CoreError::internal(format!(
                "insertion point {} is past the end of body {body} ({} statements)",
                group.index,
                stmts.len()
            )));
        }
        stmts.splice(group.index..group.index, group.stmts);
    }
    Ok(())
}
