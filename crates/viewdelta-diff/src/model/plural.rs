//! Change node over a collection, set, or list.

use std::rc::Rc;

use tracing::debug;
use viewdelta_tracking::CollectionRef;
use viewdelta_types::ChangeKind;

use super::view::{plural_element_checker, probe_elements, Probe};
use super::{ChangeModel, ChangeRef, DiffContext};
use crate::checker::PluralChecker;
use crate::delta::{collection_deltas, Delta};
use crate::error::DiffResult;
use crate::memo::MemoCache;
use crate::path;

/// Change node of a plural attribute.
///
/// Element nodes are tagged by their pair: an added element has a null
/// initial value, a removed element a null current value.
pub struct PluralChangeModel {
    ctx: Rc<DiffContext>,
    checker: Rc<PluralChecker>,
    initial: Option<CollectionRef>,
    current: Option<CollectionRef>,
    elements: MemoCache<(usize, usize)>,
}

impl PluralChangeModel {
    pub(crate) fn new(
        ctx: Rc<DiffContext>,
        checker: Rc<PluralChecker>,
        initial: Option<CollectionRef>,
        current: Option<CollectionRef>,
    ) -> Self {
        Self {
            ctx,
            checker,
            initial,
            current,
            elements: MemoCache::default(),
        }
    }

    pub fn initial(&self) -> Option<&CollectionRef> {
        self.initial.as_ref()
    }

    pub fn current(&self) -> Option<&CollectionRef> {
        self.current.as_ref()
    }

    pub fn kind(&self) -> ChangeKind {
        match (&self.initial, &self.current) {
            (None, None) => ChangeKind::None,
            (None, Some(_)) | (Some(_), None) => ChangeKind::Updated,
            (Some(a), Some(b)) => self.checker.dirty_kind(a, b),
        }
    }

    /// Current deltas. Cached element nodes no longer among them are dropped.
    fn deltas(&self) -> Vec<Delta> {
        let deltas = collection_deltas(&self.checker, self.initial.as_ref(), self.current.as_ref());
        self.elements.retain(deltas.iter().map(Delta::memo_key));
        deltas
    }

    fn node(&self, delta: &Delta) -> DiffResult<ChangeRef> {
        let (initial, current) = delta.pair();
        self.elements.get_or_build(delta.memo_key(), &initial, &current, || {
            ChangeModel::for_element(
                &self.ctx,
                self.checker.element_type(),
                self.checker.element_checker(),
                initial.clone(),
                current.clone(),
            )
        })
    }

    fn nodes(&self, keep: impl Fn(&Delta) -> bool) -> DiffResult<Vec<ChangeRef>> {
        self.deltas().iter().filter(|d| keep(d)).map(|d| self.node(d)).collect()
    }

    /// Retained elements whose node verifies as changed. Only element types
    /// whose in-place changes are observable can be mutated.
    fn mutated(&self, deltas: &[Delta]) -> DiffResult<Vec<ChangeRef>> {
        if !self.checker.element_type().tracks_mutations() {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        for d in deltas.iter().filter(|d| matches!(d, Delta::Retained { .. })) {
            let node = self.node(d)?;
            if node.is_dirty() {
                out.push(node);
            }
        }
        Ok(out)
    }

    pub(crate) fn added_elements(&self) -> DiffResult<Vec<ChangeRef>> {
        self.nodes(|d| matches!(d, Delta::Added(_)))
    }

    pub(crate) fn removed_elements(&self) -> DiffResult<Vec<ChangeRef>> {
        self.nodes(|d| matches!(d, Delta::Removed(_)))
    }

    pub(crate) fn mutated_elements(&self) -> DiffResult<Vec<ChangeRef>> {
        self.mutated(&self.deltas())
    }

    /// Added, mutated, and removed elements in delta order.
    pub(crate) fn element_changes(&self) -> DiffResult<Vec<ChangeRef>> {
        let tracks = self.checker.element_type().tracks_mutations();
        let mut out = Vec::new();
        for d in self.deltas() {
            let node = match d {
                Delta::Retained { .. } if !tracks => continue,
                _ => self.node(&d)?,
            };
            if matches!(d, Delta::Retained { .. }) && !node.is_dirty() {
                continue;
            }
            out.push(node);
        }
        Ok(out)
    }

    /// One node per current element, in iteration order.
    pub(crate) fn elements(&self) -> DiffResult<Vec<ChangeRef>> {
        self.nodes(Delta::is_current)
    }

    /// Element nodes for dereferencing through this collection.
    pub(crate) fn fan_out(&self) -> DiffResult<Vec<ChangeRef>> {
        if !self.ctx.config.fan_out_clean_plurals {
            if let Some(c) = &self.current {
                if c.is_recording() && !c.is_dirty() {
                    debug!(len = c.len(), "clean recording collection; fan-out skipped");
                    return Ok(Vec::new());
                }
            }
        }
        self.elements()
    }

    pub(crate) fn probe(&self, path: &str, probe: Probe) -> DiffResult<bool> {
        let checker = plural_element_checker(&self.checker)?;
        path::validate(checker.view_type(), path)?;
        let segments = path::segments(path)?;
        probe_elements(checker, &self.deltas(), &segments, probe)
    }
}
