//! Change node over a map.
//!
//! Keys and values are diffed on independent axes. The key axis matches
//! keys with the key type's own equality. The value axis pairs each value
//! with the initial value of its key when that key survives, and matches the
//! rest as a multiset. Object accessors merge both axes entry by entry.

use std::rc::Rc;

use tracing::debug;
use viewdelta_tracking::MapRef;
use viewdelta_types::{ChangeKind, TypeDescriptor};

use super::view::{map_key_checker, map_value_checker, probe_elements, Probe};
use super::{ChangeModel, ChangeRef, DiffContext};
use crate::checker::{DirtyChecker, MapChecker};
use crate::delta::{key_deltas, value_deltas, Delta};
use crate::error::DiffResult;
use crate::memo::MemoCache;
use crate::path;

/// Node factory for one axis of a map.
struct Axis<'a> {
    ctx: &'a Rc<DiffContext>,
    ty: &'a TypeDescriptor,
    checker: &'a DirtyChecker,
    memo: &'a MemoCache<(usize, usize)>,
}

impl Axis<'_> {
    fn node(&self, delta: &Delta) -> DiffResult<ChangeRef> {
        let (initial, current) = delta.pair();
        self.memo.get_or_build(delta.memo_key(), &initial, &current, || {
            ChangeModel::for_element(self.ctx, self.ty, self.checker, initial.clone(), current.clone())
        })
    }

    /// The node of a retained delta if it verifies as changed.
    fn mutated(&self, delta: &Delta) -> DiffResult<Option<ChangeRef>> {
        if !matches!(delta, Delta::Retained { .. }) || !self.ty.tracks_mutations() {
            return Ok(None);
        }
        let node = self.node(delta)?;
        Ok(node.is_dirty().then_some(node))
    }

    /// The node of a delta if it is a change of any sort.
    fn change(&self, delta: &Delta) -> DiffResult<Option<ChangeRef>> {
        match delta {
            Delta::Retained { .. } => self.mutated(delta),
            _ => self.node(delta).map(Some),
        }
    }

    fn select(&self, deltas: &[Delta], keep: impl Fn(&Delta) -> bool) -> DiffResult<Vec<ChangeRef>> {
        deltas.iter().filter(|d| keep(d)).map(|d| self.node(d)).collect()
    }

    fn changes(&self, deltas: &[Delta]) -> DiffResult<Vec<ChangeRef>> {
        let mut out = Vec::new();
        for d in deltas {
            out.extend(self.change(d)?);
        }
        Ok(out)
    }

    fn all_mutated(&self, deltas: &[Delta]) -> DiffResult<Vec<ChangeRef>> {
        let mut out = Vec::new();
        for d in deltas {
            out.extend(self.mutated(d)?);
        }
        Ok(out)
    }
}

fn is_added(d: &Delta) -> bool {
    matches!(d, Delta::Added(_) | Delta::Replaced { .. })
}

fn is_removed(d: &Delta) -> bool {
    matches!(d, Delta::Removed(_) | Delta::Replaced { .. })
}

/// Change node of a map attribute.
///
/// A value exchanged under one key is a single node with both sides set;
/// it is listed among the added and the removed values, and once among the
/// element changes.
pub struct MapChangeModel {
    ctx: Rc<DiffContext>,
    checker: Rc<MapChecker>,
    initial: Option<MapRef>,
    current: Option<MapRef>,
    keys: MemoCache<(usize, usize)>,
    values: MemoCache<(usize, usize)>,
}

impl MapChangeModel {
    pub(crate) fn new(
        ctx: Rc<DiffContext>,
        checker: Rc<MapChecker>,
        initial: Option<MapRef>,
        current: Option<MapRef>,
    ) -> Self {
        Self {
            ctx,
            checker,
            initial,
            current,
            keys: MemoCache::default(),
            values: MemoCache::default(),
        }
    }

    pub fn initial(&self) -> Option<&MapRef> {
        self.initial.as_ref()
    }

    pub fn current(&self) -> Option<&MapRef> {
        self.current.as_ref()
    }

    pub fn kind(&self) -> ChangeKind {
        match (&self.initial, &self.current) {
            (None, None) => ChangeKind::None,
            (None, Some(_)) | (Some(_), None) => ChangeKind::Updated,
            (Some(a), Some(b)) => self.checker.dirty_kind(a, b),
        }
    }

    fn key_axis(&self) -> Axis<'_> {
        Axis {
            ctx: &self.ctx,
            ty: self.checker.key_type(),
            checker: self.checker.key_checker(),
            memo: &self.keys,
        }
    }

    fn value_axis(&self) -> Axis<'_> {
        Axis {
            ctx: &self.ctx,
            ty: self.checker.value_type(),
            checker: self.checker.value_checker(),
            memo: &self.values,
        }
    }

    /// Current key deltas; cached key nodes no longer among them are dropped.
    fn key_deltas(&self) -> Vec<Delta> {
        let deltas = key_deltas(&self.checker, self.initial.as_ref(), self.current.as_ref());
        self.keys.retain(deltas.iter().map(Delta::memo_key));
        deltas
    }

    fn value_deltas(&self) -> Vec<Delta> {
        let deltas = value_deltas(&self.checker, self.initial.as_ref(), self.current.as_ref());
        self.values.retain(deltas.iter().map(Delta::memo_key));
        deltas
    }

    // -----------------------------------------------------------------------
    // Value axis
    // -----------------------------------------------------------------------

    pub(crate) fn element_changes(&self) -> DiffResult<Vec<ChangeRef>> {
        self.value_axis().changes(&self.value_deltas())
    }

    pub(crate) fn added_elements(&self) -> DiffResult<Vec<ChangeRef>> {
        self.value_axis().select(&self.value_deltas(), is_added)
    }

    pub(crate) fn removed_elements(&self) -> DiffResult<Vec<ChangeRef>> {
        self.value_axis().select(&self.value_deltas(), is_removed)
    }

    pub(crate) fn mutated_elements(&self) -> DiffResult<Vec<ChangeRef>> {
        self.value_axis().all_mutated(&self.value_deltas())
    }

    /// One node per non-null current value, in entry order.
    pub(crate) fn elements(&self) -> DiffResult<Vec<ChangeRef>> {
        self.value_axis().select(&self.value_deltas(), Delta::is_current)
    }

    pub(crate) fn fan_out(&self) -> DiffResult<Vec<ChangeRef>> {
        if self.skips_fan_out() {
            return Ok(Vec::new());
        }
        self.elements()
    }

    fn skips_fan_out(&self) -> bool {
        if self.ctx.config.fan_out_clean_plurals {
            return false;
        }
        match &self.current {
            Some(m) if m.is_recording() && !m.is_dirty() => {
                debug!(len = m.len(), "clean recording map; fan-out skipped");
                true
            }
            _ => false,
        }
    }

    // -----------------------------------------------------------------------
    // Key axis
    // -----------------------------------------------------------------------

    pub(crate) fn key_changes(&self) -> DiffResult<Vec<ChangeRef>> {
        self.key_axis().changes(&self.key_deltas())
    }

    pub(crate) fn added_keys(&self) -> DiffResult<Vec<ChangeRef>> {
        self.key_axis().select(&self.key_deltas(), is_added)
    }

    pub(crate) fn removed_keys(&self) -> DiffResult<Vec<ChangeRef>> {
        self.key_axis().select(&self.key_deltas(), is_removed)
    }

    pub(crate) fn mutated_keys(&self) -> DiffResult<Vec<ChangeRef>> {
        self.key_axis().all_mutated(&self.key_deltas())
    }

    /// One node per current key, for fan-out over managed keys.
    pub(crate) fn key_elements(&self) -> DiffResult<Vec<ChangeRef>> {
        if self.skips_fan_out() {
            return Ok(Vec::new());
        }
        self.key_axis().select(&self.key_deltas(), Delta::is_current)
    }

    // -----------------------------------------------------------------------
    // Both axes, merged per entry
    // -----------------------------------------------------------------------

    /// Walk the current entries with their key and value deltas, then the
    /// removed keys and the removed values. `pick` maps a delta of the given
    /// axis to the node to report, if any.
    fn merged(
        &self,
        pick: impl Fn(&Axis<'_>, &Delta) -> DiffResult<Option<ChangeRef>>,
    ) -> DiffResult<Vec<ChangeRef>> {
        let keys = self.key_axis();
        let values = self.value_axis();
        let key_deltas = self.key_deltas();
        let value_deltas = self.value_deltas();
        let (current_keys, removed_keys): (Vec<&Delta>, Vec<&Delta>) =
            key_deltas.iter().partition(|d| d.is_current());
        let (current_values, removed_values): (Vec<&Delta>, Vec<&Delta>) =
            value_deltas.iter().partition(|d| d.is_current());

        // Both current halves follow entry order; values skip null entries.
        let entries = self.current.as_ref().map(|m| m.entries()).unwrap_or_default();
        let mut key_iter = current_keys.into_iter();
        let mut value_iter = current_values.into_iter();
        let mut out = Vec::new();
        for (_, value) in &entries {
            if let Some(d) = key_iter.next() {
                out.extend(pick(&keys, d)?);
            }
            if !value.is_null() {
                if let Some(d) = value_iter.next() {
                    out.extend(pick(&values, d)?);
                }
            }
        }
        for d in key_iter.chain(removed_keys) {
            out.extend(pick(&keys, d)?);
        }
        for d in value_iter.chain(removed_values) {
            out.extend(pick(&values, d)?);
        }
        Ok(out)
    }

    pub(crate) fn object_changes(&self) -> DiffResult<Vec<ChangeRef>> {
        self.merged(|axis, d| axis.change(d))
    }

    pub(crate) fn added_objects(&self) -> DiffResult<Vec<ChangeRef>> {
        self.merged(|axis, d| if is_added(d) { axis.node(d).map(Some) } else { Ok(None) })
    }

    pub(crate) fn removed_objects(&self) -> DiffResult<Vec<ChangeRef>> {
        self.merged(|axis, d| if is_removed(d) { axis.node(d).map(Some) } else { Ok(None) })
    }

    pub(crate) fn mutated_objects(&self) -> DiffResult<Vec<ChangeRef>> {
        self.merged(|axis, d| axis.mutated(d))
    }

    // -----------------------------------------------------------------------
    // Probes
    // -----------------------------------------------------------------------

    pub(crate) fn probe(&self, path: &str, probe: Probe) -> DiffResult<bool> {
        let checker = map_value_checker(&self.checker)?;
        path::validate(checker.view_type(), path)?;
        let segments = path::segments(path)?;
        probe_elements(checker, &self.value_deltas(), &segments, probe)
    }

    pub(crate) fn probe_keys(&self, path: &str, probe: Probe) -> DiffResult<bool> {
        let checker = map_key_checker(&self.checker)?;
        path::validate(checker.view_type(), path)?;
        let segments = path::segments(path)?;
        probe_elements(checker, &self.key_deltas(), &segments, probe)
    }
}
