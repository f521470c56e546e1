//! Change node over a managed view.

use std::rc::Rc;

use tracing::debug;
use viewdelta_tracking::{Value, ViewRef};
use viewdelta_types::{Attribute, AttributeKind, ChangeKind, ViewType};

use super::{ChangeModel, ChangeRef, DiffContext, EmptyChangeModel};
use crate::checker::{DirtyChecker, MapChecker, PluralChecker, ViewChecker};
use crate::delta::{collection_deltas, value_deltas, Delta};
use crate::error::{DiffError, DiffResult};
use crate::memo::MemoCache;
use crate::path;

/// The question a path probe answers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Probe {
    /// Changed in any way, in place or by replacement.
    Dirty,
    /// Replaced by a different value somewhere along the path.
    Changed,
}

/// Change node of a singular view attribute, a view element, or the root.
pub struct ViewChangeModel {
    ctx: Rc<DiffContext>,
    checker: Rc<ViewChecker>,
    initial: Option<ViewRef>,
    current: Option<ViewRef>,
    children: MemoCache<usize>,
}

impl ViewChangeModel {
    pub(crate) fn new(
        ctx: Rc<DiffContext>,
        checker: Rc<ViewChecker>,
        initial: Option<ViewRef>,
        current: Option<ViewRef>,
    ) -> Self {
        Self {
            ctx,
            checker,
            initial,
            current,
            children: MemoCache::default(),
        }
    }

    pub fn view_type(&self) -> &Rc<ViewType> {
        self.checker.view_type()
    }

    pub fn initial(&self) -> Option<&ViewRef> {
        self.initial.as_ref()
    }

    pub fn current(&self) -> Option<&ViewRef> {
        self.current.as_ref()
    }

    pub fn kind(&self) -> ChangeKind {
        match (&self.initial, &self.current) {
            (None, None) => ChangeKind::None,
            (None, Some(_)) | (Some(_), None) => ChangeKind::Updated,
            (Some(a), Some(b)) => self.checker.dirty_kind(a, b),
        }
    }

    pub(crate) fn child_by_name(&self, name: &str, path: &str) -> DiffResult<ChangeRef> {
        let attribute = self
            .view_type()
            .attribute(name)
            .ok_or_else(|| DiffError::attribute(name, path))?;
        self.child(attribute, path)
    }

    /// Child node of a tracked attribute, memoized by slot. Below a null
    /// view every child is empty.
    pub(crate) fn child(&self, attribute: &Attribute, path: &str) -> DiffResult<ChangeRef> {
        let declared = self.view_type().attribute(attribute.name());
        let slot = match (declared, attribute.slot()) {
            (Some(d), Some(slot)) if d.slot() == Some(slot) && d.declaring_type() == attribute.declaring_type() => slot,
            _ => return Err(DiffError::attribute(attribute.name(), path)),
        };
        let Some(current) = &self.current else {
            return self.children.get_or_build(slot, &Value::Null, &Value::Null, || {
                Ok(ChangeModel::Empty(EmptyChangeModel::new(
                    Rc::clone(&self.ctx),
                    attribute.kind().clone(),
                )))
            });
        };
        // A distinct initial view (same id, other instance) supplies its own
        // initial state.
        let initial_value = self.initial.as_ref().unwrap_or(current).initial_value(slot);
        let current_value = current.current_value(slot);
        let checker = self
            .checker
            .nested(slot)
            .ok_or_else(|| DiffError::IllegalState(format!("no checker for slot {slot}")))?;
        self.children.get_or_build(slot, &initial_value, &current_value, || {
            ChangeModel::for_attribute(
                &self.ctx,
                attribute.kind(),
                checker,
                initial_value.clone(),
                current_value.clone(),
            )
        })
    }

    /// Children of reported slots that verify as changed, in slot order.
    pub(crate) fn dirty_changes(&self) -> DiffResult<Vec<ChangeRef>> {
        let Some(current) = &self.current else {
            return Ok(Vec::new());
        };
        let initial = self.initial.as_ref().unwrap_or(current);
        let slots = self.checker.changed_slots(initial, current);
        debug!(
            view = self.view_type().name(),
            reported = current.dirty_bits().iter_ones().count(),
            verified = slots.len(),
            "dirty changes enumerated"
        );
        slots
            .into_iter()
            .map(|slot| {
                let attribute = self
                    .view_type()
                    .attribute_for_slot(slot)
                    .ok_or_else(|| DiffError::IllegalState(format!("no attribute for slot {slot}")))?;
                self.child(attribute, attribute.name())
            })
            .collect()
    }

    pub(crate) fn probe(&self, path: &str, probe: Probe) -> DiffResult<bool> {
        path::validate(self.view_type(), path)?;
        let segments = path::segments(path)?;
        let Some(current) = &self.current else {
            return Ok(false);
        };
        if probe == Probe::Changed && self.kind() == ChangeKind::Updated {
            return Ok(true);
        }
        let initial = self.initial.as_ref().unwrap_or(current);
        probe_view(initial, current, &self.checker, &segments, probe)
    }
}

/// Walk `segments` from `view`, following current objects. `initial_view`
/// is `view` itself, or a distinct instance it replaced whose initial state
/// is compared slot by slot instead of consulting dirty bits.
pub(crate) fn probe_view(
    initial_view: &ViewRef,
    view: &ViewRef,
    checker: &ViewChecker,
    segments: &[&str],
    probe: Probe,
) -> DiffResult<bool> {
    let Some((first, rest)) = segments.split_first() else {
        return Ok(false);
    };
    let attribute = view
        .view_type()
        .attribute(first)
        .ok_or_else(|| DiffError::attribute(first, &segments.join(".")))?;
    let slot = attribute
        .slot()
        .ok_or_else(|| DiffError::attribute(first, &segments.join(".")))?;
    let in_place = Rc::ptr_eq(initial_view, view);
    if in_place && !view.dirty_bits().get(slot) {
        return Ok(false);
    }
    let initial = initial_view.initial_value(slot);
    let current = view.current_value(slot);
    let nested = checker
        .nested(slot)
        .ok_or_else(|| DiffError::IllegalState(format!("no checker for slot {slot}")))?;

    if rest.is_empty() {
        let kind = nested.dirty_kind(&initial, &current);
        return Ok(match probe {
            Probe::Dirty => kind.is_dirty(),
            Probe::Changed => {
                kind == ChangeKind::Updated
                    || (!attribute.kind().is_singular() && !initial.same(&current) && kind.is_dirty())
            }
        });
    }
    if current.is_null() {
        return Ok(!initial.is_null());
    }
    match (attribute.kind(), nested, &current) {
        (AttributeKind::Singular(_), DirtyChecker::View(child_checker), Value::View(child)) => {
            if initial.is_null() || (probe == Probe::Changed && nested.dirty_kind(&initial, &current) == ChangeKind::Updated) {
                return Ok(true);
            }
            probe_view(initial.as_view().unwrap_or(child), child, child_checker, rest, probe)
        }
        (AttributeKind::Plural { .. }, DirtyChecker::Plural(plural), Value::Collection(c)) => {
            if probe == Probe::Changed && !initial.same(&current) && nested.dirty_kind(&initial, &current).is_dirty() {
                return Ok(true);
            }
            let deltas = collection_deltas(plural, initial.as_collection(), Some(c));
            probe_elements(plural_element_checker(plural)?, &deltas, rest, probe)
        }
        (AttributeKind::Map { .. }, DirtyChecker::Map(map), Value::Map(m)) => {
            if probe == Probe::Changed && !initial.same(&current) && nested.dirty_kind(&initial, &current).is_dirty() {
                return Ok(true);
            }
            let deltas = value_deltas(map, initial.as_map(), Some(m));
            probe_elements(map_value_checker(map)?, &deltas, rest, probe)
        }
        _ => Err(DiffError::dereference(
            &segments.join("."),
            format!("'{first}' does not lead to a managed view"),
        )),
    }
}

/// Probe the current elements of a delta list. Under [`Probe::Changed`],
/// an element absent from the initial contents counts as changed.
pub(crate) fn probe_elements(
    checker: &ViewChecker,
    deltas: &[Delta],
    segments: &[&str],
    probe: Probe,
) -> DiffResult<bool> {
    for delta in deltas.iter().filter(|d| d.is_current()) {
        let (initial, current) = delta.pair();
        let Some(view) = current.as_view() else {
            continue;
        };
        if probe == Probe::Changed && initial.is_null() {
            return Ok(true);
        }
        if probe_view(initial.as_view().unwrap_or(view), view, checker, segments, probe)? {
            return Ok(true);
        }
    }
    Ok(false)
}

pub(crate) fn plural_element_checker(plural: &PluralChecker) -> DiffResult<&ViewChecker> {
    plural
        .element_checker()
        .as_view()
        .map(Rc::as_ref)
        .ok_or_else(|| DiffError::dereference(plural.element_type().name(), "elements are basic values"))
}

pub(crate) fn map_value_checker(map: &MapChecker) -> DiffResult<&ViewChecker> {
    map.value_checker()
        .as_view()
        .map(Rc::as_ref)
        .ok_or_else(|| DiffError::dereference(map.value_type().name(), "map values are basic values"))
}

pub(crate) fn map_key_checker(map: &MapChecker) -> DiffResult<&ViewChecker> {
    map.key_checker()
        .as_view()
        .map(Rc::as_ref)
        .ok_or_else(|| DiffError::dereference(map.key_type().name(), "map keys are basic values"))
}
