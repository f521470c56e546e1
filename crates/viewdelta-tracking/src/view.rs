//! Tracked view objects.
//!
//! A [`TrackedView`] holds, per tracked slot, the value seen at load time
//! (the initial state) and the value now (the current state), plus a dirty
//! bit that is set whenever the slot is written or a child reports a change.
//!
//! # Always-dirty slots
//!
//! A mutable leaf that cannot report its own changes gives the view no way
//! to learn about in-place mutation. Slots of such types are permanently
//! reported in [`TrackedView::dirty_bits`], and so are slots currently
//! holding a plain (non-recording) container. The change engine verifies
//! each reported slot; a set bit is necessary but not sufficient.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use serde_json::Value as Json;
use tracing::trace;
use viewdelta_types::{Attribute, AttributeKind, TypeDescriptor, ViewType};

use crate::bits::DirtyBits;
use crate::error::{TrackingError, TrackingResult};
use crate::owner::{Owner, OwnerCell};
use crate::value::{check_attribute, Value};

/// Shared handle to a tracked view.
pub type ViewRef = Rc<TrackedView>;

struct ViewState {
    initial: Vec<Value>,
    current: Vec<Value>,
    dirty: DirtyBits,
    is_new: bool,
}

/// A managed object with per-slot initial and current state.
pub struct TrackedView {
    view_type: Rc<ViewType>,
    state: RefCell<ViewState>,
    always_dirty: DirtyBits,
    owner: OwnerCell,
    me: Weak<TrackedView>,
}

impl TrackedView {
    /// Materialize an existing object. Unnamed slots start as null; the
    /// initial state is snapshotted from the given values.
    pub fn load<'a>(
        view_type: &Rc<ViewType>,
        values: impl IntoIterator<Item = (&'a str, Value)>,
    ) -> TrackingResult<ViewRef> {
        let current = Self::collect_slots(view_type, values)?;
        let initial = current
            .iter()
            .enumerate()
            .map(|(slot, v)| snapshot(slot_kind(view_type, slot), v))
            .collect();
        Self::assemble(view_type, initial, current, false)
    }

    /// Create a new object. Its initial state is all null and every
    /// non-null slot starts dirty.
    pub fn create<'a>(
        view_type: &Rc<ViewType>,
        values: impl IntoIterator<Item = (&'a str, Value)>,
    ) -> TrackingResult<ViewRef> {
        let current = Self::collect_slots(view_type, values)?;
        let initial = vec![Value::Null; current.len()];
        Self::assemble(view_type, initial, current, true)
    }

    fn collect_slots<'a>(
        view_type: &Rc<ViewType>,
        values: impl IntoIterator<Item = (&'a str, Value)>,
    ) -> TrackingResult<Vec<Value>> {
        let mut current = vec![Value::Null; view_type.slot_count()];
        for (name, value) in values {
            let (slot, attribute) = resolve(view_type, name)?;
            check_attribute(&target(attribute), attribute.kind(), &value)?;
            current[slot] = value;
        }
        Ok(current)
    }

    fn assemble(
        view_type: &Rc<ViewType>,
        initial: Vec<Value>,
        current: Vec<Value>,
        is_new: bool,
    ) -> TrackingResult<ViewRef> {
        let mut dirty = DirtyBits::new(current.len());
        if is_new {
            for (slot, v) in current.iter().enumerate() {
                if !v.is_null() {
                    dirty.set(slot);
                }
            }
        }
        let view = Rc::new_cyclic(|me| TrackedView {
            view_type: Rc::clone(view_type),
            always_dirty: always_dirty_slots(view_type),
            state: RefCell::new(ViewState {
                initial,
                current: current.clone(),
                dirty,
                is_new,
            }),
            owner: OwnerCell::default(),
            me: me.clone(),
        });
        for (slot, v) in current.iter().enumerate() {
            v.claim(view.slot_owner(slot), leaf_tracks_mutations(view_type, slot))?;
        }
        trace!(view = view_type.name(), is_new, "tracked view materialized");
        Ok(view)
    }

    pub fn view_type(&self) -> &Rc<ViewType> {
        &self.view_type
    }

    /// Created rather than loaded, and not yet reset.
    pub fn is_new(&self) -> bool {
        self.state.borrow().is_new
    }

    /// Any slot reported dirty.
    pub fn is_dirty(&self) -> bool {
        self.dirty_bits().any()
    }

    /// Slots that may have changed: written slots, always-dirty slots, and
    /// slots holding plain containers.
    pub fn dirty_bits(&self) -> DirtyBits {
        let state = self.state.borrow();
        let mut bits = state.dirty.union(&self.always_dirty);
        for (slot, v) in state.current.iter().enumerate() {
            let plain = match v {
                Value::Collection(c) => !c.is_recording(),
                Value::Map(m) => !m.is_recording(),
                _ => false,
            };
            if plain {
                bits.set(slot);
            }
        }
        bits
    }

    /// Only the bits set by writes and child notifications.
    pub fn written_bits(&self) -> DirtyBits {
        self.state.borrow().dirty.clone()
    }

    /// Values as of load time, one per slot.
    pub fn initial_state(&self) -> Vec<Value> {
        self.state.borrow().initial.clone()
    }

    /// Values now, one per slot.
    pub fn current_state(&self) -> Vec<Value> {
        self.state.borrow().current.clone()
    }

    /// Initial value of a slot; null when out of range.
    pub fn initial_value(&self, slot: usize) -> Value {
        self.state.borrow().initial.get(slot).cloned().unwrap_or_default()
    }

    /// Current value of a slot; null when out of range.
    pub fn current_value(&self, slot: usize) -> Value {
        self.state.borrow().current.get(slot).cloned().unwrap_or_default()
    }

    /// Current value of a tracked attribute.
    pub fn get(&self, name: &str) -> TrackingResult<Value> {
        let (slot, _) = resolve(&self.view_type, name)?;
        Ok(self.current_value(slot))
    }

    /// Payload of a basic attribute, if set.
    pub fn payload(&self, name: &str) -> TrackingResult<Option<Json>> {
        Ok(self.get(name)?.payload())
    }

    /// Write a tracked attribute. The slot is marked dirty even when the
    /// same reference is written back.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> TrackingResult<()> {
        let value = value.into();
        let (slot, attribute) = resolve(&self.view_type, name)?;
        check_attribute(&target(attribute), attribute.kind(), &value)?;

        let owner = self.slot_owner(slot);
        value.claim(owner.clone(), leaf_tracks_mutations(&self.view_type, slot))?;

        let previous = {
            let mut state = self.state.borrow_mut();
            std::mem::replace(&mut state.current[slot], value.clone())
        };
        if !previous.same(&value) {
            previous.release(&owner);
        }
        trace!(view = self.view_type.name(), attribute = name, "slot written");
        self.mark_slot_dirty(slot);
        Ok(())
    }

    /// Mark an attribute dirty without writing it, e.g. after mutating a
    /// leaf in place that cannot report the change itself.
    pub fn mark_dirty(&self, name: &str) -> TrackingResult<()> {
        let (slot, _) = resolve(&self.view_type, name)?;
        self.mark_slot_dirty(slot);
        Ok(())
    }

    /// Accept the current state as the new initial state, recursively, and
    /// clear all dirty tracking.
    pub fn reset(&self) {
        let current = {
            let mut state = self.state.borrow_mut();
            let initial = state
                .current
                .iter()
                .enumerate()
                .map(|(slot, v)| snapshot(slot_kind(&self.view_type, slot), v))
                .collect();
            state.initial = initial;
            state.dirty.clear_all();
            state.is_new = false;
            state.current.clone()
        };
        current.iter().for_each(Value::reset);
    }

    pub(crate) fn owner(&self) -> &OwnerCell {
        &self.owner
    }

    pub(crate) fn mark_slot_dirty(&self, slot: usize) {
        let newly = {
            let mut state = self.state.borrow_mut();
            let was = state.dirty.get(slot);
            state.dirty.set(slot);
            !was
        };
        if newly {
            trace!(view = self.view_type.name(), slot, "dirty bit set");
        }
        self.owner.notify();
    }

    fn slot_owner(&self, slot: usize) -> Owner {
        Owner::View {
            view: self.me.clone(),
            slot,
        }
    }
}

impl fmt::Debug for TrackedView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("TrackedView")
            .field("type", &self.view_type.name())
            .field("current", &state.current)
            .field("dirty", &state.dirty)
            .field("is_new", &state.is_new)
            .finish()
    }
}

fn resolve<'t>(view_type: &'t ViewType, name: &str) -> TrackingResult<(usize, &'t Attribute)> {
    let attribute = view_type
        .attribute(name)
        .ok_or_else(|| TrackingError::UnknownAttribute {
            view: view_type.name().to_string(),
            attribute: name.to_string(),
        })?;
    let slot = attribute
        .slot()
        .ok_or_else(|| TrackingError::UntrackedAttribute {
            view: view_type.name().to_string(),
            attribute: name.to_string(),
        })?;
    Ok((slot, attribute))
}

fn target(attribute: &Attribute) -> String {
    format!("{}.{}", attribute.declaring_type(), attribute.name())
}

fn slot_kind(view_type: &ViewType, slot: usize) -> Option<&AttributeKind> {
    view_type.attribute_for_slot(slot).map(Attribute::kind)
}

fn leaf_tracks_mutations(view_type: &ViewType, slot: usize) -> bool {
    matches!(slot_kind(view_type, slot), Some(AttributeKind::Singular(ty)) if ty.tracks_mutations())
}

/// Mutable leaf types whose in-place changes go unreported.
fn unreported(ty: &TypeDescriptor) -> bool {
    matches!(ty, TypeDescriptor::Basic(b) if b.capabilities().mutable && !b.capabilities().dirty_checking)
}

fn always_dirty_slots(view_type: &ViewType) -> DirtyBits {
    let mut bits = DirtyBits::new(view_type.slot_count());
    for slot in 0..view_type.slot_count() {
        let flagged = match slot_kind(view_type, slot) {
            Some(AttributeKind::Singular(ty)) => unreported(ty),
            Some(AttributeKind::Plural { element, .. }) => unreported(element),
            Some(AttributeKind::Map { key, value }) => unreported(key) || unreported(value),
            None => false,
        };
        if flagged {
            bits.set(slot);
        }
    }
    bits
}

/// Initial-state copy of a slot value. Deep-cloneable leaves get an
/// independent copy and plain containers a shallow copy; everything else is
/// shared with the current state.
fn snapshot(kind: Option<&AttributeKind>, value: &Value) -> Value {
    match (kind, value) {
        (Some(AttributeKind::Singular(TypeDescriptor::Basic(ty))), Value::Basic(b))
            if ty.capabilities().mutable && ty.capabilities().deep_cloning =>
        {
            Value::Basic(b.snapshot(ty.as_ref()))
        }
        (_, Value::Collection(c)) if !c.is_recording() => Value::Collection(c.plain_copy()),
        (_, Value::Map(m)) if !m.is_recording() => Value::Map(m.plain_copy()),
        _ => value.clone(),
    }
}
