//! Tracked collections, sets, and lists.
//!
//! A recording collection logs net additions and removals since the last
//! reset: adding an element that was recorded as removed un-removes it, and
//! removing an element that was recorded as added un-adds it. When the
//! cancelled pair are distinct references, the removed original is kept
//! alongside its replacement. Element matching follows
//! [`ElementMatcher::for_container`].
//!
//! A plain collection records nothing and owns nothing. When stored in a
//! view, the view snapshots a shallow copy so that changes are found
//! structurally.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::trace;
use viewdelta_types::{PluralKind, TypeDescriptor};

use crate::error::{TrackingError, TrackingResult};
use crate::ledger::Ledger;
use crate::matcher::ElementMatcher;
use crate::owner::{Owner, OwnerCell};
use crate::value::{check_element, Value};

/// Shared handle to a tracked collection.
pub type CollectionRef = Rc<TrackedCollection>;

/// Container for the elements of a plural attribute.
pub struct TrackedCollection {
    kind: PluralKind,
    element_type: TypeDescriptor,
    matcher: ElementMatcher,
    elements: RefCell<Vec<Value>>,
    /// `None` for plain collections.
    recorder: Option<RefCell<Ledger>>,
    dirty: Cell<bool>,
    owner: Option<OwnerCell>,
    me: Weak<TrackedCollection>,
}

impl TrackedCollection {
    /// A recording collection that claims its elements.
    pub fn recording(
        kind: PluralKind,
        element_type: TypeDescriptor,
        elements: impl IntoIterator<Item = Value>,
    ) -> TrackingResult<CollectionRef> {
        Self::build(kind, element_type, elements, true)
    }

    /// A plain collection with no recording.
    pub fn plain(
        kind: PluralKind,
        element_type: TypeDescriptor,
        elements: impl IntoIterator<Item = Value>,
    ) -> TrackingResult<CollectionRef> {
        Self::build(kind, element_type, elements, false)
    }

    fn build(
        kind: PluralKind,
        element_type: TypeDescriptor,
        elements: impl IntoIterator<Item = Value>,
        recording: bool,
    ) -> TrackingResult<CollectionRef> {
        let matcher = ElementMatcher::for_container(&element_type);
        let mut accepted: Vec<Value> = Vec::new();
        for e in elements {
            check_non_null(&e)?;
            check_element("collection element", &element_type, &e)?;
            if kind == PluralKind::Set && accepted.iter().any(|x| matcher.matches(x, &e)) {
                continue;
            }
            accepted.push(e);
        }
        let collection = Rc::new_cyclic(|me| TrackedCollection {
            kind,
            element_type,
            matcher,
            elements: RefCell::new(accepted.clone()),
            recorder: recording.then(|| RefCell::new(Ledger::default())),
            dirty: Cell::new(false),
            owner: recording.then(OwnerCell::default),
            me: me.clone(),
        });
        for e in &accepted {
            collection.claim(e)?;
        }
        Ok(collection)
    }

    pub fn kind(&self) -> PluralKind {
        self.kind
    }

    pub fn element_type(&self) -> &TypeDescriptor {
        &self.element_type
    }

    pub fn matcher(&self) -> &ElementMatcher {
        &self.matcher
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_some()
    }

    /// Snapshot of the elements in iteration order.
    pub fn elements(&self) -> Vec<Value> {
        self.elements.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.elements.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.borrow().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.elements.borrow().get(index).cloned()
    }

    /// Membership under the container's element matching.
    pub fn contains(&self, value: &Value) -> bool {
        self.position(value).is_some()
    }

    /// Recorded net additions.
    pub fn added_elements(&self) -> Vec<Value> {
        self.recorder
            .as_ref()
            .map(|r| r.borrow().added.clone())
            .unwrap_or_default()
    }

    /// Recorded net removals.
    pub fn removed_elements(&self) -> Vec<Value> {
        self.recorder
            .as_ref()
            .map(|r| r.borrow().removed.clone())
            .unwrap_or_default()
    }

    /// `(removed original, replacement)` pairs: elements removed and then
    /// matched by a later addition of a distinct reference.
    pub fn replaced_elements(&self) -> Vec<(Value, Value)> {
        self.recorder
            .as_ref()
            .map(|r| r.borrow().replaced.clone())
            .unwrap_or_default()
    }

    /// A structural add or remove is pending.
    pub fn has_actions(&self) -> bool {
        self.recorder.as_ref().is_some_and(|r| r.borrow().has_actions())
    }

    /// Aggregate dirtiness: structural actions, element notifications, or an
    /// element type whose in-place changes go unreported. Plain collections
    /// are always dirty.
    pub fn is_dirty(&self) -> bool {
        let caps = self.element_type.capabilities();
        !self.is_recording()
            || self.dirty.get()
            || self.has_actions()
            || (caps.mutable && !caps.dirty_checking)
    }

    /// Add an element. Sets ignore elements that match an existing one and
    /// return `false`.
    pub fn add(&self, value: impl Into<Value>) -> TrackingResult<bool> {
        let value = value.into();
        self.admit(&value)?;
        if self.kind == PluralKind::Set && self.contains(&value) {
            return Ok(false);
        }
        self.claim(&value)?;
        self.elements.borrow_mut().push(value.clone());
        self.record_add(value);
        Ok(true)
    }

    /// Remove the first matching element.
    pub fn remove(&self, value: &Value) -> bool {
        let Some(index) = self.position(value) else {
            return false;
        };
        let removed = self.elements.borrow_mut().remove(index);
        self.record_remove(removed);
        true
    }

    /// Insert at a position. Lists only keep the order meaningful.
    pub fn insert(&self, index: usize, value: impl Into<Value>) -> TrackingResult<()> {
        let value = value.into();
        self.admit(&value)?;
        let len = self.len();
        if index > len {
            return Err(TrackingError::IndexOutOfBounds { index, len });
        }
        self.claim(&value)?;
        self.elements.borrow_mut().insert(index, value.clone());
        self.record_add(value);
        Ok(())
    }

    /// Remove and return the element at a position.
    pub fn remove_at(&self, index: usize) -> TrackingResult<Value> {
        let len = self.len();
        if index >= len {
            return Err(TrackingError::IndexOutOfBounds { index, len });
        }
        let removed = self.elements.borrow_mut().remove(index);
        self.record_remove(removed.clone());
        Ok(removed)
    }

    /// Replace the element at a position, returning the old one. Recorded as
    /// a removal plus an addition.
    pub fn set_at(&self, index: usize, value: impl Into<Value>) -> TrackingResult<Value> {
        let value = value.into();
        self.admit(&value)?;
        let len = self.len();
        if index >= len {
            return Err(TrackingError::IndexOutOfBounds { index, len });
        }
        self.claim(&value)?;
        let previous = std::mem::replace(&mut self.elements.borrow_mut()[index], value.clone());
        self.record_remove(previous.clone());
        self.record_add(value);
        Ok(previous)
    }

    /// Remove every element.
    pub fn clear(&self) {
        let drained: Vec<Value> = self.elements.borrow_mut().drain(..).collect();
        for e in drained {
            self.record_remove(e);
        }
    }

    /// Forget recorded actions and dirtiness, recursively.
    pub fn reset(&self) {
        if let Some(r) = &self.recorder {
            *r.borrow_mut() = Ledger::default();
        }
        self.dirty.set(false);
        self.elements().iter().for_each(Value::reset);
    }

    /// Unowned, non-recording copy sharing the same element references.
    pub fn plain_copy(&self) -> CollectionRef {
        Rc::new_cyclic(|me| TrackedCollection {
            kind: self.kind,
            element_type: self.element_type.clone(),
            matcher: self.matcher.clone(),
            elements: RefCell::new(self.elements()),
            recorder: None,
            dirty: Cell::new(false),
            owner: None,
            me: me.clone(),
        })
    }

    pub(crate) fn owner(&self) -> Option<&OwnerCell> {
        self.owner.as_ref()
    }

    pub(crate) fn mark_dirty(&self) {
        if self.recorder.is_none() {
            return;
        }
        self.dirty.set(true);
        if let Some(owner) = &self.owner {
            owner.notify();
        }
    }

    fn admit(&self, value: &Value) -> TrackingResult<()> {
        check_non_null(value)?;
        check_element("collection element", &self.element_type, value)
    }

    fn position(&self, value: &Value) -> Option<usize> {
        self.elements
            .borrow()
            .iter()
            .position(|e| self.matcher.matches(e, value))
    }

    fn claim(&self, value: &Value) -> TrackingResult<()> {
        if self.recorder.is_none() {
            return Ok(());
        }
        value.claim(
            Owner::Collection(self.me.clone()),
            self.element_type.tracks_mutations(),
        )
    }

    fn record_add(&self, value: Value) {
        let Some(recorder) = &self.recorder else {
            return;
        };
        recorder.borrow_mut().add(&self.matcher, value);
        trace!(kind = ?self.kind, "element added");
        self.mark_dirty();
    }

    fn record_remove(&self, value: Value) {
        let Some(recorder) = &self.recorder else {
            return;
        };
        value.release(&Owner::Collection(self.me.clone()));
        recorder.borrow_mut().remove(&self.matcher, value);
        trace!(kind = ?self.kind, "element removed");
        self.mark_dirty();
    }
}

fn check_non_null(value: &Value) -> TrackingResult<()> {
    if value.is_null() {
        return Err(TrackingError::NullElement {
            container: "collection".to_string(),
        });
    }
    Ok(())
}

impl fmt::Debug for TrackedCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedCollection")
            .field("kind", &self.kind)
            .field("element_type", &self.element_type)
            .field("elements", &self.elements.borrow())
            .field("recording", &self.is_recording())
            .finish()
    }
}
