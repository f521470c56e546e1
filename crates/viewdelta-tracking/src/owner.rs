//! Parent links and dirty propagation.
//!
//! Every view and recording container remembers the one container that
//! holds it. Dirtiness flows upward through these links: a child marked
//! dirty marks its owner's slot bit (views) or aggregate flag (containers).

use std::cell::RefCell;
use std::rc::Weak;

use crate::collection::TrackedCollection;
use crate::error::{TrackingError, TrackingResult};
use crate::map::TrackedMap;
use crate::view::TrackedView;

#[derive(Clone)]
pub(crate) enum Owner {
    View { view: Weak<TrackedView>, slot: usize },
    Collection(Weak<TrackedCollection>),
    Map(Weak<TrackedMap>),
}

impl Owner {
    fn is_live(&self) -> bool {
        match self {
            Self::View { view, .. } => view.strong_count() > 0,
            Self::Collection(c) => c.strong_count() > 0,
            Self::Map(m) => m.strong_count() > 0,
        }
    }

    /// Same parent object. The slot of a view owner is not compared, so a
    /// child may move between slots of one parent.
    fn same_parent(&self, other: &Owner) -> bool {
        match (self, other) {
            (Self::View { view: a, .. }, Self::View { view: b, .. }) => a.ptr_eq(b),
            (Self::Collection(a), Self::Collection(b)) => a.ptr_eq(b),
            (Self::Map(a), Self::Map(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::View { view, slot } => match view.upgrade() {
                Some(v) => format!("{}[{slot}]", v.view_type().name()),
                None => "<dropped view>".to_string(),
            },
            Self::Collection(_) => "a collection".to_string(),
            Self::Map(_) => "a map".to_string(),
        }
    }

    fn notify(&self) {
        match self {
            Self::View { view, slot } => {
                if let Some(view) = view.upgrade() {
                    view.mark_slot_dirty(*slot);
                }
            }
            Self::Collection(c) => {
                if let Some(c) = c.upgrade() {
                    c.mark_dirty();
                }
            }
            Self::Map(m) => {
                if let Some(m) = m.upgrade() {
                    m.mark_dirty();
                }
            }
        }
    }
}

/// Optional parent link held by a tracked object.
#[derive(Default)]
pub(crate) struct OwnerCell(RefCell<Option<Owner>>);

impl OwnerCell {
    /// Exclusive claim: fails if a different live parent already owns the
    /// object.
    pub(crate) fn claim(&self, owner: Owner, what: &str) -> TrackingResult<()> {
        let mut slot = self.0.borrow_mut();
        if let Some(existing) = slot.as_ref() {
            if existing.is_live() && !existing.same_parent(&owner) {
                return Err(TrackingError::OwnershipConflict {
                    what: what.to_string(),
                    owner: existing.describe(),
                });
            }
        }
        *slot = Some(owner);
        Ok(())
    }

    /// Non-exclusive claim used for shared leaf values.
    pub(crate) fn replace(&self, owner: Owner) {
        *self.0.borrow_mut() = Some(owner);
    }

    /// Drop the link if `owner` is the current parent.
    pub(crate) fn release(&self, owner: &Owner) {
        let mut slot = self.0.borrow_mut();
        if slot.as_ref().is_some_and(|o| o.same_parent(owner)) {
            *slot = None;
        }
    }

    /// Propagate dirtiness to the parent, if any.
    pub(crate) fn notify(&self) {
        let owner = self.0.borrow().clone();
        if let Some(owner) = owner {
            owner.notify();
        }
    }
}
