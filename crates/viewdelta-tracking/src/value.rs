//! Runtime values of the tracked object graph.
//!
//! Identity is reference identity: two [`Value`]s are the same object when
//! they point at the same allocation. Equality of payloads is a separate
//! question answered by the basic-type plugins.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use serde_json::Value as Json;
use viewdelta_types::{AttributeKind, BasicUserType, TypeDescriptor};

use crate::collection::CollectionRef;
use crate::error::{TrackingError, TrackingResult};
use crate::map::MapRef;
use crate::owner::{Owner, OwnerCell};
use crate::view::ViewRef;

/// A value held in a tracked slot, container element, or map entry.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Basic(BasicValue),
    View(ViewRef),
    Collection(CollectionRef),
    Map(MapRef),
}

impl Value {
    /// Wrap a JSON payload in a fresh leaf cell.
    pub fn basic(payload: Json) -> Self {
        Self::Basic(BasicValue::new(payload))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Reference identity. Two nulls are the same.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Basic(a), Self::Basic(b)) => a.same(b),
            (Self::View(a), Self::View(b)) => Rc::ptr_eq(a, b),
            (Self::Collection(a), Self::Collection(b)) => Rc::ptr_eq(a, b),
            (Self::Map(a), Self::Map(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Address of the referenced object; `0` for null.
    ///
    /// Only stable while some clone of the value is alive.
    pub fn identity(&self) -> usize {
        match self {
            Self::Null => 0,
            Self::Basic(b) => Rc::as_ptr(&b.0) as usize,
            Self::View(v) => Rc::as_ptr(v) as usize,
            Self::Collection(c) => Rc::as_ptr(c) as usize,
            Self::Map(m) => Rc::as_ptr(m) as usize,
        }
    }

    pub fn as_basic(&self) -> Option<&BasicValue> {
        match self {
            Self::Basic(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_view(&self) -> Option<&ViewRef> {
        match self {
            Self::View(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_collection(&self) -> Option<&CollectionRef> {
        match self {
            Self::Collection(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&MapRef> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Short description of the value's shape for diagnostics.
    pub fn shape(&self) -> String {
        match self {
            Self::Null => "null".to_string(),
            Self::Basic(_) => "basic value".to_string(),
            Self::View(v) => format!("view {}", v.view_type().name()),
            Self::Collection(_) => "collection".to_string(),
            Self::Map(_) => "map".to_string(),
        }
    }

    /// Payload of a basic value.
    pub fn payload(&self) -> Option<Json> {
        self.as_basic().map(BasicValue::get)
    }

    /// Reset tracking state below this value after a flush.
    pub(crate) fn reset(&self) {
        match self {
            Self::Null => {}
            Self::Basic(b) => b.clear_dirty(),
            Self::View(v) => v.reset(),
            Self::Collection(c) => c.reset(),
            Self::Map(m) => m.reset(),
        }
    }

    /// Attach this value to `owner`. Views and recording containers are
    /// claimed exclusively; leaves only when their type reports mutations.
    pub(crate) fn claim(&self, owner: Owner, leaf_tracks_mutations: bool) -> TrackingResult<()> {
        match self {
            Self::Null => Ok(()),
            Self::Basic(b) => {
                if leaf_tracks_mutations {
                    b.0.owner.replace(owner);
                }
                Ok(())
            }
            Self::View(v) => v.owner().claim(owner, v.view_type().name()),
            Self::Collection(c) => match c.owner() {
                Some(cell) => cell.claim(owner, "collection"),
                None => Ok(()),
            },
            Self::Map(m) => match m.owner() {
                Some(cell) => cell.claim(owner, "map"),
                None => Ok(()),
            },
        }
    }

    pub(crate) fn release(&self, owner: &Owner) {
        match self {
            Self::Null => {}
            Self::Basic(b) => b.0.owner.release(owner),
            Self::View(v) => v.owner().release(owner),
            Self::Collection(c) => {
                if let Some(cell) = c.owner() {
                    cell.release(owner);
                }
            }
            Self::Map(m) => {
                if let Some(cell) = m.owner() {
                    cell.release(owner);
                }
            }
        }
    }
}

impl From<Json> for Value {
    fn from(payload: Json) -> Self {
        Self::basic(payload)
    }
}

impl From<BasicValue> for Value {
    fn from(value: BasicValue) -> Self {
        Self::Basic(value)
    }
}

impl From<ViewRef> for Value {
    fn from(view: ViewRef) -> Self {
        Self::View(view)
    }
}

impl From<CollectionRef> for Value {
    fn from(collection: CollectionRef) -> Self {
        Self::Collection(collection)
    }
}

impl From<MapRef> for Value {
    fn from(map: MapRef) -> Self {
        Self::Map(map)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Basic(b) => write!(f, "Basic({})", b.get()),
            Self::View(v) => write!(f, "View({}@{:#x})", v.view_type().name(), self.identity()),
            Self::Collection(c) => write!(f, "Collection(len={})", c.len()),
            Self::Map(m) => write!(f, "Map(len={})", m.len()),
        }
    }
}

struct BasicCell {
    payload: RefCell<Json>,
    dirty: Cell<bool>,
    /// Set on snapshots: the cell this one was deep-cloned from.
    origin: Option<Weak<BasicCell>>,
    owner: OwnerCell,
}

/// Shared, in-place mutable leaf value.
///
/// Cloning a `BasicValue` clones the handle, not the payload.
#[derive(Clone)]
pub struct BasicValue(Rc<BasicCell>);

impl BasicValue {
    pub fn new(payload: Json) -> Self {
        Self(Rc::new(BasicCell {
            payload: RefCell::new(payload),
            dirty: Cell::new(false),
            origin: None,
            owner: OwnerCell::default(),
        }))
    }

    /// Copy of the current payload.
    pub fn get(&self) -> Json {
        self.0.payload.borrow().clone()
    }

    /// Borrow the payload.
    pub fn with<R>(&self, f: impl FnOnce(&Json) -> R) -> R {
        f(&self.0.payload.borrow())
    }

    /// Replace the payload in place. Marks the leaf dirty and notifies the
    /// owning slot when one is attached.
    pub fn set(&self, payload: Json) {
        *self.0.payload.borrow_mut() = payload;
        self.touch();
    }

    /// Mutate the payload in place.
    pub fn update(&self, f: impl FnOnce(&mut Json)) {
        f(&mut self.0.payload.borrow_mut());
        self.touch();
    }

    /// The leaf's own dirty flag.
    pub fn is_dirty(&self) -> bool {
        self.0.dirty.get()
    }

    pub fn clear_dirty(&self) {
        self.0.dirty.set(false);
    }

    pub fn same(&self, other: &BasicValue) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Independent deep copy remembering where it came from.
    pub fn snapshot(&self, user_type: &dyn BasicUserType) -> BasicValue {
        let payload = self.with(|p| user_type.deep_clone(p));
        Self(Rc::new(BasicCell {
            payload: RefCell::new(payload),
            dirty: Cell::new(false),
            origin: Some(Rc::downgrade(&self.0)),
            owner: OwnerCell::default(),
        }))
    }

    /// `true` if `self` was produced by [`BasicValue::snapshot`] on `other`.
    pub fn is_snapshot_of(&self, other: &BasicValue) -> bool {
        self.0
            .origin
            .as_ref()
            .is_some_and(|origin| std::ptr::eq(origin.as_ptr(), Rc::as_ptr(&other.0)))
    }

    fn touch(&self) {
        self.0.dirty.set(true);
        self.0.owner.notify();
    }
}

impl fmt::Debug for BasicValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicValue")
            .field("payload", &self.get())
            .field("dirty", &self.is_dirty())
            .finish()
    }
}

/// Verify that `value` fits a type descriptor. Null always fits.
pub(crate) fn check_element(target: &str, ty: &TypeDescriptor, value: &Value) -> TrackingResult<()> {
    let fits = match (ty, value) {
        (_, Value::Null) => true,
        (TypeDescriptor::Basic(_), Value::Basic(_)) => true,
        (TypeDescriptor::View(expected), Value::View(v)) => {
            Rc::ptr_eq(expected, v.view_type()) || expected.name() == v.view_type().name()
        }
        _ => false,
    };
    if fits {
        Ok(())
    } else {
        Err(mismatch(target, ty.name(), value))
    }
}

/// Verify that `value` fits an attribute kind. Null always fits.
pub(crate) fn check_attribute(target: &str, kind: &AttributeKind, value: &Value) -> TrackingResult<()> {
    match (kind, value) {
        (_, Value::Null) => Ok(()),
        (AttributeKind::Singular(ty), _) => check_element(target, ty, value),
        (AttributeKind::Plural { kind, .. }, Value::Collection(c)) if c.kind() == *kind => Ok(()),
        (AttributeKind::Plural { kind, .. }, _) => Err(mismatch(target, &format!("{kind:?}"), value)),
        (AttributeKind::Map { .. }, Value::Map(_)) => Ok(()),
        (AttributeKind::Map { .. }, _) => Err(mismatch(target, "map", value)),
    }
}

fn mismatch(target: &str, expected: &str, value: &Value) -> TrackingError {
    TrackingError::ShapeMismatch {
        target: target.to_string(),
        expected: expected.to_string(),
        actual: value.shape(),
    }
}
