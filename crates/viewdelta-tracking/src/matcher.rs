//! Element equality inside containers.
//!
//! Views match by their id attribute when the view type declares one and by
//! reference otherwise. Basic leaves match through the type plugin's
//! equality, except opaque leaves inside recording containers, which only
//! match by reference.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use serde_json::Value as Json;
use viewdelta_types::{BasicUserType, TypeDescriptor};

use crate::value::Value;
use crate::view::TrackedView;

/// Equality and hashing for the elements of one container type.
#[derive(Clone, Debug)]
pub struct ElementMatcher {
    ty: TypeDescriptor,
    identity_only: bool,
}

impl ElementMatcher {
    /// Matcher used by recording containers: opaque leaves match by
    /// reference only.
    pub fn for_container(ty: &TypeDescriptor) -> Self {
        Self {
            ty: ty.clone(),
            identity_only: ty.is_opaque(),
        }
    }

    /// Matcher that always applies type equality to basic leaves.
    pub fn by_equality(ty: &TypeDescriptor) -> Self {
        Self {
            ty: ty.clone(),
            identity_only: false,
        }
    }

    pub fn element_type(&self) -> &TypeDescriptor {
        &self.ty
    }

    /// Whether `a` and `b` denote the same element.
    pub fn matches(&self, a: &Value, b: &Value) -> bool {
        if a.same(b) {
            return true;
        }
        match (&self.ty, a, b) {
            (_, Value::Null, _) | (_, _, Value::Null) => false,
            (TypeDescriptor::Basic(ty), Value::Basic(x), Value::Basic(y)) => {
                !self.identity_only && x.with(|px| y.with(|py| ty.is_equal(px, py)))
            }
            (TypeDescriptor::View(_), Value::View(x), Value::View(y)) => ids_equal(x, y),
            _ => false,
        }
    }

    /// Hash consistent with [`ElementMatcher::matches`].
    pub fn hash(&self, value: &Value) -> u64 {
        match (&self.ty, value) {
            (_, Value::Null) => 0,
            (TypeDescriptor::Basic(ty), Value::Basic(b)) if !self.identity_only => {
                b.with(|p| ty.hash_value(p))
            }
            (TypeDescriptor::View(_), Value::View(v)) => match id_hash(v) {
                Some(h) => h,
                None => address_hash(value),
            },
            _ => address_hash(value),
        }
    }
}

/// Two distinct views are equal when their type declares an id attribute
/// and both ids are non-null and equal.
pub fn ids_equal(a: &TrackedView, b: &TrackedView) -> bool {
    if a.view_type().name() != b.view_type().name() {
        return false;
    }
    let Some((ty, left)) = id_of(a) else {
        return false;
    };
    let Some((_, right)) = id_of(b) else {
        return false;
    };
    ty.is_equal(&left, &right)
}

fn id_of(view: &TrackedView) -> Option<(Rc<dyn BasicUserType>, Json)> {
    let attribute = view.view_type().id_attribute()?;
    let ty = Rc::clone(attribute.kind().target_type().as_basic()?);
    let payload = view.current_value(attribute.slot()?).payload()?;
    (!payload.is_null()).then_some((ty, payload))
}

fn id_hash(view: &Rc<TrackedView>) -> Option<u64> {
    let (ty, payload) = id_of(view)?;
    Some(ty.hash_value(&payload))
}

fn address_hash(value: &Value) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.identity().hash(&mut hasher);
    hasher.finish()
}
