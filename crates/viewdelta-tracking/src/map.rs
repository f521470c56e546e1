//! Tracked maps.
//!
//! A recording map logs net key and value changes separately: putting a new
//! key records the key and its value as added, replacing the value of an
//! existing key records only the value exchange, and removing a key records
//! the key and its value as removed. Null values are allowed and never
//! recorded; null keys are rejected.
//!
//! For keys that existed when recording started, the map also remembers the
//! value the key originally held once that value is replaced or removed, so
//! a value exchange under one key can be reported as a single change.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::trace;
use viewdelta_types::TypeDescriptor;

use crate::error::{TrackingError, TrackingResult};
use crate::ledger::Ledger;
use crate::matcher::ElementMatcher;
use crate::owner::{Owner, OwnerCell};
use crate::value::{check_element, Value};

/// Shared handle to a tracked map.
pub type MapRef = Rc<TrackedMap>;

#[derive(Default)]
struct Recorder {
    keys: Ledger,
    values: Ledger,
    /// (key, value held when recording started) for replaced or removed keys.
    originals: Vec<(Value, Value)>,
}

/// Container for the entries of a map attribute, in insertion order.
pub struct TrackedMap {
    key_type: TypeDescriptor,
    value_type: TypeDescriptor,
    key_matcher: ElementMatcher,
    value_matcher: ElementMatcher,
    entries: RefCell<Vec<(Value, Value)>>,
    recorder: Option<RefCell<Recorder>>,
    dirty: Cell<bool>,
    owner: Option<OwnerCell>,
    me: Weak<TrackedMap>,
}

impl TrackedMap {
    /// A recording map that claims its keys and values.
    pub fn recording(
        key_type: TypeDescriptor,
        value_type: TypeDescriptor,
        entries: impl IntoIterator<Item = (Value, Value)>,
    ) -> TrackingResult<MapRef> {
        Self::build(key_type, value_type, entries, true)
    }

    /// A plain map with no recording.
    pub fn plain(
        key_type: TypeDescriptor,
        value_type: TypeDescriptor,
        entries: impl IntoIterator<Item = (Value, Value)>,
    ) -> TrackingResult<MapRef> {
        Self::build(key_type, value_type, entries, false)
    }

    fn build(
        key_type: TypeDescriptor,
        value_type: TypeDescriptor,
        entries: impl IntoIterator<Item = (Value, Value)>,
        recording: bool,
    ) -> TrackingResult<MapRef> {
        let key_matcher = ElementMatcher::for_container(&key_type);
        let value_matcher = ElementMatcher::for_container(&value_type);
        let mut accepted: Vec<(Value, Value)> = Vec::new();
        for (k, v) in entries {
            check_key(&k)?;
            check_element("map key", &key_type, &k)?;
            check_element("map value", &value_type, &v)?;
            match accepted.iter().position(|(x, _)| key_matcher.matches(x, &k)) {
                Some(i) => accepted[i].1 = v,
                None => accepted.push((k, v)),
            }
        }
        let map = Rc::new_cyclic(|me| TrackedMap {
            key_type,
            value_type,
            key_matcher,
            value_matcher,
            entries: RefCell::new(accepted.clone()),
            recorder: recording.then(|| RefCell::new(Recorder::default())),
            dirty: Cell::new(false),
            owner: recording.then(OwnerCell::default),
            me: me.clone(),
        });
        for (k, v) in &accepted {
            map.claim_key(k)?;
            map.claim_value(v)?;
        }
        Ok(map)
    }

    pub fn key_type(&self) -> &TypeDescriptor {
        &self.key_type
    }

    pub fn value_type(&self) -> &TypeDescriptor {
        &self.value_type
    }

    pub fn key_matcher(&self) -> &ElementMatcher {
        &self.key_matcher
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_some()
    }

    /// Snapshot of the entries in insertion order.
    pub fn entries(&self) -> Vec<(Value, Value)> {
        self.entries.borrow().clone()
    }

    pub fn keys(&self) -> Vec<Value> {
        self.entries.borrow().iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn values(&self) -> Vec<Value> {
        self.entries.borrow().iter().map(|(_, v)| v.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Value stored under a matching key. `None` if the key is absent.
    pub fn get(&self, key: &Value) -> Option<Value> {
        let entries = self.entries.borrow();
        entries
            .iter()
            .find(|(k, _)| self.key_matcher.matches(k, key))
            .map(|(_, v)| v.clone())
    }

    pub fn contains_key(&self, key: &Value) -> bool {
        self.get(key).is_some()
    }

    pub fn added_keys(&self) -> Vec<Value> {
        self.recorded(|r| r.keys.added.clone())
    }

    pub fn removed_keys(&self) -> Vec<Value> {
        self.recorded(|r| r.keys.removed.clone())
    }

    /// `(removed original, replacement)` key pairs; see
    /// [`TrackedCollection::replaced_elements`](crate::TrackedCollection::replaced_elements).
    pub fn replaced_keys(&self) -> Vec<(Value, Value)> {
        self.recorded(|r| r.keys.replaced.clone())
    }

    pub fn added_values(&self) -> Vec<Value> {
        self.recorded(|r| r.values.added.clone())
    }

    pub fn removed_values(&self) -> Vec<Value> {
        self.recorded(|r| r.values.removed.clone())
    }

    pub fn replaced_values(&self) -> Vec<(Value, Value)> {
        self.recorded(|r| r.values.replaced.clone())
    }

    /// Every `(key, original value)` pair remembered since recording
    /// started.
    pub fn original_entries(&self) -> Vec<(Value, Value)> {
        self.recorded(|r| r.originals.clone())
    }

    /// The value a pre-existing key held when recording started, if that
    /// value has since been replaced or removed.
    pub fn original_value(&self, key: &Value) -> Option<Value> {
        let recorder = self.recorder.as_ref()?;
        let r = recorder.borrow();
        r.originals
            .iter()
            .find(|(k, _)| self.key_matcher.matches(k, key))
            .map(|(_, v)| v.clone())
    }

    /// A key or value addition or removal is pending.
    pub fn has_actions(&self) -> bool {
        self.recorder.as_ref().is_some_and(|r| {
            let r = r.borrow();
            r.keys.has_actions() || r.values.has_actions()
        })
    }

    /// Aggregate dirtiness, as for collections.
    pub fn is_dirty(&self) -> bool {
        let unreported = |ty: &TypeDescriptor| {
            let caps = ty.capabilities();
            caps.mutable && !caps.dirty_checking
        };
        !self.is_recording()
            || self.dirty.get()
            || self.has_actions()
            || unreported(&self.key_type)
            || unreported(&self.value_type)
    }

    /// Insert or replace. Returns the previous value of a matching key.
    pub fn put(&self, key: impl Into<Value>, value: impl Into<Value>) -> TrackingResult<Option<Value>> {
        let key = key.into();
        let value = value.into();
        check_key(&key)?;
        check_element("map key", &self.key_type, &key)?;
        check_element("map value", &self.value_type, &value)?;

        let index = self.position(&key);
        self.claim_value(&value)?;
        let previous = match index {
            Some(i) => {
                let (existing_key, previous) = {
                    let mut entries = self.entries.borrow_mut();
                    let previous = std::mem::replace(&mut entries[i].1, value.clone());
                    (entries[i].0.clone(), previous)
                };
                if !previous.same(&value) {
                    self.remember_original(&existing_key, &previous);
                    self.record_value_removed(previous.clone());
                    self.record_value_added(value);
                }
                Some(previous)
            }
            None => {
                self.claim_key(&key)?;
                self.entries.borrow_mut().push((key.clone(), value.clone()));
                self.record_key_added(key);
                self.record_value_added(value);
                None
            }
        };
        trace!(len = self.len(), "map entry put");
        self.mark_dirty();
        Ok(previous)
    }

    /// Remove a matching key, returning its value.
    pub fn remove(&self, key: &Value) -> Option<Value> {
        let index = self.position(key)?;
        let (k, v) = self.entries.borrow_mut().remove(index);
        self.remember_original(&k, &v);
        self.record_key_removed(k);
        self.record_value_removed(v.clone());
        trace!(len = self.len(), "map entry removed");
        self.mark_dirty();
        Some(v)
    }

    pub fn clear(&self) {
        let keys = self.keys();
        for k in keys {
            self.remove(&k);
        }
    }

    /// Forget recorded actions and dirtiness, recursively.
    pub fn reset(&self) {
        if let Some(r) = &self.recorder {
            *r.borrow_mut() = Recorder::default();
        }
        self.dirty.set(false);
        for (k, v) in self.entries() {
            k.reset();
            v.reset();
        }
    }

    /// Unowned, non-recording copy sharing the same key and value references.
    pub fn plain_copy(&self) -> MapRef {
        Rc::new_cyclic(|me| TrackedMap {
            key_type: self.key_type.clone(),
            value_type: self.value_type.clone(),
            key_matcher: self.key_matcher.clone(),
            value_matcher: self.value_matcher.clone(),
            entries: RefCell::new(self.entries()),
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

    fn position(&self, key: &Value) -> Option<usize> {
        self.entries
            .borrow()
            .iter()
            .position(|(k, _)| self.key_matcher.matches(k, key))
    }

    fn recorded<T: Default>(&self, pick: impl Fn(&Recorder) -> T) -> T {
        self.recorder
            .as_ref()
            .map(|r| pick(&r.borrow()))
            .unwrap_or_default()
    }

    fn self_owner(&self) -> Owner {
        Owner::Map(self.me.clone())
    }

    fn claim_key(&self, key: &Value) -> TrackingResult<()> {
        if self.recorder.is_none() {
            return Ok(());
        }
        key.claim(self.self_owner(), self.key_type.tracks_mutations())
    }

    fn claim_value(&self, value: &Value) -> TrackingResult<()> {
        if self.recorder.is_none() {
            return Ok(());
        }
        value.claim(self.self_owner(), self.value_type.tracks_mutations())
    }

    fn remember_original(&self, key: &Value, value: &Value) {
        let Some(recorder) = &self.recorder else {
            return;
        };
        let mut r = recorder.borrow_mut();
        let fresh = r.keys.added.iter().any(|k| self.key_matcher.matches(k, key));
        let known = r.originals.iter().any(|(k, _)| self.key_matcher.matches(k, key));
        if !fresh && !known {
            r.originals.push((key.clone(), value.clone()));
        }
    }

    fn record_key_added(&self, key: Value) {
        if let Some(r) = &self.recorder {
            r.borrow_mut().keys.add(&self.key_matcher, key);
        }
    }

    fn record_key_removed(&self, key: Value) {
        if let Some(r) = &self.recorder {
            key.release(&self.self_owner());
            r.borrow_mut().keys.remove(&self.key_matcher, key);
        }
    }

    fn record_value_added(&self, value: Value) {
        if value.is_null() {
            return;
        }
        if let Some(r) = &self.recorder {
            r.borrow_mut().values.add(&self.value_matcher, value);
        }
    }

    fn record_value_removed(&self, value: Value) {
        if value.is_null() {
            return;
        }
        if let Some(r) = &self.recorder {
            value.release(&self.self_owner());
            r.borrow_mut().values.remove(&self.value_matcher, value);
        }
    }
}

fn check_key(key: &Value) -> TrackingResult<()> {
    if key.is_null() {
        return Err(TrackingError::NullElement {
            container: "map".to_string(),
        });
    }
    Ok(())
}

impl fmt::Debug for TrackedMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedMap")
            .field("key_type", &self.key_type)
            .field("value_type", &self.value_type)
            .field("entries", &self.entries.borrow())
            .field("recording", &self.is_recording())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use viewdelta_types::JsonBasicType;

    fn string() -> TypeDescriptor {
        TypeDescriptor::basic(JsonBasicType::immutable("String"))
    }

    fn entry(k: &str, v: i64) -> (Value, Value) {
        (Value::basic(json!(k)), Value::basic(json!(v)))
    }

    fn int() -> TypeDescriptor {
        TypeDescriptor::basic(JsonBasicType::immutable("Int"))
    }

    #[test]
    fn put_new_key_records_key_and_value() {
        let m = TrackedMap::recording(string(), int(), [entry("a", 1)]).unwrap();
        assert!(!m.is_dirty());
        assert_eq!(m.put(json!("b"), json!(2)).unwrap(), None);
        assert_eq!(m.added_keys().len(), 1);
        assert_eq!(m.added_values().len(), 1);
        assert!(m.removed_keys().is_empty());
        assert!(m.is_dirty());
    }

    #[test]
    fn replace_value_records_only_values() {
        let m = TrackedMap::recording(string(), int(), [entry("a", 1)]).unwrap();
        let old = m.put(json!("a"), json!(5)).unwrap();
        assert_eq!(old.and_then(|v| v.payload()), Some(json!(1)));
        assert!(m.added_keys().is_empty());
        assert_eq!(m.added_values()[0].payload(), Some(json!(5)));
        assert_eq!(m.removed_values()[0].payload(), Some(json!(1)));
        let original = m.original_value(&Value::basic(json!("a"))).unwrap();
        assert_eq!(original.payload(), Some(json!(1)));
    }

    #[test]
    fn original_survives_remove_and_put() {
        let m = TrackedMap::recording(string(), int(), [entry("a", 1)]).unwrap();
        m.remove(&Value::basic(json!("a")));
        m.put(json!("a"), json!(2)).unwrap();
        m.put(json!("a"), json!(3)).unwrap();
        assert!(m.added_keys().is_empty());
        assert!(m.removed_keys().is_empty());
        let original = m.original_value(&Value::basic(json!("a"))).unwrap();
        assert_eq!(original.payload(), Some(json!(1)));
        assert_eq!(m.removed_values().len(), 1);
        assert_eq!(m.added_values()[0].payload(), Some(json!(3)));
    }

    #[test]
    fn fresh_keys_have_no_original() {
        let m = TrackedMap::recording(string(), int(), []).unwrap();
        m.put(json!("a"), json!(1)).unwrap();
        m.put(json!("a"), json!(2)).unwrap();
        assert!(m.original_value(&Value::basic(json!("a"))).is_none());
        assert!(m.removed_values().is_empty());
    }

    #[test]
    fn remove_records_key_and_value() {
        let m = TrackedMap::recording(string(), int(), [entry("a", 1), entry("b", 2)]).unwrap();
        let v = m.remove(&Value::basic(json!("a"))).unwrap();
        assert_eq!(v.payload(), Some(json!(1)));
        assert_eq!(m.removed_keys()[0].payload(), Some(json!("a")));
        assert_eq!(m.removed_values()[0].payload(), Some(json!(1)));
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn put_after_remove_cancels() {
        let m = TrackedMap::recording(string(), int(), [entry("a", 1)]).unwrap();
        m.remove(&Value::basic(json!("a")));
        m.put(json!("a"), json!(1)).unwrap();
        assert!(!m.has_actions());
    }

    #[test]
    fn equal_distinct_value_is_a_replacement() {
        let (k, v) = entry("a", 1);
        let m = TrackedMap::recording(string(), int(), [(k.clone(), v.clone())]).unwrap();
        m.put(json!("a"), json!(1)).unwrap();
        assert!(!m.has_actions());
        let pairs = m.replaced_values();
        assert_eq!(pairs.len(), 1);
        assert!(pairs[0].0.same(&v));

        m.remove(&k);
        m.put(json!("a"), json!(1)).unwrap();
        assert!(m.replaced_keys()[0].0.same(&k));
        assert_eq!(m.original_entries().len(), 1);
        m.reset();
        assert!(m.replaced_keys().is_empty());
        assert!(m.original_entries().is_empty());
    }

    #[test]
    fn custom_key_equality() {
        let ci = TypeDescriptor::basic(JsonBasicType::case_insensitive_string());
        let m = TrackedMap::recording(ci, int(), [entry("Key", 1)]).unwrap();
        assert!(m.contains_key(&Value::basic(json!("KEY"))));
        m.put(json!("kEy"), json!(2)).unwrap();
        assert_eq!(m.len(), 1);
        assert_eq!(m.keys()[0].payload(), Some(json!("Key")));
    }

    #[test]
    fn null_keys_rejected_null_values_allowed() {
        let m = TrackedMap::recording(string(), int(), []).unwrap();
        assert!(matches!(m.put(Value::Null, json!(1)), Err(TrackingError::NullElement { .. })));
        m.put(json!("a"), Value::Null).unwrap();
        assert!(m.added_values().is_empty());
        assert_eq!(m.added_keys().len(), 1);
    }

    #[test]
    fn reset_clears_recording() {
        let m = TrackedMap::recording(string(), int(), []).unwrap();
        m.put(json!("a"), json!(1)).unwrap();
        m.reset();
        assert!(!m.is_dirty());
    }
}
