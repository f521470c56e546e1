//! Element-level deltas between the initial and current contents of a
//! collection or map.
//!
//! Deltas are listed in current iteration order (retained and added
//! elements interleaved), followed by removed elements. A Recording
//! Container reused in place contributes exactly its recorded sets, with
//! replacements paired to the originals they cancelled; a replaced
//! container is compared structurally through an [`ElementIndex`].

use std::collections::{HashMap, HashSet};

use viewdelta_tracking::{CollectionRef, ElementMatcher, MapRef, Value};

use crate::checker::{MapChecker, PluralChecker};

/// How one element relates the initial and current contents.
#[derive(Clone, Debug)]
pub(crate) enum Delta {
    Added(Value),
    Removed(Value),
    Retained { initial: Value, current: Value },
    /// A map value exchanged under one key.
    Replaced { initial: Value, current: Value },
}

impl Delta {
    /// The `(initial, current)` pair a change node for this delta wraps.
    pub(crate) fn pair(&self) -> (Value, Value) {
        match self {
            Self::Added(v) => (Value::Null, v.clone()),
            Self::Removed(v) => (v.clone(), Value::Null),
            Self::Retained { initial, current } | Self::Replaced { initial, current } => {
                (initial.clone(), current.clone())
            }
        }
    }

    /// Present in the current contents.
    pub(crate) fn is_current(&self) -> bool {
        !matches!(self, Self::Removed(_))
    }

    /// Identity pair that keys this delta's node in a memo cache.
    pub(crate) fn memo_key(&self) -> (usize, usize) {
        let (initial, current) = self.pair();
        (initial.identity(), current.identity())
    }
}

/// Hash-bucketed lookup of values under an [`ElementMatcher`], tracking
/// which positions were already paired.
pub(crate) struct ElementIndex<'a> {
    matcher: &'a ElementMatcher,
    values: &'a [Value],
    buckets: HashMap<u64, Vec<usize>>,
    used: Vec<bool>,
}

impl<'a> ElementIndex<'a> {
    pub(crate) fn new(matcher: &'a ElementMatcher, values: &'a [Value]) -> Self {
        let mut buckets: HashMap<u64, Vec<usize>> = HashMap::new();
        for (i, v) in values.iter().enumerate() {
            if !v.is_null() {
                buckets.entry(matcher.hash(v)).or_default().push(i);
            }
        }
        Self {
            matcher,
            values,
            buckets,
            used: vec![false; values.len()],
        }
    }

    fn candidates(&self, value: &Value) -> &[usize] {
        self.buckets
            .get(&self.matcher.hash(value))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Any matching position, paired or not.
    pub(crate) fn find(&self, value: &Value) -> Option<usize> {
        self.candidates(value)
            .iter()
            .copied()
            .find(|&i| self.matcher.matches(&self.values[i], value))
    }

    /// Pair `value` with an unpaired matching position, preferring the same
    /// reference.
    pub(crate) fn take(&mut self, value: &Value) -> Option<usize> {
        let candidates = self.candidates(value);
        let found = candidates
            .iter()
            .copied()
            .find(|&i| !self.used[i] && self.values[i].same(value))
            .or_else(|| {
                candidates
                    .iter()
                    .copied()
                    .find(|&i| !self.used[i] && self.matcher.matches(&self.values[i], value))
            });
        if let Some(i) = found {
            self.used[i] = true;
        }
        found
    }

    pub(crate) fn mark_used(&mut self, index: usize) {
        if let Some(u) = self.used.get_mut(index) {
            *u = true;
        }
    }

    pub(crate) fn is_used(&self, index: usize) -> bool {
        self.used.get(index).copied().unwrap_or(false)
    }

    /// Non-null values never paired.
    pub(crate) fn unpaired(&self) -> impl Iterator<Item = &'a Value> + '_ {
        self.values
            .iter()
            .enumerate()
            .filter(|(i, v)| !self.used[*i] && !v.is_null())
            .map(|(_, v)| v)
    }
}

fn identities(values: &[Value]) -> HashSet<usize> {
    values.iter().map(Value::identity).collect()
}

/// Every current element as added and every initial element as removed.
fn conservative(initial: &[Value], current: &[Value]) -> Vec<Delta> {
    current
        .iter()
        .cloned()
        .map(Delta::Added)
        .chain(initial.iter().cloned().map(Delta::Removed))
        .collect()
}

/// Replacement pairs keyed by the identity of the replacement.
fn originals_by_replacement(replaced: Vec<(Value, Value)>) -> HashMap<usize, Value> {
    replaced
        .into_iter()
        .map(|(original, replacement)| (replacement.identity(), original))
        .collect()
}

/// Deltas over a recording container reused in place: the recorded sets are
/// taken as they are, a replacement pairs with the original it cancelled,
/// and every other element pairs with itself.
fn recorded(
    elements: &[Value],
    added: &[Value],
    removed: &[Value],
    replaced: Vec<(Value, Value)>,
    opaque: bool,
) -> Vec<Delta> {
    let added_ids = identities(added);
    let originals = originals_by_replacement(replaced);
    let mut deltas = Vec::with_capacity(elements.len() + removed.len());
    for e in elements.iter().filter(|e| !e.is_null()) {
        if added_ids.contains(&e.identity()) || opaque {
            deltas.push(Delta::Added(e.clone()));
        } else {
            deltas.push(Delta::Retained {
                initial: originals.get(&e.identity()).cloned().unwrap_or_else(|| e.clone()),
                current: e.clone(),
            });
        }
    }
    if opaque {
        deltas.extend(
            elements
                .iter()
                .filter(|e| !e.is_null() && !added_ids.contains(&e.identity()))
                .cloned()
                .map(Delta::Removed),
        );
    }
    deltas.extend(removed.iter().cloned().map(Delta::Removed));
    deltas
}

/// Deltas between two distinct element sequences.
fn structural(matcher: &ElementMatcher, initial: &[Value], current: &[Value]) -> Vec<Delta> {
    let mut index = ElementIndex::new(matcher, initial);
    let mut deltas = Vec::with_capacity(current.len());
    for c in current.iter().filter(|c| !c.is_null()) {
        match index.take(c) {
            Some(i) => deltas.push(Delta::Retained {
                initial: initial[i].clone(),
                current: c.clone(),
            }),
            None => deltas.push(Delta::Added(c.clone())),
        }
    }
    deltas.extend(index.unpaired().cloned().map(Delta::Removed));
    deltas
}

/// Element deltas of a collection pair.
pub(crate) fn collection_deltas(
    checker: &PluralChecker,
    initial: Option<&CollectionRef>,
    current: Option<&CollectionRef>,
) -> Vec<Delta> {
    let opaque = checker.assumes_opaque_changed();
    match (initial, current) {
        (None, None) => Vec::new(),
        (None, Some(c)) => c.elements().into_iter().map(Delta::Added).collect(),
        (Some(i), None) => i.elements().into_iter().map(Delta::Removed).collect(),
        (Some(i), Some(c)) if std::rc::Rc::ptr_eq(i, c) => {
            recorded(
                &c.elements(),
                &c.added_elements(),
                &c.removed_elements(),
                c.replaced_elements(),
                opaque,
            )
        }
        (Some(i), Some(c)) if opaque => conservative(&i.elements(), &c.elements()),
        (Some(i), Some(c)) => structural(checker.matcher(), &i.elements(), &c.elements()),
    }
}

/// Key deltas of a map pair.
pub(crate) fn key_deltas(checker: &MapChecker, initial: Option<&MapRef>, current: Option<&MapRef>) -> Vec<Delta> {
    let opaque = checker.assumes_opaque_keys_changed();
    match (initial, current) {
        (None, None) => Vec::new(),
        (None, Some(c)) => c.keys().into_iter().map(Delta::Added).collect(),
        (Some(i), None) => i.keys().into_iter().map(Delta::Removed).collect(),
        (Some(i), Some(c)) if std::rc::Rc::ptr_eq(i, c) => {
            recorded(&c.keys(), &c.added_keys(), &c.removed_keys(), c.replaced_keys(), opaque)
        }
        (Some(i), Some(c)) if opaque => conservative(&i.keys(), &c.keys()),
        (Some(i), Some(c)) => structural(checker.key_matcher(), &i.keys(), &c.keys()),
    }
}

/// Value deltas of a map pair.
///
/// A value under a key present on both sides pairs with the initial value
/// of that key: a match is retained, anything else is a single replacement.
/// Values under the remaining keys match as a multiset, so moving a value
/// to a new key is not a value change.
pub(crate) fn value_deltas(checker: &MapChecker, initial: Option<&MapRef>, current: Option<&MapRef>) -> Vec<Delta> {
    let opaque = checker.assumes_opaque_values_changed();
    let non_null = |values: Vec<Value>| values.into_iter().filter(|v| !v.is_null()).collect::<Vec<_>>();
    match (initial, current) {
        (None, None) => Vec::new(),
        (None, Some(c)) => non_null(c.values()).into_iter().map(Delta::Added).collect(),
        (Some(i), None) => non_null(i.values()).into_iter().map(Delta::Removed).collect(),
        (Some(i), Some(c)) if std::rc::Rc::ptr_eq(i, c) => {
            if opaque {
                return recorded(&c.values(), &c.added_values(), &c.removed_values(), Vec::new(), true);
            }
            recorded_values(checker, c)
        }
        (Some(i), Some(c)) if opaque => conservative(&non_null(i.values()), &non_null(c.values())),
        (Some(i), Some(c)) => structural_values(checker, i, c),
    }
}

fn recorded_values(checker: &MapChecker, map: &MapRef) -> Vec<Delta> {
    let entries = map.entries();
    let added_ids = identities(&map.added_values());
    let originals = originals_by_replacement(map.replaced_values());
    let mut consumed: HashSet<usize> = HashSet::new();
    let mut slots: Vec<Option<Delta>> = vec![None; entries.len()];

    // Pre-existing keys whose value was exchanged pair with their original.
    for (slot, (key, value)) in slots.iter_mut().zip(&entries) {
        if value.is_null() {
            continue;
        }
        let Some(original) = map.original_value(key).filter(|o| !o.is_null()) else {
            continue;
        };
        consumed.insert(original.identity());
        *slot = Some(if checker.value_matcher().matches(&original, value) {
            Delta::Retained {
                initial: original,
                current: value.clone(),
            }
        } else {
            Delta::Replaced {
                initial: original,
                current: value.clone(),
            }
        });
    }

    for (slot, (_, value)) in slots.iter_mut().zip(&entries) {
        if value.is_null() || slot.is_some() {
            continue;
        }
        let original = originals
            .get(&value.identity())
            .filter(|o| !consumed.contains(&o.identity()))
            .cloned();
        *slot = Some(match original {
            Some(o) => {
                consumed.insert(o.identity());
                Delta::Retained {
                    initial: o,
                    current: value.clone(),
                }
            }
            None if added_ids.contains(&value.identity()) => Delta::Added(value.clone()),
            None => Delta::Retained {
                initial: value.clone(),
                current: value.clone(),
            },
        });
    }

    let mut deltas: Vec<Delta> = slots.into_iter().flatten().collect();
    deltas.extend(
        map.removed_values()
            .into_iter()
            .filter(|v| !consumed.contains(&v.identity()))
            .map(Delta::Removed),
    );
    deltas
}

fn structural_values(checker: &MapChecker, initial: &MapRef, current: &MapRef) -> Vec<Delta> {
    let initial_entries = initial.entries();
    let initial_keys: Vec<Value> = initial_entries.iter().map(|(k, _)| k.clone()).collect();
    let initial_values: Vec<Value> = initial_entries.iter().map(|(_, v)| v.clone()).collect();
    let entries = current.entries();

    let key_index = ElementIndex::new(checker.key_matcher(), &initial_keys);
    let mut value_index = ElementIndex::new(checker.value_matcher(), &initial_values);
    let mut slots: Vec<Option<Delta>> = vec![None; entries.len()];

    // Keys present on both sides pair their values.
    for (slot, (key, value)) in slots.iter_mut().zip(&entries) {
        if value.is_null() {
            continue;
        }
        let Some(i) = key_index.find(key) else {
            continue;
        };
        let old = &initial_values[i];
        if old.is_null() || value_index.is_used(i) {
            continue;
        }
        value_index.mark_used(i);
        *slot = Some(if checker.value_matcher().matches(old, value) {
            Delta::Retained {
                initial: old.clone(),
                current: value.clone(),
            }
        } else {
            Delta::Replaced {
                initial: old.clone(),
                current: value.clone(),
            }
        });
    }

    for (slot, (_, value)) in slots.iter_mut().zip(&entries) {
        if value.is_null() || slot.is_some() {
            continue;
        }
        *slot = Some(match value_index.take(value) {
            Some(i) => Delta::Retained {
                initial: initial_values[i].clone(),
                current: value.clone(),
            },
            None => Delta::Added(value.clone()),
        });
    }

    let mut deltas: Vec<Delta> = slots.into_iter().flatten().collect();
    deltas.extend(value_index.unpaired().cloned().map(Delta::Removed));
    deltas
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::DirtyChecker;
    use crate::config::DiffConfig;
    use crate::fixtures;
    use proptest::prelude::*;
    use serde_json::json;
    use std::collections::BTreeSet;
    use viewdelta_tracking::{TrackedCollection, TrackedMap};
    use viewdelta_types::{AttributeKind, PluralKind, TypeDescriptor};

    fn plural_checker(element: TypeDescriptor) -> std::rc::Rc<PluralChecker> {
        match DirtyChecker::for_attribute(&AttributeKind::set(element), &DiffConfig::default()) {
            DirtyChecker::Plural(c) => c,
            other => panic!("unexpected checker {other:?}"),
        }
    }

    fn map_checker(key: TypeDescriptor, value: TypeDescriptor) -> std::rc::Rc<MapChecker> {
        match DirtyChecker::for_attribute(&AttributeKind::map(key, value), &DiffConfig::default()) {
            DirtyChecker::Map(c) => c,
            other => panic!("unexpected checker {other:?}"),
        }
    }

    fn payload(v: &Value) -> serde_json::Value {
        v.payload().unwrap_or(serde_json::Value::Null)
    }

    fn summarize(deltas: &[Delta]) -> (Vec<serde_json::Value>, Vec<serde_json::Value>, usize) {
        let mut added = Vec::new();
        let mut removed = Vec::new();
        let mut retained = 0;
        for d in deltas {
            match d {
                Delta::Added(v) => added.push(payload(v)),
                Delta::Removed(v) => removed.push(payload(v)),
                Delta::Retained { .. } => retained += 1,
                Delta::Replaced { initial, current } => {
                    added.push(payload(current));
                    removed.push(payload(initial));
                }
            }
        }
        (added, removed, retained)
    }

    fn strings(model: &fixtures::Model, xs: &[&str]) -> CollectionRef {
        TrackedCollection::plain(
            PluralKind::Set,
            model.string.clone(),
            xs.iter().map(|s| Value::basic(json!(s))),
        )
        .unwrap()
    }

    #[test]
    fn structural_set_difference() {
        let model = fixtures::Model::new();
        let checker = plural_checker(model.string.clone());
        let initial = strings(&model, &["a", "b", "c"]);
        let current = strings(&model, &["a", "b", "d"]);
        let (added, removed, retained) = summarize(&collection_deltas(&checker, Some(&initial), Some(&current)));
        assert_eq!(added, vec![json!("d")]);
        assert_eq!(removed, vec![json!("c")]);
        assert_eq!(retained, 2);
    }

    #[test]
    fn recorded_sets_are_taken_verbatim() {
        let model = fixtures::Model::new();
        let checker = plural_checker(model.string.clone());
        let tags = TrackedCollection::recording(
            PluralKind::Set,
            model.string.clone(),
            ["a", "b"].iter().map(|s| Value::basic(json!(s))),
        )
        .unwrap();
        tags.remove(&Value::basic(json!("a")));
        tags.add(json!("z")).unwrap();
        let (added, removed, retained) = summarize(&collection_deltas(&checker, Some(&tags), Some(&tags)));
        assert_eq!(added, vec![json!("z")]);
        assert_eq!(removed, vec![json!("a")]);
        assert_eq!(retained, 1);
    }

    #[test]
    fn opaque_elements_are_conservative() {
        let model = fixtures::Model::new();
        let checker = plural_checker(model.blob.clone());
        let a = Value::basic(json!([1]));
        let b = Value::basic(json!([2]));
        let blobs = TrackedCollection::recording(PluralKind::Collection, model.blob.clone(), vec![a.clone(), b.clone()])
            .unwrap();
        blobs.remove(&a);
        let a2 = Value::basic(json!([1]));
        blobs.add(a2.clone()).unwrap();

        let deltas = collection_deltas(&checker, Some(&blobs), Some(&blobs));
        let added: Vec<&Value> = deltas.iter().filter_map(|d| match d {
            Delta::Added(v) => Some(v),
            _ => None,
        }).collect();
        let removed: Vec<&Value> = deltas.iter().filter_map(|d| match d {
            Delta::Removed(v) => Some(v),
            _ => None,
        }).collect();
        assert!(added.iter().any(|v| v.same(&a2)));
        assert!(removed.iter().any(|v| v.same(&a)));
        assert!(!deltas.iter().any(|d| matches!(d, Delta::Retained { .. })));
    }

    #[test]
    fn map_value_replacement_under_one_key() {
        let model = fixtures::Model::new();
        let checker = map_checker(model.string.clone(), model.int.clone());
        let entry = |k: &str, v: i64| (Value::basic(json!(k)), Value::basic(json!(v)));
        let initial = TrackedMap::plain(model.string.clone(), model.int.clone(), [entry("k1", 1)]).unwrap();
        let current = TrackedMap::plain(model.string.clone(), model.int.clone(), [entry("k1", 2)]).unwrap();

        assert!(key_deltas(&checker, Some(&initial), Some(&current))
            .iter()
            .all(|d| matches!(d, Delta::Retained { .. })));
        let values = value_deltas(&checker, Some(&initial), Some(&current));
        assert_eq!(values.len(), 1);
        let Delta::Replaced { initial: old, current: new } = &values[0] else {
            panic!("expected a replacement, got {values:?}");
        };
        assert_eq!(payload(old), json!(1));
        assert_eq!(payload(new), json!(2));
    }

    #[test]
    fn map_rename_is_key_only() {
        let model = fixtures::Model::new();
        let checker = map_checker(model.string.clone(), model.int.clone());
        let v1 = Value::basic(json!(1));
        let initial =
            TrackedMap::plain(model.string.clone(), model.int.clone(), [(Value::basic(json!("k1")), v1.clone())]).unwrap();
        let current =
            TrackedMap::plain(model.string.clone(), model.int.clone(), [(Value::basic(json!("k2")), v1)]).unwrap();

        let (added, removed, _) = summarize(&key_deltas(&checker, Some(&initial), Some(&current)));
        assert_eq!(added, vec![json!("k2")]);
        assert_eq!(removed, vec![json!("k1")]);
        assert!(value_deltas(&checker, Some(&initial), Some(&current))
            .iter()
            .all(|d| matches!(d, Delta::Retained { .. })));
    }

    #[test]
    fn recorded_map_replacement() {
        let model = fixtures::Model::new();
        let checker = map_checker(model.string.clone(), model.int.clone());
        let m = TrackedMap::recording(
            model.string.clone(),
            model.int.clone(),
            [(Value::basic(json!("k1")), Value::basic(json!(1)))],
        )
        .unwrap();
        m.put(json!("k1"), json!(2)).unwrap();
        let values = value_deltas(&checker, Some(&m), Some(&m));
        assert_eq!(values.len(), 1);
        assert!(matches!(&values[0], Delta::Replaced { initial, .. } if payload(initial) == json!(1)));
        assert!(key_deltas(&checker, Some(&m), Some(&m))
            .iter()
            .all(|d| matches!(d, Delta::Retained { .. })));
    }

    #[test]
    fn index_prefers_same_reference() {
        let model = fixtures::Model::new();
        let matcher = ElementMatcher::by_equality(&model.int);
        let a = Value::basic(json!(1));
        let b = Value::basic(json!(1));
        let values = vec![a.clone(), b.clone()];
        let mut index = ElementIndex::new(&matcher, &values);
        assert_eq!(index.take(&b), Some(1));
        assert_eq!(index.take(&Value::basic(json!(1))), Some(0));
        assert_eq!(index.take(&a), None);
        assert!(index.find(&a).is_some());
    }

    proptest! {
        #[test]
        fn added_and_removed_are_set_differences(
            initial in proptest::collection::btree_set(0i64..20, 0..10),
            current in proptest::collection::btree_set(0i64..20, 0..10),
        ) {
            let model = fixtures::Model::new();
            let checker = plural_checker(model.int.clone());
            let build = |xs: &BTreeSet<i64>| TrackedCollection::plain(
                PluralKind::Set,
                model.int.clone(),
                xs.iter().map(|x| Value::basic(json!(x))),
            ).unwrap();
            let deltas = collection_deltas(&checker, Some(&build(&initial)), Some(&build(&current)));
            let (added, removed, retained) = summarize(&deltas);

            let expected_added: Vec<_> = current.difference(&initial).map(|x| json!(x)).collect();
            let mut expected_removed: Vec<_> = initial.difference(&current).map(|x| json!(x)).collect();
            let mut removed = removed;
            removed.sort_by_key(|v| v.as_i64());
            expected_removed.sort_by_key(|v| v.as_i64());
            prop_assert_eq!(added, expected_added);
            prop_assert_eq!(removed, expected_removed);
            prop_assert_eq!(retained, initial.intersection(&current).count());
        }
    }
}
