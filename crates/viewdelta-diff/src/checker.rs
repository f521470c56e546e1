//! Dirty checkers.
//!
//! A [`DirtyChecker`] classifies an `(initial, current)` pair as
//! [`ChangeKind::None`], [`ChangeKind::Updated`], or [`ChangeKind::Mutated`].
//! Checkers are built once per root view type from the metamodel and mirror
//! its shape: a view checker holds one nested checker per tracked slot, a
//! plural checker one element checker, a map checker a key and a value
//! checker.
//!
//! Dirty bits and container flags only select what to look at. Every
//! reported slot or element is re-verified, so a slot that was written and
//! then reverted to an equal value classifies NONE.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use viewdelta_tracking::matcher::ids_equal;
use viewdelta_tracking::{BasicValue, CollectionRef, ElementMatcher, MapRef, Value, ViewRef};
use viewdelta_types::{AttributeKind, BasicUserType, ChangeKind, PluralKind, TypeDescriptor, ViewType};

use crate::config::{DiffConfig, OpaqueLeafPolicy};
use crate::delta::ElementIndex;

/// Classifier for one declared type.
#[derive(Clone, Debug)]
pub enum DirtyChecker {
    Basic(BasicChecker),
    View(Rc<ViewChecker>),
    Plural(Rc<PluralChecker>),
    Map(Rc<MapChecker>),
}

impl DirtyChecker {
    /// Checker tree for a view type.
    pub fn for_view_type(view_type: &Rc<ViewType>, config: &DiffConfig) -> Rc<ViewChecker> {
        CheckerBuilder::new(config).view(view_type)
    }

    /// Checker for the values of an attribute kind.
    pub fn for_attribute(kind: &AttributeKind, config: &DiffConfig) -> Self {
        CheckerBuilder::new(config).attribute(kind)
    }

    /// Classify a value pair.
    pub fn dirty_kind(&self, initial: &Value, current: &Value) -> ChangeKind {
        match (initial.is_null(), current.is_null()) {
            (true, true) => return ChangeKind::None,
            (true, false) | (false, true) => return ChangeKind::Updated,
            (false, false) => {}
        }
        match (self, initial, current) {
            (Self::Basic(c), Value::Basic(a), Value::Basic(b)) => c.dirty_kind(a, b),
            (Self::View(c), Value::View(a), Value::View(b)) => c.dirty_kind(a, b),
            (Self::Plural(c), Value::Collection(a), Value::Collection(b)) => c.dirty_kind(a, b),
            (Self::Map(c), Value::Map(a), Value::Map(b)) => c.dirty_kind(a, b),
            // Values of different shapes are never the same value.
            _ => ChangeKind::Updated,
        }
    }

    /// Per-slot checkers of a view checker; empty for other checkers.
    pub fn nested_checkers(&self) -> &[DirtyChecker] {
        match self {
            Self::View(c) => &c.nested,
            _ => &[],
        }
    }

    /// Element checker of a plural checker, value checker of a map checker.
    pub fn element_checker(&self) -> Option<&DirtyChecker> {
        match self {
            Self::Plural(c) => Some(&c.element),
            Self::Map(c) => Some(&c.value),
            _ => None,
        }
    }

    /// Key checker of a map checker.
    pub fn key_checker(&self) -> Option<&DirtyChecker> {
        match self {
            Self::Map(c) => Some(&c.key),
            _ => None,
        }
    }

    pub fn as_view(&self) -> Option<&Rc<ViewChecker>> {
        match self {
            Self::View(c) => Some(c),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Basic leaves
// ---------------------------------------------------------------------------

/// Classifier for basic leaves, driven by the type's capability flags.
#[derive(Clone)]
pub struct BasicChecker {
    ty: Rc<dyn BasicUserType>,
    policy: OpaqueLeafPolicy,
}

impl BasicChecker {
    pub fn new(ty: Rc<dyn BasicUserType>, policy: OpaqueLeafPolicy) -> Self {
        Self { ty, policy }
    }

    pub fn user_type(&self) -> &Rc<dyn BasicUserType> {
        &self.ty
    }

    fn equal(&self, a: &BasicValue, b: &BasicValue) -> bool {
        let deep = self.ty.capabilities().deep_equality;
        a.with(|x| {
            b.with(|y| {
                if deep {
                    self.ty.is_deep_equal(x, y)
                } else {
                    self.ty.is_equal(x, y)
                }
            })
        })
    }

    fn dirty_kind(&self, a: &BasicValue, b: &BasicValue) -> ChangeKind {
        let caps = self.ty.capabilities();
        if !caps.mutable {
            return if a.same(b) || self.equal(a, b) {
                ChangeKind::None
            } else {
                ChangeKind::Updated
            };
        }
        if a.same(b) {
            if caps.dirty_checking {
                return if b.is_dirty() {
                    ChangeKind::Mutated
                } else {
                    ChangeKind::None
                };
            }
            // No snapshot exists for this pair.
            return match self.policy {
                OpaqueLeafPolicy::AssumeChanged => ChangeKind::Mutated,
                OpaqueLeafPolicy::AssumeUnchanged => ChangeKind::None,
            };
        }
        if a.is_snapshot_of(b) {
            return if self.equal(a, b) {
                ChangeKind::None
            } else {
                ChangeKind::Mutated
            };
        }
        if self.equal(a, b) {
            ChangeKind::None
        } else {
            ChangeKind::Updated
        }
    }
}

impl fmt::Debug for BasicChecker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicChecker")
            .field("type", &self.ty.name())
            .field("policy", &self.policy)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// Classifier for a managed view type, with one nested checker per slot.
pub struct ViewChecker {
    view_type: Rc<ViewType>,
    nested: Vec<DirtyChecker>,
}

impl ViewChecker {
    pub fn view_type(&self) -> &Rc<ViewType> {
        &self.view_type
    }

    pub fn nested_checkers(&self) -> &[DirtyChecker] {
        &self.nested
    }

    /// Nested checker of a slot.
    pub fn nested(&self, slot: usize) -> Option<&DirtyChecker> {
        self.nested.get(slot)
    }

    /// Classify a pair of views.
    ///
    /// The same instance is MUTATED when a reported slot verifies as
    /// changed. Distinct instances are UPDATED unless both carry the same
    /// id, in which case their states are compared slot by slot.
    pub fn dirty_kind(&self, a: &ViewRef, b: &ViewRef) -> ChangeKind {
        if Rc::ptr_eq(a, b) {
            if !b.is_dirty() {
                return ChangeKind::None;
            }
            let initial = b.initial_state();
            let current = b.current_state();
            let changed = b.dirty_bits().iter_ones().any(|slot| self.slot_changed(slot, &initial, &current));
            return if changed {
                ChangeKind::Mutated
            } else {
                ChangeKind::None
            };
        }
        if !ids_equal(a, b) {
            return ChangeKind::Updated;
        }
        let initial = a.initial_state();
        let current = b.current_state();
        if (0..self.nested.len()).any(|slot| self.slot_changed(slot, &initial, &current)) {
            ChangeKind::Mutated
        } else {
            ChangeKind::None
        }
    }

    /// Slots whose reported dirtiness verifies, in slot order.
    pub fn verified_dirty_slots(&self, view: &ViewRef) -> Vec<usize> {
        let initial = view.initial_state();
        let current = view.current_state();
        view.dirty_bits()
            .iter_ones()
            .filter(|slot| self.slot_changed(*slot, &initial, &current))
            .collect()
    }

    /// Changed slots of a pair. The same instance only reports verified
    /// dirty slots; distinct instances compare every slot.
    pub fn changed_slots(&self, initial: &ViewRef, current: &ViewRef) -> Vec<usize> {
        if Rc::ptr_eq(initial, current) {
            return self.verified_dirty_slots(current);
        }
        let before = initial.initial_state();
        let after = current.current_state();
        (0..self.nested.len())
            .filter(|slot| self.slot_changed(*slot, &before, &after))
            .collect()
    }

    fn slot_changed(&self, slot: usize, initial: &[Value], current: &[Value]) -> bool {
        let (Some(checker), Some(i), Some(c)) = (self.nested.get(slot), initial.get(slot), current.get(slot)) else {
            return false;
        };
        checker.dirty_kind(i, c).is_dirty()
    }
}

impl fmt::Debug for ViewChecker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewChecker")
            .field("view_type", &self.view_type.name())
            .field("slots", &self.nested.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Collections
// ---------------------------------------------------------------------------

/// Classifier for collections, sets, and lists.
#[derive(Debug)]
pub struct PluralChecker {
    kind: PluralKind,
    element_type: TypeDescriptor,
    element: DirtyChecker,
    matcher: ElementMatcher,
    policy: OpaqueLeafPolicy,
}

impl PluralChecker {
    pub fn kind(&self) -> PluralKind {
        self.kind
    }

    pub fn element_type(&self) -> &TypeDescriptor {
        &self.element_type
    }

    pub fn element_checker(&self) -> &DirtyChecker {
        &self.element
    }

    /// Element matching used for structural comparison.
    pub fn matcher(&self) -> &ElementMatcher {
        &self.matcher
    }

    /// Opaque elements are reported as changed under the current policy.
    pub fn assumes_opaque_changed(&self) -> bool {
        self.element_type.is_opaque() && self.policy == OpaqueLeafPolicy::AssumeChanged
    }

    pub fn dirty_kind(&self, a: &CollectionRef, b: &CollectionRef) -> ChangeKind {
        if Rc::ptr_eq(a, b) {
            return self.in_place_kind(b);
        }
        if a.len() != b.len() {
            return ChangeKind::Mutated;
        }
        if self.assumes_opaque_changed() && !b.is_empty() {
            return ChangeKind::Mutated;
        }
        let initial = a.elements();
        let current = b.elements();
        let pairs: Vec<(usize, usize)> = if self.kind.is_ordered() {
            if !initial.iter().zip(&current).all(|(i, c)| self.matcher.matches(i, c)) {
                return ChangeKind::Mutated;
            }
            (0..current.len()).map(|i| (i, i)).collect()
        } else {
            let mut index = ElementIndex::new(&self.matcher, &initial);
            let mut pairs = Vec::with_capacity(current.len());
            for (c, value) in current.iter().enumerate() {
                match index.take(value) {
                    Some(i) => pairs.push((i, c)),
                    None => return ChangeKind::Mutated,
                }
            }
            pairs
        };
        if self.element_type.is_mutable()
            && pairs
                .iter()
                .any(|(i, c)| self.element.dirty_kind(&initial[*i], &current[*c]).is_dirty())
        {
            return ChangeKind::Mutated;
        }
        ChangeKind::None
    }

    fn in_place_kind(&self, c: &CollectionRef) -> ChangeKind {
        if c.is_recording() && c.has_actions() {
            return ChangeKind::Mutated;
        }
        if c.replaced_elements()
            .iter()
            .any(|(original, replacement)| self.element.dirty_kind(original, replacement).is_dirty())
        {
            return ChangeKind::Mutated;
        }
        if !self.element_type.is_mutable() {
            return ChangeKind::None;
        }
        let caps = self.element_type.capabilities();
        if !caps.dirty_checking {
            return if self.policy == OpaqueLeafPolicy::AssumeChanged && !c.is_empty() {
                ChangeKind::Mutated
            } else {
                ChangeKind::None
            };
        }
        if c.is_recording() && !c.is_dirty() {
            return ChangeKind::None;
        }
        if c.elements().iter().any(|e| self.element.dirty_kind(e, e).is_dirty()) {
            ChangeKind::Mutated
        } else {
            ChangeKind::None
        }
    }
}

// ---------------------------------------------------------------------------
// Maps
// ---------------------------------------------------------------------------

/// Classifier for maps, with independent key and value checkers.
#[derive(Debug)]
pub struct MapChecker {
    key_type: TypeDescriptor,
    value_type: TypeDescriptor,
    key: DirtyChecker,
    value: DirtyChecker,
    key_matcher: ElementMatcher,
    value_matcher: ElementMatcher,
    policy: OpaqueLeafPolicy,
}

impl MapChecker {
    pub fn key_type(&self) -> &TypeDescriptor {
        &self.key_type
    }

    pub fn value_type(&self) -> &TypeDescriptor {
        &self.value_type
    }

    pub fn key_checker(&self) -> &DirtyChecker {
        &self.key
    }

    pub fn value_checker(&self) -> &DirtyChecker {
        &self.value
    }

    pub fn key_matcher(&self) -> &ElementMatcher {
        &self.key_matcher
    }

    pub fn value_matcher(&self) -> &ElementMatcher {
        &self.value_matcher
    }

    pub fn assumes_opaque_keys_changed(&self) -> bool {
        self.key_type.is_opaque() && self.policy == OpaqueLeafPolicy::AssumeChanged
    }

    pub fn assumes_opaque_values_changed(&self) -> bool {
        self.value_type.is_opaque() && self.policy == OpaqueLeafPolicy::AssumeChanged
    }

    pub fn dirty_kind(&self, a: &MapRef, b: &MapRef) -> ChangeKind {
        if Rc::ptr_eq(a, b) {
            return self.in_place_kind(b);
        }
        if a.len() != b.len() {
            return ChangeKind::Mutated;
        }
        if (self.assumes_opaque_keys_changed() || self.assumes_opaque_values_changed()) && !b.is_empty() {
            return ChangeKind::Mutated;
        }
        let initial = a.entries();
        let initial_keys: Vec<Value> = initial.iter().map(|(k, _)| k.clone()).collect();
        let mut index = ElementIndex::new(&self.key_matcher, &initial_keys);
        for (key, value) in b.entries() {
            let Some(i) = index.take(&key) else {
                return ChangeKind::Mutated;
            };
            let (initial_key, initial_value) = &initial[i];
            if !self.values_match(initial_value, &value)
                || (self.key_type.is_mutable() && self.key.dirty_kind(initial_key, &key).is_dirty())
                || (self.value_type.is_mutable() && self.value.dirty_kind(initial_value, &value).is_dirty())
            {
                return ChangeKind::Mutated;
            }
        }
        ChangeKind::None
    }

    /// Null-aware value equality under the value matcher.
    fn values_match(&self, a: &Value, b: &Value) -> bool {
        match (a.is_null(), b.is_null()) {
            (true, true) => true,
            (false, false) => self.value_matcher.matches(a, b),
            _ => false,
        }
    }

    fn in_place_kind(&self, m: &MapRef) -> ChangeKind {
        if m.is_recording() && m.has_actions() {
            return ChangeKind::Mutated;
        }
        // Values exchanged between pre-existing keys cancel out in the
        // records; the remembered originals still show the exchange.
        let exchanged = m
            .original_entries()
            .iter()
            .any(|(key, original)| m.get(key).is_some_and(|value| !self.values_match(original, &value)));
        let replaced = m
            .replaced_keys()
            .iter()
            .any(|(original, replacement)| self.key.dirty_kind(original, replacement).is_dirty())
            || m.replaced_values()
                .iter()
                .any(|(original, replacement)| self.value.dirty_kind(original, replacement).is_dirty());
        if exchanged || replaced {
            return ChangeKind::Mutated;
        }
        let key_caps = self.key_type.capabilities();
        let value_caps = self.value_type.capabilities();
        if !key_caps.mutable && !value_caps.mutable {
            return ChangeKind::None;
        }
        let unreported = (key_caps.mutable && !key_caps.dirty_checking)
            || (value_caps.mutable && !value_caps.dirty_checking);
        if unreported && self.policy == OpaqueLeafPolicy::AssumeChanged && !m.is_empty() {
            return ChangeKind::Mutated;
        }
        if m.is_recording() && !m.is_dirty() {
            return ChangeKind::None;
        }
        let changed = m.entries().iter().any(|(k, v)| {
            (key_caps.tracks_mutations() && self.key.dirty_kind(k, k).is_dirty())
                || (value_caps.tracks_mutations() && self.value.dirty_kind(v, v).is_dirty())
        });
        if changed {
            ChangeKind::Mutated
        } else {
            ChangeKind::None
        }
    }
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

/// Builds checker trees, sharing one [`ViewChecker`] per view type.
struct CheckerBuilder<'a> {
    config: &'a DiffConfig,
    views: HashMap<usize, Rc<ViewChecker>>,
}

impl<'a> CheckerBuilder<'a> {
    fn new(config: &'a DiffConfig) -> Self {
        Self {
            config,
            views: HashMap::new(),
        }
    }

    fn view(&mut self, view_type: &Rc<ViewType>) -> Rc<ViewChecker> {
        let key = Rc::as_ptr(view_type) as usize;
        if let Some(checker) = self.views.get(&key) {
            return Rc::clone(checker);
        }
        let nested = (0..view_type.slot_count())
            .filter_map(|slot| view_type.attribute_for_slot(slot))
            .map(|attribute| self.attribute(attribute.kind()))
            .collect();
        let checker = Rc::new(ViewChecker {
            view_type: Rc::clone(view_type),
            nested,
        });
        self.views.insert(key, Rc::clone(&checker));
        checker
    }

    fn descriptor(&mut self, ty: &TypeDescriptor) -> DirtyChecker {
        match ty {
            TypeDescriptor::Basic(b) => {
                DirtyChecker::Basic(BasicChecker::new(Rc::clone(b), self.config.opaque_leaves))
            }
            TypeDescriptor::View(v) => DirtyChecker::View(self.view(v)),
        }
    }

    fn attribute(&mut self, kind: &AttributeKind) -> DirtyChecker {
        let policy = self.config.opaque_leaves;
        match kind {
            AttributeKind::Singular(ty) => self.descriptor(ty),
            AttributeKind::Plural { kind, element } => DirtyChecker::Plural(Rc::new(PluralChecker {
                kind: *kind,
                element_type: element.clone(),
                element: self.descriptor(element),
                matcher: ElementMatcher::by_equality(element),
                policy,
            })),
            AttributeKind::Map { key, value } => DirtyChecker::Map(Rc::new(MapChecker {
                key_type: key.clone(),
                value_type: value.clone(),
                key: self.descriptor(key),
                value: self.descriptor(value),
                key_matcher: ElementMatcher::by_equality(key),
                value_matcher: ElementMatcher::by_equality(value),
                policy,
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use serde_json::json;
    use viewdelta_tracking::{TrackedCollection, TrackedView};
    use viewdelta_types::JsonBasicType;

    fn leaf_checker(ty: JsonBasicType, policy: OpaqueLeafPolicy) -> DirtyChecker {
        DirtyChecker::Basic(BasicChecker::new(Rc::new(ty), policy))
    }

    #[test]
    fn nulls() {
        let c = leaf_checker(JsonBasicType::immutable("Int"), OpaqueLeafPolicy::AssumeChanged);
        let v = Value::basic(json!(1));
        assert_eq!(c.dirty_kind(&Value::Null, &Value::Null), ChangeKind::None);
        assert_eq!(c.dirty_kind(&Value::Null, &v), ChangeKind::Updated);
        assert_eq!(c.dirty_kind(&v, &Value::Null), ChangeKind::Updated);
    }

    #[test]
    fn immutable_leaves_compare_by_equality() {
        let c = leaf_checker(JsonBasicType::immutable("Int"), OpaqueLeafPolicy::AssumeChanged);
        let a = Value::basic(json!(1));
        assert_eq!(c.dirty_kind(&a, &a.clone()), ChangeKind::None);
        assert_eq!(c.dirty_kind(&a, &Value::basic(json!(1))), ChangeKind::None);
        assert_eq!(c.dirty_kind(&a, &Value::basic(json!(2))), ChangeKind::Updated);
    }

    #[test]
    fn dirty_checkable_leaf_uses_own_flag() {
        let c = leaf_checker(
            JsonBasicType::mutable("Doc").with_dirty_checking(),
            OpaqueLeafPolicy::AssumeChanged,
        );
        let leaf = BasicValue::new(json!({"a": 1}));
        let v = Value::Basic(leaf.clone());
        assert_eq!(c.dirty_kind(&v, &v), ChangeKind::None);
        leaf.update(|p| p["a"] = json!(2));
        assert_eq!(c.dirty_kind(&v, &v), ChangeKind::Mutated);
    }

    #[test]
    fn opaque_leaf_follows_policy() {
        let v = Value::basic(json!([1]));
        let changed = leaf_checker(JsonBasicType::mutable("Blob"), OpaqueLeafPolicy::AssumeChanged);
        let unchanged = leaf_checker(JsonBasicType::mutable("Blob"), OpaqueLeafPolicy::AssumeUnchanged);
        assert_eq!(changed.dirty_kind(&v, &v), ChangeKind::Mutated);
        assert_eq!(unchanged.dirty_kind(&v, &v), ChangeKind::None);
    }

    #[test]
    fn snapshot_pair_is_mutated_only_if_unequal() {
        let ty = JsonBasicType::mutable("Body").with_deep_cloning();
        let c = leaf_checker(ty.clone(), OpaqueLeafPolicy::AssumeChanged);
        let leaf = BasicValue::new(json!({"a": 1}));
        let snap = Value::Basic(leaf.snapshot(&ty));
        let current = Value::Basic(leaf.clone());
        assert_eq!(c.dirty_kind(&snap, &current), ChangeKind::None);
        leaf.set(json!({"a": 2}));
        assert_eq!(c.dirty_kind(&snap, &current), ChangeKind::Mutated);
    }

    #[test]
    fn reverted_slot_is_not_dirty() {
        let model = fixtures::Model::new();
        let item = model.item(1, 2);
        let checker = DirtyChecker::View(DirtyChecker::for_view_type(&model.item, &DiffConfig::default()));
        let v = Value::View(item.clone());

        item.set("qty", json!(5)).unwrap();
        assert_eq!(checker.dirty_kind(&v, &v), ChangeKind::Mutated);

        item.set("qty", json!(2)).unwrap();
        assert!(item.dirty_bits().any());
        assert_eq!(checker.dirty_kind(&v, &v), ChangeKind::None);
    }

    #[test]
    fn distinct_views_by_id() {
        let model = fixtures::Model::new();
        let checker = DirtyChecker::View(DirtyChecker::for_view_type(&model.item, &DiffConfig::default()));
        let a = Value::View(model.item(1, 2));
        let same_state = Value::View(model.item(1, 2));
        let changed = Value::View(model.item(1, 3));
        let other = Value::View(model.item(2, 2));
        assert_eq!(checker.dirty_kind(&a, &same_state), ChangeKind::None);
        assert_eq!(checker.dirty_kind(&a, &changed), ChangeKind::Mutated);
        assert_eq!(checker.dirty_kind(&a, &other), ChangeKind::Updated);
    }

    #[test]
    fn plural_in_place_and_replaced() {
        let model = fixtures::Model::new();
        let config = DiffConfig::default();
        let checker = DirtyChecker::for_attribute(
            &AttributeKind::set(TypeDescriptor::basic(JsonBasicType::immutable("String"))),
            &config,
        );
        let strings = |xs: &[&str]| {
            TrackedCollection::recording(
                PluralKind::Set,
                model.string.clone(),
                xs.iter().map(|s| Value::basic(json!(s))),
            )
            .unwrap()
        };
        let tags = strings(&["a", "b"]);
        let v = Value::Collection(tags.clone());
        assert_eq!(checker.dirty_kind(&v, &v), ChangeKind::None);
        tags.add(json!("c")).unwrap();
        assert_eq!(checker.dirty_kind(&v, &v), ChangeKind::Mutated);

        let left = Value::Collection(strings(&["x", "y"]));
        let reordered = Value::Collection(strings(&["y", "x"]));
        let different = Value::Collection(strings(&["x", "z"]));
        assert_eq!(checker.dirty_kind(&left, &reordered), ChangeKind::None);
        assert_eq!(checker.dirty_kind(&left, &different), ChangeKind::Mutated);
    }

    #[test]
    fn plural_element_mutation() {
        let model = fixtures::Model::new();
        let order = model.order(&[(1, 2), (2, 1)]);
        let checker = DirtyChecker::for_view_type(&model.order, &DiffConfig::default());
        let items_slot = model.slot(&model.order, "items");
        let items_checker = checker.nested(items_slot).unwrap();
        let items = order.current_value(items_slot);
        assert_eq!(items_checker.dirty_kind(&items, &items), ChangeKind::None);

        let first = items.as_collection().unwrap().get(0).unwrap();
        first.as_view().unwrap().set("qty", json!(9)).unwrap();
        assert_eq!(items_checker.dirty_kind(&items, &items), ChangeKind::Mutated);
    }

    #[test]
    fn checker_tree_mirrors_metamodel() {
        let model = fixtures::Model::new();
        let checker = DirtyChecker::View(DirtyChecker::for_view_type(&model.order, &DiffConfig::default()));
        assert_eq!(checker.nested_checkers().len(), model.order.slot_count());
        let items = &checker.nested_checkers()[model.slot(&model.order, "items")];
        assert!(matches!(items.element_checker(), Some(DirtyChecker::View(_))));
        let notes = &checker.nested_checkers()[model.slot(&model.order, "notes")];
        assert!(notes.key_checker().is_some());
    }

    #[test]
    fn unused_order_is_clean() {
        let model = fixtures::Model::new();
        let order = TrackedView::load(&model.order, []).unwrap();
        let checker = DirtyChecker::View(DirtyChecker::for_view_type(&model.order, &DiffConfig::default()));
        let v = Value::View(order);
        assert_eq!(checker.dirty_kind(&v, &v), ChangeKind::None);
    }
}
