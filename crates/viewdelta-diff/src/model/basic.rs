//! Leaf change nodes.

use viewdelta_tracking::Value;
use viewdelta_types::ChangeKind;

use crate::checker::{BasicChecker, DirtyChecker};

/// Change node of a basic leaf. The kind is computed on every call, so
/// in-place mutations of a dirty-checkable leaf show up without rebuilding
/// the node.
pub struct BasicChangeModel {
    checker: DirtyChecker,
    initial: Value,
    current: Value,
}

impl BasicChangeModel {
    pub(crate) fn new(checker: BasicChecker, initial: Value, current: Value) -> Self {
        Self {
            checker: DirtyChecker::Basic(checker),
            initial,
            current,
        }
    }

    pub fn initial(&self) -> &Value {
        &self.initial
    }

    pub fn current(&self) -> &Value {
        &self.current
    }

    pub fn kind(&self) -> ChangeKind {
        self.checker.dirty_kind(&self.initial, &self.current)
    }
}

/// Node of an immutable leaf whose initial and current value are the same
/// reference. Always [`ChangeKind::None`].
pub struct ImmutableChangeModel {
    value: Value,
}

impl ImmutableChangeModel {
    pub(crate) fn new(value: Value) -> Self {
        Self { value }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use crate::fixtures;
    use crate::model::ChangeModel;
    use serde_json::json;
    use viewdelta_types::ChangeKind;

    #[test]
    fn unchanged_immutable_leaf_gets_immutable_node() {
        let model = fixtures::Model::new();
        let order = model.order(&[]);
        let status = ChangeModel::root(&order).get("status").unwrap();
        assert!(matches!(*status, ChangeModel::Immutable(_)));
        assert_eq!(status.kind(), ChangeKind::None);
        assert!(status.initial_state().same(&status.current_state()));
    }

    #[test]
    fn replaced_leaf_is_updated() {
        let model = fixtures::Model::new();
        let order = model.order(&[]);
        order.set("status", json!("shipped")).unwrap();
        let status = ChangeModel::root(&order).get("status").unwrap();
        assert!(matches!(*status, ChangeModel::Basic(_)));
        assert_eq!(status.kind(), ChangeKind::Updated);
        assert_eq!(status.initial_state().payload(), Some(json!("open")));
        assert_eq!(status.current_state().payload(), Some(json!("shipped")));
    }

    #[test]
    fn equal_replacement_is_not_dirty() {
        let model = fixtures::Model::new();
        let order = model.order(&[]);
        order.set("status", json!("open")).unwrap();
        let status = ChangeModel::root(&order).get("status").unwrap();
        assert_eq!(status.kind(), ChangeKind::None);
        assert!(order.dirty_bits().any());
    }

    #[test]
    fn dirty_checkable_leaf_reports_in_place_mutation() {
        let model = fixtures::Model::new();
        let order = model.order(&[]);
        let root = ChangeModel::root(&order);
        let meta = root.get("meta").unwrap();
        assert_eq!(meta.kind(), ChangeKind::None);

        let leaf = order.get("meta").unwrap();
        leaf.as_basic().unwrap().update(|p| p["rev"] = json!(2));
        assert_eq!(meta.kind(), ChangeKind::Mutated);
        assert!(root.get("meta").unwrap().is_dirty());
    }

    #[test]
    fn leaves_cannot_be_dereferenced() {
        let model = fixtures::Model::new();
        let order = model.order(&[]);
        let status = ChangeModel::root(&order).get("status").unwrap();
        assert!(status.get("length").is_err());
        assert!(status.is_dirty_path("length").is_err());
        assert!(status.dirty_changes().is_err());
    }
}
