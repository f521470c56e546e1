//! Change computation for viewdelta.
//!
//! Given a tracked view, builds a lazily materialized tree of change nodes
//! describing what was added, removed, mutated, or left untouched since the
//! view was loaded, down to arbitrary attribute paths. Nodes are built on
//! dereference and cached by their parent; the tracked objects are only
//! read, never copied or modified.
//!
//! # Key Types
//!
//! - [`ChangeModel`] / [`ChangeRef`] -- One node of the change tree
//! - [`DirtyChecker`] -- NONE / UPDATED / MUTATED classifier per declared type
//! - [`PathValidator`] -- Segment-by-segment path validation
//! - [`DiffConfig`] -- Opaque-leaf policy and fan-out options
//!
//! # Example
//!
//! ```ignore
//! let root = ChangeModel::root(&order);
//! for change in root.dirty_changes()? {
//!     println!("{:?}", change.kind());
//! }
//! let qty = root.get_all("items.qty")?;
//! ```

pub mod checker;
pub mod config;
mod delta;
pub mod error;
mod memo;
pub mod model;
pub mod path;

#[cfg(test)]
mod fixtures;

pub use checker::{BasicChecker, DirtyChecker, MapChecker, PluralChecker, ViewChecker};
pub use config::{DiffConfig, OpaqueLeafPolicy};
pub use error::{DiffError, DiffResult};
pub use model::{
    BasicChangeModel, ChangeModel, ChangeRef, EmptyChangeModel, ImmutableChangeModel, MapChangeModel,
    PluralChangeModel, ViewChangeModel,
};
pub use path::{PathState, PathValidator};

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;
    use std::rc::Rc;
    use viewdelta_tracking::{TrackedView, Value, ViewRef};
    use viewdelta_types::ChangeKind;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    }

    #[test]
    fn untouched_order_is_clean() {
        init_tracing();
        let model = fixtures::Model::new();
        let order = model.order(&[(1, 2), (2, 1)]);
        let root = ChangeModel::root(&order);
        assert_eq!(root.kind(), ChangeKind::None);
        assert!(root.dirty_changes().unwrap().is_empty());
        for name in ["status", "customer", "items", "tags", "notes", "contacts", "meta"] {
            assert!(!root.get(name).unwrap().is_dirty(), "{name}");
        }
    }

    #[test]
    fn removing_one_item_and_mutating_another() {
        init_tracing();
        let model = fixtures::Model::new();
        let order = model.order(&[(1, 2), (2, 1)]);
        let items = order.get("items").unwrap();
        let items = items.as_collection().unwrap();
        let removed = items.remove_at(1).unwrap();
        items.get(0).unwrap().as_view().unwrap().set("qty", json!(5)).unwrap();

        let root = ChangeModel::root(&order);
        assert_eq!(root.kind(), ChangeKind::Mutated);
        let dirty = root.dirty_changes().unwrap();
        assert_eq!(dirty.len(), 1);

        let node = root.get("items").unwrap();
        assert!(Rc::ptr_eq(&node, &dirty[0]));
        let changes = node.element_changes().unwrap();
        assert_eq!(changes.len(), 2);
        let mutated = node.mutated_elements().unwrap();
        assert_eq!(mutated.len(), 1);
        assert_eq!(mutated[0].kind(), ChangeKind::Mutated);
        let gone = node.removed_elements().unwrap();
        assert_eq!(gone.len(), 1);
        assert!(gone[0].initial_state().same(&removed));
        assert!(gone[0].current_state().is_null());
        assert!(node.added_elements().unwrap().is_empty());
    }

    #[test]
    fn replacing_an_item_with_one_of_the_same_id() {
        init_tracing();
        let model = fixtures::Model::new();
        let order = model.order(&[(1, 2)]);
        let items = order.get("items").unwrap();
        let items = items.as_collection().unwrap();
        let original = items.remove_at(0).unwrap();
        let replacement = model.item(1, 99);
        items.add(replacement.clone()).unwrap();

        let root = ChangeModel::root(&order);
        assert_eq!(root.kind(), ChangeKind::Mutated);
        assert_eq!(root.dirty_changes().unwrap().len(), 1);
        let node = root.get("items").unwrap();
        assert_eq!(node.kind(), ChangeKind::Mutated);
        assert!(node.added_elements().unwrap().is_empty());
        assert!(node.removed_elements().unwrap().is_empty());
        let mutated = node.mutated_elements().unwrap();
        assert_eq!(mutated.len(), 1);
        assert!(mutated[0].initial_state().same(&original));
        assert!(mutated[0].current_state().same(&Value::View(replacement)));
        assert_eq!(node.element_changes().unwrap().len(), 1);

        let qty = mutated[0].get("qty").unwrap();
        assert_eq!(qty.initial_state().payload(), Some(json!(2)));
        assert_eq!(qty.current_state().payload(), Some(json!(99)));
        assert!(root.is_dirty_path("items.qty").unwrap());
        assert!(!root.is_dirty_path("items.id").unwrap());

        // An equal item in place of the replacement restores the original state.
        items.set_at(0, model.item(1, 2)).unwrap();
        let node = root.get("items").unwrap();
        assert_eq!(node.kind(), ChangeKind::None);
        assert!(node.element_changes().unwrap().is_empty());
        assert_eq!(root.kind(), ChangeKind::None);
    }

    #[test]
    fn reverted_write_is_not_a_change() {
        let model = fixtures::Model::new();
        let order = model.order(&[]);
        let original = order.get("status").unwrap();
        order.set("status", json!("closed")).unwrap();
        order.set("status", original).unwrap();

        let root = ChangeModel::root(&order);
        assert!(order.written_bits().get(model.slot(&model.order, "status")));
        assert_eq!(root.get("status").unwrap().kind(), ChangeKind::None);
        assert!(root.dirty_changes().unwrap().is_empty());
        assert_eq!(root.kind(), ChangeKind::None);
    }

    #[test]
    fn get_returns_the_same_node_until_the_value_is_replaced() {
        let model = fixtures::Model::new();
        let order = model.order(&[]);
        let root = ChangeModel::root(&order);
        let first = root.get("customer.name").unwrap();
        let second = root.get("customer.name").unwrap();
        assert!(Rc::ptr_eq(&first, &second));

        let customer = root.get("customer").unwrap();
        order.set("customer", model.customer(3, "Cy")).unwrap();
        let replaced = root.get("customer").unwrap();
        assert!(!Rc::ptr_eq(&customer, &replaced));
        assert_eq!(replaced.kind(), ChangeKind::Updated);
    }

    #[test]
    fn collection_replaced_and_restored() {
        let model = fixtures::Model::new();
        let order = model.order(&[]);
        let original = order.get("tags").unwrap();
        order.set("tags", model.tags(&["a", "c"])).unwrap();
        let root = ChangeModel::root(&order);
        assert!(root.get("tags").unwrap().is_dirty());

        order.set("tags", original).unwrap();
        assert!(!root.get("tags").unwrap().is_dirty());
        assert_eq!(root.kind(), ChangeKind::None);
    }

    #[test]
    fn replaced_customer_with_same_id_is_mutated() {
        let model = fixtures::Model::new();
        let order = model.order(&[]);
        order.set("customer", model.customer(1, "Ann")).unwrap();
        let root = ChangeModel::root(&order);
        assert_eq!(root.get("customer").unwrap().kind(), ChangeKind::None);
        assert!(!root.is_changed("customer.name").unwrap());

        order.set("customer", model.customer(1, "Annie")).unwrap();
        assert_eq!(root.get("customer").unwrap().kind(), ChangeKind::Mutated);
        assert!(root.is_dirty_path("customer").unwrap());
        assert!(root.is_dirty_path("customer.name").unwrap());
        assert_eq!(root.get("customer.name").unwrap().kind(), ChangeKind::Updated);
        assert_eq!(root.get("customer").unwrap().dirty_changes().unwrap().len(), 1);
        assert!(!root.is_changed("customer").unwrap());

        order.set("customer", model.customer(7, "Ann")).unwrap();
        assert_eq!(root.get("customer").unwrap().kind(), ChangeKind::Updated);
        assert!(root.is_changed("customer.name").unwrap());
    }

    #[test]
    fn new_objects_report_every_set_slot() {
        let model = fixtures::Model::new();
        let order = TrackedView::create(&model.order, [("status", json!("draft").into())]).unwrap();
        let root = ChangeModel::root(&order);
        assert!(order.is_new());
        let dirty = root.dirty_changes().unwrap();
        assert_eq!(dirty.len(), 1);
        assert_eq!(dirty[0].kind(), ChangeKind::Updated);
        assert!(dirty[0].initial_state().is_null());
    }

    #[test]
    fn attribute_descriptors_are_validated() {
        let model = fixtures::Model::new();
        let order = model.order(&[]);
        let root = ChangeModel::root(&order);

        let name = model.customer.attribute("name").unwrap();
        assert!(matches!(root.get_attribute(name), Err(DiffError::InvalidAttribute { .. })));
        let created = model.order.attribute("created").unwrap();
        assert!(matches!(root.get_attribute(created), Err(DiffError::InvalidAttribute { .. })));
        assert!(matches!(root.get("created"), Err(DiffError::InvalidAttribute { .. })));

        let status = model.order.attribute("status").unwrap();
        let node = root.get_attribute(status).unwrap();
        assert!(Rc::ptr_eq(&node, &root.get("status").unwrap()));
        let customer = root.get("customer").unwrap();
        assert!(customer.get_attribute(name).is_ok());
    }

    #[test]
    fn paths_through_leaves_are_rejected() {
        let model = fixtures::Model::new();
        let order = model.order(&[]);
        let root = ChangeModel::root(&order);
        assert!(matches!(root.get("status.length"), Err(DiffError::InvalidDereference { .. })));
        assert!(matches!(root.is_dirty_path("status.length"), Err(DiffError::InvalidDereference { .. })));
        assert!(matches!(root.get("customer..name"), Err(DiffError::InvalidAttribute { .. })));
    }

    #[test]
    fn tracking_errors_pass_through() {
        let model = fixtures::Model::new();
        let order = model.order(&[]);
        let err: DiffError = order.set("nope", json!(1)).unwrap_err().into();
        assert!(matches!(err, DiffError::Tracking(_)));
    }

    fn order_with(model: &fixtures::Model, qtys: &[i64]) -> ViewRef {
        let items: Vec<(i64, i64)> = qtys.iter().enumerate().map(|(i, &q)| (i as i64, q)).collect();
        model.order(&items)
    }

    proptest! {
        #[test]
        fn unmutated_order_is_none(qtys in proptest::collection::vec(0i64..100, 0..6)) {
            let model = fixtures::Model::new();
            let order = order_with(&model, &qtys);
            let root = ChangeModel::root(&order);
            prop_assert_eq!(root.kind(), ChangeKind::None);
            prop_assert!(root.get("items").unwrap().element_changes().unwrap().is_empty());
            prop_assert!(!root.is_dirty_path("items.qty").unwrap());
        }

        #[test]
        fn mutated_quantities_are_found(
            qtys in proptest::collection::vec(0i64..100, 1..6),
            bump in 1i64..10,
            pick in any::<prop::sample::Index>(),
        ) {
            let model = fixtures::Model::new();
            let order = order_with(&model, &qtys);
            let index = pick.index(qtys.len());
            let items = order.get("items").unwrap();
            let item = items.as_collection().unwrap().get(index).unwrap();
            item.as_view().unwrap().set("qty", json!(qtys[index] + bump)).unwrap();

            let root = ChangeModel::root(&order);
            let node = root.get("items").unwrap();
            let mutated = node.mutated_elements().unwrap();
            prop_assert_eq!(mutated.len(), 1);
            prop_assert!(mutated[0].current_state().same(&item));
            let dirty: Vec<bool> = root
                .get_all("items.qty")
                .unwrap()
                .iter()
                .map(|n| n.is_dirty())
                .collect();
            prop_assert_eq!(dirty.iter().filter(|d| **d).count(), 1);
            prop_assert!(dirty[index]);
        }
    }
}
