//! Shared metamodel and object builders for unit tests.

use std::rc::Rc;

use serde_json::json;
use viewdelta_tracking::{CollectionRef, MapRef, TrackedCollection, TrackedMap, TrackedView, Value, ViewRef};
use viewdelta_types::{AttributeKind, JsonBasicType, PluralKind, TypeDescriptor, ViewType};

/// An order with a customer, line items, and containers of every kind.
pub(crate) struct Model {
    pub int: TypeDescriptor,
    pub string: TypeDescriptor,
    pub blob: TypeDescriptor,
    pub doc: TypeDescriptor,
    pub code: TypeDescriptor,
    pub customer: Rc<ViewType>,
    pub item: Rc<ViewType>,
    pub order: Rc<ViewType>,
}

impl Model {
    pub(crate) fn new() -> Self {
        let int = TypeDescriptor::basic(JsonBasicType::immutable("Int"));
        let string = TypeDescriptor::basic(JsonBasicType::immutable("String"));
        let blob = TypeDescriptor::basic(JsonBasicType::mutable("Blob"));
        let doc = TypeDescriptor::basic(JsonBasicType::mutable("Doc").with_dirty_checking());
        let code = TypeDescriptor::basic(JsonBasicType::case_insensitive_string());

        let customer = ViewType::builder("Customer")
            .attribute("id", AttributeKind::Singular(int.clone()))
            .attribute("name", AttributeKind::Singular(string.clone()))
            .id("id")
            .build()
            .unwrap();
        let item = ViewType::builder("Item")
            .attribute("id", AttributeKind::Singular(int.clone()))
            .attribute("qty", AttributeKind::Singular(int.clone()))
            .id("id")
            .build()
            .unwrap();
        let order = ViewType::builder("Order")
            .attribute("id", AttributeKind::Singular(int.clone()))
            .attribute("status", AttributeKind::Singular(string.clone()))
            .attribute("customer", AttributeKind::view(&customer))
            .attribute("items", AttributeKind::list(TypeDescriptor::view(&item)))
            .attribute("tags", AttributeKind::set(string.clone()))
            .attribute("notes", AttributeKind::map(code.clone(), string.clone()))
            .attribute("contacts", AttributeKind::map(string.clone(), TypeDescriptor::view(&customer)))
            .attribute("labels", AttributeKind::map(TypeDescriptor::view(&item), string.clone()))
            .attribute("attachments", AttributeKind::collection(blob.clone()))
            .attribute("blobs", AttributeKind::map(code.clone(), blob.clone()))
            .attribute("meta", AttributeKind::Singular(doc.clone()))
            .untracked("created", AttributeKind::Singular(int.clone()))
            .id("id")
            .build()
            .unwrap();

        Self {
            int,
            string,
            blob,
            doc,
            code,
            customer,
            item,
            order,
        }
    }

    pub(crate) fn item(&self, id: i64, qty: i64) -> ViewRef {
        TrackedView::load(&self.item, [("id", json!(id).into()), ("qty", json!(qty).into())]).unwrap()
    }

    pub(crate) fn customer(&self, id: i64, name: &str) -> ViewRef {
        TrackedView::load(&self.customer, [("id", json!(id).into()), ("name", json!(name).into())]).unwrap()
    }

    /// A loaded order with the given `(id, qty)` items, customer 1 "Ann",
    /// tags `a` and `b`, the note `gift: wrap`, the contact `billing`
    /// (customer 2 "Ann"), a `rev: 1` meta document, and empty labels,
    /// attachments, and blobs. Every container is recording.
    pub(crate) fn order(&self, items: &[(i64, i64)]) -> ViewRef {
        let items = TrackedCollection::recording(
            PluralKind::List,
            TypeDescriptor::view(&self.item),
            items.iter().map(|&(id, qty)| Value::View(self.item(id, qty))),
        )
        .unwrap();
        let tags = TrackedCollection::recording(
            PluralKind::Set,
            self.string.clone(),
            ["a", "b"].iter().map(|s| Value::basic(json!(s))),
        )
        .unwrap();
        let notes = TrackedMap::recording(
            self.code.clone(),
            self.string.clone(),
            [(Value::basic(json!("gift")), Value::basic(json!("wrap")))],
        )
        .unwrap();
        let contacts = TrackedMap::recording(
            self.string.clone(),
            TypeDescriptor::view(&self.customer),
            [(Value::basic(json!("billing")), Value::View(self.customer(2, "Ann")))],
        )
        .unwrap();
        let labels = TrackedMap::recording(TypeDescriptor::view(&self.item), self.string.clone(), []).unwrap();
        let attachments = TrackedCollection::recording(PluralKind::Collection, self.blob.clone(), []).unwrap();
        let blobs = TrackedMap::recording(self.code.clone(), self.blob.clone(), []).unwrap();

        TrackedView::load(
            &self.order,
            [
                ("id", json!(100).into()),
                ("status", json!("open").into()),
                ("customer", self.customer(1, "Ann").into()),
                ("items", items.into()),
                ("tags", tags.into()),
                ("notes", notes.into()),
                ("contacts", contacts.into()),
                ("labels", labels.into()),
                ("attachments", attachments.into()),
                ("blobs", blobs.into()),
                ("meta", json!({"rev": 1}).into()),
            ],
        )
        .unwrap()
    }

    /// A plain set of strings.
    pub(crate) fn tags(&self, tags: &[&str]) -> CollectionRef {
        TrackedCollection::plain(
            PluralKind::Set,
            self.string.clone(),
            tags.iter().map(|s| Value::basic(json!(s))),
        )
        .unwrap()
    }

    /// A plain map of notes.
    pub(crate) fn notes(&self, notes: &[(&str, &str)]) -> MapRef {
        TrackedMap::plain(
            self.code.clone(),
            self.string.clone(),
            notes
                .iter()
                .map(|(k, v)| (Value::basic(json!(k)), Value::basic(json!(v)))),
        )
        .unwrap()
    }

    pub(crate) fn slot(&self, view_type: &Rc<ViewType>, name: &str) -> usize {
        view_type.attribute(name).and_then(|a| a.slot()).unwrap()
    }
}
