//! Change nodes.
//!
//! A [`ChangeModel`] wraps one `(initial, current)` pair of the tracked
//! graph and classifies it. Nodes are built lazily on dereference, cached by
//! their parent, and never modify the objects they look at.
//!
//! # Node kinds
//!
//! | Variant | Wraps | Dereference |
//! |---------|-------|-------------|
//! | [`ChangeModel::View`] | a managed view | by attribute or path |
//! | [`ChangeModel::Basic`] | a basic leaf | none |
//! | [`ChangeModel::Plural`] | a collection, set, or list | fan-out per element |
//! | [`ChangeModel::Map`] | a map | fan-out per value or key |
//! | [`ChangeModel::Empty`] | a subtree below a null view | yields further empty nodes |
//! | [`ChangeModel::Immutable`] | an unchanged immutable leaf | none |

mod basic;
mod empty;
mod map;
mod plural;
mod view;

use std::rc::Rc;

use tracing::debug;
use viewdelta_tracking::{Value, ViewRef};
use viewdelta_types::{Attribute, AttributeKind, ChangeKind, TypeDescriptor};

use crate::checker::DirtyChecker;
use crate::config::DiffConfig;
use crate::error::{DiffError, DiffResult};
use crate::path;

pub use basic::{BasicChangeModel, ImmutableChangeModel};
pub use empty::EmptyChangeModel;
pub use map::MapChangeModel;
pub use plural::PluralChangeModel;
pub use view::ViewChangeModel;

pub(crate) use view::Probe;

/// Shared handle to a change node.
pub type ChangeRef = Rc<ChangeModel>;

/// State shared by every node of one change tree.
#[derive(Debug)]
pub(crate) struct DiffContext {
    pub(crate) config: DiffConfig,
}

/// One node of the lazily built change tree.
pub enum ChangeModel {
    Basic(BasicChangeModel),
    View(ViewChangeModel),
    Plural(PluralChangeModel),
    Map(MapChangeModel),
    Empty(EmptyChangeModel),
    Immutable(ImmutableChangeModel),
}

impl ChangeModel {
    /// Root node of a tracked view with the default configuration.
    pub fn root(view: &ViewRef) -> ChangeRef {
        Self::root_with_config(view, DiffConfig::default())
    }

    /// Root node of a tracked view. The root pairs the view with itself.
    pub fn root_with_config(view: &ViewRef, config: DiffConfig) -> ChangeRef {
        let checker = DirtyChecker::for_view_type(view.view_type(), &config);
        let ctx = Rc::new(DiffContext { config });
        debug!(view = view.view_type().name(), "change model root created");
        Rc::new(Self::View(ViewChangeModel::new(
            ctx,
            checker,
            Some(Rc::clone(view)),
            Some(Rc::clone(view)),
        )))
    }

    /// Node for a value pair of an attribute.
    pub(crate) fn for_attribute(
        ctx: &Rc<DiffContext>,
        kind: &AttributeKind,
        checker: &DirtyChecker,
        initial: Value,
        current: Value,
    ) -> DiffResult<Self> {
        match (kind, checker) {
            (AttributeKind::Singular(ty), _) => Self::for_element(ctx, ty, checker, initial, current),
            (AttributeKind::Plural { .. }, DirtyChecker::Plural(c)) => {
                let initial = expect_shape(initial, Value::as_collection, "collection")?;
                let current = expect_shape(current, Value::as_collection, "collection")?;
                Ok(Self::Plural(PluralChangeModel::new(Rc::clone(ctx), Rc::clone(c), initial, current)))
            }
            (AttributeKind::Map { .. }, DirtyChecker::Map(c)) => {
                let initial = expect_shape(initial, Value::as_map, "map")?;
                let current = expect_shape(current, Value::as_map, "map")?;
                Ok(Self::Map(MapChangeModel::new(Rc::clone(ctx), Rc::clone(c), initial, current)))
            }
            _ => Err(DiffError::IllegalState(format!(
                "checker {checker:?} does not fit attribute kind {kind:?}"
            ))),
        }
    }

    /// Node for a singular value, plural element, or map key/value.
    pub(crate) fn for_element(
        ctx: &Rc<DiffContext>,
        ty: &TypeDescriptor,
        checker: &DirtyChecker,
        initial: Value,
        current: Value,
    ) -> DiffResult<Self> {
        match (ty, checker) {
            (TypeDescriptor::Basic(b), DirtyChecker::Basic(c)) => {
                if !b.capabilities().mutable && !current.is_null() && initial.same(&current) {
                    return Ok(Self::Immutable(ImmutableChangeModel::new(current)));
                }
                Ok(Self::Basic(BasicChangeModel::new(c.clone(), initial, current)))
            }
            (TypeDescriptor::View(_), DirtyChecker::View(c)) => {
                let initial = expect_shape(initial, Value::as_view, "view")?;
                let current = expect_shape(current, Value::as_view, "view")?;
                Ok(Self::View(ViewChangeModel::new(Rc::clone(ctx), Rc::clone(c), initial, current)))
            }
            _ => Err(DiffError::IllegalState(format!(
                "checker {checker:?} does not fit type {ty:?}"
            ))),
        }
    }

    /// The value as of load time.
    pub fn initial_state(&self) -> Value {
        match self {
            Self::Basic(m) => m.initial().clone(),
            Self::View(m) => m.initial().cloned().into(),
            Self::Plural(m) => m.initial().cloned().into(),
            Self::Map(m) => m.initial().cloned().into(),
            Self::Empty(_) => Value::Null,
            Self::Immutable(m) => m.value().clone(),
        }
    }

    /// The value now.
    pub fn current_state(&self) -> Value {
        match self {
            Self::Basic(m) => m.current().clone(),
            Self::View(m) => m.current().cloned().into(),
            Self::Plural(m) => m.current().cloned().into(),
            Self::Map(m) => m.current().cloned().into(),
            Self::Empty(_) => Value::Null,
            Self::Immutable(m) => m.value().clone(),
        }
    }

    /// Classification of the wrapped pair.
    pub fn kind(&self) -> ChangeKind {
        match self {
            Self::Basic(m) => m.kind(),
            Self::View(m) => m.kind(),
            Self::Plural(m) => m.kind(),
            Self::Map(m) => m.kind(),
            Self::Empty(_) | Self::Immutable(_) => ChangeKind::None,
        }
    }

    /// Anything other than [`ChangeKind::None`].
    pub fn is_dirty(&self) -> bool {
        self.kind().is_dirty()
    }

    /// Whether the value at `path` is dirty, following current objects.
    ///
    /// A null object along the way counts as dirty if its initial value
    /// was not null. On plural and map nodes, true if any element is dirty
    /// at `path`.
    pub fn is_dirty_path(&self, path: &str) -> DiffResult<bool> {
        self.probe(path, Probe::Dirty)
    }

    /// Whether the value at `path` was replaced, ignoring in-place
    /// mutation. Any replaced reference along the way counts.
    pub fn is_changed(&self, path: &str) -> DiffResult<bool> {
        self.probe(path, Probe::Changed)
    }

    fn probe(&self, path: &str, probe: Probe) -> DiffResult<bool> {
        match self {
            Self::View(m) => m.probe(path, probe),
            Self::Plural(m) => m.probe(path, probe),
            Self::Map(m) => m.probe(path, probe),
            Self::Empty(m) => m.probe(path),
            Self::Basic(_) | Self::Immutable(_) => Err(past_leaf(path)),
        }
    }

    /// Dereference an attribute or a dotted path of singular attributes.
    ///
    /// Plural attributes can only be the last segment; use
    /// [`ChangeModel::get_all`] to continue through them.
    pub fn get(&self, path: &str) -> DiffResult<ChangeRef> {
        let segments = path::segments(path)?;
        let mut node = self.segment(segments[0], path)?;
        for segment in &segments[1..] {
            node = node.segment(segment, path)?;
        }
        Ok(node)
    }

    /// Dereference an attribute descriptor. The attribute must be tracked
    /// and declared by this node's view type.
    pub fn get_attribute(&self, attribute: &Attribute) -> DiffResult<ChangeRef> {
        match self {
            Self::View(m) => m.child(attribute, attribute.name()),
            Self::Empty(m) => m.child(attribute, attribute.name()),
            Self::Basic(_) | Self::Immutable(_) => Err(past_leaf(attribute.name())),
            Self::Plural(_) | Self::Map(_) => Err(through_plural(attribute.name())),
        }
    }

    /// Dereference a dotted path, fanning out through plural attributes.
    /// Results are flattened in element order.
    pub fn get_all(&self, path: &str) -> DiffResult<Vec<ChangeRef>> {
        let segments = path::segments(path)?;
        let mut out = Vec::new();
        self.collect(&segments, path, &mut out)?;
        Ok(out)
    }

    /// Children whose slot reports dirty and verifies as changed. On plural
    /// and map nodes, the element changes.
    pub fn dirty_changes(&self) -> DiffResult<Vec<ChangeRef>> {
        match self {
            Self::View(m) => m.dirty_changes(),
            Self::Plural(m) => m.element_changes(),
            Self::Map(m) => m.element_changes(),
            Self::Empty(_) => Ok(Vec::new()),
            Self::Basic(_) | Self::Immutable(_) => Err(past_leaf("")),
        }
    }

    // -----------------------------------------------------------------------
    // Plural accessors (map nodes answer for their values)
    // -----------------------------------------------------------------------

    /// Added, removed, and mutated elements.
    pub fn element_changes(&self) -> DiffResult<Vec<ChangeRef>> {
        match self {
            Self::Plural(m) => m.element_changes(),
            Self::Map(m) => m.element_changes(),
            Self::Empty(m) if m.is_plural() => Ok(Vec::new()),
            _ => Err(DiffError::NotPlural {
                operation: "element_changes",
            }),
        }
    }

    pub fn added_elements(&self) -> DiffResult<Vec<ChangeRef>> {
        match self {
            Self::Plural(m) => m.added_elements(),
            Self::Map(m) => m.added_elements(),
            Self::Empty(m) if m.is_plural() => Ok(Vec::new()),
            _ => Err(DiffError::NotPlural {
                operation: "added_elements",
            }),
        }
    }

    pub fn removed_elements(&self) -> DiffResult<Vec<ChangeRef>> {
        match self {
            Self::Plural(m) => m.removed_elements(),
            Self::Map(m) => m.removed_elements(),
            Self::Empty(m) if m.is_plural() => Ok(Vec::new()),
            _ => Err(DiffError::NotPlural {
                operation: "removed_elements",
            }),
        }
    }

    pub fn mutated_elements(&self) -> DiffResult<Vec<ChangeRef>> {
        match self {
            Self::Plural(m) => m.mutated_elements(),
            Self::Map(m) => m.mutated_elements(),
            Self::Empty(m) if m.is_plural() => Ok(Vec::new()),
            _ => Err(DiffError::NotPlural {
                operation: "mutated_elements",
            }),
        }
    }

    /// One node per current element (map: per non-null value), in order.
    pub fn elements(&self) -> DiffResult<Vec<ChangeRef>> {
        match self {
            Self::Plural(m) => m.elements(),
            Self::Map(m) => m.elements(),
            Self::Empty(m) if m.is_plural() => Ok(Vec::new()),
            _ => Err(DiffError::NotPlural { operation: "elements" }),
        }
    }

    // -----------------------------------------------------------------------
    // Map accessors
    // -----------------------------------------------------------------------

    pub fn key_changes(&self) -> DiffResult<Vec<ChangeRef>> {
        self.map_op("key_changes", MapChangeModel::key_changes)
    }

    pub fn added_keys(&self) -> DiffResult<Vec<ChangeRef>> {
        self.map_op("added_keys", MapChangeModel::added_keys)
    }

    pub fn removed_keys(&self) -> DiffResult<Vec<ChangeRef>> {
        self.map_op("removed_keys", MapChangeModel::removed_keys)
    }

    pub fn mutated_keys(&self) -> DiffResult<Vec<ChangeRef>> {
        self.map_op("mutated_keys", MapChangeModel::mutated_keys)
    }

    /// Key and value changes merged per entry.
    pub fn object_changes(&self) -> DiffResult<Vec<ChangeRef>> {
        self.map_op("object_changes", MapChangeModel::object_changes)
    }

    pub fn added_objects(&self) -> DiffResult<Vec<ChangeRef>> {
        self.map_op("added_objects", MapChangeModel::added_objects)
    }

    pub fn removed_objects(&self) -> DiffResult<Vec<ChangeRef>> {
        self.map_op("removed_objects", MapChangeModel::removed_objects)
    }

    pub fn mutated_objects(&self) -> DiffResult<Vec<ChangeRef>> {
        self.map_op("mutated_objects", MapChangeModel::mutated_objects)
    }

    /// [`ChangeModel::get_all`] over the keys of a map whose key type is a
    /// managed view.
    pub fn key_get_all(&self, path: &str) -> DiffResult<Vec<ChangeRef>> {
        let segments = path::segments(path)?;
        let keys = self.map_op("key_get_all", MapChangeModel::key_elements)?;
        let mut out = Vec::new();
        for key in keys {
            key.collect(&segments, path, &mut out)?;
        }
        Ok(out)
    }

    /// Whether any current key is dirty at `path`.
    pub fn is_key_dirty(&self, path: &str) -> DiffResult<bool> {
        match self {
            Self::Map(m) => m.probe_keys(path, Probe::Dirty),
            Self::Empty(m) if m.is_map() => Ok(false),
            _ => Err(DiffError::NotPlural {
                operation: "is_key_dirty",
            }),
        }
    }

    /// Whether any current key was replaced at `path`.
    pub fn is_key_changed(&self, path: &str) -> DiffResult<bool> {
        match self {
            Self::Map(m) => m.probe_keys(path, Probe::Changed),
            Self::Empty(m) if m.is_map() => Ok(false),
            _ => Err(DiffError::NotPlural {
                operation: "is_key_changed",
            }),
        }
    }

    fn map_op(
        &self,
        operation: &'static str,
        op: impl FnOnce(&MapChangeModel) -> DiffResult<Vec<ChangeRef>>,
    ) -> DiffResult<Vec<ChangeRef>> {
        match self {
            Self::Map(m) => op(m),
            Self::Empty(m) if m.is_map() => Ok(Vec::new()),
            _ => Err(DiffError::NotPlural { operation }),
        }
    }

    // -----------------------------------------------------------------------
    // Dereference helpers
    // -----------------------------------------------------------------------

    fn segment(&self, name: &str, path: &str) -> DiffResult<ChangeRef> {
        match self {
            Self::View(m) => m.child_by_name(name, path),
            Self::Empty(m) => m.child_by_name(name, path),
            Self::Basic(_) | Self::Immutable(_) => Err(past_leaf(path)),
            Self::Plural(_) | Self::Map(_) => Err(through_plural(path)),
        }
    }

    fn collect(&self, segments: &[&str], path: &str, out: &mut Vec<ChangeRef>) -> DiffResult<()> {
        let Some((first, rest)) = segments.split_first() else {
            return Ok(());
        };
        let fanned = match self {
            Self::Plural(m) => Some(m.fan_out()?),
            Self::Map(m) => Some(m.fan_out()?),
            Self::Empty(m) if m.is_plural() || m.is_map() => Some(vec![m.element_node()]),
            _ => None,
        };
        if let Some(elements) = fanned {
            for element in elements {
                element.collect(segments, path, out)?;
            }
            return Ok(());
        }
        let child = self.segment(first, path)?;
        if rest.is_empty() {
            out.push(child);
            Ok(())
        } else {
            child.collect(rest, path, out)
        }
    }
}

impl std::fmt::Debug for ChangeModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let variant = match self {
            Self::Basic(_) => "Basic",
            Self::View(_) => "View",
            Self::Plural(_) => "Plural",
            Self::Map(_) => "Map",
            Self::Empty(_) => "Empty",
            Self::Immutable(_) => "Immutable",
        };
        f.debug_struct(variant)
            .field("kind", &self.kind())
            .field("initial", &self.initial_state())
            .field("current", &self.current_state())
            .finish()
    }
}

fn expect_shape<T: Clone>(
    value: Value,
    project: impl Fn(&Value) -> Option<&T>,
    expected: &str,
) -> DiffResult<Option<T>> {
    if value.is_null() {
        return Ok(None);
    }
    project(&value)
        .cloned()
        .map(Some)
        .ok_or_else(|| DiffError::IllegalState(format!("expected a {expected}, found {}", value.shape())))
}

pub(crate) fn past_leaf(path: &str) -> DiffError {
    DiffError::dereference(path, "basic values have no attributes")
}

pub(crate) fn through_plural(path: &str) -> DiffError {
    DiffError::dereference(path, "plural attribute in path; use get_all")
}
