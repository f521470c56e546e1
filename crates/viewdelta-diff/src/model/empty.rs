//! Change nodes below a null view.

use std::rc::Rc;

use viewdelta_tracking::Value;
use viewdelta_types::{Attribute, AttributeKind, ViewType};

use super::{past_leaf, ChangeModel, ChangeRef, DiffContext};
use crate::error::{DiffError, DiffResult};
use crate::memo::MemoCache;
use crate::path;

/// Stand-in for the subtree of a view that is null now. It never reports
/// changes, but still validates every attribute and path against the
/// declared type, so a typo below a null object fails the same way it does
/// below a present one.
pub struct EmptyChangeModel {
    ctx: Rc<DiffContext>,
    kind: AttributeKind,
    children: MemoCache<usize>,
}

impl EmptyChangeModel {
    pub(crate) fn new(ctx: Rc<DiffContext>, kind: AttributeKind) -> Self {
        Self {
            ctx,
            kind,
            children: MemoCache::default(),
        }
    }

    /// The declared kind of the attribute this node stands in for.
    pub fn attribute_kind(&self) -> &AttributeKind {
        &self.kind
    }

    pub(crate) fn is_plural(&self) -> bool {
        matches!(self.kind, AttributeKind::Plural { .. } | AttributeKind::Map { .. })
    }

    pub(crate) fn is_map(&self) -> bool {
        matches!(self.kind, AttributeKind::Map { .. })
    }

    fn view_type(&self) -> Option<&Rc<ViewType>> {
        match &self.kind {
            AttributeKind::Singular(ty) => ty.as_view(),
            _ => None,
        }
    }

    pub(crate) fn child_by_name(&self, name: &str, path: &str) -> DiffResult<ChangeRef> {
        let Some(view_type) = self.view_type() else {
            return Err(self.not_a_view(path));
        };
        let attribute = view_type
            .attribute(name)
            .ok_or_else(|| DiffError::attribute(name, path))?;
        self.child(attribute, path)
    }

    pub(crate) fn child(&self, attribute: &Attribute, path: &str) -> DiffResult<ChangeRef> {
        let Some(view_type) = self.view_type() else {
            return Err(self.not_a_view(path));
        };
        let slot = match (view_type.attribute(attribute.name()), attribute.slot()) {
            (Some(d), Some(slot)) if d.slot() == Some(slot) && d.declaring_type() == attribute.declaring_type() => slot,
            _ => return Err(DiffError::attribute(attribute.name(), path)),
        };
        self.children.get_or_build(slot, &Value::Null, &Value::Null, || {
            Ok(ChangeModel::Empty(Self::new(
                Rc::clone(&self.ctx),
                attribute.kind().clone(),
            )))
        })
    }

    /// Validate `path` from this node's view (or element view) type. A
    /// valid path is never dirty here.
    pub(crate) fn probe(&self, path: &str) -> DiffResult<bool> {
        let view_type = match &self.kind {
            AttributeKind::Singular(ty) => ty.as_view(),
            AttributeKind::Plural { element, .. } => element.as_view(),
            AttributeKind::Map { value, .. } => value.as_view(),
        };
        match view_type {
            Some(ty) => path::validate(ty, path).map(|_| false),
            None => Err(past_leaf(path)),
        }
    }

    /// The single empty node a plural or map fans out to.
    pub(crate) fn element_node(&self) -> ChangeRef {
        Rc::new(ChangeModel::Empty(Self::new(
            Rc::clone(&self.ctx),
            AttributeKind::Singular(self.kind.target_type().clone()),
        )))
    }

    fn not_a_view(&self, path: &str) -> DiffError {
        if self.is_plural() {
            super::through_plural(path)
        } else {
            past_leaf(path)
        }
    }
}
