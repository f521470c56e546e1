//! Dotted attribute paths and their validation against the metamodel.
//!
//! A path such as `items.product.name` is checked one segment at a time by
//! a small state machine before any object is touched:
//!
//! ```text
//! AwaitingSegment --segment--> ResolvedManaged --segment--> ...
//!                          \-> ResolvedBasic  --segment--> Error
//! ```
//!
//! Plural and map attributes continue into their element (value) type.
//! Unknown or untracked attribute names are terminal errors.

use std::rc::Rc;

use viewdelta_types::{Attribute, TypeDescriptor, ViewType};

use crate::error::{DiffError, DiffResult};

/// Split a dotted path into its segments. Empty segments are rejected.
pub fn segments(path: &str) -> DiffResult<Vec<&str>> {
    if path.is_empty() {
        return Err(DiffError::attribute("", path));
    }
    let parts: Vec<&str> = path.split('.').collect();
    if parts.iter().any(|p| p.is_empty()) {
        return Err(DiffError::attribute("", path));
    }
    Ok(parts)
}

/// State of a [`PathValidator`].
#[derive(Clone, Debug)]
pub enum PathState {
    /// No segment consumed yet; positioned at the root view type.
    AwaitingSegment(Rc<ViewType>),
    /// The last segment reached a basic leaf.
    ResolvedBasic(Attribute),
    /// The last segment reached a managed view type.
    ResolvedManaged(Attribute, Rc<ViewType>),
    /// Terminal failure.
    Error(String),
}

/// Segment-by-segment validator for attribute paths.
#[derive(Debug)]
pub struct PathValidator {
    path: String,
    state: PathState,
    resolved: Vec<Attribute>,
    error: Option<DiffError>,
}

impl PathValidator {
    pub fn new(root: &Rc<ViewType>, path: &str) -> Self {
        Self {
            path: path.to_string(),
            state: PathState::AwaitingSegment(Rc::clone(root)),
            resolved: Vec::new(),
            error: None,
        }
    }

    pub fn state(&self) -> &PathState {
        &self.state
    }

    /// Consume one segment.
    pub fn step(&mut self, segment: &str) {
        let view_type = match &self.state {
            PathState::AwaitingSegment(ty) | PathState::ResolvedManaged(_, ty) => Rc::clone(ty),
            PathState::ResolvedBasic(attribute) => {
                let reason = format!("'{}' is a basic attribute and has no '{segment}'", attribute.name());
                self.fail(DiffError::dereference(&self.path, reason));
                return;
            }
            PathState::Error(_) => return,
        };
        let Some(attribute) = view_type.attribute(segment).filter(|a| a.is_tracked()) else {
            self.fail(DiffError::attribute(segment, &self.path));
            return;
        };
        self.state = match attribute.kind().target_type() {
            TypeDescriptor::Basic(_) => PathState::ResolvedBasic(attribute.clone()),
            TypeDescriptor::View(ty) => PathState::ResolvedManaged(attribute.clone(), Rc::clone(ty)),
        };
        self.resolved.push(attribute.clone());
    }

    /// The attributes along an accepted path.
    pub fn finish(self) -> DiffResult<Vec<Attribute>> {
        if let Some(err) = self.error {
            return Err(err);
        }
        match self.state {
            PathState::ResolvedBasic(_) | PathState::ResolvedManaged(..) => Ok(self.resolved),
            PathState::AwaitingSegment(_) => Err(DiffError::attribute("", &self.path)),
            PathState::Error(message) => Err(DiffError::IllegalState(message)),
        }
    }

    fn fail(&mut self, error: DiffError) {
        self.state = PathState::Error(error.to_string());
        self.error = Some(error);
    }
}

/// Validate `path` against `root`, returning the attribute at each segment.
pub fn validate(root: &Rc<ViewType>, path: &str) -> DiffResult<Vec<Attribute>> {
    let mut validator = PathValidator::new(root, path);
    for segment in segments(path)? {
        validator.step(segment);
    }
    validator.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn split_rejects_empty_segments() {
        assert_eq!(segments("a.b").unwrap(), vec!["a", "b"]);
        assert!(segments("").is_err());
        assert!(segments("a..b").is_err());
        assert!(segments(".a").is_err());
    }

    #[test]
    fn managed_and_basic_targets() {
        let model = fixtures::Model::new();
        let attrs = validate(&model.order, "customer.name").unwrap();
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs[1].name(), "name");

        let through_plural = validate(&model.order, "items.qty").unwrap();
        assert_eq!(through_plural[0].name(), "items");
    }

    #[test]
    fn states_advance_per_segment() {
        let model = fixtures::Model::new();
        let mut v = PathValidator::new(&model.order, "customer.name");
        assert!(matches!(v.state(), PathState::AwaitingSegment(_)));
        v.step("customer");
        assert!(matches!(v.state(), PathState::ResolvedManaged(..)));
        v.step("name");
        assert!(matches!(v.state(), PathState::ResolvedBasic(_)));
        assert!(v.finish().is_ok());
    }

    #[test]
    fn unknown_attribute_is_terminal() {
        let model = fixtures::Model::new();
        let err = validate(&model.order, "nope.name").unwrap_err();
        assert!(matches!(err, DiffError::InvalidAttribute { attribute, .. } if attribute == "nope"));
    }

    #[test]
    fn untracked_attribute_is_rejected() {
        let model = fixtures::Model::new();
        let err = validate(&model.order, "created").unwrap_err();
        assert!(matches!(err, DiffError::InvalidAttribute { .. }));
    }

    #[test]
    fn past_basic_leaf_is_invalid_dereference() {
        let model = fixtures::Model::new();
        let err = validate(&model.order, "status.length").unwrap_err();
        assert!(matches!(err, DiffError::InvalidDereference { .. }));
    }
}
