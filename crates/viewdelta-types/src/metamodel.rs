//! View types and attribute descriptors.
//!
//! A [`ViewType`] declares named attributes. Tracked attributes are assigned
//! a dense slot index in declaration order; that index addresses the tracked
//! object's initial-state array, current-state array, and dirty bit vector.
//! Untracked attributes are part of the type but cannot be dereferenced by
//! the change engine.
//!
//! # Invariants
//!
//! - Attribute names are unique within a view type.
//! - Slot indexes run from `0` to `slot_count() - 1` without gaps.
//! - The type graph is acyclic: nested types are built before their users.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::basic::{BasicCapabilities, BasicUserType};
use crate::error::{TypeError, TypeResult};

/// Flavor of a non-map plural attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PluralKind {
    /// Unordered bag; duplicates allowed.
    Collection,
    /// Unordered, no two matching elements.
    Set,
    /// Ordered; duplicates allowed.
    List,
}

impl PluralKind {
    /// Whether element order is significant when comparing contents.
    pub fn is_ordered(self) -> bool {
        matches!(self, Self::List)
    }
}

/// The type of a singular value, plural element, or map key/value.
#[derive(Clone)]
pub enum TypeDescriptor {
    /// A leaf value governed by a basic-type plugin.
    Basic(Rc<dyn BasicUserType>),
    /// A nested managed view.
    View(Rc<ViewType>),
}

impl TypeDescriptor {
    pub fn basic(user_type: impl BasicUserType + 'static) -> Self {
        Self::Basic(Rc::new(user_type))
    }

    pub fn view(view_type: &Rc<ViewType>) -> Self {
        Self::View(Rc::clone(view_type))
    }

    /// Type name for diagnostics.
    pub fn name(&self) -> &str {
        match self {
            Self::Basic(ty) => ty.name(),
            Self::View(ty) => ty.name(),
        }
    }

    pub fn as_view(&self) -> Option<&Rc<ViewType>> {
        match self {
            Self::View(ty) => Some(ty),
            Self::Basic(_) => None,
        }
    }

    pub fn as_basic(&self) -> Option<&Rc<dyn BasicUserType>> {
        match self {
            Self::Basic(ty) => Some(ty),
            Self::View(_) => None,
        }
    }

    /// Capability flags; managed views are mutable and dirty-tracked.
    pub fn capabilities(&self) -> BasicCapabilities {
        match self {
            Self::Basic(ty) => ty.capabilities(),
            Self::View(_) => BasicCapabilities {
                mutable: true,
                dirty_checking: true,
                deep_equality: false,
                deep_cloning: false,
            },
        }
    }

    /// Whether values of this type can change in place at all.
    pub fn is_mutable(&self) -> bool {
        self.capabilities().mutable
    }

    /// Whether in-place changes can be detected for values of this type.
    pub fn tracks_mutations(&self) -> bool {
        self.capabilities().tracks_mutations()
    }

    /// Mutable leaf type with no reliable before/after snapshot.
    pub fn is_opaque(&self) -> bool {
        matches!(self, Self::Basic(ty) if ty.capabilities().is_opaque())
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic(ty) => write!(f, "Basic({})", ty.name()),
            Self::View(ty) => write!(f, "View({})", ty.name()),
        }
    }
}

/// Plurality and nested type(s) of an attribute.
#[derive(Clone, Debug)]
pub enum AttributeKind {
    Singular(TypeDescriptor),
    Plural {
        kind: PluralKind,
        element: TypeDescriptor,
    },
    Map {
        key: TypeDescriptor,
        value: TypeDescriptor,
    },
}

impl AttributeKind {
    pub fn basic(user_type: impl BasicUserType + 'static) -> Self {
        Self::Singular(TypeDescriptor::basic(user_type))
    }

    pub fn view(view_type: &Rc<ViewType>) -> Self {
        Self::Singular(TypeDescriptor::view(view_type))
    }

    pub fn collection(element: TypeDescriptor) -> Self {
        Self::Plural {
            kind: PluralKind::Collection,
            element,
        }
    }

    pub fn set(element: TypeDescriptor) -> Self {
        Self::Plural {
            kind: PluralKind::Set,
            element,
        }
    }

    pub fn list(element: TypeDescriptor) -> Self {
        Self::Plural {
            kind: PluralKind::List,
            element,
        }
    }

    pub fn map(key: TypeDescriptor, value: TypeDescriptor) -> Self {
        Self::Map { key, value }
    }

    /// The type reached when a path continues through this attribute:
    /// the singular type, the plural element type, or the map value type.
    pub fn target_type(&self) -> &TypeDescriptor {
        match self {
            Self::Singular(ty) => ty,
            Self::Plural { element, .. } => element,
            Self::Map { value, .. } => value,
        }
    }

    pub fn is_singular(&self) -> bool {
        matches!(self, Self::Singular(_))
    }
}

/// One attribute of a view type.
#[derive(Clone, Debug)]
pub struct Attribute {
    name: String,
    declaring_type: String,
    slot: Option<usize>,
    kind: AttributeKind,
}

impl Attribute {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the view type that declares this attribute.
    pub fn declaring_type(&self) -> &str {
        &self.declaring_type
    }

    /// Tracked-slot index, or `None` for an untracked attribute.
    pub fn slot(&self) -> Option<usize> {
        self.slot
    }

    pub fn kind(&self) -> &AttributeKind {
        &self.kind
    }

    pub fn is_tracked(&self) -> bool {
        self.slot.is_some()
    }
}

/// A managed view type.
pub struct ViewType {
    name: String,
    attributes: Vec<Attribute>,
    by_name: HashMap<String, usize>,
    /// slot index -> position in `attributes`.
    slots: Vec<usize>,
    id_attribute: Option<usize>,
}

impl ViewType {
    /// Start building a view type.
    pub fn builder(name: impl Into<String>) -> ViewTypeBuilder {
        ViewTypeBuilder {
            name: name.into(),
            attributes: Vec::new(),
            id: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// All attributes in declaration order.
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Look up an attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.by_name.get(name).map(|&i| &self.attributes[i])
    }

    /// Number of tracked slots.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// The tracked attribute stored at a slot.
    pub fn attribute_for_slot(&self, slot: usize) -> Option<&Attribute> {
        self.slots.get(slot).map(|&i| &self.attributes[i])
    }

    /// The attribute whose value identifies instances, if declared.
    pub fn id_attribute(&self) -> Option<&Attribute> {
        self.id_attribute.map(|i| &self.attributes[i])
    }
}

impl fmt::Debug for ViewType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewType")
            .field("name", &self.name)
            .field("attributes", &self.attributes.len())
            .field("slots", &self.slots.len())
            .finish()
    }
}

/// Builder for [`ViewType`].
pub struct ViewTypeBuilder {
    name: String,
    attributes: Vec<(String, bool, AttributeKind)>,
    id: Option<String>,
}

impl ViewTypeBuilder {
    /// Declare a tracked (mutable) attribute.
    pub fn attribute(mut self, name: impl Into<String>, kind: AttributeKind) -> Self {
        self.attributes.push((name.into(), true, kind));
        self
    }

    /// Declare an untracked attribute; it occupies no slot.
    pub fn untracked(mut self, name: impl Into<String>, kind: AttributeKind) -> Self {
        self.attributes.push((name.into(), false, kind));
        self
    }

    /// Use a tracked singular basic attribute as the instance identity.
    pub fn id(mut self, name: impl Into<String>) -> Self {
        self.id = Some(name.into());
        self
    }

    pub fn build(self) -> TypeResult<Rc<ViewType>> {
        let mut attributes = Vec::with_capacity(self.attributes.len());
        let mut by_name = HashMap::with_capacity(self.attributes.len());
        let mut slots = Vec::new();

        for (name, tracked, kind) in self.attributes {
            if by_name.contains_key(&name) {
                return Err(TypeError::DuplicateAttribute {
                    view: self.name,
                    attribute: name,
                });
            }
            let slot = if tracked {
                slots.push(attributes.len());
                Some(slots.len() - 1)
            } else {
                None
            };
            by_name.insert(name.clone(), attributes.len());
            attributes.push(Attribute {
                name,
                declaring_type: self.name.clone(),
                slot,
                kind,
            });
        }

        let id_attribute = match self.id {
            None => None,
            Some(id) => {
                let index = *by_name.get(&id).ok_or_else(|| TypeError::UnknownIdAttribute {
                    view: self.name.clone(),
                    attribute: id.clone(),
                })?;
                let attribute: &Attribute = &attributes[index];
                let reason = if !attribute.is_tracked() {
                    Some("id attribute must be tracked")
                } else if !matches!(attribute.kind, AttributeKind::Singular(TypeDescriptor::Basic(_))) {
                    Some("id attribute must be a singular basic attribute")
                } else {
                    None
                };
                if let Some(reason) = reason {
                    return Err(TypeError::InvalidIdAttribute {
                        view: self.name,
                        attribute: id,
                        reason: reason.to_string(),
                    });
                }
                Some(index)
            }
        };

        Ok(Rc::new(ViewType {
            name: self.name,
            attributes,
            by_name,
            slots,
            id_attribute,
        }))
    }
}
