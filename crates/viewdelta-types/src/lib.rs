//! Foundation types for viewdelta.
//!
//! This crate provides the metamodel consumed by the tracking layer and the
//! change engine. Every other viewdelta crate depends on `viewdelta-types`.
//!
//! # Key Types
//!
//! - [`ViewType`] -- A managed view type with named, slot-indexed attributes
//! - [`Attribute`] / [`AttributeKind`] -- Attribute descriptor (singular, plural, map)
//! - [`TypeDescriptor`] -- Element/key type: a basic leaf or a nested view type
//! - [`BasicUserType`] -- Pluggable leaf type with four capability flags
//! - [`JsonBasicType`] -- Stock leaf type over `serde_json::Value` payloads
//! - [`ChangeKind`] -- NONE / UPDATED / MUTATED classification

pub mod basic;
pub mod error;
pub mod kind;
pub mod metamodel;

pub use basic::{BasicCapabilities, BasicUserType, JsonBasicType};
pub use error::{TypeError, TypeResult};
pub use kind::ChangeKind;
pub use metamodel::{
    Attribute, AttributeKind, PluralKind, TypeDescriptor, ViewType, ViewTypeBuilder,
};
