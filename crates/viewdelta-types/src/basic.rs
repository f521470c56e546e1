//! Basic (leaf) types and their capability descriptors.
//!
//! A basic type is any non-managed value type. The engine never inspects a
//! leaf payload itself; it only asks the type's [`BasicUserType`] plugin for
//! its four capability flags and for equality, hashing, and deep cloning.
//! Payloads are represented as `serde_json::Value`.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// The four capability flags of a basic type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BasicCapabilities {
    /// Values of the type can change in place.
    pub mutable: bool,
    /// Values carry their own dirty flag that reports in-place changes.
    pub dirty_checking: bool,
    /// The type offers a structural (deep) equality check.
    pub deep_equality: bool,
    /// Values can be deep-cloned, so an independent snapshot exists.
    pub deep_cloning: bool,
}

impl BasicCapabilities {
    /// Capabilities of an immutable value type.
    pub const IMMUTABLE: Self = Self {
        mutable: false,
        dirty_checking: false,
        deep_equality: false,
        deep_cloning: false,
    };

    /// A mutable type that can neither report its own dirtiness nor be
    /// snapshotted. No reliable before/after comparison exists for it.
    pub fn is_opaque(&self) -> bool {
        self.mutable && !self.dirty_checking && !self.deep_cloning
    }

    /// In-place mutations of values of this type can be detected.
    pub fn tracks_mutations(&self) -> bool {
        self.mutable && self.dirty_checking
    }
}

/// Pluggable behavior of a basic (leaf) type.
pub trait BasicUserType: fmt::Debug {
    /// Human-readable type name used in errors and logs.
    fn name(&self) -> &str;

    /// The capability flags of this type.
    fn capabilities(&self) -> BasicCapabilities;

    /// Type-specific equality. Used for lookups against initial snapshots.
    fn is_equal(&self, a: &Json, b: &Json) -> bool;

    /// Structural equality used when the type supports deep-equal checks.
    fn is_deep_equal(&self, a: &Json, b: &Json) -> bool {
        self.is_equal(a, b)
    }

    /// Hash consistent with [`BasicUserType::is_equal`].
    fn hash_value(&self, value: &Json) -> u64;

    /// Produce an independent copy of a value.
    fn deep_clone(&self, value: &Json) -> Json {
        value.clone()
    }
}

/// Stock [`BasicUserType`] over JSON payloads.
///
/// Equality and hashing operate on the normalized payload when a normalizer
/// is installed, which is how custom equality (e.g. case-insensitive keys)
/// is expressed.
#[derive(Clone)]
pub struct JsonBasicType {
    name: String,
    capabilities: BasicCapabilities,
    normalizer: Option<fn(&Json) -> Json>,
}

impl JsonBasicType {
    /// An immutable leaf type (strings, numbers, ...).
    pub fn immutable(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capabilities: BasicCapabilities::IMMUTABLE,
            normalizer: None,
        }
    }

    /// A mutable leaf type with no dirty checking and no deep cloning.
    ///
    /// Add capabilities with the `with_*` builders.
    pub fn mutable(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capabilities: BasicCapabilities {
                mutable: true,
                ..BasicCapabilities::IMMUTABLE
            },
            normalizer: None,
        }
    }

    /// Strings compared and hashed without regard to ASCII case.
    pub fn case_insensitive_string() -> Self {
        Self::immutable("CaseInsensitiveString").with_normalizer(lowercase)
    }

    pub fn with_dirty_checking(mut self) -> Self {
        self.capabilities.dirty_checking = true;
        self
    }

    pub fn with_deep_equality(mut self) -> Self {
        self.capabilities.deep_equality = true;
        self
    }

    pub fn with_deep_cloning(mut self) -> Self {
        self.capabilities.deep_cloning = true;
        self
    }

    /// Install a normalizer applied before equality and hashing.
    pub fn with_normalizer(mut self, normalizer: fn(&Json) -> Json) -> Self {
        self.normalizer = Some(normalizer);
        self
    }

    fn normalize(&self, value: &Json) -> Json {
        match self.normalizer {
            Some(f) => f(value),
            None => value.clone(),
        }
    }
}

impl fmt::Debug for JsonBasicType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonBasicType")
            .field("name", &self.name)
            .field("capabilities", &self.capabilities)
            .field("normalized", &self.normalizer.is_some())
            .finish()
    }
}

impl BasicUserType for JsonBasicType {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> BasicCapabilities {
        self.capabilities
    }

    fn is_equal(&self, a: &Json, b: &Json) -> bool {
        match self.normalizer {
            Some(f) => f(a) == f(b),
            None => a == b,
        }
    }

    fn hash_value(&self, value: &Json) -> u64 {
        // serde_json objects are BTreeMap-backed, so the rendering is canonical.
        let mut hasher = DefaultHasher::new();
        self.normalize(value).to_string().hash(&mut hasher);
        hasher.finish()
    }
}

fn lowercase(value: &Json) -> Json {
    match value {
        Json::String(s) => Json::String(s.to_ascii_lowercase()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn immutable_capabilities() {
        let ty = JsonBasicType::immutable("String");
        let caps = ty.capabilities();
        assert!(!caps.mutable);
        assert!(!caps.is_opaque());
        assert!(!caps.tracks_mutations());
    }

    #[test]
    fn mutable_without_snapshot_is_opaque() {
        let ty = JsonBasicType::mutable("Blob");
        assert!(ty.capabilities().is_opaque());

        let cloneable = JsonBasicType::mutable("Date").with_deep_cloning();
        assert!(!cloneable.capabilities().is_opaque());

        let tracked = JsonBasicType::mutable("Doc").with_dirty_checking();
        assert!(!tracked.capabilities().is_opaque());
        assert!(tracked.capabilities().tracks_mutations());
    }

    #[test]
    fn case_insensitive_equality_and_hash() {
        let ty = JsonBasicType::case_insensitive_string();
        assert!(ty.is_equal(&json!("Key"), &json!("KEY")));
        assert_eq!(ty.hash_value(&json!("Key")), ty.hash_value(&json!("kEy")));
        assert!(!ty.is_equal(&json!("Key"), &json!("other")));
    }

    #[test]
    fn deep_clone_copies_payload() {
        let ty = JsonBasicType::mutable("Doc").with_deep_cloning();
        let original = json!({"a": [1, 2]});
        let copy = ty.deep_clone(&original);
        assert_eq!(copy, original);
        assert!(ty.is_deep_equal(&copy, &original));
    }

    proptest! {
        #[test]
        fn equal_values_hash_equally(s in "[a-zA-Z]{0,12}") {
            let ty = JsonBasicType::case_insensitive_string();
            let upper = json!(s.to_ascii_uppercase());
            let lower = json!(s.to_ascii_lowercase());
            prop_assert!(ty.is_equal(&upper, &lower));
            prop_assert_eq!(ty.hash_value(&upper), ty.hash_value(&lower));
        }
    }
}
