//! Change-engine configuration.
//!
//! [`DiffConfig`] is plain serde data, loadable from TOML. Every field has a
//! default, so an empty document yields [`DiffConfig::default`].

use serde::{Deserialize, Serialize};

use crate::error::{DiffError, DiffResult};

/// How to classify mutable leaf types that can neither report their own
/// changes nor be snapshotted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpaqueLeafPolicy {
    /// Report them as changed: same-reference pairs classify MUTATED and
    /// container elements appear in both Added and Removed.
    #[default]
    AssumeChanged,
    /// Compare them with the type's equality like any other leaf.
    AssumeUnchanged,
}

/// Configuration for change computation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffConfig {
    /// Treatment of opaque mutable leaves.
    pub opaque_leaves: OpaqueLeafPolicy,
    /// When `false`, dereferencing an attribute through a recording
    /// container that reports itself clean yields no children instead of
    /// one unchanged child per element.
    pub fan_out_clean_plurals: bool,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            opaque_leaves: OpaqueLeafPolicy::AssumeChanged,
            fan_out_clean_plurals: true,
        }
    }
}

impl DiffConfig {
    /// Parse a configuration from TOML. Missing fields take their defaults.
    pub fn from_toml_str(source: &str) -> DiffResult<Self> {
        toml::from_str(source).map_err(|e| DiffError::Config(e.to_string()))
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> DiffResult<String> {
        toml::to_string(self).map_err(|e| DiffError::Config(e.to_string()))
    }
}
