use std::fmt;

use serde::{Deserialize, Serialize};

/// How a value pair differs between its initial snapshot and current state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    /// Nothing observable changed.
    #[default]
    None,
    /// The reference was replaced by an observably different value.
    Updated,
    /// Same identity, but the contents changed in place.
    Mutated,
}

impl ChangeKind {
    /// Returns `true` for anything other than [`ChangeKind::None`].
    pub fn is_dirty(self) -> bool {
        self != Self::None
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::None => "NONE",
            Self::Updated => "UPDATED",
            Self::Mutated => "MUTATED",
        };
        f.write_str(label)
    }
}
