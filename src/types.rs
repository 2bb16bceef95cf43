//! Shared value types used across the resolution engine and the storage layer.

use serde::{Deserialize, Serialize};

/// Tri-state outcome of a permission lookup.
///
/// `Undefined` means "no node had an opinion" and is NOT the same as `False`:
/// it is what lets a query fall through to the next level of the defaults chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Tristate {
    True,
    False,
    #[default]
    Undefined,
}

impl Tristate {
    /// Collapses to a boolean; `Undefined` is treated as `false`.
    #[inline]
    pub fn as_bool(self) -> bool {
        matches!(self, Tristate::True)
    }

    #[inline]
    pub fn is_defined(self) -> bool {
        !matches!(self, Tristate::Undefined)
    }
}

impl From<bool> for Tristate {
    fn from(value: bool) -> Self {
        if value {
            Tristate::True
        } else {
            Tristate::False
        }
    }
}

impl From<Option<bool>> for Tristate {
    fn from(value: Option<bool>) -> Self {
        value.map_or(Tristate::Undefined, Tristate::from)
    }
}

/// Which of the two subject variants a subject is.
///
/// Also selects the containing collection (and therefore the collection
/// defaults) during defaults-chain resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubjectKind {
    Group,
    User,
}

impl SubjectKind {
    /// Single character tag used in audit log entries.
    pub fn type_tag(self) -> char {
        match self {
            SubjectKind::Group => 'G',
            SubjectKind::User => 'U',
        }
    }
}
