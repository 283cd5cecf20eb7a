//! Consumer-facing identity traits.

use std::fmt;

use glam::IVec2;

use super::key::SerializableId;

/// Opaque handle identifying one consumer of a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConsumerId(pub u64);

impl fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "consumer#{}", self.0)
    }
}

/// Read-only identity of a candidate item, checked by
/// [`super::LoadScope::is_in_scope`].
///
/// Items answer for the identities they carry; the rest default to `None`.
pub trait ScopeItem {
    /// Explicit id of the item.
    fn id(&self) -> Option<&SerializableId> {
        None
    }

    /// Tile index the item belongs to.
    fn grid_index(&self) -> Option<IVec2> {
        None
    }

    /// Grid dimensions the index refers to.
    fn grid_dimensions(&self) -> Option<IVec2> {
        None
    }
}
