//! Scope keys and the grid hash.

use std::fmt;
use std::hash::{Hash, Hasher};

use glam::IVec2;
use serde::Serialize;

use crate::coord::zoom_from_dimensions;

/// Packs a tile key into a single integer.
///
/// Layout, high to low: `dims.x | dims.y | index.x | index.y`, each as the
/// 32-bit two's complement pattern of the component. Every `i32` quadruple
/// maps to a distinct value.
pub fn grid_hash(dimensions: IVec2, index: IVec2) -> u128 {
    (u128::from(dimensions.x as u32) << 96)
        | (u128::from(dimensions.y as u32) << 64)
        | (u128::from(index.x as u32) << 32)
        | u128::from(index.y as u32)
}

/// One tile at one zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridKey {
    /// Tile column and row.
    pub index: IVec2,
    /// Grid columns and rows at this zoom.
    pub dimensions: IVec2,
}

impl GridKey {
    /// Create a key.
    pub fn new(index: IVec2, dimensions: IVec2) -> Self {
        Self { index, dimensions }
    }

    /// Zoom level derived from the row count.
    pub fn zoom(&self) -> u32 {
        zoom_from_dimensions(self.dimensions)
    }

    /// See [`grid_hash`].
    pub fn grid_hash(&self) -> u128 {
        grid_hash(self.dimensions, self.index)
    }
}

impl Hash for GridKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u128(self.grid_hash());
    }
}

impl fmt::Display for GridKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{} ({}x{})",
            self.zoom(),
            self.index.x,
            self.index.y,
            self.dimensions.x,
            self.dimensions.y
        )
    }
}

/// Identifier of an id-keyed scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SerializableId(String);

impl SerializableId {
    /// Create an id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SerializableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SerializableId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for SerializableId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Key of a scope within its loader.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScopeKey {
    /// Explicit id.
    Id(SerializableId),
    /// Grid tile.
    Grid(GridKey),
}

impl ScopeKey {
    /// The grid key, for grid scopes.
    pub fn as_grid(&self) -> Option<&GridKey> {
        match self {
            Self::Grid(key) => Some(key),
            Self::Id(_) => None,
        }
    }

    /// The id, for id scopes.
    pub fn as_id(&self) -> Option<&SerializableId> {
        match self {
            Self::Id(id) => Some(id),
            Self::Grid(_) => None,
        }
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "id:{}", id),
            Self::Grid(key) => write!(f, "tile:{}", key),
        }
    }
}

impl From<GridKey> for ScopeKey {
    fn from(key: GridKey) -> Self {
        Self::Grid(key)
    }
}

impl From<SerializableId> for ScopeKey {
    fn from(id: SerializableId) -> Self {
        Self::Id(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_grid_hash_layout() {
        let hash = grid_hash(IVec2::new(1, 2), IVec2::new(3, 4));
        assert_eq!(hash, (1u128 << 96) | (2u128 << 64) | (3u128 << 32) | 4);
    }

    #[test]
    fn test_grid_hash_distinguishes_swapped_components() {
        let a = grid_hash(IVec2::new(8, 8), IVec2::new(1, 2));
        let b = grid_hash(IVec2::new(8, 8), IVec2::new(2, 1));
        let c = grid_hash(IVec2::new(1, 2), IVec2::new(8, 8));
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_grid_hash_negative_components() {
        let a = grid_hash(IVec2::new(4, 4), IVec2::new(-1, 0));
        let b = grid_hash(IVec2::new(4, 4), IVec2::new(i32::MAX, 0));
        assert_ne!(a, b);
    }

    #[test]
    fn test_grid_key_as_map_key() {
        let mut map = HashMap::new();
        let key = GridKey::new(IVec2::new(5, 9), IVec2::new(16, 16));
        map.insert(ScopeKey::from(key), "tile");
        let same = GridKey::new(IVec2::new(5, 9), IVec2::new(16, 16));
        assert_eq!(map.get(&ScopeKey::Grid(same)), Some(&"tile"));
        let other = GridKey::new(IVec2::new(9, 5), IVec2::new(16, 16));
        assert_eq!(map.get(&ScopeKey::Grid(other)), None);
    }

    #[test]
    fn test_grid_key_zoom_and_display() {
        let key = GridKey::new(IVec2::new(3, 1), IVec2::new(8, 4));
        assert_eq!(key.zoom(), 2);
        assert_eq!(key.to_string(), "2/3/1 (8x4)");
        assert_eq!(ScopeKey::from(key).to_string(), "tile:2/3/1 (8x4)");
    }

    #[test]
    fn test_id_key() {
        let key = ScopeKey::from(SerializableId::from("airport-KSEA"));
        assert_eq!(key.as_id().map(SerializableId::as_str), Some("airport-KSEA"));
        assert!(key.as_grid().is_none());
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        fn ivec2() -> impl Strategy<Value = IVec2> {
            (any::<i32>(), any::<i32>()).prop_map(|(x, y)| IVec2::new(x, y))
        }

        proptest! {
            #[test]
            fn test_grid_hash_deterministic(dims in ivec2(), index in ivec2()) {
                prop_assert_eq!(grid_hash(dims, index), grid_hash(dims, index));
            }

            #[test]
            fn test_grid_hash_injective(
                a_dims in ivec2(), a_index in ivec2(),
                b_dims in ivec2(), b_index in ivec2(),
            ) {
                let same_key = a_dims == b_dims && a_index == b_index;
                let same_hash = grid_hash(a_dims, a_index) == grid_hash(b_dims, b_index);
                prop_assert_eq!(same_key, same_hash);
            }

            #[test]
            fn test_grid_hash_single_component_change(
                dims in ivec2(), index in ivec2(), lane in 0usize..4, delta in 1i32..=i32::MAX,
            ) {
                let (mut d2, mut i2) = (dims, index);
                match lane {
                    0 => d2.x = d2.x.wrapping_add(delta),
                    1 => d2.y = d2.y.wrapping_add(delta),
                    2 => i2.x = i2.x.wrapping_add(delta),
                    _ => i2.y = i2.y.wrapping_add(delta),
                }
                prop_assert_ne!(grid_hash(dims, index), grid_hash(d2, i2));
            }
        }
    }
}
