//! Entity categories that can carry degrees of freedom.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a mesh entity (node, edge, face, element or facet).
///
/// Ids are global: every rank that sees an entity knows it by the same id.
pub type EntityId = u64;

/// Identifier of a block, sideset or bearing.
pub type GroupId = u32;

/// The five kinds of mesh entities a DOF can live on.
///
/// The declaration order is also the order of the DOF id ranges:
/// node < edge < face < cell < lambda.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[repr(u8)]
pub enum EntityCategory {
    Node = 0,
    Edge = 1,
    Face = 2,
    /// The volume element itself.
    Cell = 3,
    /// An interface facet (Lagrange-multiplier DOFs).
    Lambda = 4,
}

impl EntityCategory {
    pub const COUNT: usize = 5;

    pub const ALL: [EntityCategory; Self::COUNT] = [
        EntityCategory::Node,
        EntityCategory::Edge,
        EntityCategory::Face,
        EntityCategory::Cell,
        EntityCategory::Lambda,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(i: usize) -> Option<Self> {
        Self::ALL.get(i).copied()
    }
}

impl fmt::Display for EntityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntityCategory::Node => "node",
            EntityCategory::Edge => "edge",
            EntityCategory::Face => "face",
            EntityCategory::Cell => "cell",
            EntityCategory::Lambda => "lambda",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_roundtrip_and_order() {
        for (i, c) in EntityCategory::ALL.iter().enumerate() {
            assert_eq!(c.index(), i);
            assert_eq!(EntityCategory::from_index(i), Some(*c));
        }
        assert!(EntityCategory::Node < EntityCategory::Lambda);
        assert_eq!(EntityCategory::from_index(5), None);
    }
}
