//! Mesh topology consumed by the DOF manager.
//!
//! - [`entity`]: entity categories and id types
//! - [`element_kind`]: element shapes, corner nodes, linear shape functions
//! - [`mesh`]: one rank's view of a partitioned mesh, including its fields

pub mod element_kind;
pub mod entity;
pub mod mesh;

pub use element_kind::ElementKind;
pub use entity::{EntityCategory, EntityId, GroupId};
pub use mesh::{Element, Facet, Field, Mesh, Node, SubEntity};
