//! Degrees of freedom: configuration, id arithmetic and the distributed registry.

pub mod bitset;
pub mod dof_data;
pub mod parameters;
pub mod record;
pub mod scheme;

pub use bitset::{RankSet, TypeSet};
pub use dof_data::{DofData, unit_entities};
pub use parameters::{DEFAULT_DIVERGENCE_BOUND, Parameters};
pub use record::{Dof, DofHandle, DofTable};
pub use scheme::{DofIdScheme, DofLayout};
