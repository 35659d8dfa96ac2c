//! FEM-facing groups: blocks of elements, sidesets of facets, bearings.
//!
//! Each container wraps the ids the equation selects and answers lookups of
//! absent ids with a shared empty sentinel. Blocks and sidesets keep only
//! groups with at least one member owned by this rank; bearings live on the
//! coordinator. Boundary conditions are bound here.

pub mod bc;
pub mod bearing;
pub mod block;
pub mod sideset;

pub use bc::{BcKind, BoundaryCondition, TimeScaling};
pub use bearing::{Bearing, BearingData};
pub use block::{Block, BlockData};
pub use sideset::{SideSet, SideSetData, SideSetKind};

use crate::dof::{DofData, DofHandle, DofLayout, DofTable, unit_entities};
use crate::equation::{AssemblyUnit, SideSetRole};
use crate::fem_error::FemError;
use crate::topology::entity::{EntityCategory, EntityId};
use crate::topology::mesh::Mesh;

/// `(category, entity, dof type, value)` addressed by a boundary condition.
pub type DofTarget = (EntityCategory, EntityId, usize, f64);

/// Local DOF list of one unit, in the order the equation sees it.
pub(crate) fn unit_dof_list(
    mesh: &Mesh,
    unit: AssemblyUnit<'_>,
    table: &DofTable,
    role: SideSetRole,
    dofs: &DofData,
    enforce_linear: bool,
) -> Result<Vec<DofHandle>, FemError> {
    let layout = dofs
        .layout()
        .ok_or(FemError::NotInitialized("DOFs have not been created"))?;
    let mut out = Vec::new();
    for cat in EntityCategory::ALL {
        let types = table.types(cat);
        if types.is_empty() {
            continue;
        }
        let entities = unit_entities(mesh, unit, cat, role, enforce_linear);
        for &t in types {
            for &e in &entities {
                for k in 0..layout.multiplicity(cat) {
                    let h = dofs.find(cat, e, t, k).ok_or_else(|| FemError::MissingDof {
                        id: dofs.scheme().id(cat, e, layout.slot(cat, t, k)),
                        rank: dofs.rank(),
                    })?;
                    out.push(h);
                }
            }
        }
    }
    Ok(out)
}

/// Dirichlet targets of `bcs` on the given units. Only DOF types the group
/// declares in `table` are targeted: the rank owning a unit always holds
/// those DOFs, whatever the partition.
#[allow(clippy::too_many_arguments)]
pub(crate) fn dirichlet_targets(
    mesh: &Mesh,
    units: &[AssemblyUnit<'_>],
    role: SideSetRole,
    bcs: &[BoundaryCondition],
    table: &DofTable,
    layout: &DofLayout,
    time: f64,
    enforce_linear: bool,
) -> Vec<DofTarget> {
    let mut out = Vec::new();
    for bc in bcs.iter().filter(|bc| bc.is_dirichlet()) {
        let t = bc.dof_type();
        let Some(cat) = layout.type_category(t).filter(|&c| table.types(c).contains(&t)) else {
            log::debug!("Dirichlet condition on DOF type {t} not declared by the group ignored");
            continue;
        };
        let v = bc.value_at(time);
        for &unit in units {
            for e in unit_entities(mesh, unit, cat, role, enforce_linear) {
                out.push((cat, e, t, v));
            }
        }
    }
    out
}

/// Loads of `bcs` lumped onto the DOF-carrying nodes of each unit in
/// proportion to the unit's measure. Like Dirichlet targets, loads only
/// reach node DOF types the group declares.
#[allow(clippy::too_many_arguments)]
pub(crate) fn lumped_loads(
    mesh: &Mesh,
    units: &[AssemblyUnit<'_>],
    role: SideSetRole,
    bcs: &[BoundaryCondition],
    table: &DofTable,
    layout: &DofLayout,
    time: f64,
    enforce_linear: bool,
) -> Result<Vec<DofTarget>, FemError> {
    let mut out = Vec::new();
    for bc in bcs.iter().filter(|bc| !bc.is_dirichlet()) {
        let t = bc.dof_type();
        if layout.type_category(t) != Some(EntityCategory::Node)
            || !table.types(EntityCategory::Node).contains(&t)
        {
            log::debug!("load on DOF type {t} ignored: not a node DOF of the group");
            continue;
        }
        let v = bc.value_at(time);
        for &unit in units {
            let nodes = unit_entities(mesh, unit, EntityCategory::Node, role, enforce_linear);
            if nodes.is_empty() {
                continue;
            }
            let n_corners = unit.kind().num_corners().min(unit.nodes().len());
            let corners = mesh.coords_of(&unit.nodes()[..n_corners])?;
            let share = v * unit.kind().measure(&corners) / nodes.len() as f64;
            out.extend(nodes.into_iter().map(|n| (EntityCategory::Node, n, t, share)));
        }
    }
    Ok(out)
}
