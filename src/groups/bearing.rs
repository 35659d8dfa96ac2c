use std::collections::BTreeMap;

use once_cell::sync::Lazy;

use crate::dof::{DofData, DofHandle, DofLayout, DofTable};
use crate::equation::Equation;
use crate::fem_error::FemError;
use crate::groups::DofTarget;
use crate::groups::bc::BoundaryCondition;
use crate::topology::entity::{EntityCategory, EntityId, GroupId};
use crate::topology::mesh::Mesh;

static EMPTY_BEARING: Lazy<Bearing> = Lazy::new(Bearing::default);

/// A single-node set, used for point loads and point supports.
#[derive(Clone, Debug, Default)]
pub struct Bearing {
    id: GroupId,
    node: Option<EntityId>,
    table: DofTable,
    bcs: Vec<BoundaryCondition>,
    dofs: Vec<DofHandle>,
}

impl Bearing {
    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn node(&self) -> Option<EntityId> {
        self.node
    }

    pub fn table(&self) -> &DofTable {
        &self.table
    }

    pub fn bcs(&self) -> &[BoundaryCondition] {
        &self.bcs
    }

    /// Node DOFs present on the bearing node.
    pub fn dofs(&self) -> &[DofHandle] {
        &self.dofs
    }

    pub fn is_empty(&self) -> bool {
        self.node.is_none()
    }
}

/// Bearings selected by the equation.
///
/// The coordinator holds the complete mesh and every DOF, so it places all
/// bearings; worker ranks hold none. A point condition therefore reaches its
/// DOF whichever rank owns the node or the elements around it.
#[derive(Clone, Debug, Default)]
pub struct BearingData {
    bearings: BTreeMap<GroupId, Bearing>,
    unplaced: Vec<GroupId>,
}

impl BearingData {
    pub fn new(mesh: &Mesh, eq: &dyn Equation, coordinator: bool) -> Self {
        if !coordinator {
            return Self::default();
        }
        let table = DofTable::for_bearing(eq);
        let mut bearings = BTreeMap::new();
        let mut unplaced = Vec::new();
        for id in eq.selected_bearings() {
            let Some(node) = mesh.bearing_node(id) else {
                unplaced.push(id);
                continue;
            };
            bearings.insert(
                id,
                Bearing {
                    id,
                    node: Some(node),
                    table: table.clone(),
                    ..Bearing::default()
                },
            );
        }
        Self { bearings, unplaced }
    }

    pub fn bearing(&self, id: GroupId) -> &Bearing {
        self.bearings.get(&id).unwrap_or(&EMPTY_BEARING)
    }

    pub fn contains(&self, id: GroupId) -> bool {
        self.bearings.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bearing> {
        self.bearings.values()
    }

    pub fn len(&self) -> usize {
        self.bearings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bearings.is_empty()
    }

    pub fn bind_bc(&mut self, id: GroupId, bc: BoundaryCondition) -> bool {
        match self.bearings.get_mut(&id) {
            Some(b) => {
                b.bcs.push(bc);
                true
            }
            None => {
                log::debug!("boundary condition on bearing {id} ignored: not present on this rank");
                false
            }
        }
    }

    /// Every selected bearing sits on a mesh node, and every bound condition
    /// names a node DOF that exists there.
    pub(crate) fn check(&self, dofs: &DofData) -> Result<(), FemError> {
        if let Some(id) = self.unplaced.first() {
            return Err(FemError::InvalidConfiguration(format!(
                "bearing {id} is selected but has no node in the mesh"
            )));
        }
        let layout = dofs
            .layout()
            .ok_or(FemError::NotInitialized("DOFs have not been created"))?;
        for b in self.iter() {
            let Some(node) = b.node else { continue };
            for bc in &b.bcs {
                let t = bc.dof_type();
                if layout.type_category(t) != Some(EntityCategory::Node) {
                    return Err(FemError::InvalidConfiguration(format!(
                        "bearing {}: DOF type {t} is not a node DOF",
                        b.id
                    )));
                }
                if dofs.find(EntityCategory::Node, node, t, 0).is_none() {
                    let slot = layout.slot(EntityCategory::Node, t, 0);
                    return Err(FemError::MissingDof {
                        id: dofs.scheme().id(EntityCategory::Node, node, slot),
                        rank: dofs.rank(),
                    });
                }
            }
        }
        Ok(())
    }

    pub(crate) fn link_dofs(&mut self, dofs: &DofData) {
        for b in self.bearings.values_mut() {
            let Some(node) = b.node else { continue };
            b.dofs = b
                .table
                .types(EntityCategory::Node)
                .iter()
                .filter_map(|&t| dofs.find(EntityCategory::Node, node, t, 0))
                .collect();
        }
    }

    pub fn dirichlet_targets(&self, layout: &DofLayout, time: f64) -> Vec<DofTarget> {
        self.targets(layout, time, true)
    }

    /// Point loads.
    pub fn load_targets(&self, layout: &DofLayout, time: f64) -> Vec<DofTarget> {
        self.targets(layout, time, false)
    }

    fn targets(&self, layout: &DofLayout, time: f64, dirichlet: bool) -> Vec<DofTarget> {
        let mut out = Vec::new();
        for b in self.iter() {
            let Some(node) = b.node else { continue };
            for bc in b.bcs.iter().filter(|bc| bc.is_dirichlet() == dirichlet) {
                if layout.type_category(bc.dof_type()) == Some(EntityCategory::Node) {
                    out.push((EntityCategory::Node, node, bc.dof_type(), bc.value_at(time)));
                }
            }
        }
        out
    }
}
