use std::collections::BTreeMap;

use once_cell::sync::Lazy;

use crate::dof::{DofData, DofHandle, DofLayout, DofTable};
use crate::equation::{AssemblyUnit, Equation, SideSetRole};
use crate::fem_error::FemError;
use crate::groups::bc::BoundaryCondition;
use crate::groups::{DofTarget, dirichlet_targets, lumped_loads, unit_dof_list};
use crate::topology::entity::GroupId;
use crate::topology::mesh::Mesh;

static EMPTY_SIDESET: Lazy<SideSet> = Lazy::new(SideSet::default);

/// Specialization of a sideset by its domain role.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum SideSetKind {
    #[default]
    Plain,
    /// Interface between the elements of `master_block` and `slave_block`.
    Cut {
        master_block: GroupId,
        slave_block: GroupId,
    },
    ThinShell { layers: usize },
}

impl SideSetKind {
    pub fn role(&self) -> SideSetRole {
        match *self {
            SideSetKind::Plain => SideSetRole::Plain,
            SideSetKind::Cut { .. } => SideSetRole::Cut,
            SideSetKind::ThinShell { layers } => SideSetRole::ThinShell { layers },
        }
    }
}

/// The facets of one mesh sideset owned by this rank.
#[derive(Clone, Debug, Default)]
pub struct SideSet {
    id: GroupId,
    kind: SideSetKind,
    facets: Vec<usize>,
    table: DofTable,
    bcs: Vec<BoundaryCondition>,
    facet_dofs: Vec<Vec<DofHandle>>,
}

impl SideSet {
    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn kind(&self) -> SideSetKind {
        self.kind
    }

    /// Local mesh indices of the owned facets.
    pub fn facets(&self) -> &[usize] {
        &self.facets
    }

    pub fn table(&self) -> &DofTable {
        &self.table
    }

    pub fn bcs(&self) -> &[BoundaryCondition] {
        &self.bcs
    }

    pub fn facet_dofs(&self, i: usize) -> &[DofHandle] {
        self.facet_dofs.get(i).map_or(&[], Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.facets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facets.is_empty()
    }

    fn units<'m>(&self, mesh: &'m Mesh) -> Vec<AssemblyUnit<'m>> {
        self.facets
            .iter()
            .map(|&i| AssemblyUnit::Facet(&mesh.facets()[i]))
            .collect()
    }
}

fn classify(
    mesh: &Mesh,
    id: GroupId,
    role: SideSetRole,
    facets: &[usize],
) -> Result<SideSetKind, FemError> {
    match role {
        SideSetRole::Plain => Ok(SideSetKind::Plain),
        SideSetRole::ThinShell { layers } => Ok(SideSetKind::ThinShell { layers }),
        SideSetRole::Cut => {
            let mut blocks = None;
            for &i in facets {
                let f = &mesh.facets()[i];
                let slave = f.slave.ok_or_else(|| {
                    FemError::InvalidConfiguration(format!(
                        "cut sideset {id}: facet {} has no slave element",
                        f.id
                    ))
                })?;
                if blocks.is_none() {
                    blocks = Some((mesh.element(f.master)?.block, mesh.element(slave)?.block));
                }
            }
            let (master_block, slave_block) = blocks.unwrap_or_default();
            Ok(SideSetKind::Cut {
                master_block,
                slave_block,
            })
        }
    }
}

/// Sidesets selected by the equation that have owned facets on this rank.
#[derive(Clone, Debug, Default)]
pub struct SideSetData {
    sidesets: BTreeMap<GroupId, SideSet>,
}

impl SideSetData {
    pub fn new(mesh: &Mesh, eq: &dyn Equation, rank: usize) -> Result<Self, FemError> {
        let mut sidesets = BTreeMap::new();
        for id in eq.selected_sidesets() {
            let facets: Vec<usize> = mesh
                .sideset_facets(id)
                .filter(|(_, f)| f.owner == rank)
                .map(|(i, _)| i)
                .collect();
            if facets.is_empty() {
                log::debug!("rank {rank}: sideset {id} has no owned facets, skipped");
                continue;
            }
            let kind = classify(mesh, id, eq.sideset_role(id), &facets)?;
            sidesets.insert(
                id,
                SideSet {
                    id,
                    kind,
                    facets,
                    table: DofTable::for_sideset(eq, id),
                    ..SideSet::default()
                },
            );
        }
        Ok(Self { sidesets })
    }

    /// The sideset with id `id`, or an empty sideset if this rank owns none of it.
    pub fn sideset(&self, id: GroupId) -> &SideSet {
        self.sidesets.get(&id).unwrap_or(&EMPTY_SIDESET)
    }

    pub fn contains(&self, id: GroupId) -> bool {
        self.sidesets.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SideSet> {
        self.sidesets.values()
    }

    pub fn len(&self) -> usize {
        self.sidesets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sidesets.is_empty()
    }

    pub fn bind_bc(&mut self, id: GroupId, bc: BoundaryCondition) -> bool {
        match self.sidesets.get_mut(&id) {
            Some(s) => {
                s.bcs.push(bc);
                true
            }
            None => {
                log::debug!("boundary condition on sideset {id} ignored: not present on this rank");
                false
            }
        }
    }

    pub(crate) fn link_dofs(
        &mut self,
        mesh: &Mesh,
        dofs: &DofData,
        eq: &dyn Equation,
        enforce_linear: bool,
    ) -> Result<(), FemError> {
        for s in self.sidesets.values_mut() {
            let expected = eq.number_of_dofs_per_element(s.id);
            let role = s.kind.role();
            let mut lists = Vec::with_capacity(s.facets.len());
            for u in s.units(mesh) {
                let list = unit_dof_list(mesh, u, &s.table, role, dofs, enforce_linear)?;
                if let Some(n) = expected.filter(|&n| n != list.len()) {
                    return Err(FemError::ElementDofCountMismatch {
                        group: s.id,
                        expected: n,
                        got: list.len(),
                    });
                }
                lists.push(list);
            }
            s.facet_dofs = lists;
        }
        Ok(())
    }

    pub fn dirichlet_targets(
        &self,
        mesh: &Mesh,
        layout: &DofLayout,
        time: f64,
        enforce_linear: bool,
    ) -> Vec<DofTarget> {
        self.iter()
            .filter(|s| !s.bcs.is_empty())
            .flat_map(|s| {
                dirichlet_targets(
                    mesh,
                    &s.units(mesh),
                    s.kind.role(),
                    &s.bcs,
                    &s.table,
                    layout,
                    time,
                    enforce_linear,
                )
            })
            .collect()
    }

    /// Surface loads lumped onto facet nodes.
    pub fn load_targets(
        &self,
        mesh: &Mesh,
        layout: &DofLayout,
        time: f64,
        enforce_linear: bool,
    ) -> Result<Vec<DofTarget>, FemError> {
        let mut out = Vec::new();
        for s in self.iter().filter(|s| !s.bcs.is_empty()) {
            out.extend(lumped_loads(
                mesh,
                &s.units(mesh),
                SideSetRole::Plain,
                &s.bcs,
                &s.table,
                layout,
                time,
                enforce_linear,
            )?);
        }
        Ok(out)
    }
}
