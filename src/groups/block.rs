use std::collections::BTreeMap;

use once_cell::sync::Lazy;

use crate::dof::{DofData, DofHandle, DofLayout, DofTable};
use crate::equation::{AssemblyUnit, Equation, SideSetRole};
use crate::fem_error::FemError;
use crate::groups::bc::BoundaryCondition;
use crate::groups::{DofTarget, dirichlet_targets, lumped_loads, unit_dof_list};
use crate::topology::entity::GroupId;
use crate::topology::mesh::Mesh;

static EMPTY_BLOCK: Lazy<Block> = Lazy::new(Block::default);

/// The elements of one mesh block owned by this rank.
#[derive(Clone, Debug, Default)]
pub struct Block {
    id: GroupId,
    elements: Vec<usize>,
    table: DofTable,
    bcs: Vec<BoundaryCondition>,
    element_dofs: Vec<Vec<DofHandle>>,
}

impl Block {
    pub fn id(&self) -> GroupId {
        self.id
    }

    /// Local mesh indices of the owned elements.
    pub fn elements(&self) -> &[usize] {
        &self.elements
    }

    pub fn table(&self) -> &DofTable {
        &self.table
    }

    pub fn bcs(&self) -> &[BoundaryCondition] {
        &self.bcs
    }

    /// DOFs of the `i`-th owned element in equation order.
    pub fn element_dofs(&self, i: usize) -> &[DofHandle] {
        self.element_dofs.get(i).map_or(&[], Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    fn units<'m>(&self, mesh: &'m Mesh) -> Vec<AssemblyUnit<'m>> {
        self.elements
            .iter()
            .map(|&i| AssemblyUnit::Element(&mesh.elements()[i]))
            .collect()
    }

    fn link_dofs(
        &mut self,
        mesh: &Mesh,
        dofs: &DofData,
        eq: &dyn Equation,
        enforce_linear: bool,
    ) -> Result<(), FemError> {
        let expected = eq.number_of_dofs_per_element(self.id);
        self.element_dofs = self
            .units(mesh)
            .into_iter()
            .map(|u| {
                let list = unit_dof_list(
                    mesh,
                    u,
                    &self.table,
                    SideSetRole::Plain,
                    dofs,
                    enforce_linear,
                )?;
                match expected {
                    Some(n) if n != list.len() => Err(FemError::ElementDofCountMismatch {
                        group: self.id,
                        expected: n,
                        got: list.len(),
                    }),
                    _ => Ok(list),
                }
            })
            .collect::<Result<_, _>>()?;
        Ok(())
    }
}

/// Blocks selected by the equation that have owned elements on this rank.
#[derive(Clone, Debug, Default)]
pub struct BlockData {
    blocks: BTreeMap<GroupId, Block>,
}

impl BlockData {
    pub fn new(mesh: &Mesh, eq: &dyn Equation, rank: usize) -> Self {
        let mut blocks = BTreeMap::new();
        for id in eq.selected_blocks() {
            let elements: Vec<usize> = mesh
                .block_elements(id)
                .filter(|(_, e)| e.owner == rank)
                .map(|(i, _)| i)
                .collect();
            if elements.is_empty() {
                log::debug!("rank {rank}: block {id} has no owned elements, skipped");
                continue;
            }
            blocks.insert(
                id,
                Block {
                    id,
                    elements,
                    table: DofTable::for_block(eq, id),
                    ..Block::default()
                },
            );
        }
        Self { blocks }
    }

    /// The block with id `id`, or an empty block if this rank owns none of it.
    pub fn block(&self, id: GroupId) -> &Block {
        self.blocks.get(&id).unwrap_or(&EMPTY_BLOCK)
    }

    pub fn contains(&self, id: GroupId) -> bool {
        self.blocks.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Block> {
        self.blocks.values()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Bind a boundary condition; returns false if the block is absent here.
    pub fn bind_bc(&mut self, id: GroupId, bc: BoundaryCondition) -> bool {
        match self.blocks.get_mut(&id) {
            Some(b) => {
                b.bcs.push(bc);
                true
            }
            None => {
                log::debug!("boundary condition on block {id} ignored: not present on this rank");
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
        for b in self.blocks.values_mut() {
            b.link_dofs(mesh, dofs, eq, enforce_linear)?;
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
            .filter(|b| !b.bcs.is_empty())
            .flat_map(|b| {
                dirichlet_targets(
                    mesh,
                    &b.units(mesh),
                    SideSetRole::Plain,
                    &b.bcs,
                    &b.table,
                    layout,
                    time,
                    enforce_linear,
                )
            })
            .collect()
    }

    /// Volume loads lumped onto element nodes.
    pub fn load_targets(
        &self,
        mesh: &Mesh,
        layout: &DofLayout,
        time: f64,
        enforce_linear: bool,
    ) -> Result<Vec<DofTarget>, FemError> {
        let mut out = Vec::new();
        for b in self.iter().filter(|b| !b.bcs.is_empty()) {
            out.extend(lumped_loads(
                mesh,
                &b.units(mesh),
                SideSetRole::Plain,
                &b.bcs,
                &b.table,
                layout,
                time,
                enforce_linear,
            )?);
        }
        Ok(out)
    }
}
