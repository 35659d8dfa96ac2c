//! The DOF record and the per-group DOF type table.

use crate::equation::Equation;
use crate::topology::entity::{EntityCategory, EntityId, GroupId};

/// Index of a [`Dof`] in its owning [`DofData`](crate::dof::DofData) arena.
pub type DofHandle = usize;

/// One scalar unknown on one mesh entity.
#[derive(Clone, Debug, PartialEq)]
pub struct Dof {
    /// Globally unique id, identical on every rank.
    pub id: u64,
    pub dof_type: usize,
    pub category: EntityCategory,
    pub entity: EntityId,
    /// Local index of `entity` in this rank's mesh.
    pub entity_index: usize,
    /// Multiplicity sub-index.
    pub sub_index: usize,
    /// Output field this DOF writes into.
    pub field_index: usize,
    pub fixed: bool,
    /// Prescribed value; meaningful only when `fixed`.
    pub value: f64,
    /// Position in the free or fixed partition, depending on `fixed`.
    pub index: usize,
    /// Neighbors sharing at least one element, filled by the solver graph.
    pub adjacency: Vec<DofHandle>,
}

impl Dof {
    pub fn new(
        id: u64,
        dof_type: usize,
        category: EntityCategory,
        entity: EntityId,
        entity_index: usize,
        sub_index: usize,
    ) -> Self {
        Self {
            id,
            dof_type,
            category,
            entity,
            entity_index,
            sub_index,
            field_index: dof_type,
            fixed: false,
            value: 0.0,
            index: 0,
            adjacency: Vec::new(),
        }
    }

    pub fn fix(&mut self, value: f64) {
        self.fixed = true;
        self.value = value;
    }

    pub fn free(&mut self) {
        self.fixed = false;
        self.value = 0.0;
    }
}

/// Which DOF types one group declares on each entity category.
///
/// Lists are sorted and deduplicated; an element's local DOFs follow their
/// order (see [`crate::equation`]).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DofTable {
    lists: [Vec<usize>; EntityCategory::COUNT],
}

impl DofTable {
    /// Table of a block: node, edge, face and cell DOFs.
    pub fn for_block(eq: &dyn Equation, block: GroupId) -> Self {
        Self::from_lists([
            eq.dofs_per_node(block),
            eq.dofs_per_edge(block),
            eq.dofs_per_face(block),
            eq.dofs_per_cell(block),
            Vec::new(),
        ])
    }

    /// Table of a sideset: node, edge and lambda DOFs.
    pub fn for_sideset(eq: &dyn Equation, sideset: GroupId) -> Self {
        Self::from_lists([
            eq.dofs_per_node(sideset),
            eq.dofs_per_edge(sideset),
            Vec::new(),
            Vec::new(),
            eq.lambda_dofs(sideset),
        ])
    }

    /// Table of a bearing: node DOFs of every type the equation declares on
    /// nodes anywhere.
    pub fn for_bearing(eq: &dyn Equation) -> Self {
        let mut node = Vec::new();
        for b in eq.selected_blocks() {
            node.extend(eq.dofs_per_node(b));
        }
        Self::from_lists([node, Vec::new(), Vec::new(), Vec::new(), Vec::new()])
    }

    fn from_lists(mut lists: [Vec<usize>; EntityCategory::COUNT]) -> Self {
        for l in &mut lists {
            l.sort_unstable();
            l.dedup();
        }
        Self { lists }
    }

    pub fn types(&self, cat: EntityCategory) -> &[usize] {
        &self.lists[cat.index()]
    }

    pub fn is_empty(&self) -> bool {
        self.lists.iter().all(Vec::is_empty)
    }

    /// Local DOF count of a unit with `entities[c]` entities per category and
    /// `multiplicity[c]` DOFs per type and entity.
    pub fn count(
        &self,
        entities: [usize; EntityCategory::COUNT],
        multiplicity: [usize; EntityCategory::COUNT],
    ) -> usize {
        EntityCategory::ALL
            .into_iter()
            .map(|c| {
                let i = c.index();
                self.lists[i].len() * entities[i] * multiplicity[i]
            })
            .sum()
    }
}
