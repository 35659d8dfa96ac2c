//! Global DOF id arithmetic.
//!
//! Ids are laid out category by category (node, edge, face, cell, lambda).
//! Category `c` owns the contiguous range `base[c] .. base[c + 1]` with
//! `base[c + 1] = base[c] + (max_entity_id[c] + 1) * slots[c]`, and a DOF with
//! slot `s` on entity `e` gets `base[c] + e * slots[c] + s`. Slot `s` encodes
//! DOF type `s / multiplicity[c]` and sub-index `s % multiplicity[c]`.
//!
//! The id of a DOF therefore depends only on the mesh and the equation, never
//! on how ranks are scheduled.

use crate::dof::bitset::TypeSet;
use crate::equation::Equation;
use crate::fem_error::FemError;
use crate::topology::entity::{EntityCategory, EntityId};

const N: usize = EntityCategory::COUNT;

/// Slots and multiplicity per category, derived from the equation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DofLayout {
    n_types: usize,
    slots: [usize; N],
    multiplicity: [usize; N],
    /// Category each DOF type lives on, once declared.
    type_category: Vec<Option<EntityCategory>>,
}

impl DofLayout {
    /// Inspect every group the equation selects and validate its declarations.
    pub fn from_equation(eq: &dyn Equation) -> Result<Self, FemError> {
        let n_types = eq.dof_fields().len();
        let multiplicity = [
            1,
            eq.edge_multiplicity().max(1),
            eq.face_multiplicity().max(1),
            eq.cell_multiplicity().max(1),
            eq.lambda_multiplicity().max(1),
        ];
        let mut declared = [false; N];
        let mut type_category: Vec<Option<EntityCategory>> = vec![None; n_types];

        let mut declare = |cat: EntityCategory, types: Vec<usize>| -> Result<(), FemError> {
            for t in types {
                if t >= n_types {
                    return Err(FemError::UnknownDofType {
                        dof_type: t,
                        count: n_types,
                    });
                }
                match type_category[t] {
                    Some(first) if first != cat => {
                        return Err(FemError::FieldCategoryConflict {
                            dof_type: t,
                            first,
                            second: cat,
                        });
                    }
                    _ => type_category[t] = Some(cat),
                }
                declared[cat.index()] = true;
            }
            Ok(())
        };

        for b in eq.selected_blocks() {
            declare(EntityCategory::Node, eq.dofs_per_node(b))?;
            declare(EntityCategory::Edge, eq.dofs_per_edge(b))?;
            declare(EntityCategory::Face, eq.dofs_per_face(b))?;
            declare(EntityCategory::Cell, eq.dofs_per_cell(b))?;
        }
        for s in eq.selected_sidesets() {
            declare(EntityCategory::Node, eq.dofs_per_node(s))?;
            declare(EntityCategory::Edge, eq.dofs_per_edge(s))?;
            declare(EntityCategory::Lambda, eq.lambda_dofs(s))?;
        }

        let mut slots = [0usize; N];
        for c in EntityCategory::ALL {
            if declared[c.index()] {
                slots[c.index()] = n_types * multiplicity[c.index()];
            }
            if slots[c.index()] > TypeSet::CAPACITY {
                return Err(FemError::TypeCapacityExceeded {
                    category: c,
                    slots: slots[c.index()],
                    capacity: TypeSet::CAPACITY,
                });
            }
        }

        if eq.num_rhs_cols() > 1 && declared[EntityCategory::Edge.index()] {
            return Err(FemError::RhsColumnsWithEdgeDofs {
                cols: eq.num_rhs_cols(),
            });
        }

        Ok(Self {
            n_types,
            slots,
            multiplicity,
            type_category,
        })
    }

    pub fn n_types(&self) -> usize {
        self.n_types
    }

    pub fn slots(&self, cat: EntityCategory) -> usize {
        self.slots[cat.index()]
    }

    pub fn multiplicity(&self, cat: EntityCategory) -> usize {
        self.multiplicity[cat.index()]
    }

    /// Slot of DOF type `dof_type`, sub-index `k` on category `cat`.
    #[inline]
    pub fn slot(&self, cat: EntityCategory, dof_type: usize, k: usize) -> usize {
        dof_type * self.multiplicity[cat.index()] + k
    }

    pub fn type_category(&self, dof_type: usize) -> Option<EntityCategory> {
        self.type_category.get(dof_type).copied().flatten()
    }
}

/// Category offsets of the global id space.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DofIdScheme {
    base: [u64; N + 1],
    slots: [u64; N],
    multiplicity: [u64; N],
}

impl DofIdScheme {
    pub fn new(layout: &DofLayout, max_ids: [Option<EntityId>; N]) -> Self {
        let mut s = DofIdScheme::default();
        for c in EntityCategory::ALL {
            let i = c.index();
            let slots = layout.slots(c) as u64;
            let entities = max_ids[i].map_or(0, |m| m + 1);
            s.slots[i] = slots;
            s.multiplicity[i] = layout.multiplicity(c) as u64;
            s.base[i + 1] = s.base[i] + entities * slots;
        }
        s
    }

    /// Global id of slot `slot` on entity `entity`.
    #[inline]
    pub fn id(&self, cat: EntityCategory, entity: EntityId, slot: usize) -> u64 {
        let i = cat.index();
        debug_assert!((slot as u64) < self.slots[i]);
        self.base[i] + entity * self.slots[i] + slot as u64
    }

    /// Inverse of [`id`](Self::id): `(category, entity, slot)`.
    pub fn decode(&self, id: u64) -> Option<(EntityCategory, EntityId, usize)> {
        EntityCategory::ALL.into_iter().find_map(|c| {
            let i = c.index();
            (id >= self.base[i] && id < self.base[i + 1]).then(|| {
                let rel = id - self.base[i];
                (c, rel / self.slots[i], (rel % self.slots[i]) as usize)
            })
        })
    }

    /// Size of the id space (not the number of DOFs that exist).
    pub fn id_space(&self) -> u64 {
        self.base[N]
    }

    pub fn multiplicity(&self, cat: EntityCategory) -> usize {
        self.multiplicity[cat.index()] as usize
    }

    /// Flat representation used to broadcast the scheme.
    pub fn to_words(&self) -> Vec<u64> {
        self.base
            .iter()
            .chain(&self.slots)
            .chain(&self.multiplicity)
            .copied()
            .collect()
    }

    pub fn from_words(words: &[u64]) -> Result<Self, FemError> {
        if words.len() != 3 * N + 1 {
            return Err(FemError::InvalidConfiguration(format!(
                "DOF id scheme needs {} words, got {}",
                3 * N + 1,
                words.len()
            )));
        }
        let mut s = DofIdScheme::default();
        s.base.copy_from_slice(&words[..=N]);
        s.slots.copy_from_slice(&words[N + 1..2 * N + 1]);
        s.multiplicity.copy_from_slice(&words[2 * N + 1..]);
        Ok(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equation::ElementContext;
    use crate::topology::entity::GroupId;
    use nalgebra::DMatrix;
    use proptest::prelude::*;

    struct Decl {
        fields: usize,
        node: Vec<usize>,
        edge: Vec<usize>,
        lambda: Vec<usize>,
        edge_mult: usize,
        rhs_cols: usize,
    }

    impl Equation for Decl {
        fn selected_blocks(&self) -> Vec<GroupId> {
            vec![1]
        }
        fn selected_sidesets(&self) -> Vec<GroupId> {
            if self.lambda.is_empty() { vec![] } else { vec![7] }
        }
        fn dof_fields(&self) -> Vec<String> {
            (0..self.fields).map(|i| format!("f{i}")).collect()
        }
        fn dofs_per_node(&self, g: GroupId) -> Vec<usize> {
            if g == 1 { self.node.clone() } else { vec![] }
        }
        fn dofs_per_edge(&self, g: GroupId) -> Vec<usize> {
            if g == 1 { self.edge.clone() } else { vec![] }
        }
        fn lambda_dofs(&self, g: GroupId) -> Vec<usize> {
            if g == 7 { self.lambda.clone() } else { vec![] }
        }
        fn edge_multiplicity(&self) -> usize {
            self.edge_mult
        }
        fn num_rhs_cols(&self) -> usize {
            self.rhs_cols
        }
        fn compute_jacobian(&mut self, _: &ElementContext<'_>, _: &mut DMatrix<f64>) {}
        fn compute_rhs(&mut self, _: &ElementContext<'_>, _: &mut DMatrix<f64>) {}
    }

    fn decl() -> Decl {
        Decl {
            fields: 2,
            node: vec![0],
            edge: vec![1],
            lambda: vec![],
            edge_mult: 3,
            rhs_cols: 1,
        }
    }

    #[test]
    fn layout_counts_slots_per_category() {
        let l = DofLayout::from_equation(&decl()).unwrap();
        assert_eq!(l.slots(EntityCategory::Node), 2);
        assert_eq!(l.slots(EntityCategory::Edge), 6);
        assert_eq!(l.slots(EntityCategory::Cell), 0);
        assert_eq!(l.slot(EntityCategory::Edge, 1, 2), 5);
        assert_eq!(l.type_category(1), Some(EntityCategory::Edge));
    }

    #[test]
    fn conflicting_categories_are_rejected() {
        let mut d = decl();
        d.edge = vec![0];
        assert!(matches!(
            DofLayout::from_equation(&d),
            Err(FemError::FieldCategoryConflict { dof_type: 0, .. })
        ));
    }

    #[test]
    fn type_capacity_is_checked() {
        let mut d = decl();
        d.fields = 11;
        assert!(matches!(
            DofLayout::from_equation(&d),
            Err(FemError::TypeCapacityExceeded {
                category: EntityCategory::Edge,
                slots: 33,
                ..
            })
        ));
    }

    #[test]
    fn multiple_rhs_with_edges_is_rejected() {
        let mut d = decl();
        d.rhs_cols = 2;
        assert!(matches!(
            DofLayout::from_equation(&d),
            Err(FemError::RhsColumnsWithEdgeDofs { cols: 2 })
        ));
    }

    #[test]
    fn unknown_type_is_rejected() {
        let mut d = decl();
        d.node = vec![5];
        assert!(matches!(
            DofLayout::from_equation(&d),
            Err(FemError::UnknownDofType { dof_type: 5, count: 2 })
        ));
    }

    #[test]
    fn words_roundtrip() {
        let l = DofLayout::from_equation(&decl()).unwrap();
        let s = DofIdScheme::new(&l, [Some(9), Some(4), None, None, None]);
        assert_eq!(DofIdScheme::from_words(&s.to_words()).unwrap(), s);
        assert!(DofIdScheme::from_words(&[1, 2]).is_err());
    }

    proptest! {
        #[test]
        fn ids_are_unique_and_decodable(
            max_node in 0u64..50,
            max_edge in 0u64..50,
            entity in 0u64..50,
            slot in 0usize..6,
        ) {
            let l = DofLayout::from_equation(&decl()).unwrap();
            let s = DofIdScheme::new(&l, [Some(max_node), Some(max_edge), None, None, None]);
            let node_slot = slot % 2;
            if entity <= max_node {
                let id = s.id(EntityCategory::Node, entity, node_slot);
                prop_assert_eq!(s.decode(id), Some((EntityCategory::Node, entity, node_slot)));
            }
            if entity <= max_edge {
                let id = s.id(EntityCategory::Edge, entity, slot);
                prop_assert!(id >= (max_node + 1) * 2);
                prop_assert_eq!(s.decode(id), Some((EntityCategory::Edge, entity, slot)));
            }
            prop_assert_eq!(s.id_space(), (max_node + 1) * 2 + (max_edge + 1) * 6);
        }
    }
}
