//! The equation-object contract.
//!
//! An [`Equation`] is the pluggable weak-form evaluator: it declares which
//! groups it acts on, which DOF types live on which entity categories, and it
//! computes element-level matrices and right-hand sides. The DOF manager never
//! looks inside the physics.
//!
//! # Local DOF order
//!
//! The DOFs handed to an element are ordered by category (node, edge, face,
//! cell, lambda). Within a category they are ordered type-major: for each DOF
//! type of the group's [`DofTable`](crate::dof::DofTable) list, for each entity
//! of the element in local order, for each multiplicity slot. For cut and
//! thin-shell facets the node entities are the facet nodes followed by the
//! slave nodes.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::fem_error::FemError;
use crate::topology::element_kind::ElementKind;
use crate::topology::entity::{EntityId, GroupId};
use crate::topology::mesh::{Element, Facet, Mesh};

/// How `solve` treats the assembled system.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolverMode {
    /// One linear solve; the answer is written straight into the fields.
    Direct,
    /// One nonlinear iteration per `solve` call.
    Iterative,
}

/// Nonlinear update used in [`SolverMode::Iterative`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Algorithm {
    /// `x ← x − ω·A⁻¹(A·x − b)`
    NewtonRaphson,
    /// `x ← ω·A⁻¹b + (1 − ω)·x`
    Picard,
}

/// Domain role a sideset is declared with.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SideSetRole {
    /// Ordinary boundary.
    Plain,
    /// Internal interface between two blocks with duplicated nodes.
    Cut,
    /// Thin shell of `layers` layers between two duplicated node layers.
    ThinShell { layers: usize },
}

/// What an element-level computation is run on.
#[derive(Copy, Clone, Debug)]
pub enum AssemblyUnit<'a> {
    Element(&'a Element),
    Facet(&'a Facet),
}

impl AssemblyUnit<'_> {
    pub fn id(&self) -> EntityId {
        match self {
            AssemblyUnit::Element(e) => e.id,
            AssemblyUnit::Facet(f) => f.id,
        }
    }

    pub fn nodes(&self) -> &[EntityId] {
        match self {
            AssemblyUnit::Element(e) => &e.nodes,
            AssemblyUnit::Facet(f) => &f.nodes,
        }
    }

    pub fn kind(&self) -> ElementKind {
        match self {
            AssemblyUnit::Element(e) => e.kind,
            AssemblyUnit::Facet(f) => f.kind,
        }
    }

    pub fn owner(&self) -> usize {
        match self {
            AssemblyUnit::Element(e) => e.owner,
            AssemblyUnit::Facet(f) => f.owner,
        }
    }
}

/// Everything an equation may read while computing one element.
#[derive(Debug)]
pub struct ElementContext<'a> {
    pub mesh: &'a Mesh,
    pub group: GroupId,
    pub unit: AssemblyUnit<'a>,
    /// Global DOF ids in local order.
    pub dof_ids: &'a [u64],
    /// DOF type of each local DOF.
    pub dof_types: &'a [usize],
    /// Current value of each local DOF.
    pub dof_values: &'a [f64],
    pub integration_order: u32,
    pub time: f64,
}

impl ElementContext<'_> {
    pub fn len(&self) -> usize {
        self.dof_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dof_ids.is_empty()
    }

    pub fn node_coords(&self) -> Result<Vec<[f64; 3]>, FemError> {
        self.mesh.coords_of(self.unit.nodes())
    }
}

/// The weak-form evaluator consumed by the DOF manager.
pub trait Equation {
    /// Human-readable name used in log messages.
    fn name(&self) -> &str {
        "equation"
    }

    fn selected_blocks(&self) -> Vec<GroupId>;

    fn selected_sidesets(&self) -> Vec<GroupId> {
        Vec::new()
    }

    fn selected_bearings(&self) -> Vec<GroupId> {
        Vec::new()
    }

    fn sideset_role(&self, _sideset: GroupId) -> SideSetRole {
        SideSetRole::Plain
    }

    /// Field label of every DOF type; DOF type `i` writes into `dof_fields()[i]`.
    fn dof_fields(&self) -> Vec<String>;

    /// Secondary fields the equation produces (e.g. for projectors).
    fn flux_fields(&self) -> Vec<String> {
        Vec::new()
    }

    fn all_fields(&self) -> Vec<String> {
        let mut all = self.dof_fields();
        all.extend(self.flux_fields());
        all
    }

    /// DOF types on the nodes of group `group`.
    fn dofs_per_node(&self, _group: GroupId) -> Vec<usize> {
        Vec::new()
    }
    fn dofs_per_edge(&self, _group: GroupId) -> Vec<usize> {
        Vec::new()
    }
    fn dofs_per_face(&self, _group: GroupId) -> Vec<usize> {
        Vec::new()
    }
    fn dofs_per_cell(&self, _group: GroupId) -> Vec<usize> {
        Vec::new()
    }
    /// DOF types on the facets of sideset `group`.
    fn lambda_dofs(&self, _group: GroupId) -> Vec<usize> {
        Vec::new()
    }

    fn edge_multiplicity(&self) -> usize {
        1
    }
    fn face_multiplicity(&self) -> usize {
        1
    }
    fn cell_multiplicity(&self) -> usize {
        1
    }
    fn lambda_multiplicity(&self) -> usize {
        1
    }

    /// Element DOF count the equation expects for `group`; `None` accepts what
    /// the DOF table yields.
    fn number_of_dofs_per_element(&self, _group: GroupId) -> Option<usize> {
        None
    }

    fn compute_jacobian(&mut self, ctx: &ElementContext<'_>, jacobian: &mut DMatrix<f64>);

    /// `rhs` has one column per right-hand side.
    fn compute_rhs(&mut self, ctx: &ElementContext<'_>, rhs: &mut DMatrix<f64>);

    fn compute_jacobian_and_rhs(
        &mut self,
        ctx: &ElementContext<'_>,
        jacobian: &mut DMatrix<f64>,
        rhs: &mut DMatrix<f64>,
    ) {
        self.compute_jacobian(ctx, jacobian);
        self.compute_rhs(ctx, rhs);
    }

    fn mode(&self) -> SolverMode {
        SolverMode::Direct
    }

    fn algorithm(&self) -> Algorithm {
        Algorithm::NewtonRaphson
    }

    /// Relaxation factor ω of the iterative update.
    fn omega(&self) -> f64 {
        1.0
    }

    fn num_rhs_cols(&self) -> usize {
        1
    }
}
