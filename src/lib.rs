#![cfg_attr(docsrs, feature(doc_cfg))]
//! # dof-sieve
//!
//! dof-sieve numbers the degrees of freedom of a finite-element equation on a
//! rank-partitioned mesh and assembles and solves the resulting sparse system.
//!
//! ## Features
//! - Rank-independent DOF ids: an id is a pure function of entity id, entity
//!   category and DOF type, so every rank that sees a DOF computes the same id
//! - DOFs on nodes, edges, faces, cells and interface facets (Lagrange
//!   multipliers), with per-category multiplicities
//! - Blocks, plain/cut/thin-shell sidesets and single-node bearings carrying
//!   time-scaled Dirichlet conditions and loads
//! - Free×free Jacobian and free×fixed Dirichlet elimination matrix in CSR
//!   form, direct and Newton-Raphson/Picard solves on the coordinating rank
//! - Field collection and distribution across ranks, including linear
//!   interpolation of non-corner nodes on higher-order meshes
//! - Pluggable communication backends (in-process [`LocalComm`](algs::LocalComm)
//!   for tests, MPI behind the `mpi-support` feature)
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! dof-sieve = "0.3"
//! # features = ["mpi-support"]
//! ```
//!
//! Every rank builds its own [`Mesh`](topology::Mesh) view, wraps it in a
//! [`DofManager`](dof_manager::DofManager), binds an
//! [`Equation`](equation::Equation) and its boundary conditions, and then
//! alternates `compute_jacobian_and_rhs` and `solve`. All of these calls are
//! collective.
//!
//! ## Determinism
//!
//! Discovery, numbering and assembly on the coordinator visit ranks and ids in
//! ascending order, so a given mesh and equation produce the same ids, indices
//! and matrices for every rank count.

pub mod algs;
pub mod dof;
pub mod dof_manager;
pub mod equation;
pub mod fem_error;
pub mod field_data;
pub mod groups;
pub mod solver;
pub mod topology;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::algs::communicator::{Communicator, LocalComm, NoComm};
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::dof::{Dof, DofData, DofHandle, Parameters};
    pub use crate::dof_manager::{DofManager, ManagerState};
    pub use crate::equation::{
        Algorithm, AssemblyUnit, ElementContext, Equation, SideSetRole, SolverMode,
    };
    pub use crate::fem_error::FemError;
    pub use crate::groups::{BoundaryCondition, TimeScaling};
    pub use crate::solver::LinearSolverKind;
    pub use crate::topology::{
        Element, ElementKind, EntityCategory, EntityId, Facet, GroupId, Mesh,
    };
}
