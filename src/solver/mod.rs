//! Sparse global system: DOF graph, assembly, solve and persistence.

pub mod archive;
pub mod graph;
pub mod linear;
pub mod solver_data;

pub use archive::SystemArchive;
pub use linear::{ConjugateGradient, DirectLu, LinearSolver, LinearSolverKind};
pub use solver_data::{AssemblyInput, AssemblyTarget, GlobalSystem, SolverData};
